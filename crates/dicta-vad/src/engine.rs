use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VadError {
    #[error("Unsupported frame length: {got} samples (engine expects {expected})")]
    FrameLength { got: usize, expected: usize },

    #[error("VAD engine rejected the frame")]
    EngineRejected,

    #[error("VAD engine failed to initialise: {0}")]
    Init(String),
}

/// A trait for Voice Activity Detection (VAD) engines.
///
/// This defines the common interface for different VAD implementations,
/// allowing them to be used interchangeably in the audio pipeline.
pub trait VadEngine: Send {
    /// Classify one PCM frame. `true` means voiced.
    fn process(&mut self, frame: &[i16]) -> Result<bool, VadError>;
    fn reset(&mut self);
    fn required_sample_rate(&self) -> u32;
    fn required_frame_size_samples(&self) -> usize;
}
