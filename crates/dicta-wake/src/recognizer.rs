use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum WakeError {
    #[error("Wake recogniser model failed to load: {0}")]
    ModelLoad(String),

    #[error("Recognition failed: {0}")]
    Recognition(String),
}

/// Small-vocabulary speech recogniser feeding the wake-word matcher.
///
/// Implementations consume raw 16 kHz mono PCM frames and occasionally
/// yield a finalised text hypothesis. Partial hypotheses are an internal
/// concern; only finalised text reaches the matcher.
pub trait WakeRecognizer: Send {
    /// Feed one frame. Returns a finalised hypothesis when the recogniser
    /// decided an utterance is complete.
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<Option<String>, WakeError>;

    /// Drop any partial hypothesis state.
    fn reset(&mut self);
}
