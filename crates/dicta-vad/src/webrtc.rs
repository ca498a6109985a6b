use webrtc_vad::{SampleRate, Vad, VadMode};

use crate::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::engine::{VadEngine, VadError};

/// WebRTC VAD behind the [`VadEngine`] trait. Frames must be 10/20/30 ms
/// at the configured rate; the pipeline feeds 20 ms frames at 16 kHz.
pub struct WebRtcEngine {
    vad: Vad,
    aggressiveness: u8,
}

// The underlying fvad state is a plain heap allocation with no thread
// affinity; the engine lives on exactly one task at a time.
unsafe impl Send for WebRtcEngine {}

fn mode_for_aggressiveness(aggressiveness: u8) -> VadMode {
    match aggressiveness {
        0 => VadMode::Quality,
        1 => VadMode::LowBitrate,
        2 => VadMode::Aggressive,
        _ => VadMode::VeryAggressive,
    }
}

impl WebRtcEngine {
    pub fn new(aggressiveness: u8) -> Self {
        let mode = mode_for_aggressiveness(aggressiveness);
        Self {
            vad: Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, mode),
            aggressiveness,
        }
    }
}

impl VadEngine for WebRtcEngine {
    fn process(&mut self, frame: &[i16]) -> Result<bool, VadError> {
        if frame.len() != FRAME_SIZE_SAMPLES {
            return Err(VadError::FrameLength {
                got: frame.len(),
                expected: FRAME_SIZE_SAMPLES,
            });
        }
        self.vad
            .is_voice_segment(frame)
            .map_err(|_| VadError::EngineRejected)
    }

    fn reset(&mut self) {
        self.vad = Vad::new_with_rate_and_mode(
            SampleRate::Rate16kHz,
            mode_for_aggressiveness(self.aggressiveness),
        );
    }

    fn required_sample_rate(&self) -> u32 {
        SAMPLE_RATE_HZ
    }

    fn required_frame_size_samples(&self) -> usize {
        FRAME_SIZE_SAMPLES
    }
}
