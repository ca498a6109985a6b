use serde::{Deserialize, Serialize};

use super::constants::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

/// Peak amplitude below which a frame counts towards the VAD short-circuit.
pub const VAD_SKIP_AMPLITUDE_THRESHOLD: i16 = 5;

/// Consecutive near-silent frames before the VAD engine is skipped.
pub const VAD_SKIP_CONSECUTIVE_FRAMES: u32 = 10;

/// All-zero frames tolerated before a microphone-conflict warning
/// (~2 s at 20 ms frames).
pub const ZERO_FRAME_WARNING_THRESHOLD: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// WebRTC VAD aggressiveness, 0 (least) to 3 (most aggressive).
    pub aggressiveness: u8,
    pub skip_amplitude_threshold: i16,
    pub skip_consecutive_frames: u32,
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            aggressiveness: 2,
            skip_amplitude_threshold: VAD_SKIP_AMPLITUDE_THRESHOLD,
            skip_consecutive_frames: VAD_SKIP_CONSECUTIVE_FRAMES,
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

impl VadConfig {
    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }
}
