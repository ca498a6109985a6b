use tracing::{info, warn};

use dicta_vad::{FrameVerdict, FRAME_DURATION_MS};

/// FIFO window cap on buffered frames (~12 s at 20 ms frames).
pub const MAX_UTTERANCE_FRAMES: usize = 600;

/// Total capture length that logs a progressive-cleanup notice (~60 s).
const LONG_CAPTURE_FRAMES: u64 = 3_000;

/// Total capture length past which the session is force-stopped (~150 s).
const HARD_CAP_FRAMES: u64 = 7_500;

/// Emit one amplitude update per this many frames (50 fps / 2 = 25 Hz,
/// under the 30 Hz transport cap).
const AMP_FRAME_DIVISOR: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Trailing silence reached the auto-stop threshold.
    AutoStop,
    /// Total capture time hit the hard cap.
    HardCap,
    /// Explicit `STOP_DICTATION`.
    Manual,
}

/// What the controller should do after one recorded frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PushOutcome {
    pub stop: Option<StopReason>,
    /// First buffer overflow of this session.
    pub overflow_warning: bool,
    /// Downsampled amplitude for the UI waveform (0..=100).
    pub amplitude: Option<u8>,
}

/// Captures one utterance while the session is in the capturing state.
///
/// Voiced frames always append; silent frames append too while the trailing
/// silence stays under the auto-stop threshold, preserving inter-word
/// pauses. The buffer is a FIFO window: overflow drops the oldest frames.
pub struct UtteranceRecorder {
    buffer: Vec<Vec<i16>>,
    auto_stop_silence_ms: f32,
    trailing_silence_ms: f32,
    frames_seen: u64,
    dropped_frames: u64,
    overflow_warned: bool,
    long_capture_logged: bool,
}

impl UtteranceRecorder {
    pub fn new(auto_stop_silence_secs: f32) -> Self {
        Self {
            buffer: Vec::new(),
            auto_stop_silence_ms: auto_stop_silence_secs.clamp(1.0, 3.0) * 1000.0,
            trailing_silence_ms: 0.0,
            frames_seen: 0,
            dropped_frames: 0,
            overflow_warned: false,
            long_capture_logged: false,
        }
    }

    pub fn set_auto_stop_silence(&mut self, secs: f32) {
        self.auto_stop_silence_ms = secs.clamp(1.0, 3.0) * 1000.0;
    }

    /// Begin a fresh utterance.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.trailing_silence_ms = 0.0;
        self.frames_seen = 0;
        self.dropped_frames = 0;
        self.overflow_warned = false;
        self.long_capture_logged = false;
    }

    pub fn push(&mut self, samples: &[i16], verdict: &FrameVerdict) -> PushOutcome {
        let mut outcome = PushOutcome::default();
        self.frames_seen += 1;

        if self.frames_seen % AMP_FRAME_DIVISOR == 0 {
            outcome.amplitude = Some(scale_amplitude(verdict.amplitude));
        }

        if verdict.is_voiced {
            self.trailing_silence_ms = 0.0;
            self.append(samples, &mut outcome);
        } else {
            self.trailing_silence_ms += FRAME_DURATION_MS;
            if self.trailing_silence_ms >= self.auto_stop_silence_ms {
                info!(
                    "auto-stop after {:.1}s of trailing silence",
                    self.trailing_silence_ms / 1000.0
                );
                outcome.stop = Some(StopReason::AutoStop);
                return outcome;
            }
            // Bridge the pause so inter-word gaps survive transcription.
            self.append(samples, &mut outcome);
        }

        if self.frames_seen == LONG_CAPTURE_FRAMES && !self.long_capture_logged {
            self.long_capture_logged = true;
            info!(
                "long capture: {} frames buffered, {} dropped",
                self.buffer.len(),
                self.dropped_frames
            );
        }
        if self.frames_seen >= HARD_CAP_FRAMES {
            warn!("utterance hard cap reached, forcing stop");
            outcome.stop = Some(StopReason::HardCap);
        }
        outcome
    }

    fn append(&mut self, samples: &[i16], outcome: &mut PushOutcome) {
        if self.buffer.len() >= MAX_UTTERANCE_FRAMES {
            self.buffer.remove(0);
            self.dropped_frames += 1;
            if !self.overflow_warned {
                self.overflow_warned = true;
                outcome.overflow_warning = true;
                warn!("utterance buffer full, dropping oldest frames");
            }
        }
        self.buffer.push(samples.to_vec());
    }

    /// Hand the captured PCM to the transcription stage.
    pub fn take(&mut self) -> Vec<i16> {
        let frames = std::mem::take(&mut self.buffer);
        self.trailing_silence_ms = 0.0;
        frames.into_iter().flatten().collect()
    }

    pub fn discard(&mut self) {
        self.buffer.clear();
        self.trailing_silence_ms = 0.0;
    }

    pub fn frames_buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn scale_amplitude(peak: i16) -> u8 {
    (peak as f32 / 100.0).clamp(0.0, 100.0) as u8
}
