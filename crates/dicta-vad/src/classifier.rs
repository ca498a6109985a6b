use tracing::warn;

use crate::config::{VadConfig, ZERO_FRAME_WARNING_THRESHOLD};
use crate::engine::{VadEngine, VadError};

/// Per-frame classification result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameVerdict {
    /// Peak absolute sample amplitude, 0..=32767.
    pub amplitude: i16,
    pub is_voiced: bool,
    /// Set when the VAD engine failed on this frame; the frame counts as
    /// unvoiced and the pipeline keeps running.
    pub engine_error: Option<VadError>,
    /// Set once per session when the stream has been all-zero long enough
    /// to suggest another application holds the microphone.
    pub conflict_warning: bool,
}

/// Computes amplitude and voicing for every captured frame.
///
/// Stateful only in its streak counters: near-silent frames bypass the VAD
/// engine after a run of `skip_consecutive_frames`, and all-zero frames are
/// tracked to surface a single conflict warning.
pub struct FrameClassifier {
    engine: Box<dyn VadEngine>,
    config: VadConfig,
    low_amp_streak: u32,
    zero_streak: u32,
    conflict_warned: bool,
}

impl FrameClassifier {
    pub fn new(engine: Box<dyn VadEngine>, config: VadConfig) -> Self {
        Self {
            engine,
            config,
            low_amp_streak: 0,
            zero_streak: 0,
            conflict_warned: false,
        }
    }

    pub fn classify(&mut self, samples: &[i16]) -> FrameVerdict {
        let amplitude = peak_amplitude(samples);

        if samples.iter().all(|&s| s == 0) {
            self.zero_streak += 1;
            let conflict_warning =
                self.zero_streak == ZERO_FRAME_WARNING_THRESHOLD && !self.conflict_warned;
            if conflict_warning {
                self.conflict_warned = true;
                warn!(
                    "sustained all-zero audio for {} frames, microphone may be held elsewhere",
                    self.zero_streak
                );
            }
            return FrameVerdict {
                amplitude: 0,
                is_voiced: false,
                engine_error: None,
                conflict_warning,
            };
        }
        self.zero_streak = 0;

        if amplitude < self.config.skip_amplitude_threshold {
            self.low_amp_streak += 1;
            if self.low_amp_streak > self.config.skip_consecutive_frames {
                // Short-circuit: sustained near-silence, skip the engine.
                return FrameVerdict {
                    amplitude,
                    is_voiced: false,
                    engine_error: None,
                    conflict_warning: false,
                };
            }
        } else {
            self.low_amp_streak = 0;
        }

        match self.engine.process(samples) {
            Ok(is_voiced) => FrameVerdict {
                amplitude,
                is_voiced,
                engine_error: None,
                conflict_warning: false,
            },
            Err(e) => FrameVerdict {
                amplitude,
                is_voiced: false,
                engine_error: Some(e),
                conflict_warning: false,
            },
        }
    }

    /// Clears streak counters and the per-session warning latch.
    pub fn reset(&mut self) {
        self.low_amp_streak = 0;
        self.zero_streak = 0;
        self.conflict_warned = false;
        self.engine.reset();
    }
}

fn peak_amplitude(samples: &[i16]) -> i16 {
    samples
        .iter()
        .map(|&s| s.unsigned_abs().min(i16::MAX as u16) as i16)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedEngine {
        verdict: Result<bool, VadError>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedEngine {
        fn boxed(verdict: Result<bool, VadError>) -> (Box<dyn VadEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Box::new(ScriptedEngine {
                    verdict,
                    calls: calls.clone(),
                }),
                calls,
            )
        }
    }

    impl VadEngine for ScriptedEngine {
        fn process(&mut self, _frame: &[i16]) -> Result<bool, VadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.verdict.clone()
        }

        fn reset(&mut self) {}

        fn required_sample_rate(&self) -> u32 {
            16_000
        }

        fn required_frame_size_samples(&self) -> usize {
            320
        }
    }

    fn quiet_frame(peak: i16) -> Vec<i16> {
        let mut frame = vec![0i16; 320];
        frame[0] = peak;
        frame
    }

    #[test]
    fn amplitude_is_peak_absolute_sample() {
        let (engine, _) = ScriptedEngine::boxed(Ok(true));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());
        let mut frame = vec![0i16; 320];
        frame[10] = -1200;
        frame[20] = 800;
        assert_eq!(classifier.classify(&frame).amplitude, 1200);
    }

    #[test]
    fn amplitude_saturates_on_i16_min() {
        let (engine, _) = ScriptedEngine::boxed(Ok(false));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());
        let mut frame = vec![0i16; 320];
        frame[0] = i16::MIN;
        assert_eq!(classifier.classify(&frame).amplitude, i16::MAX);
    }

    #[test]
    fn short_circuit_triggers_on_eleventh_quiet_frame() {
        let (engine, calls) = ScriptedEngine::boxed(Ok(false));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());

        // Frames 1..=10 below the threshold still consult the engine.
        for _ in 0..10 {
            classifier.classify(&quiet_frame(3));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);

        // The 11th consecutive quiet frame short-circuits.
        let verdict = classifier.classify(&quiet_frame(3));
        assert!(!verdict.is_voiced);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn loud_frame_resets_the_streak() {
        let (engine, calls) = ScriptedEngine::boxed(Ok(true));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());

        for _ in 0..10 {
            classifier.classify(&quiet_frame(3));
        }
        classifier.classify(&quiet_frame(500)); // resets streak
        for _ in 0..10 {
            classifier.classify(&quiet_frame(3));
        }
        // 10 + 1 + 10 frames, every one below the skip point consults the
        // engine because the streak never exceeded the limit.
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[test]
    fn engine_error_is_unvoiced_and_reported() {
        let (engine, _) = ScriptedEngine::boxed(Err(VadError::EngineRejected));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());
        let verdict = classifier.classify(&quiet_frame(1000));
        assert!(!verdict.is_voiced);
        assert_eq!(verdict.engine_error, Some(VadError::EngineRejected));
    }

    #[test]
    fn zero_frames_warn_once_per_session() {
        let (engine, calls) = ScriptedEngine::boxed(Ok(false));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());
        let zero = vec![0i16; 320];

        let mut warnings = 0;
        for _ in 0..250 {
            if classifier.classify(&zero).conflict_warning {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);
        // Zero frames never reach the engine.
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // A new session may warn again.
        classifier.reset();
        let mut warnings = 0;
        for _ in 0..150 {
            if classifier.classify(&zero).conflict_warning {
                warnings += 1;
            }
        }
        assert_eq!(warnings, 1);
    }

    #[test]
    fn voiced_frame_passes_through() {
        let (engine, _) = ScriptedEngine::boxed(Ok(true));
        let mut classifier = FrameClassifier::new(engine, VadConfig::default());
        let verdict = classifier.classify(&quiet_frame(2000));
        assert!(verdict.is_voiced);
        assert!(verdict.engine_error.is_none());
    }
}
