use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dicta_audio::FrameQueue;
use dicta_foundation::AudioPhase;
use dicta_ipc::StatusBus;
use dicta_vad::FrameClassifier;
use dicta_wake::{WakePhrases, WakeRecognizer, WakeWordMatcher};

use crate::controller::ControllerEvent;

/// Poll interval when the frame queue runs dry. Frames arrive every 20 ms;
/// 5 ms polling keeps latency low without burning CPU.
const IDLE_POLL: Duration = Duration::from_millis(5);

/// Emit one amplitude update per this many frames while listening.
const AMP_FRAME_DIVISOR: u64 = 2;

/// Consumes captured frames, classifies them, and routes the result by
/// session phase: wake-word scanning while listening, utterance frames to
/// the controller while capturing, nothing otherwise. The classifier and
/// wake state reset on every phase change.
pub struct ClassifierDispatcher {
    queue: FrameQueue,
    classifier: FrameClassifier,
    recognizer: Option<Box<dyn WakeRecognizer>>,
    matcher: WakeWordMatcher,
    phase_rx: watch::Receiver<AudioPhase>,
    wake_rx: watch::Receiver<WakePhrases>,
    events: mpsc::Sender<ControllerEvent>,
    bus: StatusBus,
    shutdown: CancellationToken,
    frames_seen: u64,
    last_phase: AudioPhase,
    recognizer_fault_reported: bool,
}

impl ClassifierDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: FrameQueue,
        classifier: FrameClassifier,
        recognizer: Option<Box<dyn WakeRecognizer>>,
        phase_rx: watch::Receiver<AudioPhase>,
        wake_rx: watch::Receiver<WakePhrases>,
        events: mpsc::Sender<ControllerEvent>,
        bus: StatusBus,
        shutdown: CancellationToken,
    ) -> Self {
        let matcher = WakeWordMatcher::new(&wake_rx.borrow());
        Self {
            queue,
            classifier,
            recognizer,
            matcher,
            phase_rx,
            wake_rx,
            events,
            bus,
            shutdown,
            frames_seen: 0,
            last_phase: AudioPhase::Inactive,
            recognizer_fault_reported: false,
        }
    }

    pub async fn run(mut self) {
        info!("classifier dispatcher started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }
            if self
                .wake_rx
                .has_changed()
                .unwrap_or(false)
            {
                let phrases = self.wake_rx.borrow_and_update().clone();
                self.matcher.set_phrases(&phrases);
                debug!("wake phrases reloaded");
            }

            let phase = *self.phase_rx.borrow();
            if phase != self.last_phase {
                self.on_phase_change(phase);
            }

            let Some(frame) = self.queue.pop() else {
                tokio::time::sleep(IDLE_POLL).await;
                continue;
            };
            self.process_frame(frame.samples, phase).await;
        }
        info!("classifier dispatcher stopped");
    }

    fn on_phase_change(&mut self, phase: AudioPhase) {
        debug!("dispatcher phase: {:?} -> {:?}", self.last_phase, phase);
        self.last_phase = phase;
        self.classifier.reset();
        self.matcher.reset();
        if let Some(recognizer) = &mut self.recognizer {
            recognizer.reset();
        }
        self.frames_seen = 0;
        self.recognizer_fault_reported = false;
    }

    async fn process_frame(&mut self, samples: Vec<i16>, phase: AudioPhase) {
        let verdict = self.classifier.classify(&samples);
        self.frames_seen += 1;

        if verdict.conflict_warning {
            let _ = self.events.send(ControllerEvent::ConflictWarning).await;
        }
        if let Some(e) = &verdict.engine_error {
            let _ = self
                .events
                .send(ControllerEvent::VadFault(e.to_string()))
                .await;
        }

        match phase {
            AudioPhase::Activation => {
                if self.frames_seen % AMP_FRAME_DIVISOR == 0 {
                    self.bus.amplitude(scale_amplitude(verdict.amplitude));
                }
                self.scan_for_wake_word(&samples).await;
            }
            AudioPhase::Dictation => {
                let _ = self
                    .events
                    .send(ControllerEvent::Frame { samples, verdict })
                    .await;
            }
            AudioPhase::Processing | AudioPhase::Inactive => {
                // Frames are discarded; the wake matcher must not see them.
            }
        }
    }

    async fn scan_for_wake_word(&mut self, samples: &[i16]) {
        let Some(recognizer) = &mut self.recognizer else {
            return;
        };
        match recognizer.accept_frame(samples) {
            Ok(Some(text)) => {
                debug!("recognised: {:?}", text);
                if let Some(wake) = self.matcher.observe(&text, Instant::now()) {
                    info!("wake word matched: {:?} -> {}", wake.phrase, wake.mode);
                    let _ = self.events.send(ControllerEvent::Wake(wake)).await;
                }
            }
            Ok(None) => {}
            Err(e) => {
                if !self.recognizer_fault_reported {
                    self.recognizer_fault_reported = true;
                    warn!("wake recogniser error: {}", e);
                    let _ = self
                        .events
                        .send(ControllerEvent::VadFault(format!("wake recogniser: {e}")))
                        .await;
                }
            }
        }
    }
}

pub(crate) fn scale_amplitude(peak: i16) -> u8 {
    (peak as f32 / 100.0).clamp(0.0, 100.0) as u8
}
