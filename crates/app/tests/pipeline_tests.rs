//! Headless pipeline tests: frames flow from a synthetic queue through the
//! classifier dispatcher, with a scripted VAD engine and wake recogniser.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use dicta_app::controller::ControllerEvent;
use dicta_app::dispatch::ClassifierDispatcher;
use dicta_audio::{AudioFrame, FrameQueue};
use dicta_foundation::{AudioPhase, Mode};
use dicta_ipc::{OutboundMessage, StatusBus};
use dicta_vad::{FrameClassifier, VadConfig, VadEngine, VadError};
use dicta_wake::{WakePhrases, WakeRecognizer};

struct AlwaysVoiced;

impl VadEngine for AlwaysVoiced {
    fn process(&mut self, _frame: &[i16]) -> Result<bool, VadError> {
        Ok(true)
    }
    fn reset(&mut self) {}
    fn required_sample_rate(&self) -> u32 {
        16_000
    }
    fn required_frame_size_samples(&self) -> usize {
        320
    }
}

/// Yields a fixed hypothesis every `every` frames.
struct ScriptedRecognizer {
    every: usize,
    count: usize,
    text: &'static str,
}

impl WakeRecognizer for ScriptedRecognizer {
    fn accept_frame(&mut self, _pcm: &[i16]) -> Result<Option<String>, dicta_wake::WakeError> {
        self.count += 1;
        if self.count % self.every == 0 {
            Ok(Some(self.text.to_string()))
        } else {
            Ok(None)
        }
    }

    fn reset(&mut self) {
        self.count = 0;
    }
}

struct Pipeline {
    queue: FrameQueue,
    phase_tx: watch::Sender<AudioPhase>,
    events_rx: mpsc::Receiver<ControllerEvent>,
    bus_rx: mpsc::Receiver<OutboundMessage>,
    shutdown: CancellationToken,
    seq: u64,
}

fn pipeline(recognizer_text: &'static str, phase: AudioPhase) -> Pipeline {
    let queue = FrameQueue::new(64);
    let (bus, bus_rx) = StatusBus::new(256);
    let (events_tx, events_rx) = mpsc::channel(256);
    let (phase_tx, phase_rx) = watch::channel(phase);
    let (_wake_tx, wake_rx) = watch::channel(WakePhrases::builtin());
    let shutdown = CancellationToken::new();

    let classifier = FrameClassifier::new(Box::new(AlwaysVoiced), VadConfig::default());
    let dispatcher = ClassifierDispatcher::new(
        queue.clone(),
        classifier,
        Some(Box::new(ScriptedRecognizer {
            every: 5,
            count: 0,
            text: recognizer_text,
        })),
        phase_rx,
        wake_rx,
        events_tx,
        bus,
        shutdown.clone(),
    );
    tokio::spawn(dispatcher.run());

    Pipeline {
        queue,
        phase_tx,
        events_rx,
        bus_rx,
        shutdown,
        seq: 0,
    }
}

impl Pipeline {
    fn feed_frames(&mut self, count: usize, level: i16) {
        for _ in 0..count {
            let mut samples = vec![0i16; 320];
            samples[0] = level;
            self.queue.push(AudioFrame::new(self.seq, samples));
            self.seq += 1;
        }
    }

    async fn next_event(&mut self) -> Option<ControllerEvent> {
        tokio::time::timeout(Duration::from_secs(2), self.events_rx.recv())
            .await
            .ok()
            .flatten()
    }
}

#[tokio::test]
async fn wake_word_detected_while_listening() {
    let mut p = pipeline("note", AudioPhase::Activation);
    p.feed_frames(10, 1_000);

    let mut saw_wake = false;
    while let Some(event) = p.next_event().await {
        if let ControllerEvent::Wake(wake) = event {
            assert_eq!(wake.mode, Mode::Dictate);
            assert_eq!(wake.phrase, "note");
            saw_wake = true;
            break;
        }
    }
    assert!(saw_wake, "no wake event produced");
    p.shutdown.cancel();
}

#[tokio::test]
async fn wake_matching_is_gated_to_listening_phase() {
    let mut p = pipeline("note", AudioPhase::Dictation);
    p.feed_frames(20, 1_000);

    // While capturing, frames go to the controller and the recogniser is
    // never consulted: no wake events may appear.
    let mut frames = 0;
    for _ in 0..20 {
        match p.next_event().await {
            Some(ControllerEvent::Frame { .. }) => frames += 1,
            Some(ControllerEvent::Wake(_)) => panic!("wake match while not listening"),
            Some(_) => {}
            None => break,
        }
    }
    assert_eq!(frames, 20);
    p.shutdown.cancel();
}

#[tokio::test]
async fn frames_are_discarded_while_processing() {
    let mut p = pipeline("note", AudioPhase::Processing);
    p.feed_frames(20, 1_000);

    assert!(p.next_event().await.is_none(), "no events expected");
    p.shutdown.cancel();
}

#[tokio::test]
async fn amplitude_streams_while_listening() {
    let mut p = pipeline("unrelated", AudioPhase::Activation);
    p.feed_frames(40, 5_000);

    // Allow the dispatcher to drain the queue.
    tokio::time::sleep(Duration::from_millis(500)).await;
    p.shutdown.cancel();

    let mut amps = 0;
    while let Ok(msg) = p.bus_rx.try_recv() {
        if let OutboundMessage::AudioAmp(level) = msg {
            assert_eq!(level, 50);
            amps += 1;
        }
    }
    // Every second frame, 40 frames fed.
    assert_eq!(amps, 20);
}

#[tokio::test]
async fn phase_switch_resets_wake_state() {
    let mut p = pipeline("note", AudioPhase::Activation);
    p.feed_frames(5, 1_000);

    // First hypothesis arrives on frame 5 and matches.
    let mut saw_wake = false;
    while let Some(event) = p.next_event().await {
        if matches!(event, ControllerEvent::Wake(_)) {
            saw_wake = true;
            break;
        }
    }
    assert!(saw_wake);

    // Capture, then back to listening: the recogniser counter restarts, so
    // another 5 listening frames are needed for the next hypothesis.
    p.phase_tx.send(AudioPhase::Dictation).unwrap();
    p.feed_frames(3, 1_000);
    tokio::time::sleep(Duration::from_millis(200)).await;
    p.phase_tx.send(AudioPhase::Activation).unwrap();
    p.feed_frames(5, 1_000);

    let mut saw_second_wake = false;
    while let Some(event) = p.next_event().await {
        if matches!(event, ControllerEvent::Wake(_)) {
            saw_second_wake = true;
            break;
        }
    }
    assert!(saw_second_wake);
    p.shutdown.cancel();
}
