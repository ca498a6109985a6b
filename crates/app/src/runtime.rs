use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dicta_audio::{AudioCaptureThread, CaptureConfig, FrameQueue};
use dicta_foundation::{light_mode, AudioPhase};
use dicta_ipc::{spawn_transport_writer, InboundCommand, OutboundMessage, StatusBus, StatusColor};
use dicta_llm::{EngineConfig, LlmStreamEngine, LocalRuntimeClient};
use dicta_stt::SpeechTranscriber;
#[cfg(not(feature = "whisper"))]
use dicta_stt::SttError;
use dicta_stt::SttConfig;
use dicta_vad::{FrameClassifier, VadConfig, WebRtcEngine};
use dicta_wake::{WakePhrases, WakeRecognizer};

use crate::config::{model_catalog, AppConfig};
use crate::controller::{ControllerEvent, RunOutcome, SessionController};
use crate::dispatch::ClassifierDispatcher;
use crate::services::{HttpLlmService, SttWorker};

/// Wiring options resolved from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub device: Option<String>,
    pub llm_base_url: String,
    pub wake_model_path: String,
    pub asr_model_path: String,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            device: std::env::var("DICTA_AUDIO_DEVICE").ok(),
            llm_base_url: std::env::var("DICTA_LLM_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".into()),
            wake_model_path: std::env::var("DICTA_WAKE_MODEL")
                .unwrap_or_else(|_| "models/vosk-model-small-en-us-0.15".into()),
            asr_model_path: std::env::var("DICTA_ASR_MODEL")
                .unwrap_or_else(|_| "models/whisper/ggml-base.en.bin".into()),
        }
    }
}

/// Assemble the pipeline, run it to completion, and tear it down.
pub async fn run(options: RuntimeOptions) -> RunOutcome {
    let (bus, bus_rx) = StatusBus::new(256);
    let writer = spawn_transport_writer(bus_rx, tokio::io::stdout());

    let (events_tx, events_rx) = mpsc::channel::<ControllerEvent>(256);
    let (phase_tx, phase_rx) = watch::channel(AudioPhase::Inactive);
    let (wake_tx, wake_rx) = watch::channel(WakePhrases::builtin());
    let shutdown = CancellationToken::new();

    // Audio capture. Failure is non-fatal: the core stays Inactive and the
    // user can retry with TOGGLE_ACTIVE after freeing the microphone.
    let queue = FrameQueue::default();
    let capture = match AudioCaptureThread::spawn(
        CaptureConfig {
            device: options.device.clone(),
            ..Default::default()
        },
        queue.clone(),
    ) {
        Ok(capture) => Some(capture),
        Err(e) => {
            warn!("audio capture unavailable: {}", e);
            None
        }
    };
    let mic_error = capture
        .is_none()
        .then(|| "audio device failed to open".to_string());

    let classifier = FrameClassifier::new(
        Box::new(WebRtcEngine::new(VadConfig::default().aggressiveness)),
        VadConfig::default(),
    );
    let recognizer = build_wake_recognizer(&options, &bus);

    let dispatcher = ClassifierDispatcher::new(
        queue,
        classifier,
        recognizer,
        phase_rx,
        wake_rx,
        events_tx.clone(),
        bus.clone(),
        shutdown.clone(),
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    // Heavy services.
    let stt_config = SttConfig {
        model_id: AppConfig::default().asr_model.clone(),
        ..Default::default()
    };
    let stt = Arc::new(SttWorker::new(build_stt_backend(&options), stt_config));
    let llm = Arc::new(HttpLlmService::new(
        LocalRuntimeClient::new(options.llm_base_url.clone()),
        LlmStreamEngine::new(EngineConfig::default()),
    ));

    let mut controller = SessionController::new(
        AppConfig::default(),
        bus.clone(),
        phase_tx,
        wake_tx,
        events_tx.clone(),
        events_rx,
        stt,
        llm,
    );

    // Startup handshake with the UI.
    bus.send(OutboundMessage::BackendReady);
    bus.send(OutboundMessage::GetConfig);
    bus.send(OutboundMessage::Models(model_catalog()));
    if light_mode() {
        info!("CT_LIGHT_MODE set, heavy model loads deferred");
    }
    controller.activate(capture.is_some(), mic_error);

    spawn_signal_listener(events_tx.clone(), bus.clone());
    let stdin_handle = spawn_stdin_reader(events_tx, bus.clone());

    let outcome = controller.run().await;

    // Teardown: quiesce the source first, then the tasks.
    shutdown.cancel();
    if let Some(capture) = capture {
        capture.stop();
    }
    stdin_handle.abort();
    let _ = dispatcher_handle.await;

    bus.send(OutboundMessage::ShutdownFinalized);
    drop(bus);
    let _ = writer.await;

    outcome
}

/// SIGINT goes through the same path as a `SHUTDOWN` line from the UI, so
/// the controller winds the session down and the transport still gets its
/// terminal messages. If the handler cannot be installed the UI is told;
/// stdin remains the shutdown channel.
fn spawn_signal_listener(events: mpsc::Sender<ControllerEvent>, bus: StatusBus) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl-C handler: {}", e);
            bus.status(
                StatusColor::Yellow,
                format!("Signal handler unavailable, use SHUTDOWN to exit: {e}"),
            );
            return;
        }
        info!("SIGINT received, requesting shutdown");
        let _ = events
            .send(ControllerEvent::Command(InboundCommand::Shutdown))
            .await;
    });
}

/// Reads UI commands from stdin, one per line. Malformed lines are dropped
/// with a warning status; the stream ending means the UI went away, which
/// is treated as a shutdown request.
fn spawn_stdin_reader(
    events: mpsc::Sender<ControllerEvent>,
    bus: StatusBus,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match InboundCommand::parse(&line) {
                        Ok(command) => {
                            if events.send(ControllerEvent::Command(command)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("{}", e);
                            SessionController::protocol_warning(&bus, &e.to_string());
                        }
                    }
                }
                Ok(None) => {
                    info!("stdin closed, requesting shutdown");
                    let _ = events
                        .send(ControllerEvent::Command(InboundCommand::Shutdown))
                        .await;
                    break;
                }
                Err(e) => {
                    warn!("stdin read error: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(feature = "vosk")]
fn build_wake_recognizer(
    options: &RuntimeOptions,
    bus: &StatusBus,
) -> Option<Box<dyn WakeRecognizer>> {
    use dicta_vad::SAMPLE_RATE_HZ;
    use dicta_wake::VoskRecognizer;

    match VoskRecognizer::new(&options.wake_model_path, SAMPLE_RATE_HZ as f32) {
        Ok(recognizer) => Some(Box::new(recognizer)),
        Err(e) => {
            warn!("wake recogniser unavailable: {}", e);
            bus.status(
                StatusColor::Red,
                format!("Wake-word model failed to load: {e}"),
            );
            None
        }
    }
}

#[cfg(not(feature = "vosk"))]
fn build_wake_recognizer(
    _options: &RuntimeOptions,
    _bus: &StatusBus,
) -> Option<Box<dyn WakeRecognizer>> {
    info!("built without the vosk feature; dictation starts via commands only");
    None
}

#[cfg(feature = "whisper")]
fn build_stt_backend(options: &RuntimeOptions) -> Box<dyn SpeechTranscriber> {
    Box::new(dicta_stt::WhisperTranscriber::new(&options.asr_model_path))
}

#[cfg(not(feature = "whisper"))]
fn build_stt_backend(_options: &RuntimeOptions) -> Box<dyn SpeechTranscriber> {
    Box::new(UnavailableTranscriber)
}

/// Placeholder backend for builds without an ASR feature; every request
/// fails as a model-load error and the session returns to listening.
#[cfg(not(feature = "whisper"))]
struct UnavailableTranscriber;

#[cfg(not(feature = "whisper"))]
impl SpeechTranscriber for UnavailableTranscriber {
    fn load(&mut self) -> Result<(), SttError> {
        Err(SttError::ModelLoad(
            "no ASR backend compiled in (enable the 'whisper' feature)".into(),
        ))
    }

    fn is_loaded(&self) -> bool {
        false
    }

    fn transcribe(&mut self, _samples: &[i16], _prompt: &str) -> Result<String, SttError> {
        Err(SttError::ModelLoad(
            "no ASR backend compiled in (enable the 'whisper' feature)".into(),
        ))
    }

    fn unload(&mut self) {}
}
