use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dicta_foundation::{is_valid_transition, AudioPhase, Mode, SessionState};
use dicta_ipc::{
    InboundCommand, OutboundMessage, ProofStreamEvent, StateSnapshot, StatusBus, StatusColor,
    TranscriptionLabel,
};
use dicta_llm::{GenerationParams, LlmError, LlmRequest, LlmStreamEvent};
use dicta_stt::{SttError, Transcript, TranscriptCleaner};
use dicta_vad::FrameVerdict;
use dicta_wake::{WakeMatch, WakePhrases};

use crate::config::{model_catalog, AppConfig, ConfigPatch};
use crate::recorder::{StopReason, UtteranceRecorder};
use crate::services::{LlmService, TranscriptionService};
use crate::vocabulary::VocabularyStore;

/// Everything that can reach the controller: UI commands and pipeline
/// events share one queue, so a single task is the only writer of the
/// session state.
#[derive(Debug)]
pub enum ControllerEvent {
    Command(InboundCommand),
    Wake(WakeMatch),
    Frame { samples: Vec<i16>, verdict: FrameVerdict },
    ConflictWarning,
    VadFault(String),
    AudioFailed(String),
    TranscriptionDone { session: u64, result: Result<Transcript, SttError> },
    LlmEvent { session: u64, event: LlmStreamEvent },
    LlmDone { session: u64, result: Result<String, LlmError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Shutdown,
    Restart,
}

pub struct SessionController {
    state: SessionState,
    config: AppConfig,
    cleaner: TranscriptCleaner,
    vocabulary: VocabularyStore,
    recorder: UtteranceRecorder,
    bus: StatusBus,
    phase_tx: watch::Sender<AudioPhase>,
    wake_tx: watch::Sender<WakePhrases>,
    events_tx: mpsc::Sender<ControllerEvent>,
    events_rx: mpsc::Receiver<ControllerEvent>,
    stt: Arc<dyn TranscriptionService>,
    llm: Arc<dyn LlmService>,
    session_cancel: CancellationToken,
    session: u64,
    program_active: bool,
    audio_ok: bool,
    mic_error: Option<String>,
    is_proofing: bool,
    stream_ended: bool,
    vad_fault_reported: bool,
    last_snapshot: Option<StateSnapshot>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        bus: StatusBus,
        phase_tx: watch::Sender<AudioPhase>,
        wake_tx: watch::Sender<WakePhrases>,
        events_tx: mpsc::Sender<ControllerEvent>,
        events_rx: mpsc::Receiver<ControllerEvent>,
        stt: Arc<dyn TranscriptionService>,
        llm: Arc<dyn LlmService>,
    ) -> Self {
        let mut cleaner = TranscriptCleaner::new();
        cleaner.set_filler_filter(config.filter_filler_words);
        cleaner.set_filler_words(&config.filler_words);
        let recorder = UtteranceRecorder::new(config.auto_stop_silence_secs);

        Self {
            state: SessionState::Inactive,
            config,
            cleaner,
            vocabulary: VocabularyStore::new(),
            recorder,
            bus,
            phase_tx,
            wake_tx,
            events_tx,
            events_rx,
            stt,
            llm,
            session_cancel: CancellationToken::new(),
            session: 0,
            program_active: false,
            audio_ok: false,
            mic_error: None,
            is_proofing: false,
            stream_ended: true,
            vad_fault_reported: false,
            last_snapshot: None,
        }
    }

    /// Bring the pipeline up after the audio subsystem reported in.
    pub fn activate(&mut self, audio_ok: bool, mic_error: Option<String>) {
        self.audio_ok = audio_ok;
        if audio_ok {
            self.mic_error = None;
            self.program_active = true;
            self.transition(SessionState::Preparing);
            self.transition(SessionState::Listening);
        } else {
            let detail = mic_error.unwrap_or_else(|| "unknown error".into());
            self.mic_error = Some(detail.clone());
            self.bus.status(
                StatusColor::Red,
                format!("Microphone unavailable: {detail}"),
            );
            self.publish_state();
        }
    }

    pub async fn run(mut self) -> RunOutcome {
        info!("session controller started in {:?}", self.state);
        while let Some(event) = self.events_rx.recv().await {
            match event {
                ControllerEvent::Command(command) => {
                    if let Some(outcome) = self.handle_command(command) {
                        return outcome;
                    }
                }
                ControllerEvent::Wake(wake) => self.handle_wake(wake),
                ControllerEvent::Frame { samples, verdict } => self.handle_frame(samples, verdict),
                ControllerEvent::ConflictWarning => self.bus.status(
                    StatusColor::Orange,
                    "Sustained silent audio, another app may hold the microphone",
                ),
                ControllerEvent::VadFault(detail) => {
                    if !self.vad_fault_reported {
                        self.vad_fault_reported = true;
                        self.bus
                            .status(StatusColor::Red, format!("VAD error: {detail}"));
                    }
                }
                ControllerEvent::AudioFailed(detail) => self.handle_audio_failed(detail),
                ControllerEvent::TranscriptionDone { session, result } => {
                    self.handle_transcription_done(session, result);
                }
                ControllerEvent::LlmEvent { session, event } => {
                    self.handle_llm_event(session, event);
                }
                ControllerEvent::LlmDone { session, result } => {
                    self.handle_llm_done(session, result);
                }
            }
        }
        RunOutcome::Shutdown
    }

    // --- Command handling -------------------------------------------------

    fn handle_command(&mut self, command: InboundCommand) -> Option<RunOutcome> {
        debug!("command: {:?}", command);
        match command {
            InboundCommand::Start(mode) => self.handle_start(mode),
            InboundCommand::StopDictation => self.handle_stop(),
            InboundCommand::AbortDictation => self.handle_abort(),
            InboundCommand::ToggleActive => self.handle_toggle(),
            InboundCommand::ApplyConfig(json) => self.apply_config(json),
            InboundCommand::ModelsRequest => {
                self.bus.send(OutboundMessage::Models(model_catalog()));
            }
            InboundCommand::VocabularyApi { id, payload } => {
                let response = self.vocabulary.handle(&payload);
                self.cleaner.set_vocabulary(&self.vocabulary.entries());
                self.bus.send(OutboundMessage::VocabResponse {
                    id,
                    payload: response,
                });
            }
            InboundCommand::Restart => {
                self.bus.status(StatusColor::Orange, "Restarting...");
                self.shutdown_session();
                self.transition(SessionState::Inactive);
                self.bus.send(OutboundMessage::ShutdownSignal);
                return Some(RunOutcome::Restart);
            }
            InboundCommand::Shutdown => {
                self.bus.status(StatusColor::Orange, "Shutting down...");
                self.shutdown_session();
                self.transition(SessionState::Inactive);
                self.bus.send(OutboundMessage::ShutdownSignal);
                return Some(RunOutcome::Shutdown);
            }
        }
        None
    }

    fn handle_start(&mut self, mode: Mode) {
        if !self.program_active {
            self.bus
                .status(StatusColor::Orange, "Program inactive, start command ignored.");
            return;
        }
        match self.state {
            SessionState::Listening => {
                self.bus.status(
                    StatusColor::Green,
                    format!("Dictation started ({mode} mode)."),
                );
                self.start_capture(mode);
            }
            SessionState::Capturing(_) => {
                self.bus
                    .status(StatusColor::Orange, "Already dictating, ignoring start command.");
            }
            _ => {
                self.bus
                    .status(StatusColor::Orange, "Currently processing, ignoring start command.");
            }
        }
    }

    fn handle_wake(&mut self, wake: WakeMatch) {
        if self.state != SessionState::Listening {
            // Wake words while a session is active are rejected, never
            // restarted.
            self.bus.status(
                StatusColor::Orange,
                format!("Wake word '{}' ignored.", wake.phrase),
            );
            return;
        }
        if !self.program_active {
            self.bus
                .status(StatusColor::Orange, "Program inactive, wake word ignored.");
            return;
        }
        self.bus.status(
            StatusColor::Green,
            format!("Wake word '{}' detected.", wake.phrase),
        );
        self.start_capture(wake.mode);
    }

    fn handle_stop(&mut self) {
        if self.state.is_capturing() {
            self.bus
                .status(StatusColor::Orange, "Stopping dictation and processing...");
            self.finish_capture(StopReason::Manual);
        } else {
            self.bus
                .status(StatusColor::Orange, "Not dictating, stop command ignored.");
        }
    }

    fn handle_abort(&mut self) {
        match self.state {
            SessionState::Capturing(_) => {
                self.bus
                    .status(StatusColor::Orange, "Aborting current dictation.");
                self.session_cancel.cancel();
                self.recorder.discard();
                self.transition(SessionState::Listening);
            }
            SessionState::Transcribing(_) => {
                self.bus
                    .status(StatusColor::Orange, "Aborting transcription.");
                self.session_cancel.cancel();
                self.transition(SessionState::Listening);
            }
            SessionState::Processing(_) => {
                self.bus.status(StatusColor::Orange, "Aborting processing.");
                self.session_cancel.cancel();
                self.end_proof_stream();
                self.is_proofing = false;
                self.transition(SessionState::Listening);
            }
            _ => {
                self.bus.status(
                    StatusColor::Blue,
                    "No active dictation/processing to abort.",
                );
            }
        }
    }

    fn handle_toggle(&mut self) {
        self.program_active = !self.program_active;
        info!("program active set to {}", self.program_active);
        if self.program_active {
            if self.audio_ok {
                self.transition(SessionState::Preparing);
                self.transition(SessionState::Listening);
            } else {
                let detail = self
                    .mic_error
                    .clone()
                    .unwrap_or_else(|| "microphone not available".into());
                self.bus
                    .status(StatusColor::Red, format!("Microphone unavailable: {detail}"));
                self.program_active = false;
                self.publish_state();
            }
        } else {
            self.shutdown_session();
            self.transition(SessionState::Inactive);
        }
    }

    fn handle_audio_failed(&mut self, detail: String) {
        error!("audio failure: {}", detail);
        self.audio_ok = false;
        self.mic_error = Some(detail.clone());
        self.program_active = false;
        self.shutdown_session();
        self.bus.status(
            StatusColor::Red,
            format!("Microphone error: {detail}"),
        );
        self.transition(SessionState::Inactive);
    }

    // --- Capture ----------------------------------------------------------

    fn start_capture(&mut self, mode: Mode) {
        self.session += 1;
        self.session_cancel = CancellationToken::new();
        self.recorder
            .set_auto_stop_silence(self.config.auto_stop_silence_secs);
        self.recorder.start();
        self.vad_fault_reported = false;
        self.transition(SessionState::Capturing(mode));
    }

    fn handle_frame(&mut self, samples: Vec<i16>, verdict: FrameVerdict) {
        if !self.state.is_capturing() {
            return;
        }
        let outcome = self.recorder.push(&samples, &verdict);
        if let Some(level) = outcome.amplitude {
            self.bus.amplitude(level);
        }
        if outcome.overflow_warning {
            self.bus.status(
                StatusColor::Orange,
                "Utterance buffer full, oldest audio is being dropped.",
            );
        }
        if let Some(reason) = outcome.stop {
            self.finish_capture(reason);
        }
    }

    fn finish_capture(&mut self, reason: StopReason) {
        let Some(mode) = self.state.mode() else {
            return;
        };
        if reason == StopReason::HardCap {
            self.bus.status(
                StatusColor::Orange,
                "Maximum utterance length reached, stopping dictation.",
            );
        }
        let samples = self.recorder.take();
        if samples.is_empty() {
            self.bus
                .status(StatusColor::Orange, "No audio captured, nothing to transcribe.");
            self.transition(SessionState::Listening);
            return;
        }

        self.transition(SessionState::Transcribing(mode));
        self.bus
            .status(StatusColor::Orange, "Speech ended. Transcribing...");

        let session = self.session;
        let stt = self.stt.clone();
        let cancel = self.session_cancel.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = stt.transcribe(samples, mode, cancel).await;
            let _ = events
                .send(ControllerEvent::TranscriptionDone { session, result })
                .await;
        });
    }

    // --- Transcription ----------------------------------------------------

    fn handle_transcription_done(
        &mut self,
        session: u64,
        result: Result<Transcript, SttError>,
    ) {
        if session != self.session || !matches!(self.state, SessionState::Transcribing(_)) {
            debug!("dropping stale transcription result");
            return;
        }
        let mode = self.state.mode().unwrap_or(Mode::Dictate);

        let transcript = match result {
            Ok(t) => t,
            Err(SttError::Cancelled) => return,
            Err(e) => {
                self.bus.send(OutboundMessage::Transcription {
                    label: TranscriptionLabel::Error,
                    text: e.to_string(),
                });
                self.bus
                    .status(StatusColor::Red, format!("Transcription failed: {e}"));
                self.transition(SessionState::Listening);
                return;
            }
        };

        let text = self.cleaner.clean(&transcript.text);
        if text.is_empty() {
            self.bus
                .status(StatusColor::Orange, "Transcription returned empty.");
            self.transition(SessionState::Listening);
            return;
        }
        info!(
            "transcription complete in {:.2}s: {} chars",
            transcript.duration.as_secs_f32(),
            text.len()
        );

        match mode {
            Mode::Dictate => {
                self.transition(SessionState::Delivering(mode));
                self.bus.send(OutboundMessage::FinalTranscript(text));
                self.bus
                    .status(StatusColor::Green, "Transcription complete.");
                self.transition(SessionState::Listening);
            }
            Mode::Proofread | Mode::Letter => {
                self.bus.send(OutboundMessage::DictationPreview(text.clone()));
                self.transition(SessionState::Processing(mode));
                self.is_proofing = true;
                self.stream_ended = false;
                self.publish_state();
                self.bus.status(
                    StatusColor::Orange,
                    format!("Processing with LLM ({mode} mode)..."),
                );
                self.spawn_llm(mode, text);
            }
        }
    }

    // --- LLM --------------------------------------------------------------

    fn spawn_llm(&mut self, mode: Mode, text: String) {
        let (prompt_template, model_id) = match mode {
            Mode::Letter => (self.config.letter_prompt.clone(), self.config.letter_model.clone()),
            _ => (
                self.config.proofing_prompt.clone(),
                self.config.proofing_model.clone(),
            ),
        };
        let request = LlmRequest {
            mode,
            prompt_template,
            user_text: text,
            model_id: model_id.clone(),
            params: GenerationParams::default(),
        };

        self.bus.proof_stream(ProofStreamEvent::Thinking(format!(
            "Processing with {model_id}...\n"
        )));

        let session = self.session;
        let llm = self.llm.clone();
        let cancel = self.session_cancel.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let (stream_tx, mut stream_rx) = mpsc::channel(64);
            let generator = llm.generate(request, stream_tx, cancel);
            tokio::pin!(generator);

            // Relay stream events through the controller queue so transport
            // ordering matches generation ordering.
            let result = loop {
                tokio::select! {
                    event = stream_rx.recv() => {
                        match event {
                            Some(event) => {
                                let _ = events
                                    .send(ControllerEvent::LlmEvent { session, event })
                                    .await;
                            }
                            None => break generator.await,
                        }
                    }
                    result = &mut generator => break result,
                }
            };
            // Drain anything emitted between the last poll and completion.
            while let Ok(event) = stream_rx.try_recv() {
                let _ = events
                    .send(ControllerEvent::LlmEvent { session, event })
                    .await;
            }
            let _ = events
                .send(ControllerEvent::LlmDone { session, result })
                .await;
        });
    }

    fn handle_llm_event(&mut self, session: u64, event: LlmStreamEvent) {
        if session != self.session || !matches!(self.state, SessionState::Processing(_)) {
            return;
        }
        match event {
            LlmStreamEvent::Thinking(text) => {
                self.bus.proof_stream(ProofStreamEvent::Thinking(text));
            }
            LlmStreamEvent::Chunk(text) => {
                self.bus.proof_stream(ProofStreamEvent::Chunk(text));
            }
            LlmStreamEvent::End => self.end_proof_stream(),
        }
    }

    fn handle_llm_done(&mut self, session: u64, result: Result<String, LlmError>) {
        if session != self.session || !matches!(self.state, SessionState::Processing(_)) {
            debug!("dropping stale LLM result");
            return;
        }
        let mode = self.state.mode().unwrap_or(Mode::Proofread);

        match result {
            Ok(artifact) => {
                self.end_proof_stream();
                self.transition(SessionState::Delivering(mode));
                self.bus.send(OutboundMessage::Transcription {
                    label: TranscriptionLabel::for_mode(mode),
                    text: artifact,
                });
                self.bus.status(
                    StatusColor::Green,
                    format!("LLM processing complete ({mode})."),
                );
                self.is_proofing = false;
                self.transition(SessionState::Listening);
            }
            Err(LlmError::Cancelled) => {
                // Abort already rewound the session.
                self.end_proof_stream();
                self.is_proofing = false;
                if matches!(self.state, SessionState::Processing(_)) {
                    self.transition(SessionState::Listening);
                }
            }
            Err(e) => {
                self.end_proof_stream();
                self.bus.send(OutboundMessage::Transcription {
                    label: TranscriptionLabel::Error,
                    text: e.to_string(),
                });
                self.bus
                    .status(StatusColor::Red, format!("LLM error ({mode}): {e}"));
                self.is_proofing = false;
                self.transition(SessionState::Listening);
            }
        }
    }

    /// Close the PROOF_STREAM session exactly once.
    fn end_proof_stream(&mut self) {
        if !self.stream_ended {
            self.stream_ended = true;
            self.bus.proof_stream(ProofStreamEvent::End);
        }
    }

    // --- Configuration ----------------------------------------------------

    fn apply_config(&mut self, json: serde_json::Value) {
        let patch: ConfigPatch = match serde_json::from_value(json) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("bad CONFIG payload: {}", e);
                self.bus
                    .status(StatusColor::Yellow, format!("Config rejected: {e}"));
                return;
            }
        };
        let changes = self.config.apply(patch);

        self.cleaner.set_filler_filter(self.config.filter_filler_words);
        self.cleaner.set_filler_words(&self.config.filler_words);
        self.recorder
            .set_auto_stop_silence(self.config.auto_stop_silence_secs);
        let _ = self.wake_tx.send(self.config.wake_phrases.clone());

        if changes.proofing {
            self.bus.send(OutboundMessage::ModelSelected {
                mode: Mode::Proofread,
                model_id: self.config.proofing_model.clone(),
            });
        }
        if changes.letter {
            self.bus.send(OutboundMessage::ModelSelected {
                mode: Mode::Letter,
                model_id: self.config.letter_model.clone(),
            });
        }
        if changes.asr {
            self.bus.send(OutboundMessage::ModelSelected {
                mode: Mode::Dictate,
                model_id: self.config.asr_model.clone(),
            });
        }

        self.bus.status(StatusColor::Grey, "Configuration applied.");
        self.publish_state();
    }

    /// Report a malformed inbound line (parse failures happen before an
    /// event exists, so the reader calls this through the bus directly).
    pub fn protocol_warning(bus: &StatusBus, detail: &str) {
        bus.status(StatusColor::Yellow, format!("Ignored malformed command: {detail}"));
    }

    // --- State publication ------------------------------------------------

    fn shutdown_session(&mut self) {
        self.session_cancel.cancel();
        self.recorder.discard();
        if self.is_proofing {
            self.end_proof_stream();
            self.is_proofing = false;
        }
    }

    fn transition(&mut self, to: SessionState) {
        if self.state == to {
            return;
        }
        if !is_valid_transition(self.state, to) {
            error!("invalid state transition: {} -> {}", self.state, to);
            return;
        }
        info!("state transition: {} -> {}", self.state, to);
        self.state = to;
        let _ = self.phase_tx.send(self.state.audio_phase());
        self.publish_state();
        self.publish_phase_status();
    }

    fn publish_state(&mut self) {
        let snapshot = StateSnapshot {
            program_active: self.program_active && self.audio_ok,
            audio_state: self.state.audio_phase(),
            is_dictating: self.state.is_capturing(),
            is_proofing_active: self.is_proofing,
            can_dictate: self.program_active && self.state == SessionState::Listening,
            current_mode: self.state.mode(),
            microphone_error: self.mic_error.clone(),
        };
        // Identical snapshots are suppressed to avoid UI flicker.
        if self.last_snapshot.as_ref() == Some(&snapshot) {
            return;
        }
        self.last_snapshot = Some(snapshot.clone());
        self.bus.send(OutboundMessage::State(snapshot));
    }

    fn publish_phase_status(&self) {
        let (color, text): (StatusColor, String) = match self.state {
            SessionState::Inactive => (StatusColor::Grey, "Microphone is not listening.".into()),
            SessionState::Preparing => (
                StatusColor::Grey,
                "Preparing to listen (initializing audio/models)...".into(),
            ),
            SessionState::Listening => {
                (StatusColor::Blue, "Listening for activation words...".into())
            }
            SessionState::Capturing(mode) => (
                StatusColor::Green,
                format!("Listening for dictation... ({mode} mode)"),
            ),
            SessionState::Transcribing(_) => (StatusColor::Orange, "Processing audio...".into()),
            SessionState::Processing(mode) => (
                StatusColor::Orange,
                format!("Processing with LLM ({mode} mode)..."),
            ),
            SessionState::Delivering(_) => (StatusColor::Blue, "Delivering result...".into()),
        };
        self.bus.status(color, text);
    }
}
