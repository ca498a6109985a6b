use dicta_foundation::{AudioPhase, Mode};
use serde::Serialize;

use crate::escape::escape_payload;

/// Status lamp colors understood by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusColor {
    Grey,
    Blue,
    Green,
    Orange,
    Red,
    Yellow,
}

impl StatusColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusColor::Grey => "grey",
            StatusColor::Blue => "blue",
            StatusColor::Green => "green",
            StatusColor::Orange => "orange",
            StatusColor::Red => "red",
            StatusColor::Yellow => "yellow",
        }
    }
}

/// Snapshot of the session published as `STATE:<json>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub program_active: bool,
    pub audio_state: AudioPhase,
    pub is_dictating: bool,
    pub is_proofing_active: bool,
    pub can_dictate: bool,
    pub current_mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub microphone_error: Option<String>,
}

/// One event of the multiplexed LLM stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofStreamEvent {
    Thinking(String),
    Chunk(String),
    End,
}

/// Prefix of the final `TRANSCRIPTION:` artifact line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionLabel {
    Proofed,
    Letter,
    Error,
}

impl TranscriptionLabel {
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Letter => TranscriptionLabel::Letter,
            _ => TranscriptionLabel::Proofed,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TranscriptionLabel::Proofed => "PROOFED",
            TranscriptionLabel::Letter => "LETTER",
            TranscriptionLabel::Error => "ERROR",
        }
    }
}

/// Every message the core may place on the transport. Anything else belongs
/// in the log file.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    BackendReady,
    GetConfig,
    Models(serde_json::Value),
    ModelSelected { mode: Mode, model_id: String },
    State(StateSnapshot),
    Status { color: StatusColor, text: String },
    ProofStream { color: StatusColor, event: ProofStreamEvent },
    AudioAmp(u8),
    FinalTranscript(String),
    DictationPreview(String),
    Transcription { label: TranscriptionLabel, text: String },
    VocabResponse { id: String, payload: serde_json::Value },
    ShutdownSignal,
    ShutdownFinalized,
}

impl OutboundMessage {
    /// Serialise to exactly one transport line (without the trailing `\n`).
    pub fn encode(&self) -> String {
        let line = match self {
            OutboundMessage::BackendReady => "PYTHON_BACKEND_READY".to_string(),
            OutboundMessage::GetConfig => "GET_CONFIG".to_string(),
            OutboundMessage::Models(catalog) => format!("MODELS:{catalog}"),
            OutboundMessage::ModelSelected { mode, model_id } => {
                format!("MODEL_SELECTED:{}:{}", mode.as_str(), model_id)
            }
            OutboundMessage::State(snapshot) => {
                // StateSnapshot serialisation cannot fail: all fields are
                // plain scalars and strings.
                let json = serde_json::to_string(snapshot)
                    .unwrap_or_else(|_| "{}".to_string());
                format!("STATE:{json}")
            }
            OutboundMessage::Status { color, text } => {
                format!("STATUS:{}:{}", color.as_str(), sanitize_status(text))
            }
            OutboundMessage::ProofStream { color, event } => match event {
                ProofStreamEvent::Thinking(payload) => format!(
                    "STATUS:{}:PROOF_STREAM:thinking:{}",
                    color.as_str(),
                    escape_payload(payload)
                ),
                ProofStreamEvent::Chunk(payload) => format!(
                    "STATUS:{}:PROOF_STREAM:chunk:{}",
                    color.as_str(),
                    escape_payload(payload)
                ),
                ProofStreamEvent::End => {
                    format!("STATUS:{}:PROOF_STREAM:end", color.as_str())
                }
            },
            OutboundMessage::AudioAmp(level) => format!("AUDIO_AMP:{}", level.min(&100)),
            OutboundMessage::FinalTranscript(text) => {
                format!("FINAL_TRANSCRIPT:{}", escape_payload(text))
            }
            OutboundMessage::DictationPreview(text) => {
                format!("DICTATION_PREVIEW:{}", escape_payload(text))
            }
            OutboundMessage::Transcription { label, text } => {
                format!("TRANSCRIPTION:{}:{}", label.as_str(), escape_payload(text))
            }
            OutboundMessage::VocabResponse { id, payload } => {
                format!("VOCAB_RESPONSE:{id}:{payload}")
            }
            OutboundMessage::ShutdownSignal => "SHUTDOWN_SIGNAL".to_string(),
            OutboundMessage::ShutdownFinalized => "BACKEND_SHUTDOWN_FINALIZED".to_string(),
        };
        debug_assert!(
            !line.contains('\n') && !line.contains('\r'),
            "transport line must not contain raw line breaks: {line:?}"
        );
        line
    }
}

/// Free-form status text shares a line with its prefix; line breaks in it
/// carry no meaning, so they are flattened rather than escaped.
fn sanitize_status(text: &str) -> String {
    if text.contains('\n') || text.contains('\r') {
        text.replace(['\n', '\r'], " ")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::escape::unescape_payload;

    fn snapshot() -> StateSnapshot {
        StateSnapshot {
            program_active: true,
            audio_state: AudioPhase::Activation,
            is_dictating: false,
            is_proofing_active: false,
            can_dictate: true,
            current_mode: None,
            microphone_error: None,
        }
    }

    #[test]
    fn state_snapshot_uses_ui_field_names() {
        let line = OutboundMessage::State(snapshot()).encode();
        assert!(line.starts_with("STATE:{"));
        let json: serde_json::Value = serde_json::from_str(&line[6..]).unwrap();
        assert_eq!(json["programActive"], true);
        assert_eq!(json["audioState"], "activation");
        assert_eq!(json["isDictating"], false);
        assert_eq!(json["isProofingActive"], false);
        assert_eq!(json["canDictate"], true);
        assert!(json["currentMode"].is_null());
        assert!(json.get("microphoneError").is_none());
    }

    #[test]
    fn state_snapshot_with_mode_and_error() {
        let mut s = snapshot();
        s.current_mode = Some(Mode::Proofread);
        s.microphone_error = Some("device busy".into());
        let line = OutboundMessage::State(s).encode();
        let json: serde_json::Value = serde_json::from_str(&line[6..]).unwrap();
        assert_eq!(json["currentMode"], "proofread");
        assert_eq!(json["microphoneError"], "device busy");
    }

    #[test]
    fn proof_stream_chunk_escapes_newlines() {
        let msg = OutboundMessage::ProofStream {
            color: StatusColor::Blue,
            event: ProofStreamEvent::Chunk("- A.\n".into()),
        };
        assert_eq!(msg.encode(), "STATUS:blue:PROOF_STREAM:chunk:- A.\\n");
    }

    #[test]
    fn proof_stream_end_has_no_payload() {
        let msg = OutboundMessage::ProofStream {
            color: StatusColor::Blue,
            event: ProofStreamEvent::End,
        };
        assert_eq!(msg.encode(), "STATUS:blue:PROOF_STREAM:end");
    }

    #[test]
    fn every_message_is_single_line() {
        let messages = vec![
            OutboundMessage::BackendReady,
            OutboundMessage::Status {
                color: StatusColor::Red,
                text: "multi\nline\rstatus".into(),
            },
            OutboundMessage::FinalTranscript("hello\nworld".into()),
            OutboundMessage::DictationPreview("raw\r\ntext".into()),
            OutboundMessage::Transcription {
                label: TranscriptionLabel::Letter,
                text: "Dear Sir,\n\nBody.\n".into(),
            },
            OutboundMessage::ProofStream {
                color: StatusColor::Blue,
                event: ProofStreamEvent::Thinking("a\nb".into()),
            },
        ];
        for msg in messages {
            let line = msg.encode();
            assert!(!line.contains('\n'), "{line:?}");
            assert!(!line.contains('\r'), "{line:?}");
        }
    }

    #[test]
    fn every_message_has_known_prefix() {
        let prefixes = [
            "PYTHON_BACKEND_READY",
            "GET_CONFIG",
            "MODELS:",
            "MODEL_SELECTED:",
            "STATE:",
            "STATUS:",
            "AUDIO_AMP:",
            "FINAL_TRANSCRIPT:",
            "DICTATION_PREVIEW:",
            "TRANSCRIPTION:",
            "VOCAB_RESPONSE:",
            "SHUTDOWN_SIGNAL",
            "BACKEND_SHUTDOWN_FINALIZED",
        ];
        let messages = vec![
            OutboundMessage::BackendReady,
            OutboundMessage::GetConfig,
            OutboundMessage::Models(serde_json::json!({"asr": [], "llm": []})),
            OutboundMessage::ModelSelected {
                mode: Mode::Letter,
                model_id: "qwen3-8b".into(),
            },
            OutboundMessage::State(snapshot()),
            OutboundMessage::Status {
                color: StatusColor::Blue,
                text: "Listening for activation words...".into(),
            },
            OutboundMessage::ProofStream {
                color: StatusColor::Blue,
                event: ProofStreamEvent::End,
            },
            OutboundMessage::AudioAmp(42),
            OutboundMessage::FinalTranscript("hello world".into()),
            OutboundMessage::DictationPreview("raw".into()),
            OutboundMessage::Transcription {
                label: TranscriptionLabel::Proofed,
                text: "- Fixed.".into(),
            },
            OutboundMessage::VocabResponse {
                id: "7".into(),
                payload: serde_json::json!({"success": true}),
            },
            OutboundMessage::ShutdownSignal,
            OutboundMessage::ShutdownFinalized,
        ];
        for msg in messages {
            let line = msg.encode();
            assert!(
                prefixes.iter().any(|p| line.starts_with(p)),
                "unknown prefix: {line}"
            );
        }
    }

    #[test]
    fn amplitude_is_clamped() {
        assert_eq!(OutboundMessage::AudioAmp(100).encode(), "AUDIO_AMP:100");
        assert_eq!(OutboundMessage::AudioAmp(255).encode(), "AUDIO_AMP:100");
        assert_eq!(OutboundMessage::AudioAmp(0).encode(), "AUDIO_AMP:0");
    }

    #[test]
    fn final_transcript_round_trips_through_receiver() {
        let text = "- A.\n- B.";
        let line = OutboundMessage::FinalTranscript(text.into()).encode();
        let payload = line.strip_prefix("FINAL_TRANSCRIPT:").unwrap();
        assert_eq!(unescape_payload(payload), text);
    }
}
