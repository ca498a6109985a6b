use dicta_foundation::{AppError, Mode};

/// A command line received from the UI process on stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundCommand {
    Start(Mode),
    StopDictation,
    AbortDictation,
    ToggleActive,
    Restart,
    Shutdown,
    ApplyConfig(serde_json::Value),
    ModelsRequest,
    VocabularyApi { id: String, payload: serde_json::Value },
}

impl InboundCommand {
    /// Parse one inbound line. Malformed input is a [`AppError::Protocol`];
    /// the caller drops the line and emits a yellow warning status.
    pub fn parse(line: &str) -> Result<Self, AppError> {
        let line = line.trim();
        match line {
            "start_dictate" => return Ok(InboundCommand::Start(Mode::Dictate)),
            "start_proofread" => return Ok(InboundCommand::Start(Mode::Proofread)),
            "start_letter" => return Ok(InboundCommand::Start(Mode::Letter)),
            "STOP_DICTATION" => return Ok(InboundCommand::StopDictation),
            "ABORT_DICTATION" => return Ok(InboundCommand::AbortDictation),
            "TOGGLE_ACTIVE" => return Ok(InboundCommand::ToggleActive),
            "RESTART" => return Ok(InboundCommand::Restart),
            "SHUTDOWN" => return Ok(InboundCommand::Shutdown),
            "MODELS_REQUEST" => return Ok(InboundCommand::ModelsRequest),
            _ => {}
        }

        if let Some(json) = line.strip_prefix("CONFIG:") {
            let value = serde_json::from_str(json)
                .map_err(|e| AppError::Protocol(format!("CONFIG json: {e}")))?;
            return Ok(InboundCommand::ApplyConfig(value));
        }

        if let Some(rest) = line.strip_prefix("VOCABULARY_API:") {
            // VOCABULARY_API:<id>:<json> - the json itself may contain colons.
            let (id, json) = rest
                .split_once(':')
                .ok_or_else(|| AppError::Protocol(format!("VOCABULARY_API missing payload: {line}")))?;
            if id.is_empty() {
                return Err(AppError::Protocol("VOCABULARY_API empty id".into()));
            }
            let payload = serde_json::from_str(json)
                .map_err(|e| AppError::Protocol(format!("VOCABULARY_API json: {e}")))?;
            return Ok(InboundCommand::VocabularyApi {
                id: id.to_string(),
                payload,
            });
        }

        Err(AppError::Protocol(format!("unknown command: {line}")))
    }
}
