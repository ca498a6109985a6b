use serde::{Deserialize, Serialize};

/// Dictation mode selected by wake word or explicit command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dictate,
    Proofread,
    Letter,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dictate => "dictate",
            Mode::Proofread => "proofread",
            Mode::Letter => "letter",
        }
    }

    /// Prefix used on the final `TRANSCRIPTION:` artifact line.
    pub fn artifact_label(&self) -> &'static str {
        match self {
            Mode::Proofread => "PROOFED",
            Mode::Letter => "LETTER",
            Mode::Dictate => "DICTATE",
        }
    }

    /// Tie-break order when two wake phrases match the same window.
    /// Lower wins.
    pub fn precedence(&self) -> u8 {
        match self {
            Mode::Proofread => 0,
            Mode::Letter => 1,
            Mode::Dictate => 2,
        }
    }

    pub fn uses_llm(&self) -> bool {
        !matches!(self, Mode::Dictate)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Central session state. Owned and mutated only by the session controller;
/// other tasks observe the derived [`AudioPhase`] through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Inactive,
    Preparing,
    Listening,
    Capturing(Mode),
    Transcribing(Mode),
    Processing(Mode),
    Delivering(Mode),
}

impl SessionState {
    pub fn mode(&self) -> Option<Mode> {
        match self {
            SessionState::Capturing(m)
            | SessionState::Transcribing(m)
            | SessionState::Processing(m)
            | SessionState::Delivering(m) => Some(*m),
            _ => None,
        }
    }

    /// The coarse phase reported to the UI as `audioState`.
    pub fn audio_phase(&self) -> AudioPhase {
        match self {
            SessionState::Inactive | SessionState::Preparing => AudioPhase::Inactive,
            SessionState::Listening => AudioPhase::Activation,
            SessionState::Capturing(_) => AudioPhase::Dictation,
            SessionState::Transcribing(_)
            | SessionState::Processing(_)
            | SessionState::Delivering(_) => AudioPhase::Processing,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, SessionState::Capturing(_))
    }

    /// True while a session occupies the heavy pipeline; a new dictation
    /// cannot start.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            SessionState::Capturing(_)
                | SessionState::Transcribing(_)
                | SessionState::Processing(_)
                | SessionState::Delivering(_)
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Inactive => write!(f, "Inactive"),
            SessionState::Preparing => write!(f, "Preparing"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Capturing(m) => write!(f, "Capturing({m})"),
            SessionState::Transcribing(m) => write!(f, "Transcribing({m})"),
            SessionState::Processing(m) => write!(f, "Processing({m})"),
            SessionState::Delivering(m) => write!(f, "Delivering({m})"),
        }
    }
}

/// Coarse audio pipeline phase, published to the dispatcher and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioPhase {
    Activation,
    Dictation,
    Processing,
    Inactive,
}

impl AudioPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioPhase::Activation => "activation",
            AudioPhase::Dictation => "dictation",
            AudioPhase::Processing => "processing",
            AudioPhase::Inactive => "inactive",
        }
    }
}

/// Validates a session transition against the state machine in the design.
/// `SHUTDOWN` and fatal audio failure may force any state to `Inactive`.
pub fn is_valid_transition(from: SessionState, to: SessionState) -> bool {
    use SessionState::*;

    if to == Inactive {
        return true;
    }

    matches!(
        (from, to),
        (Inactive, Preparing)
            | (Preparing, Listening)
            | (Listening, Capturing(_))
            | (Capturing(_), Listening)
    ) || match (from, to) {
        (Capturing(a), Transcribing(b)) => a == b,
        (Transcribing(a), Delivering(b)) => a == b && a == Mode::Dictate,
        (Transcribing(a), Processing(b)) => a == b && a.uses_llm(),
        (Transcribing(_), Listening) => true,
        (Processing(a), Delivering(b)) => a == b,
        (Processing(_), Listening) => true,
        (Delivering(_), Listening) => true,
        _ => false,
    }
}
