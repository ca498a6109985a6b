use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model failed to load: {model_id}: {reason}")]
    ModelLoad { model_id: String, reason: String },

    #[error("Model runtime error: {0}")]
    ModelRuntime(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed inbound message: {0}")]
    Protocol(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Shutdown requested")]
    ShutdownRequested,

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("Device disconnected")]
    DeviceDisconnected,

    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Buffer overflow, dropped {count} frames")]
    BufferOverflow { count: usize },

    #[error("No audio data for {duration:?}")]
    NoDataTimeout { duration: Duration },

    #[error("Fatal error, cannot recover: {0}")]
    Fatal(String),
}

impl AppError {
    /// Whether this error ends the current session only, as opposed to the
    /// whole audio pipeline.
    pub fn is_session_scoped(&self) -> bool {
        matches!(
            self,
            AppError::ModelRuntime(_)
                | AppError::Timeout(_)
                | AppError::ModelLoad { .. }
                | AppError::Cancelled
        )
    }

    /// Cancellation is user intent, never reported as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}
