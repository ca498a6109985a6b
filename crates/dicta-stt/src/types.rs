use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SttError {
    #[error("ASR model failed to load: {0}")]
    ModelLoad(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transcription cancelled")]
    Cancelled,
}

/// A finished transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct SttConfig {
    pub model_id: String,
    /// Domain prompt steering the recogniser towards professional wording.
    pub prompt: String,
    pub timeout: Duration,
    /// Opt-in fingerprint cache for identical utterances.
    pub cache_enabled: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_id: "mlx-community/parakeet-tdt-0.6b-v2".to_string(),
            prompt: "You are transcribing a professional encounter for documentation. \
                     Ensure the transcription is accurate, concise, and formatted appropriately. \
                     Use appropriate terminology when needed."
                .to_string(),
            timeout: Duration::from_secs(60),
            cache_enabled: false,
        }
    }
}

/// Blocking transcription backend. Runs on a dedicated worker; the fixed
/// operation set keeps backends interchangeable.
pub trait SpeechTranscriber: Send {
    fn load(&mut self) -> Result<(), SttError>;
    fn is_loaded(&self) -> bool;
    fn transcribe(&mut self, samples: &[i16], prompt: &str) -> Result<String, SttError>;
    fn unload(&mut self);
}
