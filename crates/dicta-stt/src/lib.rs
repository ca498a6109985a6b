//! Speech-to-text abstraction layer for dicta.
//!
//! The session controller hands a completed utterance buffer to a
//! [`SpeechTranscriber`] on a blocking worker; results come back as plain
//! text plus timing. Model backends are selected by id and live behind
//! features so the core pipeline builds without inference libraries.

pub mod cache;
pub mod cleanup;
pub mod provider;
pub mod types;
#[cfg(feature = "whisper")]
pub mod whisper;

pub use cache::{Fingerprint, UtteranceCache};
pub use cleanup::TranscriptCleaner;
pub use provider::AsrProvider;
pub use types::{SpeechTranscriber, SttConfig, SttError, Transcript};
#[cfg(feature = "whisper")]
pub use whisper::WhisperTranscriber;
