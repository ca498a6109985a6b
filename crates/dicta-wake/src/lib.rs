pub mod matcher;
pub mod phonetic;
pub mod recognizer;
#[cfg(feature = "vosk")]
pub mod vosk_backend;

pub use matcher::{WakeMatch, WakePhrases, WakeWordMatcher};
pub use phonetic::phonetic_key;
pub use recognizer::{WakeError, WakeRecognizer};
#[cfg(feature = "vosk")]
pub use vosk_backend::VoskRecognizer;
