use tracing::warn;

/// Known ASR model families. Selection is by model id substring, the way
/// the catalog names them; unknown ids fall back to the Whisper-style path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsrProvider {
    WhisperLike,
    Parakeet,
}

impl AsrProvider {
    pub fn detect(model_id: &str) -> Self {
        let id = model_id.to_lowercase();
        if id.contains("parakeet") {
            AsrProvider::Parakeet
        } else if id.contains("whisper") {
            AsrProvider::WhisperLike
        } else {
            warn!("Unknown ASR model family for '{}', assuming whisper", model_id);
            AsrProvider::WhisperLike
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_families() {
        assert_eq!(
            AsrProvider::detect("mlx-community/parakeet-tdt-0.6b-v2"),
            AsrProvider::Parakeet
        );
        assert_eq!(
            AsrProvider::detect("mlx-community/whisper-large-v3-turbo"),
            AsrProvider::WhisperLike
        );
        assert_eq!(AsrProvider::detect("acme/mystery-model"), AsrProvider::WhisperLike);
    }
}
