use vosk::{CompleteResult, DecodingState, Model, Recognizer};

use crate::recognizer::{WakeError, WakeRecognizer};

/// Vosk-backed wake recogniser. The small English model is enough here;
/// full dictation accuracy comes from the transcription service, not from
/// this path.
pub struct VoskRecognizer {
    recognizer: Recognizer,
}

impl VoskRecognizer {
    pub fn new(model_path: &str, sample_rate: f32) -> Result<Self, WakeError> {
        if !std::path::Path::new(model_path).exists() {
            return Err(WakeError::ModelLoad(format!(
                "Vosk model not found at '{model_path}'"
            )));
        }

        let model = Model::new(model_path).ok_or_else(|| {
            WakeError::ModelLoad(format!("Failed to load Vosk model from: {model_path}"))
        })?;

        let mut recognizer = Recognizer::new(&model, sample_rate).ok_or_else(|| {
            WakeError::ModelLoad(format!(
                "Failed to create Vosk recognizer with sample rate: {sample_rate}"
            ))
        })?;
        recognizer.set_max_alternatives(0);
        recognizer.set_words(false);

        Ok(Self { recognizer })
    }

    fn parse_complete(result: CompleteResult) -> Option<String> {
        match result {
            CompleteResult::Single(single) => {
                let text = single.text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }
            CompleteResult::Multiple(multiple) => multiple.alternatives.first().and_then(|alt| {
                let text = alt.text.trim();
                (!text.is_empty()).then(|| text.to_string())
            }),
        }
    }
}

impl WakeRecognizer for VoskRecognizer {
    fn accept_frame(&mut self, pcm: &[i16]) -> Result<Option<String>, WakeError> {
        let state = self
            .recognizer
            .accept_waveform(pcm)
            .map_err(|e| WakeError::Recognition(format!("{e:?}")))?;

        match state {
            DecodingState::Finalized => Ok(Self::parse_complete(self.recognizer.result())),
            DecodingState::Running => Ok(None),
            DecodingState::Failed => Err(WakeError::Recognition("decoding failed".into())),
        }
    }

    fn reset(&mut self) {
        let _ = self.recognizer.final_result();
    }
}
