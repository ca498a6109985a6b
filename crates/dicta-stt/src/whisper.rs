use std::path::PathBuf;

use tracing::info;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use crate::types::{SpeechTranscriber, SttError};

/// Whisper-family backend over whisper-rs (ggml models).
pub struct WhisperTranscriber {
    model_path: PathBuf,
    ctx: Option<WhisperContext>,
    threads: i32,
}

impl WhisperTranscriber {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ctx: None,
            threads: 4,
        }
    }
}

impl SpeechTranscriber for WhisperTranscriber {
    fn load(&mut self) -> Result<(), SttError> {
        if self.ctx.is_some() {
            return Ok(());
        }
        if !self.model_path.exists() {
            return Err(SttError::ModelLoad(format!(
                "Whisper model not found at: {}",
                self.model_path.display()
            )));
        }
        let path = self.model_path.to_string_lossy();
        let ctx = WhisperContext::new_with_params(&path, WhisperContextParameters::default())
            .map_err(|e| SttError::ModelLoad(e.to_string()))?;
        self.ctx = Some(ctx);
        info!("Whisper context created from {}", self.model_path.display());
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.ctx.is_some()
    }

    fn transcribe(&mut self, samples: &[i16], prompt: &str) -> Result<String, SttError> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| SttError::ModelLoad("model not loaded".into()))?;

        let mut audio = vec![0.0f32; samples.len()];
        whisper_rs::convert_integer_to_float_audio(samples, &mut audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut state = ctx
            .create_state()
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.threads);
        params.set_language(Some("en"));
        params.set_initial_prompt(prompt);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);

        state
            .full(params, &audio)
            .map_err(|e| SttError::Transcription(e.to_string()))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Transcription(e.to_string()))?;
        let mut text = String::new();
        for i in 0..num_segments {
            if let Ok(segment) = state.full_get_segment_text(i) {
                text.push_str(&segment);
            }
        }
        Ok(text.trim().to_string())
    }

    fn unload(&mut self) {
        self.ctx = None;
    }
}
