use serde::Deserialize;
use serde_json::json;
use tracing::info;

use dicta_wake::WakePhrases;

/// Default proofing prompt, overridable from the UI configuration.
pub const DEFAULT_PROOFREAD_PROMPT: &str =
    "You are proofreading text that will be entered into a professional document.\n\
     Correct any grammatical errors, spelling mistakes, or awkward phrasing.\n\
     Ensure the text is clear, concise, and maintains accuracy.";

pub const DEFAULT_LETTER_PROMPT: &str =
    "You are finalizing text that will be sent as a professional message.\n\
     Ensure the text is grammatically correct, clear, concise, and maintains accuracy.\n\
     Format it appropriately for professional communication.\n\
     Return only the finalized message without adding any extra comments, context, or introductory phrases.";

pub const DEFAULT_ASR_MODEL: &str = "mlx-community/parakeet-tdt-0.6b-v2";
pub const DEFAULT_LLM_MODEL: &str = "mlx-community/Qwen3-8B-4bit";

/// Model catalog advertised to the UI at startup.
pub fn model_catalog() -> serde_json::Value {
    json!({
        "asr": [
            {"id": "mlx-community/whisper-large-v3-turbo", "name": "Whisper (large-v3-turbo)"},
            {"id": DEFAULT_ASR_MODEL, "name": "Parakeet-TDT-0.6B-v2"},
        ],
        "llm": [
            {"id": DEFAULT_LLM_MODEL, "name": "Qwen3-8B-4bit"},
            {"id": "mlx-community/Qwen3-14B-4bit-AWQ", "name": "Qwen3-14B-4bit-AWQ"},
            {"id": "mlx-community/DeepSeek-R1-0528-Qwen3-8B-4bit-DWQ", "name": "DeepSeek-R1-DWQ-8B-4bit"},
        ],
    })
}

/// Runtime-adjustable configuration, reassembled from every `CONFIG:` push.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub wake_phrases: WakePhrases,
    pub proofing_prompt: String,
    pub letter_prompt: String,
    pub proofing_model: String,
    pub letter_model: String,
    pub asr_model: String,
    pub filter_filler_words: bool,
    pub filler_words: Vec<String>,
    pub auto_stop_silence_secs: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wake_phrases: WakePhrases::builtin(),
            proofing_prompt: DEFAULT_PROOFREAD_PROMPT.to_string(),
            letter_prompt: DEFAULT_LETTER_PROMPT.to_string(),
            proofing_model: DEFAULT_LLM_MODEL.to_string(),
            letter_model: DEFAULT_LLM_MODEL.to_string(),
            asr_model: DEFAULT_ASR_MODEL.to_string(),
            filter_filler_words: false,
            filler_words: Vec::new(),
            auto_stop_silence_secs: 1.5,
        }
    }
}

/// Wire shape of the UI's `CONFIG:` payload. Every field is optional; a
/// partial push only touches what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub wake_words: Option<WakeWordsPatch>,
    pub proofing_prompt: Option<String>,
    pub letter_prompt: Option<String>,
    pub selected_proofing_model: Option<String>,
    pub selected_letter_model: Option<String>,
    pub selected_asr_model: Option<String>,
    pub filter_filler_words: Option<bool>,
    pub filler_words: Option<Vec<String>>,
    pub silence_threshold_seconds: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WakeWordsPatch {
    #[serde(default)]
    pub dictate: Vec<String>,
    #[serde(default)]
    pub proofread: Vec<String>,
    #[serde(default)]
    pub letter: Vec<String>,
}

impl AppConfig {
    /// Apply a UI push. Returns which LLM model selections changed so the
    /// controller can emit `MODEL_SELECTED` notifications.
    pub fn apply(&mut self, patch: ConfigPatch) -> ModelChanges {
        let mut changes = ModelChanges::default();

        if let Some(words) = patch.wake_words {
            self.wake_phrases = WakePhrases {
                dictate: words.dictate,
                proofread: words.proofread,
                letter: words.letter,
            };
            info!("wake words updated: {:?}", self.wake_phrases);
        }
        if let Some(prompt) = patch.proofing_prompt {
            self.proofing_prompt = prompt;
        }
        if let Some(prompt) = patch.letter_prompt {
            self.letter_prompt = prompt;
        }
        if let Some(model) = patch.selected_proofing_model {
            if model != self.proofing_model {
                self.proofing_model = model;
                changes.proofing = true;
            }
        }
        if let Some(model) = patch.selected_letter_model {
            if model != self.letter_model {
                self.letter_model = model;
                changes.letter = true;
            }
        }
        if let Some(model) = patch.selected_asr_model {
            if model != self.asr_model {
                self.asr_model = model;
                changes.asr = true;
            }
        }
        if let Some(enabled) = patch.filter_filler_words {
            self.filter_filler_words = enabled;
        }
        if let Some(words) = patch.filler_words {
            self.filler_words = words;
        }
        if let Some(secs) = patch.silence_threshold_seconds {
            self.auto_stop_silence_secs = secs.clamp(1.0, 3.0);
        }
        changes
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModelChanges {
    pub proofing: bool,
    pub letter: bool,
    pub asr: bool,
}
