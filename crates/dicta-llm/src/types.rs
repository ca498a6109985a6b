use std::time::Duration;

use thiserror::Error;

use dicta_foundation::Mode;

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("LLM failed to load: {0}")]
    ModelLoad(String),

    #[error("LLM runtime error: {0}")]
    Runtime(String),

    #[error("No token received for {0:?}")]
    IdleTimeout(Duration),

    #[error("Generation cancelled")]
    Cancelled,
}

/// Model families with behavioural differences. Adding a family is
/// additive: a new variant plus its marker tuple and sampler defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Reasoning-channel models (`<|channel|>analysis<|message|>` framing).
    GptOss,
    /// Everything else; thinking arrives in `<think>`-style tags if at all.
    Generic,
}

impl ModelFamily {
    pub fn detect(model_id: &str) -> Self {
        if model_id.to_lowercase().contains("gpt-oss") {
            ModelFamily::GptOss
        } else {
            ModelFamily::Generic
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.1,
            top_p: 0.95,
        }
    }
}

impl GenerationParams {
    /// Family-specific sampler overrides. gpt-oss models loop easily at
    /// higher budgets, so the token budget is capped and sampling loosened.
    pub fn for_family(self, family: ModelFamily) -> Self {
        match family {
            ModelFamily::GptOss => Self {
                max_tokens: self.max_tokens.min(2048),
                temperature: 0.3,
                top_p: 0.95,
            },
            ModelFamily::Generic => self,
        }
    }
}

/// One LLM invocation as issued by the session controller.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub mode: Mode,
    pub prompt_template: String,
    pub user_text: String,
    pub model_id: String,
    pub params: GenerationParams,
}

impl LlmRequest {
    pub fn family(&self) -> ModelFamily {
        ModelFamily::detect(&self.model_id)
    }

    pub fn effective_params(&self) -> GenerationParams {
        self.params.for_family(self.family())
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = "You are a meticulous professional proof-reader.".to_string();
        if self.family() == ModelFamily::GptOss {
            prompt.push_str(
                " Answer once, tersely. Never repeat a sentence or phrase you have already written.",
            );
        }
        prompt
    }

    /// Full user prompt: template, output-format contract, then the input.
    pub fn user_prompt(&self) -> String {
        let format_instructions = match self.mode {
            Mode::Proofread => {
                "First give your reasoning inside <think> and </think> tags. \
                 Immediately after the closing </think> tag, provide ONLY the corrected text \
                 as a bulleted list using '-' markers, one distinct corrected sentence per bullet. \
                 No filler, no commentary, nothing after the final bullet."
            }
            Mode::Letter => {
                "Generate a professional letter based on the input text, with clear paragraphs. \
                 Do not add any conversational filler before or after the letter content itself."
            }
            Mode::Dictate => "",
        };

        format!(
            "{template}\n\n\
             IMPORTANT: You MUST strictly follow these output formatting instructions for your entire response:\n\
             {format_instructions}\n\n\
             -----\n\
             Input Text to {mode}:\n{input}\n\n\
             Now, generate the {mode} output, adhering to all instructions above:\n",
            template = self.prompt_template,
            format_instructions = format_instructions,
            mode = self.mode.as_str(),
            input = self.user_text,
        )
    }
}

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub idle_timeout: Duration,
    pub max_repetitions: usize,
    /// Seed phrases watched by the repetition detector.
    pub repetition_seeds: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_repetitions: 3,
            repetition_seeds: vec!["The correct term is".to_string()],
        }
    }
}
