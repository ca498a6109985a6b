//! Streaming client for an OpenAI-compatible local model runtime
//! (llama.cpp server, ollama, LM Studio and friends).
//!
//! The engine consumes tokens through [`TokenSource`]; this module is the
//! only place that knows about HTTP or SSE framing.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::engine::TokenSource;
use crate::types::{LlmError, LlmRequest};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

#[derive(Clone)]
pub struct LocalRuntimeClient {
    base_url: String,
    client: reqwest::Client,
}

impl LocalRuntimeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn default_local() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }

    /// Issue a streaming chat completion for the request.
    pub async fn stream_chat(&self, request: &LlmRequest) -> Result<HttpTokenSource, LlmError> {
        let params = request.effective_params();
        let body = json!({
            "model": request.model_id,
            "stream": true,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_tokens": params.max_tokens,
            "messages": [
                {"role": "system", "content": request.system_prompt()},
                {"role": "user", "content": request.user_prompt()},
            ],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ModelLoad(format!("runtime unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(LlmError::Runtime(format!(
                "runtime returned {}",
                response.status()
            )));
        }

        Ok(HttpTokenSource {
            stream: Box::pin(response.bytes_stream()),
            pending: Vec::new(),
            done: false,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    delta: ChatDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChatDelta {
    #[serde(default)]
    content: Option<String>,
}

/// SSE-framed token stream. `data:` lines carry JSON deltas; `[DONE]`
/// terminates the stream.
pub struct HttpTokenSource {
    stream: futures_util::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    pending: Vec<u8>,
    done: bool,
}

impl HttpTokenSource {
    fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn parse_data_line(line: &str) -> Option<SseItem> {
        let data = line.strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            return Some(SseItem::Done);
        }
        match serde_json::from_str::<ChatChunk>(data) {
            Ok(chunk) => chunk
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.delta.content)
                .filter(|c| !c.is_empty())
                .map(SseItem::Token),
            Err(_) => {
                debug!("ignoring unparseable stream line: {line}");
                None
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SseItem {
    Token(String),
    Done,
}

#[async_trait]
impl TokenSource for HttpTokenSource {
    async fn next_token(&mut self) -> Result<Option<String>, LlmError> {
        loop {
            while let Some(line) = self.next_line() {
                match Self::parse_data_line(&line) {
                    Some(SseItem::Token(content)) => return Ok(Some(content)),
                    Some(SseItem::Done) => {
                        self.done = true;
                        return Ok(None);
                    }
                    None => {}
                }
            }
            if self.done {
                return Ok(None);
            }
            match self.stream.next().await {
                Some(Ok(bytes)) => self.pending.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(LlmError::Runtime(format!("stream read: {e}"))),
                None => {
                    self.done = true;
                    // Whatever is buffered without a trailing newline is
                    // not a complete SSE line; the stream is over.
                    return Ok(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(
            HttpTokenSource::parse_data_line(line),
            Some(SseItem::Token("Hel".to_string()))
        );
    }

    #[test]
    fn parses_done_sentinel() {
        assert_eq!(
            HttpTokenSource::parse_data_line("data: [DONE]"),
            Some(SseItem::Done)
        );
    }

    #[test]
    fn skips_empty_deltas_and_comments() {
        assert_eq!(
            HttpTokenSource::parse_data_line(r#"data: {"choices":[{"delta":{}}]}"#),
            None
        );
        assert_eq!(HttpTokenSource::parse_data_line(": keep-alive"), None);
        assert_eq!(HttpTokenSource::parse_data_line(""), None);
    }
}
