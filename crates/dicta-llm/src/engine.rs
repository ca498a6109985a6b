use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assemble::ResponseAssembler;
use crate::format::finalize_artifact;
use crate::markers::MarkerSet;
use crate::parser::{Piece, StreamParser};
use crate::repetition::RepetitionDetector;
use crate::types::{EngineConfig, LlmError, LlmRequest};

/// Flush the thinking buffer to the UI once it holds a line break or grows
/// past this many characters.
const THINKING_FLUSH_CHARS: usize = 50;

/// A stream of generated token chunks from a model runtime.
#[async_trait]
pub trait TokenSource: Send {
    /// Next chunk, `None` at end of stream.
    async fn next_token(&mut self) -> Result<Option<String>, LlmError>;
}

/// Events published while a stream is being consumed. `End` is always the
/// last event of a session, exactly once, on every exit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmStreamEvent {
    Thinking(String),
    Chunk(String),
    End,
}

enum StreamOutcome {
    Finished,
    RepetitionStop,
    Cancelled,
    IdleTimeout,
    Failed(LlmError),
}

/// Drives a [`TokenSource`] through demultiplexing, cleaning and loop
/// detection, publishing stream events and returning the final artifact.
pub struct LlmStreamEngine {
    config: EngineConfig,
}

impl LlmStreamEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub async fn run<S: TokenSource>(
        &self,
        request: &LlmRequest,
        mut source: S,
        events: mpsc::Sender<LlmStreamEvent>,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        // The marker vocabulary follows the model family: channel framing
        // is only live on reasoning-channel models.
        let mut parser = StreamParser::new(MarkerSet::for_family(request.family()));
        let mut assembler = ResponseAssembler::new();
        let mut repetition =
            RepetitionDetector::new(&self.config.repetition_seeds, self.config.max_repetitions);
        let mut thinking_buf = String::new();

        info!(model = %request.model_id, mode = %request.mode, "LLM stream started");

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => break StreamOutcome::Cancelled,
                token = timeout(self.config.idle_timeout, source.next_token()) => {
                    match token {
                        Err(_) => break StreamOutcome::IdleTimeout,
                        Ok(Err(e)) => break StreamOutcome::Failed(e),
                        Ok(Ok(None)) => break StreamOutcome::Finished,
                        Ok(Ok(Some(chunk))) => {
                            if chunk.is_empty() {
                                continue;
                            }
                            let mut looped = false;
                            for piece in parser.push(&chunk) {
                                if self
                                    .handle_piece(piece, &events, &mut thinking_buf, &mut assembler, &mut repetition)
                                    .await
                                {
                                    looped = true;
                                    break;
                                }
                            }
                            if looped {
                                break StreamOutcome::RepetitionStop;
                            }
                        }
                    }
                }
            }
        };

        // Flush whatever the parser still holds, except after a cancel:
        // cancellation promptness forbids further chunks.
        if matches!(outcome, StreamOutcome::Finished | StreamOutcome::RepetitionStop) {
            for piece in parser.finish() {
                let _ = self
                    .handle_piece(piece, &events, &mut thinking_buf, &mut assembler, &mut repetition)
                    .await;
            }
            if !thinking_buf.trim().is_empty() {
                let _ = events.send(LlmStreamEvent::Thinking(std::mem::take(&mut thinking_buf))).await;
            }
        }

        let _ = events.send(LlmStreamEvent::End).await;

        match outcome {
            StreamOutcome::Finished => {
                let artifact = finalize_artifact(request.mode, assembler.text());
                info!("LLM stream finished, artifact {} chars", artifact.len());
                Ok(artifact)
            }
            StreamOutcome::RepetitionStop => {
                warn!("LLM stream terminated by repetition detector");
                Ok(finalize_artifact(request.mode, assembler.text()))
            }
            StreamOutcome::Cancelled => {
                debug!("LLM stream cancelled");
                Err(LlmError::Cancelled)
            }
            StreamOutcome::IdleTimeout => Err(LlmError::IdleTimeout(self.config.idle_timeout)),
            StreamOutcome::Failed(e) => Err(e),
        }
    }

    /// Returns `true` when the repetition detector fired.
    async fn handle_piece(
        &self,
        piece: Piece,
        events: &mpsc::Sender<LlmStreamEvent>,
        thinking_buf: &mut String,
        assembler: &mut ResponseAssembler,
        repetition: &mut RepetitionDetector,
    ) -> bool {
        match piece {
            Piece::Thinking(text) => {
                thinking_buf.push_str(&text);
                if thinking_buf.contains('\n') || thinking_buf.len() > THINKING_FLUSH_CHARS {
                    if !thinking_buf.trim().is_empty() {
                        let _ = events
                            .send(LlmStreamEvent::Thinking(std::mem::take(thinking_buf)))
                            .await;
                    } else {
                        thinking_buf.clear();
                    }
                }
                false
            }
            Piece::Response(text) => {
                let _ = events.send(LlmStreamEvent::Chunk(text.clone())).await;
                assembler.append(&text);
                repetition.observe(&text)
            }
        }
    }
}
