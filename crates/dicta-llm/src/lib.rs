//! Streaming LLM engine.
//!
//! Token streams from a local model runtime are demultiplexed into a
//! thinking channel and a response channel, cleaned, watched for runaway
//! repetition, and reassembled into the final artifact delivered to the UI.
//! The runtime itself sits behind [`TokenSource`]; the engine never touches
//! a model directly.

pub mod assemble;
pub mod engine;
pub mod format;
pub mod markers;
pub mod parser;
pub mod repetition;
#[cfg(feature = "http-runtime")]
pub mod runtime;
pub mod types;

pub use assemble::ResponseAssembler;
pub use engine::{LlmStreamEngine, LlmStreamEvent, TokenSource};
pub use format::finalize_artifact;
pub use markers::MarkerSet;
pub use parser::{Piece, StreamParser};
pub use repetition::RepetitionDetector;
#[cfg(feature = "http-runtime")]
pub use runtime::{HttpTokenSource, LocalRuntimeClient};
pub use types::{EngineConfig, GenerationParams, LlmError, LlmRequest, ModelFamily};
