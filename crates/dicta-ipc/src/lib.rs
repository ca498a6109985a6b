//! IPC layer for the dicta core.
//!
//! All core-to-UI traffic is serialised onto a single line-oriented stdout
//! transport; everything that is not a protocol message belongs in the log
//! file. The escaping scheme in [`escape`] is load-bearing: the transport
//! frames on `\n`, so payload line breaks must survive as literal two-char
//! sequences.

pub mod command;
pub mod escape;
pub mod message;
pub mod transport;

pub use command::InboundCommand;
pub use escape::{escape_payload, unescape_payload};
pub use message::{
    OutboundMessage, ProofStreamEvent, StateSnapshot, StatusColor, TranscriptionLabel,
};
pub use transport::{spawn_transport_writer, StatusBus};
