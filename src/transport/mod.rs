//! Session event contract
//!
//! The pipeline reports progress through an [`EventSink`]; the websocket and
//! CLI adapters decide where the events go. Inbound session-start frames are
//! parsed and validated by [`SessionStart::parse`].

pub mod events;
pub mod message;

pub use events::{ChannelSink, EventSink, NullSink, SessionEvent};
pub use message::{Edits, SessionStart, parse_edits};
