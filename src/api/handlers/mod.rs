//! API request handlers.

/// Non-streaming research and health handlers.
pub mod research;
/// Websocket session handler.
pub mod ws;
