use crate::types::RankedPassage;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound event of a research session, serialized as `{"type": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Queries { output: Vec<String> },
    Sources { output: Vec<RankedPassage> },
    Logs { output: String },
    Report { output: String },
    Complete,
    Error { message: String },
}

impl SessionEvent {
    pub fn log(message: impl Into<String>) -> Self {
        SessionEvent::Logs {
            output: message.into(),
        }
    }

    /// `complete` and `error` end a session's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Complete | SessionEvent::Error { .. })
    }
}

/// Narrow event-emission interface consumed by the pipeline.
///
/// Emission never fails the session: a sink whose listener went away drops
/// events silently.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);

    fn is_closed(&self) -> bool {
        false
    }
}

/// Ordered delivery into a per-connection queue.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            debug!("Event dropped, listener disconnected");
        }
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: SessionEvent) {}
}
