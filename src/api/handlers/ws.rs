//! Streaming research over a websocket.
//!
//! Every inbound text frame requests a session. Sessions on one connection
//! run one at a time in arrival order, so a client always sees one
//! session's events end with `complete` or `error` before the next begins.
//! Events are written by a single sender task. Closing the socket aborts the
//! running session and drops the queued ones.

use crate::{
    AppState,
    research::launch,
    transport::{ChannelSink, EventSink, SessionEvent, SessionStart},
    types::{AppError, Result},
};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, Stream, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub async fn research_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, receiver) = socket.split();
    let (sink, mut events) = ChannelSink::channel();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Writer only stops when the client is gone.
    serve_frames(receiver, state, sink, &mut writer).await;
    writer.abort();
}

/// Run the sessions requested by `frames` one after another, emitting their
/// events on `sink`.
///
/// Returns when the frame stream ends, a close frame arrives or `closed`
/// resolves. A session still running at that point is aborted.
pub async fn serve_frames<F, E, C>(mut frames: F, state: AppState, sink: ChannelSink, closed: C)
where
    F: Stream<Item = std::result::Result<Message, E>> + Unpin,
    C: Future,
{
    tokio::pin!(closed);
    let mut pending: VecDeque<Result<SessionStart>> = VecDeque::new();
    let mut running = JoinSet::new();

    loop {
        if running.is_empty() {
            start_next(&mut pending, &mut running, &state, &sink);
        }

        tokio::select! {
            frame = frames.next() => {
                let Some(Ok(frame)) = frame else { break };
                match frame {
                    Message::Text(text) => pending.push_back(SessionStart::parse(text.as_str())),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(finished) = running.join_next(), if !running.is_empty() => {
                if let Err(e) = finished {
                    warn!("Session task failed: {}", e);
                }
            }
            _ = &mut closed => break,
        }
    }

    debug!(
        running = running.len(),
        queued = pending.len(),
        "Socket closed, aborting sessions"
    );
    running.abort_all();
}

/// Start the next queued session. Rejected frames ahead of it are answered
/// with an `error` event in queue order.
fn start_next(
    pending: &mut VecDeque<Result<SessionStart>>,
    running: &mut JoinSet<()>,
    state: &AppState,
    sink: &ChannelSink,
) {
    while let Some(next) = pending.pop_front() {
        match next {
            Ok(start) => {
                info!(task = %start.task, kind = %start.report_kind, "Session requested");
                let state = state.clone();
                let sink = sink.clone();
                running.spawn(async move {
                    let config = state.config_manager.config();
                    // Outcome already reported on the sink.
                    let _ = launch(state.deps.as_ref(), config, start, &sink).await;
                });
                return;
            }
            Err(e) => sink.emit(SessionEvent::Error {
                message: rejection_message(e),
            }),
        }
    }
}

fn rejection_message(error: AppError) -> String {
    match error {
        AppError::InvalidInput(message) => message,
        other => other.to_string(),
    }
}
