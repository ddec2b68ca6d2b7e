//! HTTP and websocket surface
//!
//! # Endpoints
//!
//! - `GET /ws` - websocket; each text frame queues a research session,
//!   sessions run one at a time and their events stream back as JSON
//!   objects tagged by `type`
//! - `POST /api/research` - run one session, respond with the finished report
//! - `GET /health` - liveness probe

/// Request handlers.
pub mod handlers;
/// Router configuration.
pub mod routes;
