use crate::AppState;
use crate::api::handlers::{research, ws};
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(research::health))
        .route("/ws", get(ws::research_socket))
        .route("/api/research", post(research::research))
}

/// The full application with tracing and permissive CORS.
pub fn app(state: AppState) -> Router {
    create_router()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
