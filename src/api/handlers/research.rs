use crate::{
    AppState,
    research::launch,
    transport::NullSink,
    types::{ResearchRequest, ResearchResponse, Result},
};
use axum::{Json, extract::State};
use std::time::Instant;

/// Run one research session and return the finished report.
pub async fn research(
    State(state): State<AppState>,
    Json(payload): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>> {
    let start = Instant::now();

    let outcome = launch(
        state.deps.as_ref(),
        state.config_manager.config(),
        payload.into(),
        &NullSink,
    )
    .await?;

    Ok(Json(ResearchResponse {
        report: outcome.report,
        queries: outcome.queries,
        sources: outcome.sources,
        duration_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
