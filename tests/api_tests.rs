//! HTTP surface tests driven through the router without a listener.

mod common;

use axum::body::{Body, to_bytes};
use axum::extract::ws::Message;
use axum::http::{Request, StatusCode, header};
use common::mocks::{CountingExtractor, ScriptedLLM, StubRetriever};
use common::{Harness, PLANNING};
use futures::{StreamExt, stream};
use reach::api::handlers::ws::serve_frames;
use reach::api::routes;
use reach::transport::{ChannelSink, SessionEvent};
use reach::{AppState, ReachConfig, ReachConfigManager};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn state(harness: &Harness) -> AppState {
    let config = ReachConfig::default();
    let provider = harness.provider(&config);
    AppState::new(Arc::new(ReachConfigManager::from_config(config))).with_deps(Arc::new(provider))
}

fn app(harness: &Harness) -> axum::Router {
    routes::app(state(harness))
}

fn start_frame(task: &str) -> Result<Message, axum::Error> {
    let body = json!({"task": task, "report_type": "research_report"});
    Ok(Message::Text(body.to_string().into()))
}

fn post_research(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/research")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn default_harness() -> Harness {
    Harness::new(
        ScriptedLLM::new()
            .on(PLANNING, r#"["rental vacancy rates"]"#)
            .otherwise("# Rental markets\n\nVacancies fell."),
        StubRetriever::new()
            .with("rental vacancy rates", &["https://a.example/vacancy"])
            .with("rental markets", &["https://b.example/rents"]),
        CountingExtractor::new(),
    )
}

#[tokio::test]
async fn test_health() {
    let response = app(&default_harness())
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_research_returns_report() {
    let harness = default_harness();
    let request = json!({
        "task": "rental markets",
        "report_type": "research_report",
        "sources": ["WEB"],
    });

    let response = app(&harness)
        .oneshot(post_research(request.to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["report"], "# Rental markets\n\nVacancies fell.");
    assert_eq!(body["queries"], json!(["rental vacancy rates", "rental markets"]));
    assert_eq!(
        body["sources"],
        json!(["https://a.example/vacancy", "https://b.example/rents"])
    );
    assert!(body["duration_ms"].is_u64());

    // Without a sink the report is generated in one call, not streamed.
    assert!(harness.smart.streamed_calls().is_empty());
}

#[tokio::test]
async fn test_planning_failure_maps_to_bad_gateway() {
    let harness = Harness::new(
        ScriptedLLM::new().on(PLANNING, "no idea").otherwise("unused"),
        StubRetriever::new(),
        CountingExtractor::new(),
    );

    let response = app(&harness)
        .oneshot(post_research(
            json!({"task": "rental markets", "report_type": "paragraph"}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("not a list"));
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let response = app(&default_harness())
        .oneshot(post_research("{not json"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_report_type_is_rejected() {
    let harness = default_harness();
    let response = app(&harness)
        .oneshot(post_research(
            json!({"task": "rental markets", "report_type": "limerick"}).to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(harness.fast.calls().is_empty());
}

#[tokio::test]
async fn test_socket_runs_sessions_one_at_a_time() {
    let harness = Harness::new(
        ScriptedLLM::new()
            .on(PLANNING, r#"["rental vacancy rates"]"#)
            .otherwise("# Rental markets\n\nVacancies fell."),
        StubRetriever::new().with("rental vacancy rates", &["https://a.example/vacancy"]),
        CountingExtractor::new(),
    );
    let (sink, mut events) = ChannelSink::channel();
    let frames = stream::iter(vec![
        start_frame("rental markets"),
        Ok(Message::Text("{not json".into())),
        start_frame("office vacancies"),
    ])
    .chain(stream::pending());

    let connection = tokio::spawn(serve_frames(
        frames,
        state(&harness),
        sink,
        std::future::pending::<()>(),
    ));

    let mut received = Vec::new();
    while received.iter().filter(|e| matches!(e, SessionEvent::Complete)).count() < 2 {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        received.push(event);
    }
    connection.abort();

    let terminals: Vec<usize> = received
        .iter()
        .enumerate()
        .filter(|(_, e)| e.is_terminal())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(terminals.len(), 3);
    assert_eq!(
        received[terminals[1]],
        SessionEvent::Error {
            message: "Invalid JSON format".to_string()
        }
    );

    // Each session's events sit entirely before the next session's.
    let queries: Vec<usize> = received
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, SessionEvent::Queries { .. }))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(queries.len(), 2);
    assert!(queries[0] < terminals[0]);
    assert!(terminals[1] < queries[1] && queries[1] < terminals[2]);
    assert_eq!(received.last(), Some(&SessionEvent::Complete));
}
