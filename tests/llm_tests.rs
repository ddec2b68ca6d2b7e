//! Ollama client tests against a mocked chat endpoint.

#![cfg(feature = "ollama")]

use futures::StreamExt;
use reach::ReachConfig;
use reach::llm::{CallClass, LLMClientFactory};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chat_response(content: &str, done: bool) -> serde_json::Value {
    json!({
        "model": "llama3.2",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {
            "role": "assistant",
            "content": content
        },
        "done": done
    })
}

fn streaming_body(chunks: &[&str]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("{}\n", chat_response(chunk, i == chunks.len() - 1)))
        .collect()
}

fn config_for(server: &MockServer, max_retries: u32) -> Arc<ReachConfig> {
    let mut config = ReachConfig::default();
    config.llm.base_url = server.uri();
    config.llm.smart_model = "llama3.2".to_string();
    config.llm.max_retries = max_retries;
    config.llm.retry_backoff_ms = 1;
    config.llm.timeout_secs = 5;
    Arc::new(config)
}

#[tokio::test]
async fn test_generate_with_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("[\"q1\"]", true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = LLMClientFactory::new(config_for(&server, 0))
        .create(CallClass::Smart)
        .await
        .unwrap();
    let reply = client
        .generate_with_system("You are a planner.", "Plan queries")
        .await
        .unwrap();

    assert_eq!(reply, "[\"q1\"]");
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("recovered", true)))
        .mount(&server)
        .await;

    let client = LLMClientFactory::new(config_for(&server, 2))
        .create(CallClass::Smart)
        .await
        .unwrap();

    assert_eq!(client.generate("hello").await.unwrap(), "recovered");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_budget_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("down"))
        .mount(&server)
        .await;

    let client = LLMClientFactory::new(config_for(&server, 2))
        .create(CallClass::Smart)
        .await
        .unwrap();

    assert!(client.generate("hello").await.is_err());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_stream_yields_chunks_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(streaming_body(&["# Rep", "ort", ""]), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let client = LLMClientFactory::new(config_for(&server, 0))
        .create(CallClass::Smart)
        .await
        .unwrap();
    let mut stream = client
        .stream_with_system("You are a writer.", "Write")
        .await
        .unwrap();

    let mut chunks = Vec::new();
    while let Some(chunk) = stream.next().await {
        chunks.push(chunk.unwrap());
    }
    assert_eq!(chunks.concat(), "# Report");
}
