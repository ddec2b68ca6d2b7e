//! Mock implementations for testing.
//!
//! Scripted stand-ins for every collaborator a research session talks to,
//! so whole sessions can run without a model server or the network.

use async_trait::async_trait;
use futures::stream;
use parking_lot::Mutex;
use reach::llm::{LLMClient, TextStream};
use reach::rag::Embedder;
use reach::tools::scraper::{FailureReason, FetchFailure, FetchResult};
use reach::tools::{ContentExtractor, SearchRetriever};
use reach::transport::{EventSink, SessionEvent};
use reach::types::{AppError, ExtractionMethod, RawDocument, Result, SearchHit};
use reqwest::Url;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

// ============= LLM =============

/// One recorded generation call.
#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub prompt: String,
    pub streamed: bool,
}

/// LLM client answering by prompt content.
///
/// Rules are checked in insertion order; the first whose needle occurs in
/// the prompt wins. Without a match the fallback reply is used, and without
/// a fallback the call fails.
///
/// ```ignore
/// let llm = ScriptedLLM::new()
///     .on("response_format", r#"["q1", "q2"]"#)
///     .otherwise("# Report");
/// ```
#[derive(Default)]
pub struct ScriptedLLM {
    rules: Vec<(String, String)>,
    fallback: Option<String>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedLLM {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, needle: &str, reply: &str) -> Self {
        self.rules.push((needle.to_string(), reply.to_string()));
        self
    }

    pub fn otherwise(mut self, reply: &str) -> Self {
        self.fallback = Some(reply.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_containing(&self, needle: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.prompt.contains(needle))
            .cloned()
            .collect()
    }

    pub fn streamed_calls(&self) -> Vec<Call> {
        self.calls.lock().iter().filter(|c| c.streamed).cloned().collect()
    }

    fn reply(&self, system: &str, prompt: &str, streamed: bool) -> Result<String> {
        self.calls.lock().push(Call {
            system: system.to_string(),
            prompt: prompt.to_string(),
            streamed,
        });

        self.rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply.clone())
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| AppError::Generation("Mock LLM has no reply".to_string()))
    }
}

#[async_trait]
impl LLMClient for ScriptedLLM {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.reply("", prompt, false)
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.reply(system, prompt, false)
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        let text = self.reply(system, prompt, true)?;
        let chunks: Vec<Result<String>> = text
            .split_inclusive(' ')
            .map(|chunk| Ok(chunk.to_string()))
            .collect();
        Ok(Box::new(stream::iter(chunks)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

// ============= Search =============

/// Retriever answering from a fixed query-to-URLs table.
#[derive(Default)]
pub struct StubRetriever {
    results: HashMap<String, Vec<String>>,
    searched: Mutex<Vec<String>>,
}

impl StubRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().clone()
    }
}

#[async_trait]
impl SearchRetriever for StubRetriever {
    fn name(&self) -> &str {
        "stub"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        self.searched.lock().push(query.to_string());
        Ok(self
            .results
            .get(query)
            .map(|urls| {
                urls.iter()
                    .take(max_results)
                    .map(|url| SearchHit {
                        title: format!("Result for {}", query),
                        url: url.clone(),
                        snippet: String::new(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

// ============= Extraction =============

/// Extractor producing filler pages and counting every request per URL.
pub struct CountingExtractor {
    body_len: usize,
    failing: HashSet<String>,
    counts: Mutex<HashMap<String, usize>>,
}

impl Default for CountingExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CountingExtractor {
    pub fn new() -> Self {
        Self {
            body_len: 500,
            failing: HashSet::new(),
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Pages of exactly `chars` characters.
    pub fn with_body_len(mut self, chars: usize) -> Self {
        self.body_len = chars;
        self
    }

    pub fn failing_on(mut self, urls: &[&str]) -> Self {
        self.failing.extend(urls.iter().map(|u| u.to_string()));
        self
    }

    pub fn count(&self, url: &str) -> usize {
        self.counts.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().values().sum()
    }

    fn body(&self) -> String {
        "housing market data ".chars().cycle().take(self.body_len).collect()
    }
}

#[async_trait]
impl ContentExtractor for CountingExtractor {
    async fn extract(&self, url: &Url) -> FetchResult {
        let key = url.as_str().to_string();
        *self.counts.lock().entry(key.clone()).or_insert(0) += 1;

        if self.failing.contains(&key) {
            return Err(FetchFailure::new(
                key,
                FailureReason::Network("connection refused".to_string()),
            ));
        }
        Ok(RawDocument::new(
            key.clone(),
            format!("Page {}", key),
            self.body(),
            ExtractionMethod::PageTags,
        ))
    }
}

// ============= Embeddings =============

/// Every text maps to the same vector, so every window scores 1.0.
pub struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
    }
}

// ============= Events =============

/// Sink keeping every event in emission order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SessionEvent>>,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose client has already gone away.
    pub fn closed() -> Self {
        let sink = Self::default();
        sink.closed.store(true, Ordering::SeqCst);
        sink
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Logs { output } => Some(output),
                _ => None,
            })
            .collect()
    }

    pub fn report_chunks(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Report { output } => Some(output),
                _ => None,
            })
            .collect()
    }

    pub fn sources(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::Sources { output } => Some(output),
                _ => None,
            })
            .flatten()
            .map(|p| p.source)
            .collect()
    }

    pub fn last(&self) -> Option<SessionEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: SessionEvent) {
        self.events.lock().push(event);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
