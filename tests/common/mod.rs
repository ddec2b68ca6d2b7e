//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod mocks;

use async_trait::async_trait;
use mocks::{ConstantEmbedder, CountingExtractor, ScriptedLLM, StubRetriever};
use reach::rag::ContextCompressor;
use reach::report::PromptRegistry;
use reach::research::{DepsProvider, ResearchDeps};
use reach::tools::{FileLoader, PlainTextConverter, Scraper};
use reach::types::Result;
use reach::utils::toml_config::ReachConfig;
use std::sync::Arc;

pub const PERSONA_REPLY: &str =
    r#"{"server": "Housing Agent", "agent_role_prompt": "You are a housing market analyst."}"#;

/// Marker present in every query-planning prompt.
pub const PLANNING: &str = "response_format";

/// Scripted collaborators of one session, kept around for assertions.
pub struct Harness {
    pub fast: Arc<ScriptedLLM>,
    pub smart: Arc<ScriptedLLM>,
    pub retriever: Arc<StubRetriever>,
    pub extractor: Arc<CountingExtractor>,
}

impl Harness {
    pub fn new(smart: ScriptedLLM, retriever: StubRetriever, extractor: CountingExtractor) -> Self {
        Self {
            fast: Arc::new(ScriptedLLM::new().otherwise(PERSONA_REPLY)),
            smart: Arc::new(smart),
            retriever: Arc::new(retriever),
            extractor: Arc::new(extractor),
        }
    }

    pub fn deps(&self, config: &ReachConfig) -> ResearchDeps {
        ResearchDeps {
            fast_llm: self.fast.clone(),
            smart_llm: self.smart.clone(),
            retriever: self.retriever.clone(),
            scraper: Arc::new(Scraper::new(
                self.extractor.clone(),
                4,
                config.scraper.min_content_length,
            )),
            compressor: Arc::new(ContextCompressor::from_config(
                Arc::new(ConstantEmbedder),
                &config.compression,
            )),
            files: Arc::new(FileLoader::new(
                reqwest::Client::new(),
                Arc::new(PlainTextConverter),
            )),
            prompts: PromptRegistry::with_default_builders(),
        }
    }

    pub fn provider(&self, config: &ReachConfig) -> StaticDeps {
        StaticDeps(self.deps(config))
    }
}

/// Hands out the same collaborators to every session.
pub struct StaticDeps(pub ResearchDeps);

#[async_trait]
impl DepsProvider for StaticDeps {
    async fn deps(&self, _config: Arc<ReachConfig>) -> Result<ResearchDeps> {
        Ok(self.0.clone())
    }
}
