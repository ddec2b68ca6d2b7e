//! # Reach - research orchestration server
//!
//! Turns a natural-language research task into a structured report: plan
//! sub-queries, gather documents from the web, uploaded files, connected
//! systems and explicit URLs, compress them to relevant passages, then
//! generate a flat or composite report while streaming progress events.
//!
//! ## Overview
//!
//! Reach can be used in two ways:
//!
//! 1. **As a standalone server** - run the `reach-server` binary
//! 2. **As a library** - drive [`research::ResearchCoordinator`] directly
//!
//! ### Library Example
//!
//! ```rust,ignore
//! use reach::{ReachConfigManager, research::{ConfiguredDeps, launch}, transport::NullSink};
//!
//! let manager = ReachConfigManager::new("reach.toml")?;
//! let start = reach::transport::SessionStart::parse(
//!     r#"{"task": "EV battery supply chains", "report_type": "research_report", "sources": ["web"]}"#,
//! )?;
//! let outcome = launch(&ConfiguredDeps, manager.config(), start, &NullSink).await?;
//! println!("{}", outcome.report);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama generation and embeddings (default) |
//! | `openai` | OpenAI-compatible generation and embeddings |
//! | `local-embeddings` | In-process embeddings via fastembed |
//!
//! ## Modules
//!
//! - [`api`] - axum router, websocket and research handlers
//! - [`cli`] - command line parsing and colored output
//! - [`llm`] - generation clients and bounded retry
//! - [`rag`] - chunking, embeddings and context compression
//! - [`report`] - prompt registry and report assembly
//! - [`research`] - sessions, planning, gathering and coordination
//! - [`tools`] - search retrievers, scraper and file loading
//! - [`transport`] - session events and inbound message parsing
//! - [`types`] - shared data model and error handling
//! - [`utils`] - TOML configuration with hot reload

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command line interface.
pub mod cli;
/// LLM provider clients and abstractions.
pub mod llm;
/// Chunking, embeddings and compression.
pub mod rag;
/// Prompt strategies and report assembly.
pub mod report;
/// Research session orchestration.
pub mod research;
/// Search, scraping and document loading.
pub mod tools;
/// Session event contract.
pub mod transport;
/// Core types (requests, responses, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export commonly used types
pub use llm::{LLMClient, LLMClientFactory, Provider};
pub use research::{DepsProvider, ResearchCoordinator, ResearchSession};
pub use types::{AppError, Result};
pub use utils::toml_config::{ReachConfig, ReachConfigManager};

use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// TOML configuration with hot-reload support; each session snapshots it
    pub config_manager: Arc<ReachConfigManager>,
    /// Builds the collaborators of each session
    pub deps: Arc<dyn DepsProvider>,
}

impl AppState {
    pub fn new(config_manager: Arc<ReachConfigManager>) -> Self {
        Self {
            config_manager,
            deps: Arc::new(research::ConfiguredDeps),
        }
    }

    pub fn with_deps(mut self, deps: Arc<dyn DepsProvider>) -> Self {
        self.deps = deps;
        self
    }
}
