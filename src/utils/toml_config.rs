//! TOML-based configuration for REACH
//!
//! This module provides declarative configuration for the generation provider,
//! embeddings, research limits, scraper and compression tunables via a TOML
//! file (`reach.toml`).
//!
//! # Hot Reloading
//!
//! Configuration changes are detected and applied at runtime through
//! `ReachConfigManager`. A research session takes one snapshot with
//! [`ReachConfigManager::config`] and keeps it for its whole lifetime, so a
//! reload only affects sessions started afterwards.

use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Hard ceiling for per-call token limits.
pub const MAX_TOKEN_LIMIT: u32 = 8001;

/// Root configuration structure loaded from reach.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReachConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub compression: CompressionConfig,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= LLM Configuration =============

/// Closed set of generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Ollama,
    OpenAI,
}

impl LlmProviderKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(ConfigError::UnknownOption("llm.provider", other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Environment variable containing the API key (OpenAI only)
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model used for cheap classification calls (persona selection)
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model used for planning and report writing
    #[serde(default = "default_smart_model")]
    pub smart_model: String,

    #[serde(default = "default_fast_token_limit")]
    pub fast_token_limit: u32,

    #[serde(default = "default_smart_token_limit")]
    pub smart_token_limit: u32,

    #[serde(default)]
    pub temperature: f32,

    /// Retries after the first attempt of a generation call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Per-attempt timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_provider() -> String {
    "ollama".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_fast_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_smart_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_fast_token_limit() -> u32 {
    2000
}

fn default_smart_token_limit() -> u32 {
    4000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_llm_timeout() -> u64 {
    180
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_ollama_url(),
            api_key_env: None,
            fast_model: default_fast_model(),
            smart_model: default_smart_model(),
            fast_token_limit: default_fast_token_limit(),
            smart_token_limit: default_smart_token_limit(),
            temperature: 0.0,
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

// ============= Embeddings Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProviderKind {
    Ollama,
    OpenAI,
    Local,
}

impl EmbeddingProviderKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "local" | "fastembed" => Ok(Self::Local),
            other => Err(ConfigError::UnknownOption(
                "embeddings.provider",
                other.to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default)]
    pub api_key_env: Option<String>,
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_embedding_model(),
            base_url: default_ollama_url(),
            api_key_env: None,
        }
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverKind {
    DuckDuckGo,
    Searx,
}

impl RetrieverKind {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "searx" | "searxng" => Ok(Self::Searx),
            other => Err(ConfigError::UnknownOption(
                "research.retriever",
                other.to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_retriever")]
    pub retriever: String,

    #[serde(default)]
    pub searx_url: Option<String>,

    /// Maximum number of planned sub-queries
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_max_subtopics")]
    pub max_subtopics: usize,

    #[serde(default = "default_max_search_results")]
    pub max_search_results_per_query: usize,

    #[serde(default = "default_max_passages")]
    pub max_passages_per_query: usize,

    /// Citation/style format requested from the writer
    #[serde(default = "default_report_format")]
    pub report_format: String,

    /// Minimum target length of a report in words
    #[serde(default = "default_total_words")]
    pub total_words: usize,

    /// Replaces the selected persona's prompt for custom reports
    #[serde(default)]
    pub agent_role: Option<String>,

    /// Static connected-systems corpus (JSON list of `{url, raw_content}`)
    #[serde(default = "default_systems_corpus_path")]
    pub systems_corpus_path: PathBuf,

    /// Characters of each uploaded file shown to the planner
    #[serde(default = "default_file_preview_chars")]
    pub file_preview_chars: usize,
}

fn default_retriever() -> String {
    "duckduckgo".to_string()
}

fn default_max_iterations() -> usize {
    3
}

fn default_max_subtopics() -> usize {
    3
}

fn default_max_search_results() -> usize {
    5
}

fn default_max_passages() -> usize {
    8
}

fn default_report_format() -> String {
    "APA".to_string()
}

fn default_total_words() -> usize {
    1000
}

fn default_systems_corpus_path() -> PathBuf {
    PathBuf::from("data/systems/parsed_app.json")
}

fn default_file_preview_chars() -> usize {
    1000
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            retriever: default_retriever(),
            searx_url: None,
            max_iterations: default_max_iterations(),
            max_subtopics: default_max_subtopics(),
            max_search_results_per_query: default_max_search_results(),
            max_passages_per_query: default_max_passages(),
            report_format: default_report_format(),
            total_words: default_total_words(),
            agent_role: None,
            systems_corpus_path: default_systems_corpus_path(),
            file_preview_chars: default_file_preview_chars(),
        }
    }
}

// ============= Scraper Configuration =============

/// Page extraction strategy for generic web pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperStrategy {
    /// Title plus text of content-bearing tags
    Tags,
    /// Boilerplate-stripping main-content extraction
    Readable,
}

impl ScraperStrategy {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "tags" | "bs" => Ok(Self::Tags),
            "readable" | "newspaper" => Ok(Self::Readable),
            other => Err(ConfigError::UnknownOption(
                "scraper.strategy",
                other.to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scraper_strategy")]
    pub strategy: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Width of the fetch worker pool
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Extracted text shorter than this (in characters) is rejected
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,

    /// Per-request timeout
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on extracting one link, across all of its requests
    #[serde(default = "default_link_timeout")]
    pub link_timeout_secs: u64,
}

fn default_scraper_strategy() -> String {
    "tags".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/119.0.0.0 Safari/537.36"
        .to_string()
}

fn default_workers() -> usize {
    20
}

fn default_min_content_length() -> usize {
    100
}

fn default_scraper_timeout() -> u64 {
    10
}

fn default_link_timeout() -> u64 {
    30
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            strategy: default_scraper_strategy(),
            user_agent: default_user_agent(),
            workers: default_workers(),
            min_content_length: default_min_content_length(),
            timeout_secs: default_scraper_timeout(),
            link_timeout_secs: default_link_timeout(),
        }
    }
}

// ============= Compression Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Window size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    100
}

fn default_similarity_threshold() -> f32 {
    0.30
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown value '{1}' for {0}")]
    UnknownOption(&'static str, String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl ReachConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ReachConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate closed option sets and numeric ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        LlmProviderKind::parse(&self.llm.provider)?;
        EmbeddingProviderKind::parse(&self.embeddings.provider)?;
        let retriever = RetrieverKind::parse(&self.research.retriever)?;
        ScraperStrategy::parse(&self.scraper.strategy)?;

        if retriever == RetrieverKind::Searx && self.research.searx_url.is_none() {
            return Err(ConfigError::ValidationError(
                "research.searx_url is required when retriever is searx".to_string(),
            ));
        }

        for (name, limit) in [
            ("llm.fast_token_limit", self.llm.fast_token_limit),
            ("llm.smart_token_limit", self.llm.smart_token_limit),
        ] {
            if limit == 0 || limit > MAX_TOKEN_LIMIT {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be between 1 and {}, got {}",
                    name, MAX_TOKEN_LIMIT, limit
                )));
            }
        }

        let compression = &self.compression;
        if compression.chunk_size == 0 || compression.chunk_overlap >= compression.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "compression.chunk_overlap ({}) must be smaller than a non-zero chunk_size ({})",
                compression.chunk_overlap, compression.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&compression.similarity_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "compression.similarity_threshold must be within [0, 1], got {}",
                compression.similarity_threshold
            )));
        }

        if self.scraper.workers == 0 {
            return Err(ConfigError::ValidationError(
                "scraper.workers must be at least 1".to_string(),
            ));
        }
        if self.research.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_iterations must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok()
    }

    /// Resolve an optional `*_env` reference, failing if it is set but missing
    pub fn api_key(&self, env_ref: Option<&str>) -> Result<Option<String>, ConfigError> {
        match env_ref {
            Some(name) => self
                .resolve_env(name)
                .map(Some)
                .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string())),
            None => Ok(None),
        }
    }

    pub fn scraper_strategy(&self) -> Result<ScraperStrategy, ConfigError> {
        ScraperStrategy::parse(&self.scraper.strategy)
    }

    pub fn retriever_kind(&self) -> Result<RetrieverKind, ConfigError> {
        RetrieverKind::parse(&self.research.retriever)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ReachConfigManager {
    config: Arc<ArcSwap<ReachConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ReachConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let config = ReachConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (no file watching)
    pub fn from_config(config: ReachConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("reach.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Snapshot of the current configuration (lockless read)
    pub fn config(&self) -> Arc<ReachConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = ReachConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let watched_name = config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == watched_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let debounce = Duration::from_millis(500);
            let mut last_reload: Option<std::time::Instant> = None;

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|at| at.elapsed() < debounce) {
                    continue;
                }

                // Let the writer finish
                tokio::time::sleep(Duration::from_millis(100)).await;

                match ReachConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ReachConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}
