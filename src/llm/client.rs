//! LLM Client abstractions and provider management
//!
//! This module provides a unified interface for the generation providers used
//! by the research pipeline:
//! - **Ollama**: local inference with streaming (default feature)
//! - **OpenAI**: OpenAI API and compatible endpoints (feature `openai`)
//!
//! Every pipeline stage talks to a [`LLMClient`] trait object, so stages can
//! be exercised with scripted clients in tests.

use crate::types::{AppError, Result};
use crate::utils::toml_config::{LlmProviderKind, ReachConfig};
use async_trait::async_trait;
use futures::Stream;

/// Boxed stream of generated text chunks.
pub type TextStream = Box<dyn Stream<Item = Result<String>> + Send + Unpin>;

/// Generic LLM client trait for provider abstraction
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Generate a completion from a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with system prompt
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Stream a completion steered by a system prompt
    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// The two classes of generation calls the pipeline makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallClass {
    /// Cheap classification (persona selection)
    Fast,
    /// Planning, subtopic construction and report writing
    Smart,
}

/// Sampling parameters applied to every request of a client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4000,
        }
    }
}

/// Provider enum for runtime selection
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including Azure OpenAI and compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    ///     params: GenerationParams::default(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
        params: GenerationParams,
    },

    /// Ollama local LLM provider
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Ollama {
    ///     base_url: "http://localhost:11434".to_string(),
    ///     model: "llama3.1:8b".to_string(),
    ///     params: GenerationParams::default(),
    /// };
    /// ```
    Ollama {
        base_url: String,
        model: String,
        params: GenerationParams,
    },
}

impl Provider {
    /// Build the provider for one call class from configuration
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] for an unknown provider name or a
    /// missing API key environment variable.
    pub fn from_config(config: &ReachConfig, class: CallClass) -> Result<Self> {
        let llm = &config.llm;
        let (model, max_tokens) = match class {
            CallClass::Fast => (llm.fast_model.clone(), llm.fast_token_limit),
            CallClass::Smart => (llm.smart_model.clone(), llm.smart_token_limit),
        };
        let params = GenerationParams {
            temperature: llm.temperature,
            max_tokens,
        };

        match LlmProviderKind::parse(&llm.provider)? {
            LlmProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: llm.base_url.clone(),
                model,
                params,
            }),
            LlmProviderKind::OpenAI => {
                let api_key = config
                    .api_key(llm.api_key_env.as_deref())?
                    .unwrap_or_default();
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: llm.base_url.clone(),
                    model,
                    params,
                })
            }
        }
    }

    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider's feature is not compiled in or the
    /// client cannot be constructed.
    pub async fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
                params,
            } => Ok(Box::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *params,
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama {
                base_url,
                model,
                params,
            } => Ok(Box::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone(), *params).await?,
            )),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Configuration(format!(
                "{} support is not compiled in; enable the '{}' feature",
                other.name(),
                other.name().to_ascii_lowercase()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Provider::OpenAI { model, .. } | Provider::Ollama { model, .. } => model,
        }
    }
}

/// Configuration-based client factory
///
/// Builds the fast and smart clients a session needs, each wrapped in the
/// retrying [`ResilientClient`](super::retry::ResilientClient).
pub struct LLMClientFactory {
    config: std::sync::Arc<ReachConfig>,
}

impl LLMClientFactory {
    pub fn new(config: std::sync::Arc<ReachConfig>) -> Self {
        Self { config }
    }

    /// Create a retrying client for a call class
    pub async fn create(&self, class: CallClass) -> Result<std::sync::Arc<dyn LLMClient>> {
        let provider = Provider::from_config(&self.config, class)?;
        let inner = provider.create_client().await?;
        Ok(std::sync::Arc::new(super::retry::ResilientClient::new(
            inner,
            super::retry::RetryPolicy::from_config(&self.config),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_config_uses_call_class() {
        let config = ReachConfig::default();

        let fast = Provider::from_config(&config, CallClass::Fast).unwrap();
        let smart = Provider::from_config(&config, CallClass::Smart).unwrap();

        assert_eq!(fast.name(), "Ollama");
        assert_eq!(fast.model(), config.llm.fast_model);
        assert_eq!(smart.model(), config.llm.smart_model);
        match smart {
            Provider::Ollama { params, .. } => {
                assert_eq!(params.max_tokens, config.llm.smart_token_limit)
            }
            _ => panic!("expected ollama provider"),
        }
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let mut config = ReachConfig::default();
        config.llm.provider = "llamacpp".to_string();

        let err = Provider::from_config(&config, CallClass::Smart).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_openai_missing_key_env() {
        let mut config = ReachConfig::default();
        config.llm.provider = "openai".to_string();
        config.llm.api_key_env = Some("REACH_TEST_SURELY_UNSET_KEY".to_string());

        let err = Provider::from_config(&config, CallClass::Smart).unwrap_err();
        assert!(err.to_string().contains("REACH_TEST_SURELY_UNSET_KEY"));
    }
}
