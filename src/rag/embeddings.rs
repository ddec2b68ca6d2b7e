//! Dense embeddings used to score passage relevance.
//!
//! Three backends sit behind [`Embedder`]: an Ollama server (default), the
//! OpenAI embeddings endpoint (feature `openai`) and local ONNX models through
//! fastembed (feature `local-embeddings`).

use crate::types::{AppError, Result};
use crate::utils::toml_config::{EmbeddingProviderKind, ReachConfig};
use async_trait::async_trait;
use std::sync::Arc;

/// Batch text embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `texts`, returning one vector per input in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Build the embedder named by `[embeddings]`.
pub fn embedder_from_config(config: &ReachConfig) -> Result<Arc<dyn Embedder>> {
    let settings = &config.embeddings;
    match EmbeddingProviderKind::parse(&settings.provider)? {
        #[cfg(feature = "ollama")]
        EmbeddingProviderKind::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &settings.base_url,
            settings.model.clone(),
        ))),
        #[cfg(feature = "openai")]
        EmbeddingProviderKind::OpenAI => {
            let api_key = config
                .api_key(settings.api_key_env.as_deref())?
                .unwrap_or_default();
            Ok(Arc::new(OpenAIEmbedder::new(
                api_key,
                settings.base_url.clone(),
                settings.model.clone(),
            )))
        }
        #[cfg(feature = "local-embeddings")]
        EmbeddingProviderKind::Local => Ok(Arc::new(LocalEmbedder::new(&settings.model)?)),
        #[allow(unreachable_patterns)]
        other => Err(AppError::Configuration(format!(
            "Embedding provider {:?} is not compiled in",
            other
        ))),
    }
}

// ============= Ollama =============

#[cfg(feature = "ollama")]
pub struct OllamaEmbedder {
    client: ollama_rs::Ollama,
    model: String,
}

#[cfg(feature = "ollama")]
impl OllamaEmbedder {
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = crate::llm::ollama::split_base_url(base_url);
        Self {
            client: ollama_rs::Ollama::new(host, port),
            model,
        }
    }
}

#[cfg(feature = "ollama")]
#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use ollama_rs::generation::embeddings::request::{
            EmbeddingsInput, GenerateEmbeddingsRequest,
        };

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = GenerateEmbeddingsRequest::new(
            self.model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|e| AppError::Embedding(format!("Ollama embeddings error: {}", e)))?;

        if response.embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }
}

// ============= OpenAI =============

#[cfg(feature = "openai")]
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

#[cfg(feature = "openai")]
impl OpenAIEmbedder {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let config = async_openai::config::OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: async_openai::Client::with_config(config),
            model,
        }
    }
}

#[cfg(feature = "openai")]
#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        use async_openai::types::CreateEmbeddingRequestArgs;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| AppError::Embedding(format!("OpenAI embeddings error: {}", e)))?;

        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

// ============= Local (fastembed) =============

#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model: Arc<parking_lot::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(_model_name: &str) -> Result<Self> {
        use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(true),
        )
        .map_err(|e| AppError::Embedding(e.to_string()))?;

        Ok(Self {
            model: Arc::new(parking_lot::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            model
                .lock()
                .embed(texts, None)
                .map_err(|e| AppError::Embedding(e.to_string()))
        })
        .await
        .map_err(|e| AppError::Internal(format!("Embedding task failed: {}", e)))?
    }
}
