use crate::rag::chunker::TextChunker;
use crate::rag::embeddings::{Embedder, cosine_similarity};
use crate::types::{CompressedContext, RankedPassage, RawDocument, Result};
use crate::utils::toml_config::CompressionConfig;
use std::sync::Arc;
use tracing::debug;

/// Windows embedded per backend call.
const EMBED_BATCH: usize = 64;

/// Reduces raw documents to the passages relevant to a query.
///
/// The pipeline order is fixed: split into overlapping windows, score each
/// window against the query, keep windows at or above the threshold, then
/// keep the first `max_results` in document order. Scores never reorder.
pub struct ContextCompressor {
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    threshold: f32,
}

impl ContextCompressor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
        threshold: f32,
    ) -> Self {
        Self {
            embedder,
            chunker: TextChunker::new(chunk_size, chunk_overlap),
            threshold,
        }
    }

    pub fn from_config(embedder: Arc<dyn Embedder>, config: &CompressionConfig) -> Self {
        Self::new(
            embedder,
            config.chunk_size,
            config.chunk_overlap,
            config.similarity_threshold,
        )
    }

    pub async fn compress(
        &self,
        query: &str,
        documents: &[RawDocument],
        max_results: usize,
    ) -> Result<CompressedContext> {
        let windows: Vec<(&RawDocument, String)> = documents
            .iter()
            .flat_map(|doc| {
                self.chunker
                    .chunk(&doc.content)
                    .into_iter()
                    .map(move |window| (doc, window))
            })
            .collect();

        if windows.is_empty() || max_results == 0 {
            return Ok(CompressedContext::default());
        }

        let query_embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut passages = Vec::new();
        for batch in windows.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|(_, w)| w.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;

            for ((doc, window), embedding) in batch.iter().zip(embeddings) {
                let score = cosine_similarity(&query_embedding, &embedding);
                if score >= self.threshold {
                    passages.push(RankedPassage {
                        source: doc.source.clone(),
                        title: doc.title.clone(),
                        content: window.clone(),
                        score,
                    });
                }
            }

            if passages.len() >= max_results {
                break;
            }
        }

        passages.truncate(max_results);
        debug!(
            query,
            windows = windows.len(),
            kept = passages.len(),
            "Compressed documents"
        );

        Ok(CompressedContext::from_passages(passages))
    }
}
