//! Relevance-based context compression
//!
//! Gathered documents are far larger than what fits in a generation prompt.
//! This module reduces them to the passages that matter for one query.
//!
//! # Module Structure
//!
//! - [`rag::chunker`](crate::rag::chunker) - Overlapping character windows
//! - [`rag::embeddings`](crate::rag::embeddings) - Dense embeddings (Ollama, OpenAI, fastembed)
//! - [`rag::compression`](crate::rag::compression) - Split, score, threshold, truncate
//!
//! # Example
//!
//! ```ignore
//! use reach::rag::{compression::ContextCompressor, embeddings::embedder_from_config};
//!
//! let embedder = embedder_from_config(&config)?;
//! let compressor = ContextCompressor::from_config(embedder, &config.compression);
//!
//! let context = compressor.compress("mortgage rates 2024", &documents, 8).await?;
//! println!("{}", context.text);
//! ```

pub mod chunker;
pub mod compression;
pub mod embeddings;

pub use compression::ContextCompressor;
pub use embeddings::Embedder;
