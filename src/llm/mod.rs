//! LLM Provider Clients and Abstractions
//!
//! Provider-specific implementations sit behind the [`LLMClient`] trait so the
//! research pipeline works with any supported provider.
//!
//! # Architecture
//!
//! - [`LLMClient`] - The core trait that all providers implement
//! - [`Provider`] - Runtime provider selection built from `reach.toml`
//! - [`LLMClientFactory`] - Builds fast/smart clients for a session
//! - [`ResilientClient`] - Bounded retry, backoff and per-attempt timeouts
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `ollama` - Local Ollama server (default)
//! - `openai` - OpenAI API and compatible endpoints

/// Core LLM client trait and provider selection.
pub mod client;
/// Retry/backoff decorator for generation calls.
pub mod retry;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CallClass, GenerationParams, LLMClient, LLMClientFactory, Provider, TextStream};
pub use retry::{ResilientClient, RetryPolicy};
