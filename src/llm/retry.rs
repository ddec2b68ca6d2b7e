//! Bounded retry with exponential backoff for generation calls.
//!
//! [`ResilientClient`] wraps any [`LLMClient`]. Each attempt runs under a
//! timeout; a failed or timed-out attempt is retried up to
//! `max_retries` more times, sleeping `base_backoff * 2^attempt` in between.
//! For streams only establishing the stream is retried, since chunks already
//! forwarded to a listener cannot be taken back.

use crate::llm::client::{LLMClient, TextStream};
use crate::types::{AppError, Result};
use crate::utils::toml_config::ReachConfig;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ReachConfig) -> Self {
        Self {
            max_retries: config.llm.max_retries,
            base_backoff: Duration::from_millis(config.llm.retry_backoff_ms),
            attempt_timeout: Duration::from_secs(config.llm.timeout_secs),
        }
    }

    /// No retries, effectively unbounded attempt time.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_backoff: Duration::ZERO,
            attempt_timeout: Duration::from_secs(24 * 60 * 60),
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(1u32 << attempt.min(16))
    }

    /// Run `op` until it succeeds or the retry budget is exhausted.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            let outcome = match tokio::time::timeout(self.attempt_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Generation(format!(
                    "{} timed out after {:?}",
                    what, self.attempt_timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "{} failed: {}; retrying in {:?}",
                        what,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// LLM client decorator applying a [`RetryPolicy`] to every call.
pub struct ResilientClient {
    inner: Box<dyn LLMClient>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(inner: Box<dyn LLMClient>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl LLMClient for ResilientClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.policy
            .run("generation", || self.inner.generate(prompt))
            .await
    }

    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String> {
        self.policy
            .run("generation", || self.inner.generate_with_system(system, prompt))
            .await
    }

    async fn stream_with_system(&self, system: &str, prompt: &str) -> Result<TextStream> {
        self.policy
            .run("stream", || self.inner.stream_with_system(system, prompt))
            .await
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
