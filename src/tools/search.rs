//! Web search retrievers
//!
//! The web source resolves each sub-query into candidate URLs through a
//! [`SearchRetriever`]. Two retrievers are available: DuckDuckGo via the
//! daedra crate (default) and a self-hosted SearXNG instance over its JSON API.

use crate::types::{AppError, Result, SearchHit};
use crate::utils::toml_config::{ReachConfig, RetrieverKind};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Resolves a query into at most `max_results` search hits.
#[async_trait]
pub trait SearchRetriever: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Build the retriever named by `research.retriever`.
///
/// An unknown name is a configuration error.
pub fn retriever_from_config(config: &ReachConfig) -> Result<Arc<dyn SearchRetriever>> {
    match config.retriever_kind()? {
        RetrieverKind::DuckDuckGo => Ok(Arc::new(DuckDuckGoRetriever::new())),
        RetrieverKind::Searx => {
            let base_url = config.research.searx_url.clone().ok_or_else(|| {
                AppError::Configuration("research.searx_url is not set".to_string())
            })?;
            Ok(Arc::new(SearxRetriever::new(
                base_url,
                &config.scraper.user_agent,
                Duration::from_secs(config.scraper.timeout_secs),
            )?))
        }
    }
}

/// DuckDuckGo search powered by daedra
pub struct DuckDuckGoRetriever;

impl DuckDuckGoRetriever {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DuckDuckGoRetriever {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchRetriever for DuckDuckGoRetriever {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: max_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::Fetch(format!("Search failed: {}", e)))?;

        Ok(response
            .data
            .iter()
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title.to_string(),
                url: r.url.to_string(),
                snippet: r.description.to_string(),
            })
            .collect())
    }
}

/// SearXNG metasearch over its JSON API
pub struct SearxRetriever {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl SearxRetriever {
    pub fn new(base_url: String, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchRetriever for SearxRetriever {
    fn name(&self) -> &str {
        "searx"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Fetch(format!("Searx request failed: {}", e)))?;

        let body: SearxResponse = response
            .json()
            .await
            .map_err(|e| AppError::Fetch(format!("Invalid searx response: {}", e)))?;

        Ok(body
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                title: r.title,
                url: r.url,
                snippet: r.content,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_searx_parses_and_limits_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "housing market"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"url": "https://a.example", "title": "A", "content": "first"},
                    {"url": "https://b.example", "title": "B", "content": "second"},
                    {"url": "https://c.example", "title": "C"}
                ]
            })))
            .mount(&server)
            .await;

        let retriever =
            SearxRetriever::new(server.uri(), "reach-test", Duration::from_secs(5)).unwrap();
        let hits = retriever.search("housing market", 2).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://a.example");
        assert_eq!(hits[1].snippet, "second");
    }

    #[tokio::test]
    async fn test_searx_http_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let retriever =
            SearxRetriever::new(server.uri(), "reach-test", Duration::from_secs(5)).unwrap();
        let err = retriever.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, AppError::Fetch(_)));
    }

    #[test]
    fn test_retriever_from_config() {
        let config = ReachConfig::default();
        let retriever = retriever_from_config(&config).unwrap();
        assert_eq!(retriever.name(), "duckduckgo");

        let mut config = ReachConfig::default();
        config.research.retriever = "altavista".to_string();
        assert!(matches!(
            retriever_from_config(&config),
            Err(AppError::Configuration(_))
        ));
    }
}
