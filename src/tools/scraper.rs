//! Fetch & extract
//!
//! [`Scraper`] runs link extraction under a bounded worker pool. Each link is
//! isolated: network errors, parse errors and texts shorter than the minimum
//! content length all become a [`FetchFailure`] value that is logged and
//! dropped, never an error that aborts sibling fetches.
//!
//! [`WebExtractor`] picks a strategy per link:
//!
//! | Link | Strategy |
//! |------|----------|
//! | path ends in `.pdf` | download, convert through [`DocumentConverter`] |
//! | host contains `arxiv.org` | abstract page metadata, full text when convertible |
//! | `youtube.com` / `youtu.be` | [`TranscriptSource`] |
//! | anything else | page text by [`ScraperStrategy`] |

use crate::tools::documents::{DocumentConverter, FileKind, file_name};
use crate::types::{AppError, ExtractionMethod, RawDocument, Result};
use crate::utils::toml_config::{ReachConfig, ScraperStrategy};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Url;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// ============= Failures =============

#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    InvalidUrl,
    Network(String),
    Extraction(String),
    /// Extracted text had this many characters, below the threshold
    ShortContent(usize),
}

/// Per-link failure value. Aggregation filters these out.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub url: String,
    pub reason: FailureReason,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            url: url.into(),
            reason,
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::InvalidUrl => write!(f, "invalid URL: {}", self.url),
            FailureReason::Network(e) => write!(f, "network error for {}: {}", self.url, e),
            FailureReason::Extraction(e) => write!(f, "extraction failed for {}: {}", self.url, e),
            FailureReason::ShortContent(n) => {
                write!(f, "content too short for {} ({} chars)", self.url, n)
            }
        }
    }
}

impl From<(&str, AppError)> for FetchFailure {
    fn from((url, err): (&str, AppError)) -> Self {
        let reason = match err {
            AppError::Fetch(e) => FailureReason::Network(e),
            other => FailureReason::Extraction(other.to_string()),
        };
        FetchFailure::new(url, reason)
    }
}

/// Outcome of a single link extraction.
pub type FetchResult = std::result::Result<RawDocument, FetchFailure>;

// ============= Extraction Seams =============

/// Turns one valid URL into a document.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &Url) -> FetchResult;
}

/// Fetches a transcript for a video id.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn transcript(&self, video_id: &str) -> Result<String>;
}

/// A URL has a scheme and a host.
pub fn parse_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    url.host_str().filter(|h| !h.is_empty())?;
    Some(url)
}

// ============= Strategy Dispatch =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkKind {
    Pdf,
    Preprint { id: String },
    Video { id: Option<String> },
    Page,
}

impl LinkKind {
    pub fn classify(url: &Url) -> Self {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = url.path();

        if path.to_ascii_lowercase().ends_with(".pdf") && !host.contains("arxiv.org") {
            return LinkKind::Pdf;
        }
        if host.contains("arxiv.org") {
            let id = path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .trim_end_matches(".pdf")
                .to_string();
            return LinkKind::Preprint { id };
        }
        if host.ends_with("youtube.com") || host.ends_with("youtu.be") {
            return LinkKind::Video {
                id: video_id(url, &host),
            };
        }
        LinkKind::Page
    }
}

fn video_id(url: &Url, host: &str) -> Option<String> {
    let candidate = if host.ends_with("youtu.be") {
        url.path_segments()?.next().map(str::to_string)
    } else if let Some((_, v)) = url.query_pairs().find(|(k, _)| k == "v") {
        Some(v.into_owned())
    } else {
        let mut segments = url.path_segments()?;
        match segments.next() {
            Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    };

    candidate.filter(|id| {
        id.len() == 11
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Collapse runs of whitespace into single spaces.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title plus the text of content-bearing tags.
pub fn extract_tag_text(html: &str) -> (String, String) {
    let document = scraper::Html::parse_document(html);

    let title = scraper::Selector::parse("title")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .map(|el| normalize_whitespace(&el.text().collect::<String>()))
        .unwrap_or_default();

    let body = match scraper::Selector::parse("p, h1, h2, h3, h4, h5") {
        Ok(sel) => document
            .select(&sel)
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Err(_) => String::new(),
    };

    (title, body)
}

/// Metadata scraped from an arXiv abstract page.
fn extract_preprint_metadata(html: &str) -> (String, String) {
    let document = scraper::Html::parse_document(html);
    let pick = |selector: &str, prefix: &str| -> String {
        scraper::Selector::parse(selector)
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|el| {
                let text = normalize_whitespace(&el.text().collect::<String>());
                text.strip_prefix(prefix).unwrap_or(&text).trim().to_string()
            })
            .unwrap_or_default()
    };

    let title = pick("h1.title", "Title:");
    let authors = pick("div.authors", "Authors:");
    let summary = pick("blockquote.abstract", "Abstract:");

    let mut body = String::new();
    if !authors.is_empty() {
        body.push_str(&format!("Authors: {}\n\n", authors));
    }
    body.push_str(&summary);
    (title, body)
}

/// Production extractor for web links.
pub struct WebExtractor {
    client: reqwest::Client,
    strategy: ScraperStrategy,
    converter: Arc<dyn DocumentConverter>,
    transcripts: Option<Arc<dyn TranscriptSource>>,
    /// Budget for one link across every request it needs
    link_timeout: Duration,
}

impl WebExtractor {
    pub fn new(
        client: reqwest::Client,
        strategy: ScraperStrategy,
        converter: Arc<dyn DocumentConverter>,
        link_timeout: Duration,
    ) -> Self {
        Self {
            client,
            strategy,
            converter,
            transcripts: None,
            link_timeout,
        }
    }

    pub fn with_transcripts(mut self, source: Arc<dyn TranscriptSource>) -> Self {
        self.transcripts = Some(source);
        self
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AppError::Fetch(e.to_string()))
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| AppError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn pdf(&self, url: &Url) -> Result<RawDocument> {
        let bytes = self.get_bytes(url.as_str()).await?;
        let text = self.converter.convert(FileKind::Pdf, &bytes).await?;
        Ok(RawDocument::new(
            url.as_str(),
            file_name(url.path()),
            text,
            ExtractionMethod::Pdf,
        ))
    }

    async fn preprint(&self, url: &Url, id: &str) -> Result<RawDocument> {
        if id.is_empty() {
            return Err(AppError::Extraction("missing preprint identifier".into()));
        }
        let origin = url.origin().ascii_serialization();

        let html = self.get_text(&format!("{}/abs/{}", origin, id)).await?;
        let (title, mut content) = extract_preprint_metadata(&html);

        match self.get_bytes(&format!("{}/pdf/{}", origin, id)).await {
            Ok(bytes) => match self.converter.convert(FileKind::Pdf, &bytes).await {
                Ok(fulltext) => {
                    content.push_str("\n\n");
                    content.push_str(&fulltext);
                }
                Err(e) => debug!(id, "Preprint full text unavailable: {}", e),
            },
            Err(e) => debug!(id, "Preprint PDF download failed: {}", e),
        }

        Ok(RawDocument::new(
            url.as_str(),
            title,
            content,
            ExtractionMethod::Preprint,
        ))
    }

    async fn video(&self, url: &Url, id: Option<&str>) -> Result<RawDocument> {
        let id = id.ok_or_else(|| AppError::Extraction("no video id in link".into()))?;
        let source = self
            .transcripts
            .as_ref()
            .ok_or_else(|| AppError::Extraction("no transcript source configured".into()))?;
        let text = source.transcript(id).await?;
        Ok(RawDocument::new(
            url.as_str(),
            format!("Video {}", id),
            text,
            ExtractionMethod::Transcript,
        ))
    }

    async fn page(&self, url: &Url) -> Result<RawDocument> {
        match self.strategy {
            ScraperStrategy::Tags => {
                let html = self.get_text(url.as_str()).await?;
                let (title, body) = extract_tag_text(&html);
                Ok(RawDocument::new(
                    url.as_str(),
                    title,
                    body,
                    ExtractionMethod::PageTags,
                ))
            }
            ScraperStrategy::Readable => {
                let args = daedra::VisitPageArgs {
                    url: url.to_string(),
                    include_images: false,
                    selector: None,
                };
                let page = daedra::tools::fetch::fetch_page(&args)
                    .await
                    .map_err(|e| AppError::Fetch(e.to_string()))?;
                Ok(RawDocument::new(
                    url.as_str(),
                    page.title,
                    page.content,
                    ExtractionMethod::Readable,
                ))
            }
        }
    }
}

#[async_trait]
impl ContentExtractor for WebExtractor {
    async fn extract(&self, url: &Url) -> FetchResult {
        let kind = LinkKind::classify(url);
        let attempt = async {
            match &kind {
                LinkKind::Pdf => self.pdf(url).await,
                LinkKind::Preprint { id } => self.preprint(url, id).await,
                LinkKind::Video { id } => self.video(url, id.as_deref()).await,
                LinkKind::Page => self.page(url).await,
            }
        };

        match tokio::time::timeout(self.link_timeout, attempt).await {
            Ok(result) => result.map_err(|e| FetchFailure::from((url.as_str(), e))),
            Err(_) => Err(FetchFailure::new(
                url.as_str(),
                FailureReason::Network("timed out".to_string()),
            )),
        }
    }
}

// ============= Worker Pool =============

/// Bounded concurrent link extraction with the minimum-content gate.
pub struct Scraper {
    extractor: Arc<dyn ContentExtractor>,
    workers: usize,
    min_content_length: usize,
}

impl Scraper {
    pub fn new(
        extractor: Arc<dyn ContentExtractor>,
        workers: usize,
        min_content_length: usize,
    ) -> Self {
        Self {
            extractor,
            workers: workers.max(1),
            min_content_length,
        }
    }

    /// Build the production scraper from configuration.
    pub fn from_config(
        config: &ReachConfig,
        client: reqwest::Client,
        converter: Arc<dyn DocumentConverter>,
    ) -> Result<Self> {
        let extractor = WebExtractor::new(
            client,
            config.scraper_strategy()?,
            converter,
            Duration::from_secs(config.scraper.link_timeout_secs),
        );
        Ok(Self::new(
            Arc::new(extractor),
            config.scraper.workers,
            config.scraper.min_content_length,
        ))
    }

    pub fn min_content_length(&self) -> usize {
        self.min_content_length
    }

    /// Validate, extract and gate one link.
    pub async fn fetch(&self, raw_url: &str) -> FetchResult {
        let url = parse_url(raw_url)
            .ok_or_else(|| FetchFailure::new(raw_url, FailureReason::InvalidUrl))?;

        let mut document = self.extractor.extract(&url).await?;
        document.source = raw_url.to_string();

        let chars = document.len();
        if chars < self.min_content_length {
            return Err(FetchFailure::new(raw_url, FailureReason::ShortContent(chars)));
        }
        Ok(document)
    }

    /// Extract every link concurrently. Completion order is unspecified;
    /// failures are logged and dropped.
    pub async fn run(&self, urls: &[String]) -> Vec<RawDocument> {
        if urls.is_empty() {
            return Vec::new();
        }

        let results: Vec<FetchResult> = stream::iter(urls)
            .map(|url| self.fetch(url))
            .buffer_unordered(self.workers)
            .boxed()
            .collect()
            .await;

        let mut documents = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(doc) => {
                    debug!(url = %doc.source, chars = doc.len(), "Scraped");
                    documents.push(doc);
                }
                Err(failure) => warn!("{}", failure),
            }
        }

        info!(
            requested = urls.len(),
            extracted = documents.len(),
            "Scrape finished"
        );
        documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::documents::PlainTextConverter;
    use rstest::rstest;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[rstest]
    #[case("https://example.com/paper.pdf", LinkKind::Pdf)]
    #[case("https://arxiv.org/abs/2401.01234", LinkKind::Preprint { id: "2401.01234".into() })]
    #[case("https://arxiv.org/pdf/2401.01234.pdf", LinkKind::Preprint { id: "2401.01234".into() })]
    #[case("https://www.youtube.com/watch?v=dQw4w9WgXcQ", LinkKind::Video { id: Some("dQw4w9WgXcQ".into()) })]
    #[case("https://youtu.be/dQw4w9WgXcQ", LinkKind::Video { id: Some("dQw4w9WgXcQ".into()) })]
    #[case("https://www.youtube.com/channel/abc", LinkKind::Video { id: None })]
    #[case("https://news.example.com/story", LinkKind::Page)]
    fn test_classify(#[case] link: &str, #[case] expected: LinkKind) {
        assert_eq!(LinkKind::classify(&url(link)), expected);
    }

    #[rstest]
    #[case("notaurl")]
    #[case("mailto:someone@example.com")]
    #[case("/relative/path")]
    fn test_invalid_urls(#[case] link: &str) {
        assert!(parse_url(link).is_none());
    }

    #[test]
    fn test_extract_tag_text() {
        let html = r#"<html><head><title> Rates   Rise </title></head>
            <body><nav>menu</nav><h1>Housing</h1><p>Prices   fell
            sharply.</p><div>ignored</div><p></p></body></html>"#;
        let (title, body) = extract_tag_text(html);
        assert_eq!(title, "Rates Rise");
        assert_eq!(body, "Housing\nPrices fell sharply.");
    }

    #[test]
    fn test_extract_preprint_metadata() {
        let html = r#"<h1 class="title">Title: Deep Rates</h1>
            <div class="authors">Authors: A. Author, B. Author</div>
            <blockquote class="abstract">Abstract: We study rates.</blockquote>"#;
        let (title, body) = extract_preprint_metadata(html);
        assert_eq!(title, "Deep Rates");
        assert!(body.starts_with("Authors: A. Author, B. Author"));
        assert!(body.ends_with("We study rates."));
    }

    #[tokio::test]
    async fn test_video_without_transcript_source_fails() {
        let extractor = WebExtractor::new(
            reqwest::Client::new(),
            ScraperStrategy::Tags,
            Arc::new(PlainTextConverter),
            Duration::from_secs(1),
        );
        let failure = extractor
            .extract(&url("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap_err();
        assert!(matches!(failure.reason, FailureReason::Extraction(_)));
    }

    struct FixedTranscripts;

    #[async_trait]
    impl TranscriptSource for FixedTranscripts {
        async fn transcript(&self, video_id: &str) -> Result<String> {
            Ok(format!("Transcript of {video_id}: housing starts fell in March."))
        }
    }

    #[tokio::test]
    async fn test_video_uses_transcript_source() {
        let extractor = WebExtractor::new(
            reqwest::Client::new(),
            ScraperStrategy::Tags,
            Arc::new(PlainTextConverter),
            Duration::from_secs(1),
        )
        .with_transcripts(Arc::new(FixedTranscripts));
        let document = extractor
            .extract(&url("https://youtu.be/dQw4w9WgXcQ"))
            .await
            .unwrap();
        assert_eq!(document.title, "Video dQw4w9WgXcQ");
        assert_eq!(document.method, ExtractionMethod::Transcript);
        assert!(document.content.starts_with("Transcript of dQw4w9WgXcQ"));
    }

    mod http {
        use super::*;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        fn scraper() -> Scraper {
            let extractor = WebExtractor::new(
                reqwest::Client::new(),
                ScraperStrategy::Tags,
                Arc::new(PlainTextConverter),
                Duration::from_secs(2),
            );
            Scraper::new(Arc::new(extractor), 4, 100)
        }

        async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(response)
                .mount(server)
                .await;
        }

        fn page(title: &str, paragraph: &str) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_raw(
                format!("<html><head><title>{title}</title></head><body><p>{paragraph}</p></body></html>"),
                "text/html",
            )
        }

        #[tokio::test]
        async fn test_page_is_extracted() {
            let server = MockServer::start().await;
            serve(&server, "/long", page("Rates", &"Mortgage rates climbed. ".repeat(10))).await;

            let link = format!("{}/long", server.uri());
            let document = scraper().fetch(&link).await.unwrap();

            assert_eq!(document.source, link);
            assert_eq!(document.title, "Rates");
            assert_eq!(document.method, ExtractionMethod::PageTags);
            assert!(document.len() >= 100);
        }

        #[tokio::test]
        async fn test_short_page_is_a_failure() {
            let server = MockServer::start().await;
            serve(&server, "/short", page("Tiny", "Too little.")).await;

            let failure = scraper()
                .fetch(&format!("{}/short", server.uri()))
                .await
                .unwrap_err();
            assert!(matches!(failure.reason, FailureReason::ShortContent(n) if n < 100));
        }

        #[tokio::test]
        async fn test_slow_link_hits_link_timeout() {
            let server = MockServer::start().await;
            serve(
                &server,
                "/slow",
                page("Slow", &"Late reply. ".repeat(20)).set_delay(Duration::from_secs(5)),
            )
            .await;

            let extractor = WebExtractor::new(
                reqwest::Client::new(),
                ScraperStrategy::Tags,
                Arc::new(PlainTextConverter),
                Duration::from_millis(100),
            );
            let failure = extractor
                .extract(&url(&format!("{}/slow", server.uri())))
                .await
                .unwrap_err();
            assert_eq!(failure.reason, FailureReason::Network("timed out".to_string()));
        }

        #[tokio::test]
        async fn test_failures_do_not_abort_siblings() {
            let server = MockServer::start().await;
            serve(&server, "/a", page("A", &"Vacancy rates fell. ".repeat(10))).await;
            serve(&server, "/b", ResponseTemplate::new(404)).await;
            serve(&server, "/c", page("C", &"Rents kept rising. ".repeat(10))).await;

            let links: Vec<String> = ["/a", "/b", "/c"]
                .iter()
                .map(|p| format!("{}{}", server.uri(), p))
                .chain(std::iter::once("not a url".to_string()))
                .collect();
            let mut titles: Vec<String> = scraper()
                .run(&links)
                .await
                .into_iter()
                .map(|d| d.title)
                .collect();
            titles.sort();

            assert_eq!(titles, vec!["A", "C"]);
        }
    }
}
