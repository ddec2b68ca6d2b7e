use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============= API Request/Response Types =============

/// Body of `POST /api/research`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub task: String,
    pub report_type: ReportKind,
    #[serde(default)]
    pub sources: Vec<SourceKind>,
    #[serde(default)]
    pub source_urls: Vec<String>,
    #[serde(default)]
    pub file_urls: Vec<String>,
    #[serde(default)]
    pub subtopics: Vec<String>,
    #[serde(default)]
    pub cadence: Cadence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edits: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResearchResponse {
    pub report: String,
    pub queries: Vec<String>,
    pub sources: Vec<String>,
    pub duration_ms: u64,
}

// ============= Report Kinds =============

/// Closed set of report kinds a session can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    ResearchReport,
    Paragraph,
    Json,
    DetailedJson,
    ResourceReport,
    OutlineReport,
    #[serde(rename = "table")]
    Table,
    CustomReport,
    NewsletterReport,
    LongNewsletterReport,
    NewsletterParagraph,
    DetailedReport,
    SubtopicReport,
}

impl ReportKind {
    pub const ALL: [ReportKind; 13] = [
        ReportKind::ResearchReport,
        ReportKind::Paragraph,
        ReportKind::Json,
        ReportKind::DetailedJson,
        ReportKind::ResourceReport,
        ReportKind::OutlineReport,
        ReportKind::Table,
        ReportKind::CustomReport,
        ReportKind::NewsletterReport,
        ReportKind::LongNewsletterReport,
        ReportKind::NewsletterParagraph,
        ReportKind::DetailedReport,
        ReportKind::SubtopicReport,
    ];

    /// Wire name used by the transport.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::ResearchReport => "research_report",
            ReportKind::Paragraph => "paragraph",
            ReportKind::Json => "json",
            ReportKind::DetailedJson => "detailed_json",
            ReportKind::ResourceReport => "resource_report",
            ReportKind::OutlineReport => "outline_report",
            ReportKind::Table => "table",
            ReportKind::CustomReport => "custom_report",
            ReportKind::NewsletterReport => "newsletter_report",
            ReportKind::LongNewsletterReport => "long_newsletter_report",
            ReportKind::NewsletterParagraph => "newsletter_paragraph",
            ReportKind::DetailedReport => "detailed_report",
            ReportKind::SubtopicReport => "subtopic_report",
        }
    }

    /// Composite reports are assembled from an introduction plus sub-reports.
    pub fn is_composite(&self) -> bool {
        matches!(self, ReportKind::DetailedReport)
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        ReportKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown report type: {}", s)))
    }
}

// ============= Source Kinds =============

/// Source kinds in declaration order; gathering runs in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(alias = "WEB")]
    Web,
    #[serde(alias = "FILES")]
    Files,
    #[serde(alias = "SYSTEMS")]
    Systems,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Web => "web",
            SourceKind::Files => "files",
            SourceKind::Systems => "systems",
        }
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "web" => Ok(SourceKind::Web),
            "files" => Ok(SourceKind::Files),
            "systems" => Ok(SourceKind::Systems),
            other => Err(AppError::InvalidInput(format!("Unknown source: {}", other))),
        }
    }
}

// ============= Cadence =============

/// Recency window restricting which information a report may draw on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    /// Lenient parse: anything unrecognised means no restriction.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Cadence::Daily,
            "weekly" => Cadence::Weekly,
            "monthly" => Cadence::Monthly,
            _ => Cadence::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::None => "none",
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    /// Phrase used in prompts to restrict recency.
    pub fn recency_window(&self) -> &'static str {
        match self {
            Cadence::Daily => "previous day",
            Cadence::Weekly => "previous week",
            Cadence::Monthly => "previous month",
            Cadence::None => "no restrictions",
        }
    }
}

impl<'de> Deserialize<'de> for Cadence {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Cadence::parse).unwrap_or_default())
    }
}

// ============= Research Data Model =============

/// How a document's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    PageTags,
    Readable,
    Pdf,
    Preprint,
    Transcript,
    PlainText,
    Document,
    Image,
    Corpus,
}

/// Text extracted from one URL or file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDocument {
    pub source: String,
    pub title: String,
    pub content: String,
    pub method: ExtractionMethod,
}

impl RawDocument {
    pub fn new(
        source: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        method: ExtractionMethod,
    ) -> Self {
        Self {
            source: source.into(),
            title: title.into(),
            content: content.into(),
            method,
        }
    }

    /// Length in characters, the unit of the minimum content gate.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// A relevant window of a document, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedPassage {
    pub source: String,
    pub title: String,
    pub content: String,
    pub score: f32,
}

/// Output of one compression call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompressedContext {
    /// Human-readable `Source/Title/Content` blocks.
    pub text: String,
    pub passages: Vec<RankedPassage>,
}

impl CompressedContext {
    pub fn from_passages(passages: Vec<RankedPassage>) -> Self {
        let text = passages
            .iter()
            .map(|p| {
                format!(
                    "Source: {}\nTitle: {}\nContent: {}\n",
                    p.source, p.title, p.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, passages }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

/// One accumulated-context entry: a sub-query and what it resolved to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub query: String,
    pub context: CompressedContext,
}

/// Role name plus the system prompt steering every generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(alias = "server")]
    pub name: String,
    #[serde(alias = "agent_role_prompt")]
    pub role_prompt: String,
}

impl Persona {
    pub fn fallback() -> Self {
        Self {
            name: "Default Agent".to_string(),
            role_prompt: "You are an AI critical thinker research assistant. Your sole purpose is \
                          to write well written, critically acclaimed, objective and structured \
                          reports on given text."
                .to_string(),
        }
    }
}

/// A single search-engine result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::utils::toml_config::ConfigError> for AppError {
    fn from(err: crate::utils::toml_config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match self {
            AppError::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Planning(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Generation(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Fetch(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Extraction(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Embedding(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Transport(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_kind_wire_names() {
        for kind in ReportKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
            assert_eq!(kind.as_str().parse::<ReportKind>().unwrap(), kind);
        }
        assert!("table_report".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_cadence_lenient() {
        assert_eq!(Cadence::parse("Weekly"), Cadence::Weekly);
        assert_eq!(Cadence::parse("hourly"), Cadence::None);
        let c: Cadence = serde_json::from_str("null").unwrap();
        assert_eq!(c, Cadence::None);
        assert_eq!(Cadence::Monthly.recency_window(), "previous month");
    }

    #[test]
    fn test_source_kind_aliases() {
        let kinds: Vec<SourceKind> = serde_json::from_str(r#"["WEB", "files"]"#).unwrap();
        assert_eq!(kinds, vec![SourceKind::Web, SourceKind::Files]);
    }

    #[test]
    fn test_compressed_context_text() {
        let ctx = CompressedContext::from_passages(vec![RankedPassage {
            source: "https://a.example".into(),
            title: "A".into(),
            content: "body".into(),
            score: 0.9,
        }]);
        assert_eq!(ctx.text, "Source: https://a.example\nTitle: A\nContent: body\n");
    }

    #[test]
    fn test_persona_aliases() {
        let p: Persona = serde_json::from_str(
            r#"{"server": "Finance Agent", "agent_role_prompt": "You are a finance analyst."}"#,
        )
        .unwrap();
        assert_eq!(p.name, "Finance Agent");
    }
}
