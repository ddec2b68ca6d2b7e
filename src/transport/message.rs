use crate::types::{AppError, Cadence, ReportKind, ResearchRequest, Result, SourceKind};
use serde::Deserialize;

const RETAINED_MARKER: &str = "user-retained:";
const DELETED_MARKER: &str = "user-deleted:";

/// User curation deltas for incremental reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Edits {
    /// Content to preserve and expand
    pub retained: String,
    /// Content to exclude
    pub deleted: String,
}

/// Split an edits blob on its `user-retained:` / `user-deleted:` markers.
pub fn parse_edits(blob: &str) -> Edits {
    let retained = blob
        .find(RETAINED_MARKER)
        .map(|start| {
            let rest = &blob[start + RETAINED_MARKER.len()..];
            let end = rest.find(DELETED_MARKER).unwrap_or(rest.len());
            rest[..end].trim().to_string()
        })
        .unwrap_or_default();

    let deleted = blob
        .find(DELETED_MARKER)
        .map(|start| blob[start + DELETED_MARKER.len()..].trim().to_string())
        .unwrap_or_default();

    Edits { retained, deleted }
}

#[derive(Debug, Deserialize)]
struct RawStart {
    task: Option<String>,
    report_type: Option<String>,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    edits: Option<String>,
    #[serde(default)]
    cadence: Cadence,
    #[serde(default)]
    source_urls: Vec<String>,
    #[serde(default)]
    file_urls: Vec<String>,
    #[serde(default)]
    subtopics: Vec<String>,
}

/// A validated session-start message.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStart {
    pub task: String,
    pub report_kind: ReportKind,
    pub sources: Vec<SourceKind>,
    pub edits: Edits,
    pub cadence: Cadence,
    pub source_urls: Vec<String>,
    pub file_urls: Vec<String>,
    pub subtopics: Vec<String>,
}

impl SessionStart {
    /// Parse one inbound frame.
    ///
    /// # Errors
    ///
    /// `Invalid JSON format` for unparseable frames, `Missing required
    /// parameters` when `task` or `report_type` is absent, and an invalid
    /// input error for unknown report types or sources.
    pub fn parse(frame: &str) -> Result<Self> {
        let raw: RawStart = serde_json::from_str(frame)
            .map_err(|_| AppError::InvalidInput("Invalid JSON format".to_string()))?;

        let (Some(task), Some(report_type)) = (raw.task, raw.report_type) else {
            return Err(AppError::InvalidInput(
                "Missing required parameters".to_string(),
            ));
        };
        if task.trim().is_empty() || report_type.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Missing required parameters".to_string(),
            ));
        }

        let sources = raw
            .sources
            .iter()
            .map(|s| s.parse::<SourceKind>())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            task,
            report_kind: report_type.parse()?,
            sources,
            edits: raw.edits.as_deref().map(parse_edits).unwrap_or_default(),
            cadence: raw.cadence,
            source_urls: raw.source_urls,
            file_urls: raw.file_urls,
            subtopics: raw.subtopics,
        })
    }
}

impl From<ResearchRequest> for SessionStart {
    fn from(request: ResearchRequest) -> Self {
        Self {
            task: request.task,
            report_kind: request.report_type,
            sources: request.sources,
            edits: request.edits.as_deref().map(parse_edits).unwrap_or_default(),
            cadence: request.cadence,
            source_urls: request.source_urls,
            file_urls: request.file_urls,
            subtopics: request.subtopics,
        }
    }
}
