use crate::research::ledger::DedupLedger;
use crate::transport::{Edits, SessionStart};
use crate::types::{Cadence, ContextEntry, ReportKind, Result, SourceKind};
use crate::utils::toml_config::ReachConfig;
use std::sync::Arc;
use uuid::Uuid;

/// State of one research task, discarded once its report is delivered.
///
/// The configuration snapshot is taken at construction and never changes,
/// even if the configuration file is reloaded meanwhile.
pub struct ResearchSession {
    pub id: Uuid,
    pub task: String,
    pub report_kind: ReportKind,
    /// Enabled source kinds, sorted in declaration order.
    pub sources: Vec<SourceKind>,
    pub source_urls: Vec<String>,
    pub file_urls: Vec<String>,
    /// User-supplied subtopics for detailed reports.
    pub subtopics: Vec<String>,
    pub cadence: Cadence,
    pub edits: Edits,
    /// Main task, set on the child sessions of a detailed report.
    pub parent_topic: Option<String>,
    config: Arc<ReachConfig>,
    ledger: Arc<DedupLedger>,
    context: Vec<ContextEntry>,
}

impl ResearchSession {
    /// # Errors
    ///
    /// Returns a configuration error if the snapshot names an unknown
    /// provider, retriever or scraper strategy.
    pub fn new(start: SessionStart, config: Arc<ReachConfig>) -> Result<Self> {
        config.validate()?;

        let mut sources = start.sources;
        sources.sort();
        sources.dedup();
        if sources.is_empty() && start.source_urls.is_empty() {
            sources.push(SourceKind::Web);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            task: start.task,
            report_kind: start.report_kind,
            sources,
            source_urls: start.source_urls,
            file_urls: start.file_urls,
            subtopics: start.subtopics,
            cadence: start.cadence,
            edits: start.edits,
            parent_topic: None,
            config,
            ledger: Arc::new(DedupLedger::new()),
            context: Vec::new(),
        })
    }

    /// Child session researching one subtopic of a detailed report.
    ///
    /// The child shares this session's ledger, so nothing fetched for the
    /// parent or an earlier subtopic is fetched again. It inherits the
    /// enabled sources and uploaded files but not the explicit URLs, which
    /// the parent has already consumed.
    pub fn child(&self, subtopic: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            task: subtopic.to_string(),
            report_kind: ReportKind::SubtopicReport,
            sources: self.sources.clone(),
            source_urls: Vec::new(),
            file_urls: self.file_urls.clone(),
            subtopics: Vec::new(),
            cadence: self.cadence,
            edits: self.edits.clone(),
            parent_topic: Some(self.task.clone()),
            config: self.config.clone(),
            ledger: self.ledger.clone(),
            context: Vec::new(),
        }
    }

    pub fn config(&self) -> &ReachConfig {
        &self.config
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn context(&self) -> &[ContextEntry] {
        &self.context
    }

    pub fn extend_context(&mut self, entries: Vec<ContextEntry>) {
        self.context.extend(entries);
    }

    /// Accumulated context as one prompt-ready string, in gathering order.
    pub fn context_text(&self) -> String {
        self.context
            .iter()
            .map(|entry| entry.context.text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Sub-queries that contributed context, in order.
    pub fn queries(&self) -> Vec<String> {
        self.context.iter().map(|e| e.query.clone()).collect()
    }
}
