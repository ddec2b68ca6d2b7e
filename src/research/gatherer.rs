use crate::rag::ContextCompressor;
use crate::research::planner::{PlanRequest, QueryPlanner};
use crate::research::session::ResearchSession;
use crate::tools::documents::file_name;
use crate::tools::{FileLoader, Scraper, SearchRetriever};
use crate::transport::{EventSink, SessionEvent};
use crate::types::{
    AppError, ContextEntry, ExtractionMethod, Persona, RankedPassage, RawDocument, Result,
    SourceKind,
};
use crate::utils::toml_config::ReachConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-session limits for source gathering.
#[derive(Debug, Clone)]
pub struct GatherSettings {
    pub max_search_results: usize,
    pub max_passages: usize,
    pub file_preview_chars: usize,
    pub systems_corpus_path: PathBuf,
}

impl GatherSettings {
    pub fn from_config(config: &ReachConfig) -> Self {
        Self {
            max_search_results: config.research.max_search_results_per_query,
            max_passages: config.research.max_passages_per_query,
            file_preview_chars: config.research.file_preview_chars,
            systems_corpus_path: config.research.systems_corpus_path.clone(),
        }
    }
}

/// One record of the connected-systems snapshot.
#[derive(Debug, Deserialize)]
struct SystemRecord {
    url: String,
    raw_content: String,
}

/// Resolves a session's task into context, one strategy per source kind.
pub struct SourceGatherer {
    planner: Arc<QueryPlanner>,
    retriever: Arc<dyn SearchRetriever>,
    scraper: Arc<Scraper>,
    compressor: Arc<ContextCompressor>,
    files: Arc<FileLoader>,
    settings: GatherSettings,
}

impl SourceGatherer {
    pub fn new(
        planner: Arc<QueryPlanner>,
        retriever: Arc<dyn SearchRetriever>,
        scraper: Arc<Scraper>,
        compressor: Arc<ContextCompressor>,
        files: Arc<FileLoader>,
        settings: GatherSettings,
    ) -> Self {
        Self {
            planner,
            retriever,
            scraper,
            compressor,
            files,
            settings,
        }
    }

    /// Run every enabled strategy in source-kind order, then the explicit
    /// URL list. Entries come back in that order.
    ///
    /// # Errors
    ///
    /// Planning failures are fatal and stop gathering before any fetch of
    /// the failing strategy. Per-query search, fetch and compression
    /// failures are logged and skipped.
    pub async fn gather(
        &self,
        session: &ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        let mut entries = Vec::new();

        for kind in &session.sources {
            let gathered = match kind {
                SourceKind::Web => self.by_search(session, persona, sink).await?,
                SourceKind::Files => self.by_files(session, persona, sink).await?,
                SourceKind::Systems => self.by_systems(session, persona, sink).await?,
            };
            info!(session = %session.id, source = kind.as_str(), entries = gathered.len(), "Gathered");
            entries.extend(gathered);
        }

        if !session.source_urls.is_empty() {
            entries.extend(self.by_urls(session, sink).await?);
        }

        Ok(entries)
    }

    fn plan_request<'a>(
        session: &'a ResearchSession,
        uploaded_files: &'a [String],
        file_preview: Option<&'a str>,
    ) -> PlanRequest<'a> {
        PlanRequest {
            task: &session.task,
            parent_topic: session.parent_topic.as_deref(),
            report_kind: Some(session.report_kind),
            uploaded_files,
            file_preview,
            cadence: session.cadence,
            retained: &session.edits.retained,
            deleted: &session.edits.deleted,
        }
    }

    async fn plan(
        &self,
        request: &PlanRequest<'_>,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<Vec<String>> {
        let queries = self.planner.plan(request, persona).await?;
        sink.emit(SessionEvent::Queries {
            output: queries.clone(),
        });
        Ok(queries)
    }

    fn ensure_listening(sink: &dyn EventSink) -> Result<()> {
        if sink.is_closed() {
            return Err(AppError::Transport("Client disconnected".to_string()));
        }
        Ok(())
    }

    /// Compress `documents` against `query`; failures and empty results
    /// yield `None`.
    async fn compress(&self, query: &str, documents: &[RawDocument]) -> Option<ContextEntry> {
        if documents.is_empty() {
            return None;
        }
        match self
            .compressor
            .compress(query, documents, self.settings.max_passages)
            .await
        {
            Ok(context) if !context.is_empty() => Some(ContextEntry {
                query: query.to_string(),
                context,
            }),
            Ok(_) => None,
            Err(e) => {
                warn!(query, "Compression failed: {}", e);
                None
            }
        }
    }

    /// Documents under the content threshold never reach compression.
    fn gate(&self, documents: Vec<RawDocument>) -> Vec<RawDocument> {
        let min = self.scraper.min_content_length();
        documents
            .into_iter()
            .filter(|doc| {
                let keep = doc.len() >= min;
                if !keep {
                    warn!(source = %doc.source, chars = doc.len(), "Content too short, dropped");
                }
                keep
            })
            .collect()
    }

    /// Web search: plan, then search, admit, fetch and compress per query.
    pub async fn by_search(
        &self,
        session: &ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        let queries = self
            .plan(&Self::plan_request(session, &[], None), persona, sink)
            .await?;

        let mut entries = Vec::new();
        let mut passages: Vec<RankedPassage> = Vec::new();

        for query in &queries {
            Self::ensure_listening(sink)?;

            let hits = match self
                .retriever
                .search(query, self.settings.max_search_results)
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, retriever = self.retriever.name(), "Search failed: {}", e);
                    continue;
                }
            };

            let candidates: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
            let admitted = session.ledger().admit(&candidates);
            let documents = self.scraper.run(&admitted).await;

            match self.compress(query, &documents).await {
                Some(entry) => {
                    passages.extend(entry.context.passages.iter().cloned());
                    entries.push(entry);
                }
                None => sink.emit(SessionEvent::log(format!("No content found for '{}'", query))),
            }
        }

        if !passages.is_empty() {
            sink.emit(SessionEvent::Sources { output: passages });
        }
        Ok(entries)
    }

    /// Uploaded files: build a corpus, plan with a content preview, compress
    /// every query against the corpus.
    pub async fn by_files(
        &self,
        session: &ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        if session.file_urls.is_empty() {
            sink.emit(SessionEvent::log("No uploaded files to research"));
            return Ok(Vec::new());
        }

        for reference in &session.file_urls {
            sink.emit(SessionEvent::log(format!("Processing file: {}", file_name(reference))));
        }
        let corpus = self.gate(self.files.load_all(&session.file_urls).await);
        if corpus.is_empty() {
            warn!(session = %session.id, "No content could be extracted from any file");
            sink.emit(SessionEvent::log(
                "Warning: no content could be extracted from any file",
            ));
            return Ok(Vec::new());
        }

        let names: Vec<String> = corpus.iter().map(|d| d.title.clone()).collect();
        let preview = corpus
            .iter()
            .map(|d| {
                let head: String = d.content.chars().take(self.settings.file_preview_chars).collect();
                format!("{}:\n{}", d.title, head)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let queries = self
            .plan(&Self::plan_request(session, &names, Some(&preview)), persona, sink)
            .await?;
        self.compress_each(&queries, &corpus, sink).await
    }

    /// Connected systems: compress every planned query against the static
    /// corpus snapshot.
    pub async fn by_systems(
        &self,
        session: &ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        let queries = self
            .plan(&Self::plan_request(session, &[], None), persona, sink)
            .await?;

        let corpus = match self.load_systems_corpus().await {
            Ok(corpus) => self.gate(corpus),
            Err(e) => {
                warn!(path = %self.settings.systems_corpus_path.display(), "Systems corpus unavailable: {}", e);
                sink.emit(SessionEvent::log("Connected systems data is unavailable"));
                return Ok(Vec::new());
            }
        };

        self.compress_each(&queries, &corpus, sink).await
    }

    async fn load_systems_corpus(&self) -> Result<Vec<RawDocument>> {
        let path = &self.settings.systems_corpus_path;
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Fetch(format!("{}: {}", path.display(), e)))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<SystemRecord> = serde_json::from_str(&raw)
            .map_err(|e| AppError::Extraction(format!("{}: {}", path.display(), e)))?;

        Ok(records
            .into_iter()
            .map(|r| RawDocument::new(r.url.clone(), r.url, r.raw_content, ExtractionMethod::Corpus))
            .collect())
    }

    async fn compress_each(
        &self,
        queries: &[String],
        corpus: &[RawDocument],
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        let mut entries = Vec::new();
        for query in queries {
            Self::ensure_listening(sink)?;
            match self.compress(query, corpus).await {
                Some(entry) => entries.push(entry),
                None => sink.emit(SessionEvent::log(format!("No content found for '{}'", query))),
            }
        }
        Ok(entries)
    }

    /// Explicit URLs: admit, fetch and compress against the task itself.
    pub async fn by_urls(
        &self,
        session: &ResearchSession,
        sink: &dyn EventSink,
    ) -> Result<Vec<ContextEntry>> {
        Self::ensure_listening(sink)?;

        let admitted = session.ledger().admit(&session.source_urls[..]);
        let documents = self.scraper.run(&admitted).await;

        Ok(match self.compress(&session.task, &documents).await {
            Some(entry) => {
                sink.emit(SessionEvent::Sources {
                    output: entry.context.passages.clone(),
                });
                vec![entry]
            }
            None => {
                sink.emit(SessionEvent::log("No content found in the provided URLs"));
                Vec::new()
            }
        })
    }
}
