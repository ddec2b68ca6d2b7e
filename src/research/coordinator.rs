use crate::llm::{CallClass, LLMClient, LLMClientFactory};
use crate::rag::ContextCompressor;
use crate::rag::embeddings::embedder_from_config;
use crate::report::{CompositeReport, PromptRegistry, ReportAssembler, ReportRequest};
use crate::research::gatherer::{GatherSettings, SourceGatherer};
use crate::research::persona::PersonaSelector;
use crate::research::planner::QueryPlanner;
use crate::research::session::ResearchSession;
use crate::tools::{FileLoader, PlainTextConverter, Scraper, SearchRetriever, retriever_from_config};
use crate::transport::{EventSink, SessionEvent, SessionStart};
use crate::types::{AppError, Persona, ReportKind, Result};
use crate::utils::toml_config::ReachConfig;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Collaborators a coordinator drives. Tests substitute scripted ones.
#[derive(Clone)]
pub struct ResearchDeps {
    pub fast_llm: Arc<dyn LLMClient>,
    pub smart_llm: Arc<dyn LLMClient>,
    pub retriever: Arc<dyn SearchRetriever>,
    pub scraper: Arc<Scraper>,
    pub compressor: Arc<ContextCompressor>,
    pub files: Arc<FileLoader>,
    pub prompts: PromptRegistry,
}

impl ResearchDeps {
    /// Build the production collaborators from a configuration snapshot.
    pub async fn from_config(config: Arc<ReachConfig>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .user_agent(config.scraper.user_agent.clone())
            .timeout(Duration::from_secs(config.scraper.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {}", e)))?;
        let converter = Arc::new(PlainTextConverter);

        let factory = LLMClientFactory::new(config.clone());
        let embedder = embedder_from_config(&config)?;

        Ok(Self {
            fast_llm: factory.create(CallClass::Fast).await?,
            smart_llm: factory.create(CallClass::Smart).await?,
            retriever: retriever_from_config(&config)?,
            scraper: Arc::new(Scraper::from_config(&config, client.clone(), converter.clone())?),
            compressor: Arc::new(ContextCompressor::from_config(embedder, &config.compression)),
            files: Arc::new(FileLoader::new(client, converter)),
            prompts: PromptRegistry::with_default_builders(),
        })
    }
}

/// Supplies the collaborators of each new session.
#[async_trait]
pub trait DepsProvider: Send + Sync {
    async fn deps(&self, config: Arc<ReachConfig>) -> Result<ResearchDeps>;
}

/// Builds the production collaborators from the session's snapshot.
pub struct ConfiguredDeps;

#[async_trait]
impl DepsProvider for ConfiguredDeps {
    async fn deps(&self, config: Arc<ReachConfig>) -> Result<ResearchDeps> {
        ResearchDeps::from_config(config).await
    }
}

/// Construct and run one session, reporting construction failures on the
/// sink like any other fatal error.
pub async fn launch(
    provider: &dyn DepsProvider,
    config: Arc<ReachConfig>,
    start: SessionStart,
    sink: &dyn EventSink,
) -> Result<ResearchOutcome> {
    let prepared = async {
        let session = ResearchSession::new(start, config.clone())?;
        let deps = provider.deps(config.clone()).await?;
        Ok::<_, AppError>((session, ResearchCoordinator::new(deps, &config)))
    }
    .await;

    match prepared {
        Ok((mut session, coordinator)) => coordinator.execute(&mut session, sink).await,
        Err(e) => {
            error!("Session construction failed: {}", e);
            sink.emit(SessionEvent::Error {
                message: e.to_string(),
            });
            Err(e)
        }
    }
}

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub report: String,
    /// Sub-queries that contributed context.
    pub queries: Vec<String>,
    /// Every admitted URL, in admission order.
    pub sources: Vec<String>,
}

/// Drives one session from persona selection to the finished report.
pub struct ResearchCoordinator {
    personas: PersonaSelector,
    planner: Arc<QueryPlanner>,
    gatherer: SourceGatherer,
    assembler: ReportAssembler,
    agent_role: Option<String>,
    max_subtopics: usize,
}

impl ResearchCoordinator {
    pub fn new(deps: ResearchDeps, config: &ReachConfig) -> Self {
        let planner = Arc::new(QueryPlanner::new(
            deps.smart_llm.clone(),
            config.research.max_iterations,
        ));
        let gatherer = SourceGatherer::new(
            planner.clone(),
            deps.retriever,
            deps.scraper,
            deps.compressor,
            deps.files,
            GatherSettings::from_config(config),
        );
        let assembler = ReportAssembler::new(
            deps.smart_llm,
            deps.prompts,
            config.research.report_format.clone(),
            config.research.total_words,
        );

        Self {
            personas: PersonaSelector::new(deps.fast_llm),
            planner,
            gatherer,
            assembler,
            agent_role: config.research.agent_role.clone(),
            max_subtopics: config.research.max_subtopics,
        }
    }

    pub async fn from_config(config: Arc<ReachConfig>) -> Result<Self> {
        let deps = ResearchDeps::from_config(config.clone()).await?;
        Ok(Self::new(deps, &config))
    }

    /// Run the session and finish its event stream with `complete` or
    /// `error`. Nothing but the `error` event follows a fatal failure.
    pub async fn execute(
        &self,
        session: &mut ResearchSession,
        sink: &dyn EventSink,
    ) -> Result<ResearchOutcome> {
        match self.run(session, sink).await {
            Ok(outcome) => {
                info!(
                    session = %session.id,
                    queries = outcome.queries.len(),
                    sources = outcome.sources.len(),
                    "Research complete"
                );
                sink.emit(SessionEvent::Complete);
                Ok(outcome)
            }
            Err(e) => {
                error!(session = %session.id, "Research failed: {}", e);
                sink.emit(SessionEvent::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub async fn run(
        &self,
        session: &mut ResearchSession,
        sink: &dyn EventSink,
    ) -> Result<ResearchOutcome> {
        info!(session = %session.id, task = %session.task, kind = %session.report_kind, "Starting research");
        sink.emit(SessionEvent::log(format!(
            "Starting research for '{}'",
            session.task
        )));

        let persona = self.persona_for(session).await;
        sink.emit(SessionEvent::log(persona.name.clone()));

        if session.report_kind.is_composite() {
            self.run_detailed(session, &persona, sink).await
        } else {
            self.run_flat(session, &persona, sink).await
        }
    }

    async fn persona_for(&self, session: &ResearchSession) -> Persona {
        let mut persona = self.personas.select(&session.task).await;
        if session.report_kind == ReportKind::CustomReport
            && let Some(role) = self.agent_role.as_deref().filter(|r| !r.trim().is_empty())
        {
            persona.role_prompt = role.to_string();
        }
        persona
    }

    async fn run_flat(
        &self,
        session: &mut ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<ResearchOutcome> {
        let entries = self.gatherer.gather(session, persona, sink).await?;
        session.extend_context(entries);

        let context = session.context_text();
        let main_topic = session.parent_topic.as_deref().unwrap_or(&session.task);
        let request = ReportRequest {
            kind: session.report_kind,
            question: &session.task,
            context: &context,
            cadence: session.cadence,
            edits: &session.edits,
            main_topic,
            existing_headers: &[],
        };
        let report = self
            .assembler
            .write_report(&request, persona, Some(sink))
            .await?;

        Ok(ResearchOutcome {
            report,
            queries: session.queries(),
            sources: session.ledger().urls(),
        })
    }

    /// Main research, then introduction and one sub-report per subtopic,
    /// strictly in order so each sees the headers of those before it.
    async fn run_detailed(
        &self,
        session: &mut ResearchSession,
        persona: &Persona,
        sink: &dyn EventSink,
    ) -> Result<ResearchOutcome> {
        let entries = self.gatherer.gather(session, persona, sink).await?;
        session.extend_context(entries);
        let main_context = session.context_text();

        let subtopics = self
            .planner
            .plan_subtopics(
                &session.task,
                &main_context,
                &session.subtopics,
                self.max_subtopics,
                persona,
            )
            .await;
        sink.emit(SessionEvent::log(format!("Subtopics: {}", subtopics.join(", "))));

        let introduction = self
            .assembler
            .write_introduction(&session.task, &main_context, session.cadence, persona)
            .await;
        let mut composite = CompositeReport::new(introduction);
        let mut queries = session.queries();

        for subtopic in &subtopics {
            sink.emit(SessionEvent::log(format!("Researching subtopic: {}", subtopic)));

            let mut child = session.child(subtopic);
            let entries = self.gatherer.gather(&child, persona, sink).await?;
            child.extend_context(entries);
            queries.extend(child.queries());

            let child_context = child.context_text();
            let context = if child_context.is_empty() {
                warn!(subtopic = %subtopic, "No context for subtopic, using main context");
                main_context.as_str()
            } else {
                child_context.as_str()
            };

            let existing = composite.existing_headers();
            let request = ReportRequest {
                kind: ReportKind::SubtopicReport,
                question: subtopic,
                context,
                cadence: child.cadence,
                edits: &child.edits,
                main_topic: &session.task,
                existing_headers: &existing,
            };
            let content = self.assembler.write(&request, persona, None).await?;
            if content.trim().is_empty() {
                warn!(subtopic = %subtopic, "Sub-report came back empty, skipped");
                continue;
            }
            composite.push(subtopic.clone(), content);
        }

        let sources = session.ledger().urls();
        let report = composite.render(&sources);
        if report.trim().is_empty() {
            return Err(AppError::Generation(format!(
                "No content produced for '{}'",
                session.task
            )));
        }
        sink.emit(SessionEvent::Report {
            output: report.clone(),
        });

        Ok(ResearchOutcome {
            report,
            queries,
            sources,
        })
    }
}
