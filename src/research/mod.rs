//! Research orchestration
//!
//! A session runs in a fixed order: persona selection, query planning,
//! source gathering per enabled source kind, then report assembly.
//!
//! - [`coordinator::ResearchCoordinator`] - drives a session end to end
//! - [`gatherer::SourceGatherer`] - web, file, system and explicit-URL strategies
//! - [`planner::QueryPlanner`] - sub-queries and detailed-report subtopics
//! - [`persona::PersonaSelector`] - role steering every generation call
//! - [`ledger::DedupLedger`] - URLs already fetched in this session
//!
//! # Usage
//!
//! ```ignore
//! let config = manager.config();
//! let coordinator = ResearchCoordinator::from_config(config.clone()).await?;
//! let mut session = ResearchSession::new(SessionStart::parse(frame)?, config)?;
//! let outcome = coordinator.execute(&mut session, &sink).await?;
//! ```

/// Session orchestration and composite report flow.
pub mod coordinator;
/// Source-kind strategies.
pub mod gatherer;
/// Session-scoped URL deduplication.
pub mod ledger;
/// Persona classification.
pub mod persona;
/// Sub-query and subtopic planning.
pub mod planner;
/// Per-task session state.
pub mod session;

pub use coordinator::{
    ConfiguredDeps, DepsProvider, ResearchCoordinator, ResearchDeps, ResearchOutcome, launch,
};
pub use gatherer::{GatherSettings, SourceGatherer};
pub use ledger::DedupLedger;
pub use persona::PersonaSelector;
pub use planner::{PlanRequest, QueryPlanner};
pub use session::ResearchSession;
