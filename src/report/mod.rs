//! Report generation
//!
//! - [`prompts`] - one prompt builder per report kind, behind a registry
//! - [`markdown`] - header extraction, table of contents, references
//! - [`assembler`] - generation calls and composite report assembly

pub mod assembler;
pub mod markdown;
pub mod prompts;

pub use assembler::{CompositeReport, ReportAssembler, ReportRequest, SubtopicReport};
pub use prompts::{PromptBuilder, PromptContext, PromptRegistry};
