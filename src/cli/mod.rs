//! CLI module for reach-server
//!
//! Provides command-line interface parsing for the reach-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod output;

use crate::types::{Cadence, ReportKind, SourceKind};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Reach - research orchestration server
///
/// Plans sub-queries, gathers and compresses sources, and writes structured
/// reports, streamed over a websocket or printed locally.
#[derive(Parser, Debug)]
#[command(
    name = "reach-server",
    version,
    about = "Reach - research orchestration server",
    after_help = "EXAMPLES:\n    \
                  reach-server                                   # Start the server (reads reach.toml)\n    \
                  reach-server --config my.toml                  # Use a custom config file\n    \
                  reach-server research \"EV battery recycling\"   # Run one session locally\n    \
                  reach-server config --validate                 # Check the configuration"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "reach.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP and websocket server (default)
    Serve,

    /// Run one research session and print its events and report
    Research {
        /// The research task
        task: String,

        /// Report kind, e.g. research_report, detailed_report, newsletter_report
        #[arg(short = 't', long, default_value = "research_report", value_parser = parse_report_kind)]
        report_type: ReportKind,

        /// Source kinds to gather from (web, files, systems)
        #[arg(short, long = "source", value_parser = parse_source_kind)]
        sources: Vec<SourceKind>,

        /// Explicit URLs to include
        #[arg(short, long = "url")]
        urls: Vec<String>,

        /// Uploaded-file references (paths or URLs)
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Recency window: none, daily, weekly or monthly
        #[arg(long, default_value = "none", value_parser = parse_cadence)]
        cadence: Cadence,
    },

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },
}

fn parse_report_kind(raw: &str) -> Result<ReportKind, String> {
    raw.parse().map_err(|e: crate::types::AppError| e.to_string())
}

fn parse_source_kind(raw: &str) -> Result<SourceKind, String> {
    raw.parse().map_err(|e: crate::types::AppError| e.to_string())
}

fn parse_cadence(raw: &str) -> Result<Cadence, String> {
    Ok(Cadence::parse(raw))
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_serve() {
        let cli = Cli::try_parse_from(["reach-server"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("reach.toml"));
    }

    #[test]
    fn test_research_command() {
        let cli = Cli::try_parse_from([
            "reach-server",
            "research",
            "EV battery recycling",
            "-t",
            "detailed_report",
            "--source",
            "web",
            "--source",
            "SYSTEMS",
            "--cadence",
            "weekly",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Research {
                task,
                report_type,
                sources,
                cadence,
                ..
            }) => {
                assert_eq!(task, "EV battery recycling");
                assert_eq!(report_type, ReportKind::DetailedReport);
                assert_eq!(sources, vec![SourceKind::Web, SourceKind::Systems]);
                assert_eq!(cadence, Cadence::Weekly);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_report_type_rejected() {
        assert!(Cli::try_parse_from(["reach-server", "research", "x", "-t", "poem"]).is_err());
    }
}
