//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the reach-server CLI,
//! including a live renderer for research session events.

use crate::transport::{EventSink, SessionEvent};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "REACH".bright_cyan().bold(),
                format!("research orchestration server v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                "\n   REACH research orchestration server v{}\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Render one session event.
    pub fn event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Queries { output } => {
                self.header("Sub-queries");
                for query in output {
                    self.list_item(query);
                }
            }
            SessionEvent::Sources { output } => {
                self.header("Sources");
                let mut seen = std::collections::HashSet::new();
                for passage in output.iter().filter(|p| seen.insert(p.source.as_str())) {
                    self.list_item(&passage.source);
                }
            }
            SessionEvent::Logs { output } => self.info(output),
            SessionEvent::Report { output } => {
                print!("{}", output);
                io::stdout().flush().ok();
            }
            SessionEvent::Complete => {
                println!();
                self.success("Research complete");
            }
            SessionEvent::Error { message } => self.error(message),
        }
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

/// Prints session events as they are emitted.
pub struct OutputSink {
    output: Output,
}

impl OutputSink {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl EventSink for OutputSink {
    fn emit(&self, event: SessionEvent) {
        self.output.event(&event);
    }
}
