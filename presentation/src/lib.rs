//! Presentation layer for butlerd-client
//!
//! This crate contains CLI definitions, output formatters
//! and the startup progress reporter.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, Command, OutputFormat};
pub use output::{console::ConsoleFormatter, formatter::OutputFormatter};
pub use progress::reporter::BootstrapReporter;
