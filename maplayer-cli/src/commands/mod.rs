//! CLI subcommand implementations.

pub mod cache;
pub mod fetch;

/// Shared result type for subcommands.
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;
