//! Command-line interface for Hubsearch.
//!
//! Loads [`HubsearchConfig`] once, installs the tracing subscriber, and
//! dispatches to `serve`, `health`, `embed`, `config`, and `version`.

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;

// Re-exports
pub use app::{EmbedSummary, EmbeddingHealth, HealthReport, HubsearchCli};
pub use cli::{CliArgs, Command, ConfigAction, ConfigCommand};
pub use config::HubsearchConfig;
