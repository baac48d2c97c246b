//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level arguments for the `hubsearch` binary.
#[derive(Parser, Debug)]
#[command(name = "hubsearch", author, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "HUBSEARCH_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP embedding service.
    Serve {
        /// Bind address (overrides server.host).
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a JSON health report for the configured backends.
    Health,

    /// Embed one text and print a summary.
    Embed {
        /// Text to embed.
        text: String,
    },

    /// Configuration operations.
    Config(ConfigCommand),

    /// Print version information.
    Version,
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Print the effective configuration as TOML.
    Show,

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to the platform config directory).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
