//! # Distinct CLI Module
//!
//! This module implements the CLI interface for Distinct.
//!
//! ## Available Commands
//!
//! - `serve` - Start the report ingestion server
//! - `replay` - Replay recorded report logs into sessions
//! - `show` - Show a stored session (diagram, hierarchy, statements, metrics)
//! - `sessions` - List stored sessions

mod commands;

use crate::config::DistinctConfig;
use clap::{Parser, Subcommand, ValueEnum};
use distinct_core::DistinctError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Distinct - execution context reconstruction for browser security analysis
///
/// Turns the reports of an in-page agent into a hierarchy of windows,
/// iframes and popups plus a sequence diagram of what happened between them.
#[derive(Parser, Debug)]
#[command(name = "distinct")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the session database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the report ingestion server
    Serve {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Replay JSON-lines report logs, one session per file
    Replay {
        /// Session id (suffixed with the file name when several files are given)
        #[arg(short, long)]
        session: Option<String>,

        /// Report log files, one agent envelope per line
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Show a stored session
    Show {
        /// Session id
        session: String,

        /// What to show
        #[arg(short, long, value_enum, default_value = "diagram")]
        what: ShowTarget,
    },

    /// List stored sessions
    Sessions,
}

/// Session views available to `show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShowTarget {
    /// PlantUML sequence diagram
    Diagram,
    /// Browsing-context tree
    Hierarchy,
    /// Session statements
    Statements,
    /// Report and hierarchy counters
    Metrics,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), DistinctError> {
    let mut config = DistinctConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database = database;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_serve(&config).await
        }
        Some(Commands::Replay { session, files }) => {
            cmd_replay(&config, json_mode, session.as_deref(), &files).await
        }
        Some(Commands::Show { session, what }) => cmd_show(&config, json_mode, &session, what),
        Some(Commands::Sessions) | None => cmd_sessions(&config, json_mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_with_global_flags() {
        let cli = Cli::parse_from([
            "distinct",
            "replay",
            "--session",
            "run1",
            "a.jsonl",
            "b.jsonl",
            "-D",
            "runs.redb",
            "--json-mode",
        ]);

        assert!(cli.json_mode);
        assert_eq!(cli.database, Some(PathBuf::from("runs.redb")));
        match cli.command {
            Some(Commands::Replay { session, files }) => {
                assert_eq!(session.as_deref(), Some("run1"));
                assert_eq!(files.len(), 2);
            }
            other => unreachable!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn show_defaults_to_diagram() {
        let cli = Cli::parse_from(["distinct", "show", "s1"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Show {
                what: ShowTarget::Diagram,
                ..
            })
        ));
    }

    #[test]
    fn replay_requires_a_file() {
        assert!(Cli::try_parse_from(["distinct", "replay"]).is_err());
    }
}
