//! # Distinct - Execution Context Reconstruction
//!
//! The main binary for Distinct.
//!
//! This application provides:
//! - HTTP ingestion server for the in-page agent (axum-based)
//! - Session workers applying reports in arrival order
//! - CLI interface for replaying and inspecting stored sessions
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  apps/distinct (THE BINARY)                 │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌────────────────┐  │
//! │  │   CLI       │    │   HTTP API  │    │ Session Workers│  │
//! │  │  (clap)     │    │   (axum)    │    │ (tokio + mpsc) │  │
//! │  └──────┬──────┘    └──────┬──────┘    └───────┬────────┘  │
//! │         │                  │                   │           │
//! │         └──────────────────┼───────────────────┘           │
//! │                            ▼                               │
//! │                   ┌────────────────┐                       │
//! │                   │ distinct-core  │                       │
//! │                   │  (THE ENGINE)  │                       │
//! │                   └────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the ingestion server
//! distinct serve --host 0.0.0.0 --port 3000
//!
//! # Replay recorded report logs and inspect the result
//! distinct replay --session run1 reports.jsonl
//! distinct show run1 --what hierarchy
//! distinct sessions
//! ```

use clap::Parser;
use distinct::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // DISTINCT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("DISTINCT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "distinct=info,distinct_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && matches!(cli.command, Some(cli::Commands::Serve { .. })) {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Distinct startup banner.
fn print_banner() {
    println!(
        r#"
  ┳┓•   •      
  ┃┃┓┏╋┓┏┓┏╋   Distinct v{}
  ┻┛┗┛┗┗┛┗┗┗   execution context reconstruction
"#,
        env!("CARGO_PKG_VERSION")
    );
}
