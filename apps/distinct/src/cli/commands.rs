//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::ShowTarget;
use crate::api;
use crate::config::DistinctConfig;
use crate::session::{SessionManager, WorkerSettings, validate_session_id};
use distinct_core::{
    DistinctError, ExecutionContext, HierarchyMetrics, ProcessorRegistry, RedbStore,
    snapshot_crypto_hash,
};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum report log size for replay (100 MB).
const MAX_REPLAY_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file path and size before reading.
///
/// Canonicalizes the path, then checks it is a regular file no larger than
/// `max_size`.
fn validate_input_file(path: &Path, max_size: u64) -> Result<PathBuf, DistinctError> {
    let canonical = path.canonicalize().map_err(|e| {
        DistinctError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(DistinctError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| DistinctError::Io(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > max_size {
        return Err(DistinctError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }

    Ok(canonical)
}

fn print_json(value: &impl serde::Serialize) -> Result<(), DistinctError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| DistinctError::Serialization(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

fn unknown_session(session: &str) -> DistinctError {
    DistinctError::Storage(format!("Unknown session '{}'", session))
}

// =============================================================================
// SERVE COMMAND
// =============================================================================

/// Start the report ingestion server.
pub async fn cmd_serve(config: &DistinctConfig) -> Result<(), DistinctError> {
    let store = RedbStore::open(&config.storage.database)?;
    let registry = Arc::new(ProcessorRegistry::with_defaults());
    let sessions = SessionManager::new(store, registry, WorkerSettings::from(config));

    println!("Distinct ingestion server starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", config.server.host);
    println!("  Port:     {}", config.server.port);
    println!("  Database: {}", config.storage.database.display());
    println!("  Queue:    {} reports per session", config.server.queue_capacity);
    println!();
    println!("Endpoints:");
    println!("  GET  /health                          - Health check");
    println!("  POST /api/handlers/{{session}}/dispatch - Submit an agent report");
    println!();

    api::run_server(
        &config.bind_addr(),
        sessions,
        config.server.body_limit_bytes,
    )
    .await
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

/// Outcome of replaying one report log.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReplaySummary {
    pub session: String,
    pub file: PathBuf,
    pub submitted: u64,
    pub rejected: u64,
}

/// Session id for each replayed file.
///
/// A single file uses `session` as given; several files get the file stem
/// appended. Without `session` the file stem is the id.
pub fn replay_session_ids(
    session: Option<&str>,
    files: &[PathBuf],
) -> Result<Vec<String>, DistinctError> {
    let stem = |path: &PathBuf| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    };

    let ids: Vec<String> = match session {
        Some(id) if files.len() == 1 => vec![id.to_string()],
        Some(id) => files.iter().map(|f| format!("{}-{}", id, stem(f))).collect(),
        None => files.iter().map(stem).collect(),
    };

    let mut seen = BTreeSet::new();
    for id in &ids {
        validate_session_id(id)?;
        if !seen.insert(id.as_str()) {
            return Err(DistinctError::InvalidField {
                discriminator: "session".to_string(),
                field: "session",
                reason: format!("session id '{}' used by more than one file", id),
            });
        }
    }
    Ok(ids)
}

/// Feed every line of `contents` into `session`.
///
/// A line is either an agent envelope (`{"key": .., "val": {..}}`) or a
/// dispatch body wrapping one (`{"report": {..}}`). Blank lines are ignored;
/// unparseable lines are counted and skipped.
async fn replay_lines(
    sessions: SessionManager,
    session: String,
    file: PathBuf,
    contents: String,
) -> ReplaySummary {
    let mut summary = ReplaySummary {
        session,
        file,
        submitted: 0,
        rejected: 0,
    };

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let payload = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(mut map)) if map.contains_key("report") => {
                map.remove("report").unwrap_or(Value::Null)
            }
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    file = %summary.file.display(),
                    line = line_no + 1,
                    "invalid JSON: {}",
                    e
                );
                summary.rejected = summary.rejected.saturating_add(1);
                continue;
            }
        };

        match sessions.submit(&summary.session, &payload).await {
            Ok(_) => summary.submitted = summary.submitted.saturating_add(1),
            Err(e @ DistinctError::SessionFailed(_)) => {
                tracing::error!(session = %summary.session, "replay stopped: {}", e);
                break;
            }
            Err(e) => {
                tracing::warn!(
                    file = %summary.file.display(),
                    line = line_no + 1,
                    "rejected report: {}",
                    e
                );
                summary.rejected = summary.rejected.saturating_add(1);
            }
        }
    }

    summary
}

/// Replay report logs in parallel, one session per file.
pub async fn cmd_replay(
    config: &DistinctConfig,
    json_mode: bool,
    session: Option<&str>,
    files: &[PathBuf],
) -> Result<(), DistinctError> {
    let ids = replay_session_ids(session, files)?;

    let mut inputs = Vec::with_capacity(files.len());
    for (id, file) in ids.into_iter().zip(files) {
        let path = validate_input_file(file, MAX_REPLAY_FILE_SIZE)?;
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| DistinctError::Io(format!("Read '{}': {}", file.display(), e)))?;
        inputs.push((id, file.clone(), contents));
    }

    let store = RedbStore::open(&config.storage.database)?;
    let registry = Arc::new(ProcessorRegistry::with_defaults());
    let sessions = SessionManager::new(store.clone(), registry, WorkerSettings::from(config));

    let mut tasks = JoinSet::new();
    for (id, file, contents) in inputs {
        tasks.spawn(replay_lines(sessions.clone(), id, file, contents));
    }

    let mut summaries = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(summary) => summaries.push(summary),
            Err(e) => tracing::error!("replay task aborted: {}", e),
        }
    }
    sessions.shutdown().await;
    summaries.sort_by(|a, b| a.session.cmp(&b.session));

    if json_mode {
        let mut results = Vec::new();
        for summary in &summaries {
            let hierarchy = store.load_hierarchy(&summary.session)?.unwrap_or_default();
            results.push(json!({
                "summary": summary,
                "hierarchy": hierarchy.render(),
                "metrics": HierarchyMetrics::from_hierarchy(&hierarchy),
            }));
        }
        return print_json(&results);
    }

    for summary in &summaries {
        let hierarchy = store.load_hierarchy(&summary.session)?.unwrap_or_default();
        println!(
            "Session {} ({}): {} reports submitted, {} rejected",
            summary.session,
            summary.file.display(),
            summary.submitted,
            summary.rejected
        );
        println!("{}", hierarchy.render());
        println!();
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Show one view of a stored session.
pub fn cmd_show(
    config: &DistinctConfig,
    json_mode: bool,
    session: &str,
    what: ShowTarget,
) -> Result<(), DistinctError> {
    let store = RedbStore::open(&config.storage.database)?;
    let info = store
        .session_info(session)?
        .ok_or_else(|| unknown_session(session))?;

    match what {
        ShowTarget::Diagram => {
            let diagram = store.render_diagram(session)?;
            if json_mode {
                print_json(&json!({ "session": session, "diagram": diagram }))
            } else {
                println!("{}", diagram);
                Ok(())
            }
        }
        ShowTarget::Hierarchy => {
            let hierarchy = store.load_hierarchy(session)?.unwrap_or_default();
            let checksum = snapshot_crypto_hash(&hierarchy)?;
            if json_mode {
                print_json(&json!({
                    "session": session,
                    "hierarchy": hierarchy.render(),
                    "snapshot": hierarchy.snapshot(),
                    "blake3": checksum,
                }))
            } else {
                println!("{}", hierarchy.render());
                println!();
                println!("BLAKE3: {}", checksum);
                Ok(())
            }
        }
        ShowTarget::Statements => print_json(&store.statements(session)?),
        ShowTarget::Metrics => {
            // Session counters are not stored; rebuild them from the history.
            let mut ctx =
                ExecutionContext::new(info, Arc::new(ProcessorRegistry::with_defaults()));
            for report in store.reports(session)? {
                ctx.process(report)?;
            }
            let metrics = ctx.metrics();
            let hierarchy = HierarchyMetrics::from_hierarchy(
                &store.load_hierarchy(session)?.unwrap_or_default(),
            );

            if json_mode {
                return print_json(&json!({
                    "session": session,
                    "reports": metrics,
                    "hierarchy": hierarchy,
                }));
            }

            println!("Session {}", session);
            println!();
            println!("Reports:");
            println!("  Received:      {}", metrics.reports_received);
            println!("  Applied:       {}", metrics.reports_applied);
            println!("  Skipped:       {}", metrics.reports_skipped);
            println!("  Unknown:       {}", metrics.reports_unknown);
            for (kind, count) in &metrics.unknown_by_kind {
                println!("    {:<24} {}", kind, count);
            }
            println!("  Log entries:   {}", metrics.log_entries);
            println!();
            println!("Hierarchy:");
            println!("  Frames:        {}", hierarchy.frame_count);
            println!("  Iframes:       {}", hierarchy.iframe_count);
            println!("  Popups:        {}", hierarchy.popup_count);
            println!("  Closed popups: {}", hierarchy.closed_popups);
            println!("  Max depth:     {}", hierarchy.max_depth);
            Ok(())
        }
    }
}

// =============================================================================
// SESSIONS COMMAND
// =============================================================================

/// List stored sessions.
pub fn cmd_sessions(config: &DistinctConfig, json_mode: bool) -> Result<(), DistinctError> {
    let store = RedbStore::open(&config.storage.database)?;
    let sessions = store.sessions()?;

    if json_mode {
        return print_json(&sessions);
    }

    if sessions.is_empty() {
        println!("No sessions in {}", config.storage.database.display());
        return Ok(());
    }

    println!("{:<40} {:>15}  Initial URL", "Session", "Started (ms)");
    for info in &sessions {
        println!(
            "{:<40} {:>15}  {}",
            info.session_id,
            info.start_time,
            info.initial_url.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}
