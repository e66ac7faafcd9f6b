//! # Session Workers
//!
//! Every analysis session is driven by exactly one worker. The first report
//! for a session id starts its worker; the worker owns the session's
//! [`ExecutionContext`] and applies the reports queued for it one at a time,
//! in arrival order. Different sessions run in parallel.
//!
//! Report ids count the reports of one session from zero. The worker assigns
//! them as it takes reports off its queue, so the id order is the history
//! order, and a resumed session continues after its stored reports.
//!
//! After each report the worker persists the report, the statements and the
//! hierarchy snapshot in a single store transaction. The behavior log is
//! written as entries are produced. When either write fails the worker stops
//! and the session rejects every further report.

use crate::config::DistinctConfig;
use distinct_core::{
    DistinctError, ExecutionContext, ProcessorRegistry, RedbSessionLog, RedbStore, Report,
    ReportId, SessionInfo,
};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

/// Maximum length of a session identifier.
pub const MAX_SESSION_ID_LENGTH: usize = 128;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Check that `session` can be used as a session identifier.
///
/// Identifiers are non-empty and limited to ASCII letters, digits, `-`, `_`
/// and `.`.
pub fn validate_session_id(session: &str) -> Result<(), DistinctError> {
    let invalid = |reason: &str| {
        Err(DistinctError::InvalidField {
            discriminator: "session".to_string(),
            field: "session",
            reason: reason.to_string(),
        })
    };

    if session.is_empty() {
        return invalid("session id is empty");
    }
    if session.len() > MAX_SESSION_ID_LENGTH {
        return invalid("session id is too long");
    }
    if !session
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return invalid("session id contains unsupported characters");
    }
    Ok(())
}

struct Worker {
    sender: mpsc::Sender<Report>,
    handle: JoinHandle<()>,
}

/// Settings applied to every session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// Reports buffered per session before `submit` waits.
    pub queue_capacity: usize,
    /// URL the analyzed browser was started with, seeded into new sessions.
    pub initial_url: Option<String>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            initial_url: None,
        }
    }
}

impl From<&DistinctConfig> for WorkerSettings {
    fn from(config: &DistinctConfig) -> Self {
        Self {
            queue_capacity: config.server.queue_capacity,
            initial_url: config.session.initial_url.clone(),
        }
    }
}

struct Inner {
    store: RedbStore,
    registry: Arc<ProcessorRegistry>,
    settings: WorkerSettings,
    workers: Mutex<BTreeMap<String, Worker>>,
}

/// Routes incoming reports to per-session workers.
///
/// Cloning is cheap; all clones share the same workers.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    #[must_use]
    pub fn new(
        store: RedbStore,
        registry: Arc<ProcessorRegistry>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                settings,
                workers: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &RedbStore {
        &self.inner.store
    }

    /// Number of sessions with a running worker.
    pub async fn active_sessions(&self) -> usize {
        let workers = self.inner.workers.lock().await;
        workers.values().filter(|w| !w.sender.is_closed()).count()
    }

    /// Queue an agent envelope (`{"key": .., "val": {..}}`) for `session`.
    ///
    /// Returns the report's discriminator. The id is assigned by the
    /// session's worker. Waits while the session's queue is full.
    pub async fn submit(&self, session: &str, payload: &Value) -> Result<String, DistinctError> {
        validate_session_id(session)?;
        let report = Report::from_agent_payload(0u64, payload, now_millis())?;
        let discriminator = report.discriminator.clone();
        self.enqueue(session, report).await?;
        Ok(discriminator)
    }

    async fn enqueue(&self, session: &str, report: Report) -> Result<(), DistinctError> {
        let sender = {
            let mut workers = self.inner.workers.lock().await;
            let worker = workers
                .entry(session.to_string())
                .or_insert_with(|| self.spawn_worker(session));
            worker.sender.clone()
        };

        sender
            .send(report)
            .await
            .map_err(|_| DistinctError::SessionFailed(session.to_string()))
    }

    /// Stop accepting reports and wait until every queued report is stored.
    pub async fn shutdown(&self) {
        let workers = std::mem::take(&mut *self.inner.workers.lock().await);
        for (session, worker) in workers {
            drop(worker.sender);
            if let Err(e) = worker.handle.await {
                tracing::error!(session = %session, "session worker aborted: {}", e);
            }
        }
    }

    fn spawn_worker(&self, session: &str) -> Worker {
        let (sender, receiver) = mpsc::channel(self.inner.settings.queue_capacity.max(1));

        let mut info = SessionInfo::new(session, now_millis());
        if let Some(url) = &self.inner.settings.initial_url {
            info = info.with_initial_url(url.clone());
        }
        let store = self.inner.store.clone();
        let registry = Arc::clone(&self.inner.registry);

        tracing::info!(session = %session, "starting session worker");
        let handle = tokio::task::spawn_blocking(move || {
            let session = info.session_id.clone();
            match open_context(&store, registry, info) {
                Ok((ctx, next_id)) => run_worker(ctx, next_id, receiver),
                Err(e) => {
                    tracing::error!(session = %session, error = %e, "cannot open session");
                }
            }
        });

        Worker { sender, handle }
    }
}

/// Context for `info`, continuing the stored state of a known session, and
/// the id of the session's next report.
fn open_context(
    store: &RedbStore,
    registry: Arc<ProcessorRegistry>,
    info: SessionInfo,
) -> Result<(ExecutionContext<RedbSessionLog>, u64), DistinctError> {
    let session = info.session_id.clone();
    let log = store.session_log(session.as_str());

    match store.session_info(&session)? {
        Some(known) => {
            let hierarchy = store.load_hierarchy(&session)?.unwrap_or_default();
            let statements = store.statements(&session)?;
            let next_id = store.report_count(&session)?;
            tracing::info!(
                session = %session,
                frames = hierarchy.len(),
                reports = next_id,
                "resuming stored session"
            );
            Ok((
                ExecutionContext::resume(known, registry, log, hierarchy, statements),
                next_id,
            ))
        }
        None => {
            store.register_session(&info)?;
            Ok((ExecutionContext::with_log(info, registry, log), 0))
        }
    }
}

fn run_worker(
    mut ctx: ExecutionContext<RedbSessionLog>,
    mut next_id: u64,
    mut receiver: mpsc::Receiver<Report>,
) {
    let session = ctx.session().session_id.clone();

    while let Some(mut report) = receiver.blocking_recv() {
        report.id = ReportId::Number(next_id);
        next_id = next_id.saturating_add(1);

        let disposition = match ctx.process(report) {
            Ok(disposition) => disposition,
            Err(e) => {
                tracing::error!(session = %session, error = %e, "session failed");
                break;
            }
        };

        if let Some(report) = ctx.history().last() {
            let stored = ctx.log().store().record(
                &session,
                report,
                ctx.statements(),
                ctx.hierarchy(),
            );
            if let Err(e) = stored {
                tracing::error!(session = %session, error = %e, "cannot persist session state");
                break;
            }
            tracing::debug!(
                session = %session,
                report = %report.id,
                discriminator = %report.discriminator,
                ?disposition,
                "report processed"
            );
        }
    }

    let metrics = ctx.metrics();
    tracing::info!(
        session = %session,
        received = metrics.reports_received,
        applied = metrics.reports_applied,
        skipped = metrics.reports_skipped,
        unknown = metrics.reports_unknown,
        "session worker stopped"
    );
}
