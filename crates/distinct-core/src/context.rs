//! # Execution Context
//!
//! One instance per session. It owns the session's hierarchy, statements,
//! report history and behavior log, and applies reports strictly one at a
//! time: `process` takes `&mut self`, so a session can never be mutated
//! concurrently. Different sessions share nothing but the read-only
//! [`ProcessorRegistry`].

use crate::diagram::{BehaviorLog, SequenceDiagram};
use crate::hierarchy::Hierarchy;
use crate::processors::ContextState;
use crate::registry::ProcessorRegistry;
use crate::statements::{SessionInfo, Statements};
use crate::system::{HierarchyMetrics, SessionMetrics};
use crate::{DistinctError, Report};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened to a processed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Disposition {
    /// A processor accepted the report and its log entries were written.
    Applied,
    /// No processor is registered for the discriminator.
    Unknown,
    /// The processor rejected the report for missing or malformed fields.
    Skipped,
}

/// Per-session report processing engine.
pub struct ExecutionContext<L: BehaviorLog = SequenceDiagram> {
    info: SessionInfo,
    state: ContextState,
    history: Vec<Report>,
    registry: Arc<ProcessorRegistry>,
    log: L,
    metrics: SessionMetrics,
    failed: bool,
}

impl<L: BehaviorLog> std::fmt::Debug for ExecutionContext<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("session", &self.info.session_id)
            .field("frames", &self.state.hierarchy.len())
            .field("history", &self.history.len())
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext<SequenceDiagram> {
    /// Context recording into an in-memory sequence diagram.
    #[must_use]
    pub fn new(info: SessionInfo, registry: Arc<ProcessorRegistry>) -> Self {
        Self::with_log(info, registry, SequenceDiagram::new())
    }
}

impl<L: BehaviorLog> ExecutionContext<L> {
    /// Context recording into `log`.
    #[must_use]
    pub fn with_log(info: SessionInfo, registry: Arc<ProcessorRegistry>, log: L) -> Self {
        let statements = Statements::seeded(&info);
        Self {
            info,
            state: ContextState {
                hierarchy: Hierarchy::new(),
                statements,
            },
            history: Vec::new(),
            registry,
            log,
            metrics: SessionMetrics::new(),
            failed: false,
        }
    }

    /// Context continuing a session whose hierarchy and statements were
    /// persisted earlier. The report history starts empty.
    #[must_use]
    pub fn resume(
        info: SessionInfo,
        registry: Arc<ProcessorRegistry>,
        log: L,
        hierarchy: Hierarchy,
        statements: Statements,
    ) -> Self {
        let mut ctx = Self::with_log(info, registry, log);
        ctx.state = ContextState {
            hierarchy,
            statements,
        };
        ctx
    }

    /// Process one report.
    ///
    /// The report is appended to the history whatever its outcome. Unknown
    /// kinds and malformed reports are absorbed and reported through the
    /// returned [`Disposition`]. An `Err` means the behavior log failed; the
    /// session is then marked failed and rejects every further report with
    /// [`DistinctError::SessionFailed`].
    pub fn process(&mut self, report: Report) -> Result<Disposition, DistinctError> {
        if self.failed {
            return Err(DistinctError::SessionFailed(self.info.session_id.clone()));
        }

        let outcome = self.dispatch(&report);
        self.history.push(report);
        outcome
    }

    fn dispatch(&mut self, report: &Report) -> Result<Disposition, DistinctError> {
        self.metrics.record_received();

        let Some(processor) = self.registry.lookup(&report.discriminator).map(Arc::clone) else {
            tracing::debug!(
                session = %self.info.session_id,
                discriminator = %report.discriminator,
                "no processor registered, report kept in history only"
            );
            self.metrics.record_unknown(&report.discriminator);
            return Ok(Disposition::Unknown);
        };

        let entries = match processor.apply(&mut self.state, report) {
            Ok(entries) => entries,
            Err(err) if err.is_data_quality() => {
                tracing::warn!(
                    session = %self.info.session_id,
                    report = %report.id,
                    error = %err,
                    "skipping report"
                );
                self.metrics.record_skipped();
                return Ok(Disposition::Skipped);
            }
            Err(err) => return Err(self.fail(err)),
        };

        for entry in &entries {
            if let Err(err) = self.log.append(entry) {
                return Err(self.fail(err));
            }
        }

        self.metrics.record_applied(entries.len());
        Ok(Disposition::Applied)
    }

    fn fail(&mut self, err: DistinctError) -> DistinctError {
        tracing::error!(
            session = %self.info.session_id,
            error = %err,
            "behavior log unavailable, session failed"
        );
        self.failed = true;
        err
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn session(&self) -> &SessionInfo {
        &self.info
    }

    #[must_use]
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.state.hierarchy
    }

    #[must_use]
    pub fn statements(&self) -> &Statements {
        &self.state.statements
    }

    /// Every report received, in arrival order.
    #[must_use]
    pub fn history(&self) -> &[Report] {
        &self.history
    }

    #[must_use]
    pub fn log(&self) -> &L {
        &self.log
    }

    #[must_use]
    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    #[must_use]
    pub fn hierarchy_metrics(&self) -> HierarchyMetrics {
        HierarchyMetrics::from_hierarchy(&self.state.hierarchy)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ProcessorRegistry> {
        &self.registry
    }

    /// Whether the behavior log failed for this session.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.failed
    }
}

// =============================================================================
// TESTS
// =============================================================================
