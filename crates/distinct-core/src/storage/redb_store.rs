//! # redb-backed Session Storage
//!
//! One database file holds every session:
//! - the behavior log, one rendered statement per row
//! - the verbatim report history
//! - the latest statements and hierarchy snapshot
//! - the session's identity
//!
//! Every append is its own write transaction, so a reader never observes a
//! half-written entry. A failing write is returned as
//! [`DistinctError::Storage`]; the caller decides which session it fails.

use crate::diagram::{Arrow, BehaviorLog, Note, render_diagram};
use crate::formats::{hierarchy_from_bytes, hierarchy_to_bytes};
use crate::hierarchy::Hierarchy;
use crate::primitives::DIAGRAM_START;
use crate::statements::{SessionInfo, Statements};
use crate::{DistinctError, Report};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use std::path::Path;
use std::sync::Arc;

/// Behavior log rows: (session, seq) -> rendered PlantUML statement
const DIAGRAM: TableDefinition<(&str, u64), &str> = TableDefinition::new("diagram");

/// Report history: (session, seq) -> report JSON
const REPORTS: TableDefinition<(&str, u64), &str> = TableDefinition::new("reports");

/// Statements: (session, key) -> value JSON
const STATEMENTS: TableDefinition<(&str, &str), &str> = TableDefinition::new("statements");

/// Latest hierarchy snapshot: session -> snapshot bytes
const HIERARCHY: TableDefinition<&str, &[u8]> = TableDefinition::new("hierarchy");

/// Session identity: session -> SessionInfo JSON
const SESSIONS: TableDefinition<&str, &str> = TableDefinition::new("sessions");

fn storage(e: impl std::fmt::Display) -> DistinctError {
    DistinctError::Storage(e.to_string())
}

fn serialization(e: impl std::fmt::Display) -> DistinctError {
    DistinctError::Serialization(e.to_string())
}

/// Next free sequence number of `session` in a `(session, seq)` table.
fn next_seq<T>(table: &T, session: &str) -> Result<u64, DistinctError>
where
    T: ReadableTable<(&'static str, u64), &'static str>,
{
    let last = table
        .range((session, 0u64)..=(session, u64::MAX))
        .map_err(storage)?
        .next_back();
    match last {
        Some(entry) => {
            let (key, _) = entry.map_err(storage)?;
            Ok(key.value().1.saturating_add(1))
        }
        None => Ok(0),
    }
}

/// Shared handle to the session database.
///
/// Cloning is cheap; all clones write to the same file.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a session database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DistinctError> {
        let db = Database::create(path.as_ref()).map_err(|e| DistinctError::Io(e.to_string()))?;

        // Create every table up front so read transactions can open them.
        {
            let write_txn = db.begin_write().map_err(storage)?;
            let _ = write_txn.open_table(DIAGRAM).map_err(storage)?;
            let _ = write_txn.open_table(REPORTS).map_err(storage)?;
            let _ = write_txn.open_table(STATEMENTS).map_err(storage)?;
            let _ = write_txn.open_table(HIERARCHY).map_err(storage)?;
            let _ = write_txn.open_table(SESSIONS).map_err(storage)?;
            write_txn.commit().map_err(storage)?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    // =========================================================================
    // SESSIONS
    // =========================================================================

    /// Record a session's identity. An existing record is kept.
    pub fn register_session(&self, info: &SessionInfo) -> Result<(), DistinctError> {
        let json = serde_json::to_string(info).map_err(serialization)?;
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(SESSIONS).map_err(storage)?;
            let exists = table
                .get(info.session_id.as_str())
                .map_err(storage)?
                .is_some();
            if !exists {
                table
                    .insert(info.session_id.as_str(), json.as_str())
                    .map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)
    }

    pub fn session_info(&self, session: &str) -> Result<Option<SessionInfo>, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(SESSIONS).map_err(storage)?;
        match table.get(session).map_err(storage)? {
            Some(value) => serde_json::from_str(value.value())
                .map(Some)
                .map_err(serialization),
            None => Ok(None),
        }
    }

    /// Every registered session, ordered by id.
    pub fn sessions(&self) -> Result<Vec<SessionInfo>, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(SESSIONS).map_err(storage)?;

        let mut sessions = Vec::new();
        for entry in table.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            sessions.push(serde_json::from_str(value.value()).map_err(serialization)?);
        }
        Ok(sessions)
    }

    // =========================================================================
    // BEHAVIOR LOG
    // =========================================================================

    /// Behavior log writing into this store under `session`.
    #[must_use]
    pub fn session_log(&self, session: impl Into<String>) -> RedbSessionLog {
        RedbSessionLog {
            store: self.clone(),
            session: session.into(),
        }
    }

    /// Append one rendered statement. Returns its sequence number.
    pub fn append_diagram_line(&self, session: &str, line: &str) -> Result<u64, DistinctError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        let seq = {
            let mut table = write_txn.open_table(DIAGRAM).map_err(storage)?;
            let seq = next_seq(&table, session)?;
            table.insert((session, seq), line).map_err(storage)?;
            seq
        };
        write_txn.commit().map_err(storage)?;
        Ok(seq)
    }

    /// Rendered statements of `session`, in append order.
    pub fn diagram_lines(&self, session: &str) -> Result<Vec<String>, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(DIAGRAM).map_err(storage)?;

        let mut lines = Vec::new();
        for entry in table
            .range((session, 0u64)..=(session, u64::MAX))
            .map_err(storage)?
        {
            let (_, value) = entry.map_err(storage)?;
            lines.push(value.value().to_string());
        }
        Ok(lines)
    }

    /// Complete PlantUML source of a session's behavior log.
    pub fn render_diagram(&self, session: &str) -> Result<String, DistinctError> {
        let mut lines = vec![DIAGRAM_START.to_string()];
        lines.extend(self.diagram_lines(session)?);
        Ok(render_diagram(&lines))
    }

    // =========================================================================
    // SESSION STATE
    // =========================================================================

    /// Persist one processed report with the state it produced, atomically.
    pub fn record(
        &self,
        session: &str,
        report: &Report,
        statements: &Statements,
        hierarchy: &Hierarchy,
    ) -> Result<u64, DistinctError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        let seq = Self::write_report(&write_txn, session, report)?;
        Self::write_statements(&write_txn, session, statements)?;
        Self::write_hierarchy(&write_txn, session, hierarchy)?;
        write_txn.commit().map_err(storage)?;
        Ok(seq)
    }

    /// Append a report to the history. Returns its sequence number.
    pub fn append_report(&self, session: &str, report: &Report) -> Result<u64, DistinctError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        let seq = Self::write_report(&write_txn, session, report)?;
        write_txn.commit().map_err(storage)?;
        Ok(seq)
    }

    pub fn save_statements(
        &self,
        session: &str,
        statements: &Statements,
    ) -> Result<(), DistinctError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        Self::write_statements(&write_txn, session, statements)?;
        write_txn.commit().map_err(storage)
    }

    pub fn save_hierarchy(&self, session: &str, hierarchy: &Hierarchy) -> Result<(), DistinctError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        Self::write_hierarchy(&write_txn, session, hierarchy)?;
        write_txn.commit().map_err(storage)
    }

    fn write_report(
        write_txn: &WriteTransaction,
        session: &str,
        report: &Report,
    ) -> Result<u64, DistinctError> {
        let json = serde_json::to_string(report).map_err(serialization)?;
        let mut table = write_txn.open_table(REPORTS).map_err(storage)?;
        let seq = next_seq(&table, session)?;
        table.insert((session, seq), json.as_str()).map_err(storage)?;
        Ok(seq)
    }

    fn write_statements(
        write_txn: &WriteTransaction,
        session: &str,
        statements: &Statements,
    ) -> Result<(), DistinctError> {
        let mut table = write_txn.open_table(STATEMENTS).map_err(storage)?;
        for (key, value) in statements.iter() {
            let json = serde_json::to_string(value).map_err(serialization)?;
            table
                .insert((session, key.as_str()), json.as_str())
                .map_err(storage)?;
        }
        Ok(())
    }

    fn write_hierarchy(
        write_txn: &WriteTransaction,
        session: &str,
        hierarchy: &Hierarchy,
    ) -> Result<(), DistinctError> {
        let bytes = hierarchy_to_bytes(hierarchy)?;
        let mut table = write_txn.open_table(HIERARCHY).map_err(storage)?;
        table.insert(session, bytes.as_slice()).map_err(storage)?;
        Ok(())
    }

    /// Report history of `session`, in arrival order.
    pub fn reports(&self, session: &str) -> Result<Vec<Report>, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(REPORTS).map_err(storage)?;

        let mut reports = Vec::new();
        for entry in table
            .range((session, 0u64)..=(session, u64::MAX))
            .map_err(storage)?
        {
            let (_, value) = entry.map_err(storage)?;
            reports.push(serde_json::from_str(value.value()).map_err(serialization)?);
        }
        Ok(reports)
    }

    /// Number of reports stored for `session`.
    pub fn report_count(&self, session: &str) -> Result<u64, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(REPORTS).map_err(storage)?;
        next_seq(&table, session)
    }

    pub fn statements(&self, session: &str) -> Result<Statements, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(STATEMENTS).map_err(storage)?;

        let mut entries = Vec::new();
        for entry in table.range((session, "")..).map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            let (owner, name) = key.value();
            if owner != session {
                break;
            }
            let value = serde_json::from_str(value.value()).map_err(serialization)?;
            entries.push((name.to_string(), value));
        }
        Ok(entries.into_iter().collect())
    }

    /// Latest hierarchy snapshot of `session`, if one was saved.
    pub fn load_hierarchy(&self, session: &str) -> Result<Option<Hierarchy>, DistinctError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(HIERARCHY).map_err(storage)?;
        match table.get(session).map_err(storage)? {
            Some(bytes) => hierarchy_from_bytes(bytes.value()).map(Some),
            None => Ok(None),
        }
    }
}

// =============================================================================
// SESSION LOG
// =============================================================================

/// [`BehaviorLog`] persisting into a [`RedbStore`].
#[derive(Debug, Clone)]
pub struct RedbSessionLog {
    store: RedbStore,
    session: String,
}

impl RedbSessionLog {
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn store(&self) -> &RedbStore {
        &self.store
    }
}

impl BehaviorLog for RedbSessionLog {
    fn annotate(&mut self, note: &Note) -> Result<(), DistinctError> {
        self.store
            .append_diagram_line(&self.session, &note.render())
            .map(|_| ())
    }

    fn link(&mut self, arrow: &Arrow) -> Result<(), DistinctError> {
        self.store
            .append_diagram_line(&self.session, &arrow.render())
            .map(|_| ())
    }
}

// =============================================================================
// TESTS
// =============================================================================
