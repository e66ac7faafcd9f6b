//! # Core Type Definitions
//!
//! This module contains the types shared by every part of the engine:
//! - Arena identifiers (`FrameId`)
//! - The inbound unit of work (`Report`, `ReportId`)
//! - Error types (`DistinctError`)
//!
//! ## Determinism Guarantees
//!
//! - Identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! - Counters use saturating arithmetic
//! - Timestamps are kept as the JSON number the agent sent, never as floats

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ARENA IDENTIFIERS
// =============================================================================

/// Handle of a browsing-context node inside a [`crate::Hierarchy`].
///
/// Handles are only meaningful for the hierarchy that issued them and are
/// never reused after the node is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

// =============================================================================
// REPORT
// =============================================================================

/// Identifier the ingestion side attached to a report.
///
/// The in-page agent does not number its reports, so the transport may use
/// either a string (e.g. a request id) or an arrival counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReportId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportId::Number(n) => write!(f, "{}", n),
            ReportId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for ReportId {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for ReportId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One instrumentation event emitted by the in-page agent.
///
/// Reports are immutable once received. The engine appends every report to
/// the session history verbatim, whether or not a processor understands it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Event kind, e.g. `documentinit` or `postmessagereceived`.
    #[serde(alias = "key")]
    pub discriminator: String,
    /// Identifier assigned by the ingestion side.
    pub id: ReportId,
    /// Time the agent observed the event (milliseconds since the epoch).
    pub timestamp: Number,
    /// Event-specific payload.
    #[serde(default, alias = "val")]
    pub fields: Map<String, Value>,
}

impl Report {
    /// Create a new report.
    #[must_use]
    pub fn new(
        discriminator: impl Into<String>,
        id: impl Into<ReportId>,
        timestamp: impl Into<Number>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            discriminator: discriminator.into(),
            id: id.into(),
            timestamp: timestamp.into(),
            fields,
        }
    }

    /// Build a report from the agent envelope payload `{"key": .., "val": {..}}`.
    ///
    /// The agent stores its own clock reading in `val.timestamp`; when it is
    /// missing, `received_at` is used instead.
    pub fn from_agent_payload(
        id: impl Into<ReportId>,
        payload: &Value,
        received_at: u64,
    ) -> Result<Self, DistinctError> {
        let discriminator = payload
            .get("key")
            .and_then(Value::as_str)
            .ok_or_else(|| DistinctError::Serialization("report without key".to_string()))?;

        let fields = match payload.get("val") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(DistinctError::Serialization(
                    "report val is not an object".to_string(),
                ));
            }
        };

        let timestamp = match fields.get("timestamp") {
            Some(Value::Number(n)) => n.clone(),
            _ => Number::from(received_at),
        };

        Ok(Self {
            discriminator: discriminator.to_string(),
            id: id.into(),
            timestamp,
            fields,
        })
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Distinct engine.
///
/// - `MissingField`, `InvalidField` and `InvalidAddress` are data-quality
///   defects of a single report; the report is skipped and the session goes on
/// - `Storage` raised by the behavior log fails the session it belongs to
/// - The engine never panics on input
#[derive(Debug, Error)]
pub enum DistinctError {
    /// A recognized report lacks a field its processor requires.
    #[error("Report '{discriminator}' is missing required field '{field}'")]
    MissingField {
        discriminator: String,
        field: &'static str,
    },

    /// A field is present but its value cannot be used.
    #[error("Report '{discriminator}' has invalid field '{field}': {reason}")]
    InvalidField {
        discriminator: String,
        field: &'static str,
        reason: String,
    },

    /// A structural address does not follow the `top(.frames[N]|.popups[N])*` grammar.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The persistence or behavior-log collaborator failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The session can no longer record reports durably.
    #[error("Session {0} has failed and no longer accepts reports")]
    SessionFailed(String),
}

impl DistinctError {
    /// Whether the error only concerns the report being processed.
    #[must_use]
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            DistinctError::MissingField { .. }
                | DistinctError::InvalidField { .. }
                | DistinctError::InvalidAddress { .. }
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
