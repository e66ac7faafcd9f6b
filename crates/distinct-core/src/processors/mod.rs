//! # Report Processors
//!
//! One processor per family of report kinds. Every processor:
//! - validates the fields it needs before touching any state
//! - mutates the hierarchy and/or the statements through [`ContextState`]
//! - returns the log entries describing what it saw
//!
//! Processors are stateless and shared read-only between sessions through
//! the [`crate::ProcessorRegistry`].

mod document;
mod messaging;
mod navigation;
mod property;
mod statement;
mod storage;
mod window;

pub use document::{DocumentProcessor, DocumentStage};
pub use messaging::{MessagingEvent, MessagingProcessor};
pub use navigation::{Navigation, NavigationProcessor};
pub use property::{PropertyAccess, PropertyProcessor};
pub use statement::StatementProcessor;
pub use storage::{StorageKind, StorageProcessor};
pub use window::{WindowCloseProcessor, WindowOpenProcessor};

use crate::address::Address;
use crate::diagram::{LogEntry, Note};
use crate::hierarchy::Hierarchy;
use crate::statements::Statements;
use crate::{DistinctError, Report};
use serde_json::Value;

// =============================================================================
// PROCESSOR TRAIT
// =============================================================================

/// Mutable session state a processor may change.
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    pub hierarchy: Hierarchy,
    pub statements: Statements,
}

/// Handler for one or more report discriminators.
pub trait Processor: Send + Sync {
    /// Discriminators this processor is registered under.
    fn discriminators(&self) -> &'static [&'static str];

    /// Apply one report.
    ///
    /// A data-quality error must be returned before any state was changed.
    fn apply(&self, state: &mut ContextState, report: &Report)
    -> Result<Vec<LogEntry>, DistinctError>;
}

// =============================================================================
// FIELD ACCESS
// =============================================================================

/// Name of the field carrying the reporting context's address.
pub const HIERARCHY_FIELD: &str = "hierarchy";

/// Typed read access to a report's fields.
pub(crate) struct Fields<'a> {
    report: &'a Report,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(report: &'a Report) -> Self {
        Self { report }
    }

    fn missing(&self, field: &'static str) -> DistinctError {
        DistinctError::MissingField {
            discriminator: self.report.discriminator.clone(),
            field,
        }
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> DistinctError {
        DistinctError::InvalidField {
            discriminator: self.report.discriminator.clone(),
            field,
            reason: reason.into(),
        }
    }

    /// Present and non-null value.
    pub(crate) fn optional(&self, field: &'static str) -> Option<&'a Value> {
        self.report.fields.get(field).filter(|v| !v.is_null())
    }

    pub(crate) fn required(&self, field: &'static str) -> Result<&'a Value, DistinctError> {
        self.optional(field).ok_or_else(|| self.missing(field))
    }

    /// Required field rendered as text.
    pub(crate) fn required_text(&self, field: &'static str) -> Result<String, DistinctError> {
        self.required(field).map(render_value)
    }

    /// Optional field rendered as text.
    pub(crate) fn optional_text(&self, field: &'static str) -> Option<String> {
        self.optional(field).map(render_value)
    }

    /// Required string-typed field.
    pub(crate) fn required_str(&self, field: &'static str) -> Result<&'a str, DistinctError> {
        self.required(field)?
            .as_str()
            .ok_or_else(|| self.invalid(field, "expected a string"))
    }

    /// Optional non-negative integer field.
    pub(crate) fn optional_index(&self, field: &'static str) -> Result<Option<u32>, DistinctError> {
        match self.optional(field) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(field, "expected a slot index")),
        }
    }

    /// Required structural address.
    pub(crate) fn address(&self, field: &'static str) -> Result<Address, DistinctError> {
        Address::parse(self.required_str(field)?)
    }

    /// Optional structural address.
    pub(crate) fn optional_address(
        &self,
        field: &'static str,
    ) -> Result<Option<Address>, DistinctError> {
        match self.optional(field) {
            None => Ok(None),
            Some(Value::String(raw)) => Address::parse(raw).map(Some),
            Some(_) => Err(self.invalid(field, "expected an address string")),
        }
    }

    /// The reporting context's address.
    pub(crate) fn hierarchy(&self) -> Result<Address, DistinctError> {
        self.address(HIERARCHY_FIELD)
    }

    /// Collect the note fields described by `specs`, in order.
    pub(crate) fn collect(&self, specs: &[FieldSpec]) -> Result<Vec<(String, String)>, DistinctError> {
        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            let value = if spec.required {
                Some(self.required_text(spec.key)?)
            } else {
                self.optional_text(spec.key)
            };
            if let Some(value) = value {
                out.push((spec.label.to_string(), value));
            }
        }
        Ok(out)
    }
}

/// Strings verbatim, everything else as compact JSON.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// One report field shown in a note.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Key inside `report.fields`.
    pub key: &'static str,
    /// Label printed in the note.
    pub label: &'static str,
    pub required: bool,
}

impl FieldSpec {
    pub const fn req(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            required: true,
        }
    }

    pub const fn opt(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            required: false,
        }
    }
}

/// Start a note for `report` on `participant`.
pub(crate) fn note_for(participant: &Address, report: &Report, label: &'static str) -> Note {
    Note::new(
        participant.to_string(),
        report.id.clone(),
        report.timestamp.clone(),
        label,
    )
}

// =============================================================================
// NOTE COLORS
// =============================================================================

pub(crate) const WINDOW_COLOR: &str = "Wheat";
pub(crate) const NAVIGATION_COLOR: &str = "LightBlue";
pub(crate) const PROPERTY_COLOR: &str = "LightGray";
pub(crate) const MESSAGING_COLOR: &str = "LightGreen";
pub(crate) const STORAGE_COLOR: &str = "LightYellow";

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use crate::Report;
    use serde_json::Value;

    /// Build a report from a JSON object literal.
    pub(crate) fn report(discriminator: &str, fields: Value) -> Report {
        let fields = match fields {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Report::new(discriminator, 1u64, 100u64, fields)
    }
}
