//! Window property access reports.

use super::{ContextState, FieldSpec, Fields, PROPERTY_COLOR, Processor, note_for};
use crate::diagram::{Arrow, LogEntry};
use crate::{DistinctError, Report};

/// Kind of property access observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyAccess {
    /// `window.closed` read on another window.
    ClosedAccessed,
    WindowPropNew,
    WindowPropChanged,
}

const CLOSED_ACCESSED: &[FieldSpec] = &[FieldSpec::req("closed", "Closed")];

const PROP_NEW: &[FieldSpec] = &[
    FieldSpec::req("prop", "Property"),
    FieldSpec::opt("val", "Value"),
];

const PROP_CHANGED: &[FieldSpec] = &[
    FieldSpec::req("prop", "Property"),
    FieldSpec::opt("oldval", "Old Value"),
    FieldSpec::opt("newval", "New Value"),
];

impl PropertyAccess {
    pub const ALL: [PropertyAccess; 3] = [
        PropertyAccess::ClosedAccessed,
        PropertyAccess::WindowPropNew,
        PropertyAccess::WindowPropChanged,
    ];

    #[must_use]
    pub const fn discriminators(self) -> &'static [&'static str] {
        match self {
            PropertyAccess::ClosedAccessed => &["closedaccessed"],
            PropertyAccess::WindowPropNew => &["windowpropnew"],
            PropertyAccess::WindowPropChanged => &["windowpropchanged"],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PropertyAccess::ClosedAccessed => "Closed Accessed",
            PropertyAccess::WindowPropNew => "Window Property New",
            PropertyAccess::WindowPropChanged => "Window Property Changed",
        }
    }

    const fn fields(self) -> &'static [FieldSpec] {
        match self {
            PropertyAccess::ClosedAccessed => CLOSED_ACCESSED,
            PropertyAccess::WindowPropNew => PROP_NEW,
            PropertyAccess::WindowPropChanged => PROP_CHANGED,
        }
    }

    const fn has_target(self) -> bool {
        matches!(self, PropertyAccess::ClosedAccessed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyProcessor {
    kind: PropertyAccess,
}

impl PropertyProcessor {
    #[must_use]
    pub const fn new(kind: PropertyAccess) -> Self {
        Self { kind }
    }
}

impl Processor for PropertyProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        self.kind.discriminators()
    }

    fn apply(
        &self,
        _state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let address = fields.hierarchy()?;
        let values = fields.collect(self.kind.fields())?;
        let target = if self.kind.has_target() {
            fields.optional_address("targethierarchy")?
        } else {
            None
        };

        let mut note = note_for(&address, report, self.kind.label())
            .color(Some(PROPERTY_COLOR))
            .fields(values);
        if let Some(target) = &target {
            note = note.field("Target", target.to_string());
        }

        let mut entries = vec![LogEntry::from(note)];
        if let Some(target) = target {
            entries.push(Arrow::new(address.to_string(), target.to_string(), self.kind.label()).into());
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::report;
    use serde_json::json;

    #[test]
    fn closed_access_links_accessor_to_target() {
        let mut state = ContextState::default();
        let entries = PropertyProcessor::new(PropertyAccess::ClosedAccessed)
            .apply(
                &mut state,
                &report(
                    "closedaccessed",
                    json!({"hierarchy": "top", "closed": false, "targethierarchy": "top.popups[0]"}),
                ),
            )
            .expect("apply");

        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1],
            LogEntry::Arrow(Arrow::new("top", "top.popups[0]", "Closed Accessed"))
        );
    }

    #[test]
    fn closed_access_without_target_only_annotates() {
        let mut state = ContextState::default();
        let entries = PropertyProcessor::new(PropertyAccess::ClosedAccessed)
            .apply(
                &mut state,
                &report("closedaccessed", json!({"hierarchy": "top", "closed": true})),
            )
            .expect("apply");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn prop_changed_renders_values() {
        let mut state = ContextState::default();
        let entries = PropertyProcessor::new(PropertyAccess::WindowPropChanged)
            .apply(
                &mut state,
                &report(
                    "windowpropchanged",
                    json!({"hierarchy": "top", "prop": "name", "oldval": "", "newval": "idp"}),
                ),
            )
            .expect("apply");
        let LogEntry::Note(note) = &entries[0] else {
            unreachable!("first entry is the note");
        };
        assert_eq!(note.fields.len(), 3);
        assert_eq!(note.fields[2], ("New Value".to_string(), "idp".to_string()));
    }

    #[test]
    fn malformed_target_is_rejected() {
        let mut state = ContextState::default();
        let result = PropertyProcessor::new(PropertyAccess::ClosedAccessed).apply(
            &mut state,
            &report(
                "closedaccessed",
                json!({"hierarchy": "top", "closed": true, "targethierarchy": "opener"}),
            ),
        );
        assert!(result.is_err_and(|e| e.is_data_quality()));
    }
}
