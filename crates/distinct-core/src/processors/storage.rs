//! Client-side storage writes: web storage, cookies and IndexedDB.

use super::{ContextState, FieldSpec, Fields, Processor, STORAGE_COLOR, note_for};
use crate::diagram::LogEntry;
use crate::{DistinctError, Report};

/// Storage area written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    LocalStorage,
    SessionStorage,
    Cookie,
    IndexedDbAdd,
    IndexedDbPut,
}

const WEB_STORAGE: &[FieldSpec] = &[FieldSpec::req("key", "Key"), FieldSpec::opt("val", "Value")];

const COOKIE: &[FieldSpec] = &[FieldSpec::req("cookie", "Cookie")];

const INDEXED_DB: &[FieldSpec] = &[
    FieldSpec::req("val", "Value"),
    FieldSpec::opt("database", "Database"),
    FieldSpec::opt("objectstore", "Object Store"),
    FieldSpec::opt("key", "Key"),
];

impl StorageKind {
    pub const ALL: [StorageKind; 5] = [
        StorageKind::LocalStorage,
        StorageKind::SessionStorage,
        StorageKind::Cookie,
        StorageKind::IndexedDbAdd,
        StorageKind::IndexedDbPut,
    ];

    #[must_use]
    pub const fn discriminators(self) -> &'static [&'static str] {
        match self {
            StorageKind::LocalStorage => &["localstorageset"],
            StorageKind::SessionStorage => &["sessionstorageset"],
            StorageKind::Cookie => &["cookieset"],
            StorageKind::IndexedDbAdd => &["idbadd"],
            StorageKind::IndexedDbPut => &["idbput"],
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            StorageKind::LocalStorage => "LocalStorage Set",
            StorageKind::SessionStorage => "SessionStorage Set",
            StorageKind::Cookie => "Cookie Set",
            StorageKind::IndexedDbAdd | StorageKind::IndexedDbPut => "IndexedDB Set",
        }
    }

    const fn fields(self) -> &'static [FieldSpec] {
        match self {
            StorageKind::LocalStorage | StorageKind::SessionStorage => WEB_STORAGE,
            StorageKind::Cookie => COOKIE,
            StorageKind::IndexedDbAdd | StorageKind::IndexedDbPut => INDEXED_DB,
        }
    }

    /// IndexedDB write method, if any.
    const fn method(self) -> Option<&'static str> {
        match self {
            StorageKind::IndexedDbAdd => Some("add"),
            StorageKind::IndexedDbPut => Some("put"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StorageProcessor {
    kind: StorageKind,
}

impl StorageProcessor {
    #[must_use]
    pub const fn new(kind: StorageKind) -> Self {
        Self { kind }
    }
}

impl Processor for StorageProcessor {
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

        let mut note = note_for(&address, report, self.kind.label()).color(Some(STORAGE_COLOR));
        if let Some(method) = self.kind.method() {
            note = note.field("Method", method);
        }
        Ok(vec![note.fields(values).into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::report;
    use serde_json::json;

    fn note(entries: &[LogEntry]) -> &crate::diagram::Note {
        match &entries[0] {
            LogEntry::Note(note) => note,
            LogEntry::Arrow(_) => unreachable!("storage reports only annotate"),
        }
    }

    #[test]
    fn idb_put_records_method_first() {
        let mut state = ContextState::default();
        let entries = StorageProcessor::new(StorageKind::IndexedDbPut)
            .apply(
                &mut state,
                &report(
                    "idbput",
                    json!({"hierarchy": "top", "val": {"id_token": "x"}, "objectstore": "tokens"}),
                ),
            )
            .expect("apply");

        let note = note(&entries);
        assert_eq!(note.label, "IndexedDB Set");
        assert_eq!(note.fields[0], ("Method".to_string(), "put".to_string()));
        assert_eq!(note.fields[2], ("Object Store".to_string(), "tokens".to_string()));
    }

    #[test]
    fn local_storage_value_is_optional() {
        let mut state = ContextState::default();
        let entries = StorageProcessor::new(StorageKind::LocalStorage)
            .apply(
                &mut state,
                &report("localstorageset", json!({"hierarchy": "top", "key": "state"})),
            )
            .expect("apply");
        assert_eq!(note(&entries).fields.len(), 1);
    }

    #[test]
    fn cookie_requires_cookie() {
        let mut state = ContextState::default();
        assert!(StorageProcessor::new(StorageKind::Cookie)
            .apply(&mut state, &report("cookieset", json!({"hierarchy": "top"})))
            .is_err());
    }
}
