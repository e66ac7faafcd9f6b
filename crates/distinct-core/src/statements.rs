//! # Session Statements
//!
//! Free-form, session-scoped facts (detected SDK flows, login buttons, ...)
//! kept next to the per-report log. The mapping only grows: values are
//! merged, never deleted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Statement key holding the session identifier.
pub const SESSION_ID_KEY: &str = "sessionId";
/// Statement key holding the session start time (ms since the epoch).
pub const START_TIME_KEY: &str = "startTime";
/// Statement key holding the URL the browser was started with.
pub const INITIAL_URL_KEY: &str = "initialUrl";

/// Keys seeded from [`SessionInfo`]; reports cannot overwrite them.
pub const RESERVED_KEYS: [&str; 3] = [SESSION_ID_KEY, START_TIME_KEY, INITIAL_URL_KEY];

/// Identity of one analysis session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    /// Milliseconds since the Unix epoch.
    pub start_time: u64,
    pub initial_url: Option<String>,
}

impl SessionInfo {
    #[must_use]
    pub fn new(session_id: impl Into<String>, start_time: u64) -> Self {
        Self {
            session_id: session_id.into(),
            start_time,
            initial_url: None,
        }
    }

    #[must_use]
    pub fn with_initial_url(mut self, url: impl Into<String>) -> Self {
        self.initial_url = Some(url.into());
        self
    }
}

/// The statement mapping of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Statements(BTreeMap<String, Value>);

impl Statements {
    /// Mapping seeded with the session's identity.
    #[must_use]
    pub fn seeded(info: &SessionInfo) -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            SESSION_ID_KEY.to_string(),
            Value::String(info.session_id.clone()),
        );
        map.insert(START_TIME_KEY.to_string(), Value::from(info.start_time));
        map.insert(
            INITIAL_URL_KEY.to_string(),
            info.initial_url
                .as_ref()
                .map_or(Value::Null, |url| Value::String(url.clone())),
        );
        Self(map)
    }

    /// Merge `value` into the statement named `key`.
    ///
    /// - an existing array is extended (a non-array value is appended)
    /// - two objects are merged key by key, the new side winning
    /// - anything else replaces the previous value
    pub fn merge(&mut self, key: &str, value: Value) {
        let slot = self.0.entry(key.to_string()).or_insert(Value::Null);
        match (slot, value) {
            (Value::Array(existing), Value::Array(items)) => existing.extend(items),
            (Value::Array(existing), item) => existing.push(item),
            (Value::Object(existing), Value::Object(incoming)) => existing.extend(incoming),
            (slot, value) => *slot = value,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for Statements {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
