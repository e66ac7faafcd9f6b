//! Statement reports: facts the agent wants recorded for the whole session.

use super::{ContextState, Fields, Processor};
use crate::diagram::LogEntry;
use crate::statements::RESERVED_KEYS;
use crate::{DistinctError, Report};
use serde_json::Value;

/// Merges `key`/`val` into the session's statements. Writes no log entry.
///
/// The session identity keys are refused as an invalid `key`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementProcessor;

impl Processor for StatementProcessor {
    fn discriminators(&self) -> &'static [&'static str] {
        &["report", "statement"]
    }

    fn apply(
        &self,
        state: &mut ContextState,
        report: &Report,
    ) -> Result<Vec<LogEntry>, DistinctError> {
        let fields = Fields::new(report);
        let key = fields.required_str("key")?;
        if RESERVED_KEYS.contains(&key) {
            return Err(fields.invalid("key", format!("'{}' is set by the session", key)));
        }
        let value = fields.optional("val").cloned().unwrap_or(Value::Null);

        state.statements.merge(key, value);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::test_support::report;
    use serde_json::json;

    #[test]
    fn merges_into_statements_without_log_entries() {
        let mut state = ContextState::default();
        let entries = StatementProcessor
            .apply(
                &mut state,
                &report("statement", json!({"key": "sdks", "val": ["google"]})),
            )
            .expect("apply");
        StatementProcessor
            .apply(
                &mut state,
                &report("statement", json!({"key": "sdks", "val": ["apple"]})),
            )
            .expect("apply");

        assert!(entries.is_empty());
        assert_eq!(state.statements.get("sdks"), Some(&json!(["google", "apple"])));
    }

    #[test]
    fn hierarchy_is_not_required() {
        let mut state = ContextState::default();
        assert!(StatementProcessor
            .apply(&mut state, &report("report", json!({"key": "flag"})))
            .is_ok());
        assert_eq!(state.statements.get("flag"), Some(&Value::Null));
    }

    #[test]
    fn session_identity_keys_are_refused() {
        let mut state = ContextState::default();
        state
            .statements
            .merge(crate::statements::SESSION_ID_KEY, json!("s1"));

        for key in RESERVED_KEYS {
            let result = StatementProcessor.apply(
                &mut state,
                &report("statement", json!({"key": key, "val": "forged"})),
            );
            assert!(matches!(
                result,
                Err(DistinctError::InvalidField { field: "key", .. })
            ));
        }
        assert_eq!(state.statements.get("sessionId"), Some(&json!("s1")));
        assert!(state.statements.get("startTime").is_none());
    }

    #[test]
    fn key_is_required() {
        let mut state = ContextState::default();
        assert!(StatementProcessor
            .apply(&mut state, &report("report", json!({"val": 1})))
            .is_err());
        assert!(state.statements.is_empty());
    }
}
