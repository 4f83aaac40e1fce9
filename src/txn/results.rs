//! Per-step transaction outcomes.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::QueryError;

/// Terminal state of a successful execution.
///
/// `Aborted` is a success: a continuation declined to proceed, every
/// pending write was discarded, and zero documents were mutated. Callers
/// distinguish it from `Committed` by inspecting the result set, never by
/// error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Every queued write reached the store.
    Committed,
    /// A continuation aborted; nothing reached the store.
    Aborted,
}

/// The outcome of one named step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    name: String,
    value: Value,
    mutated: bool,
}

impl StepResult {
    /// Returns the step's value: the snapshot a read observed, or the
    /// document a committed update wrote.
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Returns true if this step's document was written by the commit.
    #[inline]
    pub fn mutated(&self) -> bool {
        self.mutated
    }

    /// Decodes the value as `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, QueryError> {
        serde_json::from_value(self.value.clone()).map_err(|error| QueryError::TypeMismatch {
            name: self.name.clone(),
            type_name: std::any::type_name::<T>(),
            reason: error.to_string(),
        })
    }
}

/// Mapping from step name to outcome, in deterministic (name) order.
///
/// A name is present only if its step actually ran on the executed path:
/// steps superseded by an abort never appear, and update entries are
/// recorded only once the commit applied them.
#[derive(Debug, Clone)]
pub struct ResultSet {
    entries: BTreeMap<String, StepResult>,
    status: TransactionStatus,
}

impl ResultSet {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            status: TransactionStatus::Committed,
        }
    }

    /// Returns the outcome of the named step, or `MissingStep` if that
    /// step never ran (for example, it sat behind an abort).
    pub fn get(&self, name: &str) -> Result<&StepResult, QueryError> {
        self.entries.get(name).ok_or_else(|| QueryError::MissingStep {
            name: name.to_string(),
        })
    }

    /// Returns the outcome of the named step, if it ran.
    pub fn try_get(&self, name: &str) -> Option<&StepResult> {
        self.entries.get(name)
    }

    /// Returns how the transaction ended.
    #[inline]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Returns the names of all steps that ran, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Returns the change manifest: sorted names of every step whose
    /// document was written. The API layer turns this into the `updates`
    /// list clients use for cache invalidation.
    pub fn updates(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, step)| step.mutated)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Returns the number of steps that ran.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no step produced an entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn insert_read(&mut self, name: &str, value: Value) {
        self.entries.insert(
            name.to_string(),
            StepResult {
                name: name.to_string(),
                value,
                mutated: false,
            },
        );
    }

    pub(crate) fn record_write(&mut self, name: String, value: Value) {
        self.entries.insert(
            name.clone(),
            StepResult {
                name,
                value,
                mutated: true,
            },
        );
    }

    pub(crate) fn set_status(&mut self, status: TransactionStatus) {
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_get_missing_step() {
        let results = ResultSet::new();
        let error = results.get("boosts").unwrap_err();
        assert_eq!(error.code(), "GAIA_RESULT_MISSING_STEP");
        assert!(results.try_get("boosts").is_none());
    }

    #[test]
    fn test_read_entries_are_not_mutated() {
        let mut results = ResultSet::new();
        results.insert_read("boosts", json!({"active": []}));

        let step = results.get("boosts").unwrap();
        assert!(!step.mutated());
        assert_eq!(step.value()["active"], json!([]));
        assert!(results.updates().is_empty());
    }

    #[test]
    fn test_record_write_marks_entry_mutated() {
        let mut results = ResultSet::new();
        results.insert_read("boosts", json!({"active": []}));
        results.record_write("boosts".to_string(), json!({"active": [1]}));

        let step = results.get("boosts").unwrap();
        assert!(step.mutated());
        assert_eq!(step.value()["active"], json!([1]));
        assert_eq!(results.updates(), vec!["boosts"]);
    }

    #[test]
    fn test_updates_are_sorted() {
        let mut results = ResultSet::new();
        results.record_write("inventory".to_string(), json!(1));
        results.record_write("boosts".to_string(), json!(2));
        results.insert_read("profile", json!(3));

        assert_eq!(results.updates(), vec!["boosts", "inventory"]);
        assert_eq!(results.names().collect::<Vec<_>>(), vec!["boosts", "inventory", "profile"]);
    }

    #[derive(Debug, Deserialize)]
    struct Counter {
        count: u32,
    }

    #[test]
    fn test_decode_typed_value() {
        let mut results = ResultSet::new();
        results.insert_read("counter", json!({"count": 41}));

        let counter: Counter = results.get("counter").unwrap().decode().unwrap();
        assert_eq!(counter.count, 41);
    }

    #[test]
    fn test_decode_wrong_shape_reports_type_mismatch() {
        let mut results = ResultSet::new();
        results.insert_read("counter", json!({"level": 1}));

        let error = results.get("counter").unwrap().decode::<Counter>().unwrap_err();
        assert_eq!(error.code(), "GAIA_DOC_TYPE_MISMATCH");
    }

    #[test]
    fn test_status_defaults_to_committed() {
        let mut results = ResultSet::new();
        assert_eq!(results.status(), TransactionStatus::Committed);

        results.set_status(TransactionStatus::Aborted);
        assert_eq!(results.status(), TransactionStatus::Aborted);
    }
}
