//! Execution-scoped transaction state.
//!
//! A `TransactionContext` lives for exactly one commit attempt. It holds
//! the snapshot cache (one observed document per key), the name-to-key
//! bindings used to validate spliced sub-trees, the pending write set,
//! and the result set under construction. On retry the context is
//! discarded and rebuilt from fresh reads.

use std::collections::HashMap;

use serde_json::Value;

use crate::document::{DocumentKey, VersionedDocument};
use crate::store::{ConditionalWrite, VersionExpectation};
use crate::txn::{ResultSet, TransactionStatus};

/// Phase of one `execute()` call.
///
/// `Aborted` is a terminal *success*: a continuation declined to proceed
/// and no write reached the store. `Failed` (an error was raised) never
/// appears on a context - the attempt is torn down instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    Building,
    Reading,
    Branching,
    Committing,
    Committed,
    Aborted,
    Failed,
}

impl TransactionPhase {
    /// Returns true if no further transition is allowed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionPhase::Committed | TransactionPhase::Aborted | TransactionPhase::Failed
        )
    }

    /// Returns true if `next` is a legal successor of `self`.
    pub fn can_transition(self, next: TransactionPhase) -> bool {
        use TransactionPhase::*;
        matches!(
            (self, next),
            (Building, Reading)
                | (Reading, Branching)
                | (Reading, Failed)
                | (Branching, Committing)
                | (Branching, Aborted)
                | (Branching, Failed)
                | (Committing, Committed)
                | (Committing, Failed)
        )
    }
}

/// One write waiting for the commit phase.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub name: String,
    pub key: DocumentKey,
    pub document: Value,
    pub expected: VersionExpectation,
}

pub(crate) struct TransactionContext {
    phase: TransactionPhase,
    snapshots: HashMap<DocumentKey, VersionedDocument>,
    step_keys: HashMap<String, DocumentKey>,
    pending: Vec<PendingWrite>,
    pending_index: HashMap<DocumentKey, usize>,
    results: ResultSet,
}

impl TransactionContext {
    pub fn new() -> Self {
        Self {
            phase: TransactionPhase::Building,
            snapshots: HashMap::new(),
            step_keys: HashMap::new(),
            pending: Vec::new(),
            pending_index: HashMap::new(),
            results: ResultSet::new(),
        }
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase
    }

    pub fn advance(&mut self, next: TransactionPhase) {
        debug_assert!(
            self.phase.can_transition(next),
            "invalid phase transition {:?} -> {:?}",
            self.phase,
            next
        );
        self.phase = next;
    }

    /// Returns the snapshot observed for `key`, if the key was read.
    pub fn snapshot(&self, key: &DocumentKey) -> Option<&VersionedDocument> {
        self.snapshots.get(key)
    }

    /// Records the one snapshot this execution will ever observe for
    /// `key`. Later reads of the key are served from here.
    pub fn record_snapshot(&mut self, key: DocumentKey, document: VersionedDocument) {
        self.snapshots.entry(key).or_insert(document);
    }

    /// Returns the key a step name is bound to, if any step used it.
    pub fn key_for(&self, name: &str) -> Option<&DocumentKey> {
        self.step_keys.get(name)
    }

    /// Records a read entry under `name`, binding the name to `key`.
    /// A name already present (a spliced re-read of the same key) is
    /// left untouched.
    pub fn record_read(&mut self, name: &str, key: &DocumentKey, value: Value) {
        self.step_keys
            .entry(name.to_string())
            .or_insert_with(|| key.clone());
        if !self.results.contains(name) {
            self.results.insert_read(name, value);
        }
    }

    /// Folds an update into the pending write set. The last write per
    /// key wins; its condition is the version captured when the key was
    /// first read, or "must not exist" if the key was never read.
    pub fn stage_write(&mut self, name: String, key: DocumentKey, document: Value) {
        let expected = match self.snapshots.get(&key) {
            Some(snapshot) => VersionExpectation::At(snapshot.version()),
            None => VersionExpectation::Absent,
        };
        self.step_keys
            .entry(name.clone())
            .or_insert_with(|| key.clone());

        match self.pending_index.get(&key) {
            Some(&index) => {
                self.pending[index] = PendingWrite {
                    name,
                    key,
                    document,
                    expected,
                };
            }
            None => {
                self.pending_index.insert(key.clone(), self.pending.len());
                self.pending.push(PendingWrite {
                    name,
                    key,
                    document,
                    expected,
                });
            }
        }
    }

    /// Returns true if no write is pending.
    pub fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Builds the conditional batch for an atomic commit.
    pub fn conditional_writes(&self) -> Vec<ConditionalWrite> {
        self.pending
            .iter()
            .map(|write| ConditionalWrite {
                key: write.key.clone(),
                document: write.document.clone(),
                expected: write.expected,
            })
            .collect()
    }

    /// Drains the pending write set.
    pub fn take_pending(&mut self) -> Vec<PendingWrite> {
        self.pending_index.clear();
        std::mem::take(&mut self.pending)
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    /// Upserts a mutated entry for a committed write.
    pub fn record_write(&mut self, name: String, document: Value) {
        self.results.record_write(name, document);
    }

    /// Terminates the attempt and hands back the result set.
    pub fn finish(mut self, status: TransactionStatus) -> ResultSet {
        let phase = match status {
            TransactionStatus::Committed => TransactionPhase::Committed,
            TransactionStatus::Aborted => TransactionPhase::Aborted,
        };
        debug_assert!(self.phase.can_transition(phase) || self.phase == phase);
        self.phase = phase;
        self.results.set_status(status);
        self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Version;
    use serde_json::json;

    fn key(id: &str) -> DocumentKey {
        DocumentKey::new("boosts", id)
    }

    #[test]
    fn test_phase_transitions() {
        use TransactionPhase::*;

        assert!(Building.can_transition(Reading));
        assert!(Reading.can_transition(Branching));
        assert!(Branching.can_transition(Committing));
        assert!(Branching.can_transition(Aborted));
        assert!(Committing.can_transition(Committed));

        assert!(!Building.can_transition(Committing));
        assert!(!Committed.can_transition(Reading));
        assert!(!Aborted.can_transition(Committing));
    }

    #[test]
    fn test_terminal_phases() {
        assert!(TransactionPhase::Committed.is_terminal());
        assert!(TransactionPhase::Aborted.is_terminal());
        assert!(TransactionPhase::Failed.is_terminal());
        assert!(!TransactionPhase::Branching.is_terminal());
    }

    #[test]
    fn test_snapshot_is_recorded_once() {
        let mut ctx = TransactionContext::new();
        let first = VersionedDocument::new(json!(1), Version::first());
        let second = VersionedDocument::new(json!(2), Version::new(2));

        ctx.record_snapshot(key("p1"), first.clone());
        ctx.record_snapshot(key("p1"), second);

        assert_eq!(ctx.snapshot(&key("p1")), Some(&first));
    }

    #[test]
    fn test_stage_write_uses_snapshot_version() {
        let mut ctx = TransactionContext::new();
        ctx.record_snapshot(
            key("p1"),
            VersionedDocument::new(json!({"count": 1}), Version::new(4)),
        );
        ctx.stage_write("boosts".to_string(), key("p1"), json!({"count": 2}));

        let writes = ctx.conditional_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].expected, VersionExpectation::At(Version::new(4)));
    }

    #[test]
    fn test_stage_write_without_read_expects_absence() {
        let mut ctx = TransactionContext::new();
        ctx.stage_write("profile".to_string(), key("p1"), json!({}));

        let writes = ctx.conditional_writes();
        assert_eq!(writes[0].expected, VersionExpectation::Absent);
    }

    #[test]
    fn test_last_write_per_key_wins() {
        let mut ctx = TransactionContext::new();
        ctx.record_snapshot(key("p1"), VersionedDocument::new(json!(0), Version::first()));
        ctx.stage_write("first".to_string(), key("p1"), json!(1));
        ctx.stage_write("second".to_string(), key("p1"), json!(2));
        ctx.stage_write("other".to_string(), key("p2"), json!(3));

        let writes = ctx.conditional_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].document, json!(2));
        assert_eq!(writes[1].document, json!(3));
    }

    #[test]
    fn test_record_read_binds_name_and_keeps_first_entry() {
        let mut ctx = TransactionContext::new();
        ctx.record_read("boosts", &key("p1"), json!(1));
        ctx.record_read("boosts", &key("p1"), json!(2));

        assert_eq!(ctx.key_for("boosts"), Some(&key("p1")));
        assert_eq!(ctx.results().get("boosts").unwrap().value(), &json!(1));
    }

    #[test]
    fn test_finish_sets_status() {
        let mut ctx = TransactionContext::new();
        ctx.advance(TransactionPhase::Reading);
        ctx.advance(TransactionPhase::Branching);

        let results = ctx.finish(TransactionStatus::Aborted);
        assert_eq!(results.status(), TransactionStatus::Aborted);
    }
}
