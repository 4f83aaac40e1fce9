//! Transaction metrics registry.
//!
//! - Counters only (no gauges, no histograms)
//! - Monotonic increase
//! - Reset only on process start
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for an executor.
///
/// All counters use atomic operations with Relaxed ordering; eventual
/// consistency is fine for metrics.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// `execute()` calls started
    executions: AtomicU64,
    /// Transactions ending in a commit (including zero-write commits)
    commits: AtomicU64,
    /// Transactions ending in a continuation abort
    aborts: AtomicU64,
    /// Optimistic commit checks that failed
    conflicts: AtomicU64,
    /// Attempts re-run after a conflict
    retries: AtomicU64,
    /// Calls that surfaced an error
    failures: AtomicU64,
    /// Documents fetched from the store (snapshot cache misses)
    documents_read: AtomicU64,
    /// Documents written by commits
    documents_written: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_executions(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_aborts(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_documents_read(&self) {
        self.documents_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_documents_written(&self, count: u64) {
        self.documents_written.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current values as JSON.
    pub fn to_json(&self) -> String {
        format!(
            r#"{{"executions":{},"commits":{},"aborts":{},"conflicts":{},"retries":{},"failures":{},"documents_read":{},"documents_written":{}}}"#,
            self.executions.load(Ordering::Relaxed),
            self.commits.load(Ordering::Relaxed),
            self.aborts.load(Ordering::Relaxed),
            self.conflicts.load(Ordering::Relaxed),
            self.retries.load(Ordering::Relaxed),
            self.failures.load(Ordering::Relaxed),
            self.documents_read.load(Ordering::Relaxed),
            self.documents_written.load(Ordering::Relaxed),
        )
    }

    /// Get all counters as a point-in-time snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            executions: self.executions.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            aborts: self.aborts.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            documents_read: self.documents_read.load(Ordering::Relaxed),
            documents_written: self.documents_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub executions: u64,
    pub commits: u64,
    pub aborts: u64,
    pub conflicts: u64,
    pub retries: u64,
    pub failures: u64,
    pub documents_read: u64,
    pub documents_written: u64,
}
