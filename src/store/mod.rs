//! Document store boundary
//!
//! The executor consumes a keyed document store through the
//! [`DocumentStore`] trait and never assumes anything about the engine
//! behind it (replication, disk format, transport). Two operations are
//! required:
//! - `get` - fetch one document with its current version
//! - `commit` - atomically apply a batch of writes, each conditioned on an
//!   expected version
//!
//! [`InMemoryStore`] is the reference implementation, used by tests and
//! embedded deployments.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::document::{DocumentKey, Version, VersionedDocument};

/// Transport or engine failure in the underlying store.
///
/// Store errors are always fatal to the transaction that observes them;
/// the executor never retries through one.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed the request.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// The version condition attached to a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionExpectation {
    /// The key must not exist.
    Absent,
    /// The key must currently be at exactly this version.
    At(Version),
    /// No condition; the write always applies.
    Any,
}

impl VersionExpectation {
    /// Returns true if `current` satisfies this expectation.
    pub fn matches(&self, current: Option<Version>) -> bool {
        match self {
            VersionExpectation::Absent => current.is_none(),
            VersionExpectation::At(version) => current == Some(*version),
            VersionExpectation::Any => true,
        }
    }
}

/// One write in a commit batch.
#[derive(Debug, Clone)]
pub struct ConditionalWrite {
    /// The document address.
    pub key: DocumentKey,
    /// The full replacement payload.
    pub document: Value,
    /// The condition under which the write may apply.
    pub expected: VersionExpectation,
}

/// A keyed document store with per-document version tags.
///
/// Implementations must apply `commit` batches atomically: either every
/// write in the batch applies (and every touched version is bumped), or -
/// when any expectation fails - none do and the call returns `Ok(false)`.
/// A commit future that is dropped before completion must not leave a
/// partial batch behind.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches a document and its current version, or `None` if the key
    /// does not exist.
    async fn get(&self, key: &DocumentKey) -> Result<Option<VersionedDocument>, StoreError>;

    /// Atomically applies `writes` iff every expectation holds.
    ///
    /// Returns `Ok(false)` when a version condition failed (the batch was
    /// not applied), `Ok(true)` when the whole batch applied.
    async fn commit(&self, writes: &[ConditionalWrite]) -> Result<bool, StoreError>;
}
