//! gaiadb - a transactional document engine for persistent-world game
//! backends.
//!
//! Route handlers declare a multi-step read-modify-write operation as a
//! pure [`QueryTree`] value - including steps whose later reads and
//! writes depend on earlier reads - and hand it to the
//! [`TransactionExecutor`], which runs it against a [`DocumentStore`]
//! with atomicity and optimistic-concurrency guarantees and reports
//! exactly which documents were mutated in a [`ResultSet`].

pub mod document;
pub mod errors;
pub mod observability;
pub mod query;
pub mod session;
pub mod store;
pub mod txn;

pub use document::{DocumentKey, PayloadProbe, Version, VersionedDocument};
pub use errors::{BuildError, QueryError};
pub use query::{Outcome, QueryBuilder, QueryNode, QueryTree};
pub use session::{SessionError, SessionRegistry};
pub use store::{ConditionalWrite, DocumentStore, InMemoryStore, StoreError, VersionExpectation};
pub use txn::{
    ExecutorConfig, ResultSet, RetryPolicy, StepResult, TransactionExecutor, TransactionPhase,
    TransactionStatus,
};
