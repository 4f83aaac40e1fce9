//! Error taxonomy for query building and execution.
//!
//! Build problems surface before any I/O; everything else is an execution
//! failure. The abort idiom is deliberately absent here: an aborted
//! transaction is a *successful* outcome with zero mutations, reported
//! through the result set rather than through an error.

use std::time::Duration;

use thiserror::Error;

use crate::document::DocumentKey;
use crate::store::StoreError;

/// A malformed query tree, detected without touching the store.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BuildError {
    /// The same step name was used twice in one tree.
    #[error("duplicate step name '{0}' in query tree")]
    DuplicateStep(String),

    /// A spliced sub-tree reused a step name for a different document.
    #[error("step name '{name}' reused for a different document (bound to {existing}, got {conflicting})")]
    NameKeyMismatch {
        name: String,
        existing: DocumentKey,
        conflicting: DocumentKey,
    },

    /// A document handed to an update step could not be serialized.
    #[error("cannot serialize document for step '{name}': {reason}")]
    Serialize { name: String, reason: String },
}

/// Execution failure of a query tree.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The tree (or a continuation-produced sub-tree) was malformed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A read step targeted a document that does not exist.
    #[error("document not found: {key}")]
    NotFound { key: DocumentKey },

    /// A stored payload did not decode as the type a step asked for.
    #[error("step '{name}': stored document does not decode as {type_name}: {reason}")]
    TypeMismatch {
        name: String,
        type_name: &'static str,
        reason: String,
    },

    /// The optimistic commit check kept failing past the retry budget.
    #[error("optimistic commit failed after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The underlying store transport failed. Fatal to the call.
    #[error("document store failure: {0}")]
    Connectivity(#[from] StoreError),

    /// The caller-supplied deadline expired before the transaction
    /// reached a terminal state. Nothing was committed.
    #[error("transaction deadline of {timeout:?} expired")]
    Timeout { timeout: Duration },

    /// A result entry was requested for a step that never ran.
    #[error("no result entry for step '{name}'")]
    MissingStep { name: String },
}

impl QueryError {
    /// Stable error code for API responses and structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Build(_) => "GAIA_QUERY_BUILD",
            QueryError::NotFound { .. } => "GAIA_DOC_NOT_FOUND",
            QueryError::TypeMismatch { .. } => "GAIA_DOC_TYPE_MISMATCH",
            QueryError::Conflict { .. } => "GAIA_TXN_CONFLICT",
            QueryError::Connectivity(_) => "GAIA_STORE_UNAVAILABLE",
            QueryError::Timeout { .. } => "GAIA_TXN_TIMEOUT",
            QueryError::MissingStep { .. } => "GAIA_RESULT_MISSING_STEP",
        }
    }

    /// HTTP status the API layer maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::Build(_) => 400,
            QueryError::NotFound { .. } => 404,
            QueryError::TypeMismatch { .. } => 500,
            QueryError::Conflict { .. } => 409,
            QueryError::Connectivity(_) => 503,
            QueryError::Timeout { .. } => 504,
            QueryError::MissingStep { .. } => 500,
        }
    }
}
