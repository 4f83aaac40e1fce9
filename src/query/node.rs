//! Query step variants.
//!
//! Every step a transaction can take is an explicit tagged variant
//! interpreted by the executor, so a tree can be printed, inspected, and
//! re-run across commit retries. Continuations are the one place a
//! closure is unavoidable; they are held behind `Arc` so trees stay
//! cheap to clone, and Debug output never exposes them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::{DocumentKey, PayloadProbe};
use crate::errors::QueryError;
use crate::query::QueryTree;
use crate::txn::ResultSet;

/// What a continuation decided after inspecting the results so far.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Splice the given sub-tree into the current transaction scope.
    Continue(QueryTree),
    /// Stop the transaction: discard every pending write and report
    /// success with zero mutations.
    Abort,
}

/// A data-dependent step: receives the accumulated result set and
/// decides how the transaction proceeds. Decode failures and malformed
/// sub-trees propagate as errors and fail the whole transaction.
pub type Continuation = Arc<dyn Fn(&ResultSet) -> Result<Outcome, QueryError> + Send + Sync>;

/// One step in a query tree.
#[derive(Clone)]
pub enum QueryNode {
    /// Read a document and record it under `name`, checking that the
    /// payload decodes as the probed type.
    Get {
        name: String,
        key: DocumentKey,
        probe: PayloadProbe,
    },
    /// Tentatively replace a document. Nothing reaches the store until
    /// the commit phase.
    Update {
        name: String,
        key: DocumentKey,
        document: Value,
    },
    /// Run a continuation against the results accumulated so far.
    Then { run: Continuation },
}

impl QueryNode {
    /// Returns the step name, if this step kind carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            QueryNode::Get { name, .. } | QueryNode::Update { name, .. } => Some(name),
            QueryNode::Then { .. } => None,
        }
    }

    /// Returns the step kind for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryNode::Get { .. } => "get",
            QueryNode::Update { .. } => "update",
            QueryNode::Then { .. } => "then",
        }
    }
}

impl fmt::Debug for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Get { name, key, probe } => f
                .debug_struct("Get")
                .field("name", name)
                .field("key", &key.to_string())
                .field("type", &probe.type_name())
                .finish(),
            QueryNode::Update { name, key, .. } => f
                .debug_struct("Update")
                .field("name", name)
                .field("key", &key.to_string())
                .finish(),
            QueryNode::Then { .. } => f.write_str("Then"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kinds() {
        let get = QueryNode::Get {
            name: "boosts".to_string(),
            key: DocumentKey::new("boosts", "p1"),
            probe: PayloadProbe::of::<Value>(),
        };
        let update = QueryNode::Update {
            name: "boosts".to_string(),
            key: DocumentKey::new("boosts", "p1"),
            document: json!({}),
        };
        let then = QueryNode::Then {
            run: Arc::new(|_| Ok(Outcome::Abort)),
        };

        assert_eq!(get.kind(), "get");
        assert_eq!(update.kind(), "update");
        assert_eq!(then.kind(), "then");
    }

    #[test]
    fn test_names() {
        let get = QueryNode::Get {
            name: "inventory".to_string(),
            key: DocumentKey::new("inventory", "p1"),
            probe: PayloadProbe::of::<Value>(),
        };
        let then = QueryNode::Then {
            run: Arc::new(|_| Ok(Outcome::Abort)),
        };

        assert_eq!(get.name(), Some("inventory"));
        assert_eq!(then.name(), None);
    }

    #[test]
    fn test_debug_never_exposes_continuations() {
        let then = QueryNode::Then {
            run: Arc::new(|_| Ok(Outcome::Abort)),
        };
        assert_eq!(format!("{:?}", then), "Then");
    }

    #[test]
    fn test_debug_shows_key_and_type() {
        let get = QueryNode::Get {
            name: "boosts".to_string(),
            key: DocumentKey::new("boosts", "p1"),
            probe: PayloadProbe::of::<Value>(),
        };
        let debug = format!("{:?}", get);
        assert!(debug.contains("boosts/p1"));
        assert!(debug.contains("Value"));
    }

    #[test]
    fn test_clone_shares_continuation() {
        let run: Continuation = Arc::new(|_| Ok(Outcome::Abort));
        let node = QueryNode::Then { run };
        let cloned = node.clone();

        match (&node, &cloned) {
            (QueryNode::Then { run: a }, QueryNode::Then { run: b }) => {
                assert!(Arc::ptr_eq(a, b));
            }
            _ => unreachable!(),
        }
    }
}
