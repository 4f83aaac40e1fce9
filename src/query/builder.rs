//! Query tree builder.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::document::{DocumentKey, PayloadProbe};
use crate::errors::{BuildError, QueryError};
use crate::query::{Outcome, QueryNode, QueryTree};
use crate::txn::ResultSet;

/// Accumulates an ordered description of reads, writes, and
/// data-dependent continuations, then produces an immutable [`QueryTree`].
///
/// Methods consume and return the builder for chaining. Problems found
/// while building (duplicate step names, unserializable documents) are
/// remembered and reported by [`build`](QueryBuilder::build), so a
/// malformed tree never reaches the store.
pub struct QueryBuilder {
    nodes: Vec<QueryNode>,
    seen: HashSet<String>,
    atomic: bool,
    error: Option<BuildError>,
}

impl QueryBuilder {
    /// Starts an empty tree. `atomic` decides whether the tree's updates
    /// commit all-or-nothing.
    pub fn new(atomic: bool) -> Self {
        Self {
            nodes: Vec::new(),
            seen: HashSet::new(),
            atomic,
            error: None,
        }
    }

    /// Queues a typed read of `collection/id`, recorded under `name`.
    ///
    /// The read fails at execution time with `NotFound` if the document
    /// is missing, or `TypeMismatch` if the stored payload does not
    /// decode as `T`.
    pub fn get<T: DeserializeOwned>(
        mut self,
        name: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let name = name.into();
        if self.register(&name) {
            self.nodes.push(QueryNode::Get {
                name,
                key: DocumentKey::new(collection, id),
                probe: PayloadProbe::of::<T>(),
            });
        }
        self
    }

    /// Queues a tentative write of `document` to `collection/id`. The
    /// write has no effect until the commit phase.
    pub fn update<T: Serialize>(
        self,
        name: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
        document: &T,
    ) -> Self {
        let name = name.into();
        match serde_json::to_value(document) {
            Ok(value) => self.update_value(name, collection, id, value),
            Err(error) => self.fail(BuildError::Serialize {
                name,
                reason: error.to_string(),
            }),
        }
    }

    /// Queues a tentative write of an already-serialized payload.
    pub fn update_value(
        mut self,
        name: impl Into<String>,
        collection: impl Into<String>,
        id: impl Into<String>,
        document: Value,
    ) -> Self {
        let name = name.into();
        if self.register(&name) {
            self.nodes.push(QueryNode::Update {
                name,
                key: DocumentKey::new(collection, id),
                document,
            });
        }
        self
    }

    /// Queues a data-dependent step. The continuation receives the
    /// result set accumulated so far and returns an [`Outcome`]: either a
    /// sub-tree to splice into the same transaction scope, or an abort.
    ///
    /// Continuations may run once per commit attempt, so they must be
    /// pure with respect to everything except the store.
    pub fn then<F>(mut self, continuation: F) -> Self
    where
        F: Fn(&ResultSet) -> Result<Outcome, QueryError> + Send + Sync + 'static,
    {
        self.nodes.push(QueryNode::Then {
            run: Arc::new(continuation),
        });
        self
    }

    /// Produces the immutable tree, or the first error found while
    /// building.
    pub fn build(self) -> Result<QueryTree, BuildError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(QueryTree::new(self.nodes, self.atomic)),
        }
    }

    fn register(&mut self, name: &str) -> bool {
        if self.error.is_some() {
            return false;
        }
        if !self.seen.insert(name.to_string()) {
            self.error = Some(BuildError::DuplicateStep(name.to_string()));
            return false;
        }
        true
    }

    fn fail(mut self, error: BuildError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chaining_builds_ordered_tree() {
        let tree = QueryBuilder::new(true)
            .get::<Value>("inventory", "inventory", "p1")
            .get::<Value>("boosts", "boosts", "p1")
            .then(|_| Ok(Outcome::Abort))
            .build()
            .unwrap();

        let kinds: Vec<_> = tree.nodes().iter().map(|node| node.kind()).collect();
        assert_eq!(kinds, vec!["get", "get", "then"]);
    }

    #[test]
    fn test_duplicate_get_name_is_a_build_error() {
        let result = QueryBuilder::new(true)
            .get::<Value>("boosts", "boosts", "p1")
            .get::<Value>("boosts", "boosts", "p2")
            .build();

        assert_eq!(
            result.unwrap_err(),
            BuildError::DuplicateStep("boosts".to_string())
        );
    }

    #[test]
    fn test_get_then_update_with_same_name_is_a_build_error() {
        let result = QueryBuilder::new(true)
            .get::<Value>("boosts", "boosts", "p1")
            .update("boosts", "boosts", "p1", &json!({}))
            .build();

        assert!(matches!(result, Err(BuildError::DuplicateStep(_))));
    }

    #[test]
    fn test_first_error_wins() {
        let result = QueryBuilder::new(true)
            .get::<Value>("a", "boosts", "p1")
            .get::<Value>("a", "boosts", "p1")
            .get::<Value>("a", "boosts", "p1")
            .build();

        assert_eq!(result.unwrap_err(), BuildError::DuplicateStep("a".to_string()));
    }

    #[test]
    fn test_unserializable_document_is_a_build_error() {
        let mut broken = std::collections::HashMap::new();
        broken.insert(vec![1u8], "non-string keys do not serialize to JSON");

        let result = QueryBuilder::new(true)
            .update("profile", "profile", "p1", &broken)
            .build();

        match result {
            Err(BuildError::Serialize { name, .. }) => assert_eq!(name, "profile"),
            other => panic!("expected Serialize error, got {:?}", other),
        }
    }

    #[test]
    fn test_building_touches_no_store() {
        // A tree over keys that exist nowhere still builds fine.
        let tree = QueryBuilder::new(false)
            .get::<Value>("ghost", "nowhere", "nobody")
            .update("shadow", "nowhere", "nobody", &json!(null))
            .build()
            .unwrap();

        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_update_value_accepts_raw_payload() {
        let tree = QueryBuilder::new(true)
            .update_value("boosts", "boosts", "p1", json!({"active": []}))
            .build()
            .unwrap();

        assert_eq!(tree.step_names(), vec!["boosts"]);
    }
}
