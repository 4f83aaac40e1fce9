//! The query tree value.

use crate::query::QueryNode;

/// An ordered, side-effect-free description of a transaction.
///
/// Trees are plain values: building one performs no I/O, and a built tree
/// can be logged, inspected, or executed any number of times (the
/// executor re-runs it on commit conflicts). `atomic` decides whether the
/// queued updates commit all-or-nothing or best-effort.
#[derive(Debug, Clone)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
    atomic: bool,
}

impl QueryTree {
    pub(crate) fn new(nodes: Vec<QueryNode>, atomic: bool) -> Self {
        Self { nodes, atomic }
    }

    /// An empty, non-atomic tree. Useful as a no-op continuation result.
    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            atomic: false,
        }
    }

    /// Returns true if the tree commits all-or-nothing.
    #[inline]
    pub fn atomic(&self) -> bool {
        self.atomic
    }

    /// Returns the steps in declaration order.
    #[inline]
    pub fn nodes(&self) -> &[QueryNode] {
        &self.nodes
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the tree has no steps.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the names of all named steps, in declaration order.
    pub fn step_names(&self) -> Vec<&str> {
        self.nodes.iter().filter_map(|node| node.name()).collect()
    }

    pub(crate) fn into_nodes(self) -> Vec<QueryNode> {
        self.nodes
    }
}
