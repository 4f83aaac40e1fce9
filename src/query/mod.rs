//! Query composition
//!
//! A transaction is declared as a pure value before it ever touches
//! storage:
//! - `QueryBuilder` - accumulates reads, writes, and continuations
//! - `QueryTree` - the immutable, inspectable result
//! - `QueryNode` - the tagged step variants the executor interprets
//! - `Outcome` - what a continuation returns: continue with a sub-tree,
//!   or abort with zero mutations
//!
//! Trees perform no I/O and require no synchronization: they are built,
//! handed to the executor, and may be interpreted several times if the
//! optimistic commit retries.

mod builder;
mod node;
mod tree;

pub use builder::QueryBuilder;
pub use node::{Continuation, Outcome, QueryNode};
pub use tree::QueryTree;
