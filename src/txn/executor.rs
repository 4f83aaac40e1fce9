//! Transaction executor.
//!
//! Interprets a [`QueryTree`] against a [`DocumentStore`]:
//! - Reading: every top-level read is snapshotted before any branching
//! - Branching: continuations run in declaration order; the sub-trees
//!   they return are spliced into the same transaction scope,
//!   depth-first, until no continuation remains
//! - Committing: atomic trees commit all pending writes in one batch,
//!   each conditioned on the version observed at first read; a failed
//!   condition re-runs the whole tree with fresh snapshots under the
//!   retry policy
//!
//! Nothing outside a successful commit is ever visible in the store, and
//! an abort is a successful outcome with zero mutations.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::document::{DocumentKey, PayloadProbe};
use crate::errors::{BuildError, QueryError};
use crate::observability::{Logger, MetricsRegistry};
use crate::query::{Outcome, QueryNode, QueryTree};
use crate::store::{ConditionalWrite, DocumentStore, StoreError, VersionExpectation};
use crate::txn::context::{TransactionContext, TransactionPhase};
use crate::txn::{ResultSet, RetryPolicy, TransactionStatus};

/// Executor tuning knobs.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    retry: RetryPolicy,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

enum AttemptOutcome {
    Done(ResultSet),
    Conflict,
}

/// Interprets query trees against a document store.
///
/// Executors are cheap to share (`Arc` the store, atomic metrics) and
/// every `execute` call is independent: concurrent calls against the
/// same store never block each other.
pub struct TransactionExecutor {
    store: Arc<dyn DocumentStore>,
    config: ExecutorConfig,
    metrics: Arc<MetricsRegistry>,
}

impl TransactionExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: ExecutorConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Returns the executor's metrics registry.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Executes `tree`, bounded by `timeout`.
    ///
    /// The deadline covers the whole call, backoff sleeps included. On
    /// expiry nothing has been committed and `Timeout` is raised.
    pub async fn execute(
        &self,
        tree: &QueryTree,
        timeout: Duration,
    ) -> Result<ResultSet, QueryError> {
        self.metrics.increment_executions();

        let outcome = match tokio::time::timeout(timeout, self.run(tree)).await {
            Ok(result) => result,
            Err(_) => Err(QueryError::Timeout { timeout }),
        };

        if let Err(error) = &outcome {
            self.metrics.increment_failures();
            let message = error.to_string();
            Logger::error(
                "TXN_FAILED",
                &[("code", error.code()), ("error", message.as_str())],
            );
        }

        outcome
    }

    async fn run(&self, tree: &QueryTree) -> Result<ResultSet, QueryError> {
        let txn_id = Uuid::new_v4().to_string();
        let atomic = tree.atomic().to_string();
        let steps = tree.len().to_string();
        Logger::trace(
            "TXN_START",
            &[
                ("atomic", atomic.as_str()),
                ("steps", steps.as_str()),
                ("txn", txn_id.as_str()),
            ],
        );

        let retry = self.config.retry().clone();
        let max_attempts = retry.max_attempts().max(1);

        for attempt in 1..=max_attempts {
            match self.attempt(tree).await? {
                AttemptOutcome::Done(results) => {
                    let updates = results.updates().len().to_string();
                    match results.status() {
                        TransactionStatus::Committed => {
                            self.metrics.increment_commits();
                            Logger::info(
                                "TXN_COMMITTED",
                                &[("txn", txn_id.as_str()), ("updates", updates.as_str())],
                            );
                        }
                        TransactionStatus::Aborted => {
                            self.metrics.increment_aborts();
                            Logger::info("TXN_ABORTED", &[("txn", txn_id.as_str())]);
                        }
                    }
                    return Ok(results);
                }
                AttemptOutcome::Conflict => {
                    self.metrics.increment_conflicts();
                    if attempt < max_attempts {
                        self.metrics.increment_retries();
                        let delay = retry.delay_for(attempt);
                        let attempt_field = attempt.to_string();
                        let delay_field = delay.as_millis().to_string();
                        Logger::warn(
                            "TXN_CONFLICT",
                            &[
                                ("attempt", attempt_field.as_str()),
                                ("delay_ms", delay_field.as_str()),
                                ("txn", txn_id.as_str()),
                            ],
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(QueryError::Conflict {
            attempts: max_attempts,
        })
    }

    /// Runs the tree once against fresh snapshots.
    async fn attempt(&self, tree: &QueryTree) -> Result<AttemptOutcome, QueryError> {
        let mut ctx = TransactionContext::new();

        ctx.advance(TransactionPhase::Reading);
        for node in tree.nodes() {
            if let QueryNode::Get { name, key, probe } = node {
                self.read_step(&mut ctx, name, key, *probe).await?;
            }
        }

        ctx.advance(TransactionPhase::Branching);
        let mut queue: VecDeque<QueryNode> = tree.nodes().iter().cloned().collect();
        while let Some(node) = queue.pop_front() {
            match node {
                QueryNode::Get { name, key, probe } => {
                    match ctx.key_for(&name) {
                        // Already resolved (a top-level read, or a spliced
                        // re-read of the same key): nothing to do.
                        Some(existing) if existing == &key => {}
                        Some(existing) => {
                            return Err(BuildError::NameKeyMismatch {
                                name,
                                existing: existing.clone(),
                                conflicting: key,
                            }
                            .into());
                        }
                        None => self.read_step(&mut ctx, &name, &key, probe).await?,
                    }
                }
                QueryNode::Update { name, key, document } => {
                    if let Some(existing) = ctx.key_for(&name) {
                        if existing != &key {
                            return Err(BuildError::NameKeyMismatch {
                                name,
                                existing: existing.clone(),
                                conflicting: key,
                            }
                            .into());
                        }
                    }
                    ctx.stage_write(name, key, document);
                }
                QueryNode::Then { run } => match (*run)(ctx.results())? {
                    Outcome::Abort => {
                        return Ok(AttemptOutcome::Done(
                            ctx.finish(TransactionStatus::Aborted),
                        ));
                    }
                    Outcome::Continue(subtree) => {
                        // Depth-first: the sub-tree runs before anything
                        // already queued behind this continuation.
                        for spliced in subtree.into_nodes().into_iter().rev() {
                            queue.push_front(spliced);
                        }
                    }
                },
            }
        }

        ctx.advance(TransactionPhase::Committing);
        if ctx.pending_is_empty() {
            return Ok(AttemptOutcome::Done(
                ctx.finish(TransactionStatus::Committed),
            ));
        }

        if tree.atomic() {
            self.commit_atomic(ctx).await
        } else {
            self.commit_relaxed(ctx).await
        }
    }

    /// Reads a key (or serves the execution's snapshot of it), checks
    /// the payload shape, and records the result entry.
    async fn read_step(
        &self,
        ctx: &mut TransactionContext,
        name: &str,
        key: &DocumentKey,
        probe: PayloadProbe,
    ) -> Result<(), QueryError> {
        let document = match ctx.snapshot(key) {
            Some(snapshot) => snapshot.clone(),
            None => {
                let fetched = self
                    .store
                    .get(key)
                    .await?
                    .ok_or_else(|| QueryError::NotFound { key: key.clone() })?;
                self.metrics.increment_documents_read();
                ctx.record_snapshot(key.clone(), fetched.clone());
                fetched
            }
        };

        probe
            .check(document.payload())
            .map_err(|error| QueryError::TypeMismatch {
                name: name.to_string(),
                type_name: probe.type_name(),
                reason: error.to_string(),
            })?;

        ctx.record_read(name, key, document.payload().clone());
        Ok(())
    }

    /// Commits the pending writes as one conditioned batch.
    async fn commit_atomic(
        &self,
        mut ctx: TransactionContext,
    ) -> Result<AttemptOutcome, QueryError> {
        debug_assert_eq!(ctx.phase(), TransactionPhase::Committing);

        let writes = ctx.conditional_writes();
        let applied = self.store.commit(&writes).await?;
        if !applied {
            return Ok(AttemptOutcome::Conflict);
        }

        self.metrics.add_documents_written(writes.len() as u64);
        for write in ctx.take_pending() {
            ctx.record_write(write.name, write.document);
        }
        Ok(AttemptOutcome::Done(
            ctx.finish(TransactionStatus::Committed),
        ))
    }

    /// Applies pending writes independently, with no version conditions
    /// and no rollback: a transport failure partway leaves the earlier
    /// writes committed.
    async fn commit_relaxed(
        &self,
        mut ctx: TransactionContext,
    ) -> Result<AttemptOutcome, QueryError> {
        debug_assert_eq!(ctx.phase(), TransactionPhase::Committing);

        for write in ctx.take_pending() {
            let conditional = ConditionalWrite {
                key: write.key.clone(),
                document: write.document.clone(),
                expected: VersionExpectation::Any,
            };
            let applied = self.store.commit(std::slice::from_ref(&conditional)).await?;
            if !applied {
                return Err(QueryError::Connectivity(StoreError::Backend(format!(
                    "unconditional write to {} rejected",
                    write.key
                ))));
            }
            self.metrics.add_documents_written(1);
            ctx.record_write(write.name, write.document);
        }

        Ok(AttemptOutcome::Done(
            ctx.finish(TransactionStatus::Committed),
        ))
    }
}
