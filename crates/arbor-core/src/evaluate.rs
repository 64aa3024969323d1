//! Dependency-ordered evaluation
//!
//! Runs a [`NodeWorker`] over a set of keys in rounds. Each round
//! dispatches every queued key once, at most `worker_count` at a time.
//! Keys whose worker reports [`Readiness::Pending`] are queued for the
//! next round; the rest retire. A round that retires nothing is a
//! deadlock and ends evaluation with the stuck keys.
//!
//! The engine never inspects what a key refers to: the worker decides
//! readiness on every call, so it must tolerate being invoked again on
//! a key it previously reported pending.
//!
//! Failure policy:
//! - [`WorkerError::Recoverable`] and panics are logged, passed to
//!   [`NodeWorker::on_failure`], and the key retires
//! - [`WorkerError::Fatal`] aborts the round and the run

use crate::error::{EvaluationError, WorkerError};
use async_trait::async_trait;
use futures::FutureExt;
use indexmap::IndexSet;
use std::fmt::Display;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Outcome of one worker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Derived value computed, or intentionally skipped
    Ready,
    /// A dependency is missing; try again next round
    Pending,
}

impl From<bool> for Readiness {
    fn from(ready: bool) -> Self {
        if ready {
            Self::Ready
        } else {
            Self::Pending
        }
    }
}

/// Per-key computation driven by the [`Evaluator`]
#[async_trait]
pub trait NodeWorker<K>: Send + Sync + 'static {
    /// Compute the derived value of `key` if its dependencies are ready
    async fn process(&self, key: &K) -> Result<Readiness, WorkerError>;

    /// Record a recovered failure on `key`
    fn on_failure(&self, _key: &K, _error: &WorkerError) {}
}

/// Counters from one evaluation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub rounds: usize,
    /// Worker invocations across all rounds
    pub dispatched: usize,
    pub retired: usize,
    /// Keys whose worker failed and was recovered
    pub recovered: Vec<String>,
}

/// Round-based scheduler over a bounded worker pool
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    worker_count: usize,
}

impl Evaluator {
    /// `worker_count` is clamped to at least one
    #[inline]
    #[must_use]
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Evaluate every key in `keys` (any order, duplicates ignored)
    ///
    /// # Errors
    /// - [`EvaluationError::DependencyDeadlock`] when a round retires nothing
    /// - [`EvaluationError::WorkerAborted`] on a fatal worker error
    /// - [`EvaluationError::Cancelled`] if the runtime cancels a worker task
    pub async fn run<K, W>(
        &self,
        worker: Arc<W>,
        keys: impl IntoIterator<Item = K>,
    ) -> Result<EvaluationReport, EvaluationError>
    where
        K: Clone + Eq + Hash + Display + Send + Sync + 'static,
        W: NodeWorker<K>,
    {
        let mut queue: IndexSet<K> = keys.into_iter().collect();
        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut report = EvaluationReport::default();

        while !queue.is_empty() {
            report.rounds += 1;
            let round = report.rounds;
            let dispatched = queue.len();
            report.dispatched += dispatched;
            tracing::debug!(round, dispatched, "evaluation round started");

            let mut tasks = JoinSet::new();
            for key in queue.drain(..) {
                let worker = Arc::clone(&worker);
                let semaphore = Arc::clone(&semaphore);
                tasks.spawn(async move {
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => AssertUnwindSafe(worker.process(&key))
                            .catch_unwind()
                            .await
                            .unwrap_or_else(|panic| {
                                Err(WorkerError::Recoverable(panic_message(&*panic)))
                            }),
                        Err(closed) => Err(WorkerError::Fatal(closed.to_string())),
                    };
                    (key, outcome)
                });
            }

            let mut pending = IndexSet::new();
            let mut retired = 0usize;
            while let Some(joined) = tasks.join_next().await {
                let (key, outcome) =
                    joined.map_err(|e| EvaluationError::Cancelled(e.to_string()))?;
                match outcome {
                    Ok(Readiness::Ready) => retired += 1,
                    Ok(Readiness::Pending) => {
                        pending.insert(key);
                    }
                    Err(err @ WorkerError::Recoverable(_)) => {
                        tracing::warn!(node = %key, round, "node worker failed, continuing: {err}");
                        worker.on_failure(&key, &err);
                        report.recovered.push(key.to_string());
                        retired += 1;
                    }
                    Err(WorkerError::Fatal(message)) => {
                        tasks.abort_all();
                        tracing::error!(node = %key, round, "node worker aborted: {message}");
                        return Err(EvaluationError::WorkerAborted {
                            node: key.to_string(),
                            message,
                        });
                    }
                }
            }

            report.retired += retired;
            tracing::debug!(
                round,
                retired,
                pending = pending.len(),
                "evaluation round finished"
            );

            if retired == 0 {
                let stuck: Vec<String> = pending.iter().map(ToString::to_string).collect();
                tracing::error!(round, stuck = stuck.len(), "dependency deadlock");
                return Err(EvaluationError::DependencyDeadlock { stuck, round });
            }
            queue = pending;
        }

        tracing::info!(
            rounds = report.rounds,
            retired = report.retired,
            recovered = report.recovered.len(),
            "evaluation finished"
        );
        Ok(report)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(20)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("worker panicked: {detail}")
}
