use arbor_core::{EvaluationError, Evaluator, NodeWorker, Readiness, WorkerError};
use arbor_test_utils::DependencyWorker;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// root <- {intro, method}; method <- {m1, m2}
fn paper_dependencies() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        ("root", vec!["intro", "method"]),
        ("method", vec!["m1", "m2"]),
        ("intro", vec![]),
        ("m1", vec![]),
        ("m2", vec![]),
    ]
}

#[tokio::test]
async fn test_bottom_up_completion() {
    let worker = Arc::new(DependencyWorker::new(paper_dependencies()));
    // root first: worst case for a bottom-up computation
    let keys = ["root", "method", "intro", "m1", "m2"];

    let report = Evaluator::new(4)
        .run(Arc::clone(&worker), keys)
        .await
        .unwrap();

    assert!(keys.iter().all(|k| worker.is_retired(k)));
    assert_eq!(report.retired, 5);
    assert!(report.rounds <= 3, "rounds: {}", report.rounds);
    assert!(report.recovered.is_empty());
    assert_eq!(worker.invocations(&"m1"), 1);
    assert!(worker.invocations(&"root") <= report.rounds);
}

#[tokio::test]
async fn test_duplicate_keys_dispatch_once() {
    let worker = Arc::new(
        DependencyWorker::new([("a", vec![]), ("b", vec![])])
            .with_delay(Duration::from_millis(20)),
    );

    let report = Evaluator::new(8)
        .run(Arc::clone(&worker), ["a", "b", "a", "a", "b"])
        .await
        .unwrap();

    assert_eq!(report.dispatched, 2);
    assert_eq!(worker.invocations(&"a"), 1);
    assert_eq!(worker.invocations(&"b"), 1);
    assert!(!worker.overlapped());
}

#[tokio::test]
async fn test_no_key_runs_concurrently_with_itself() {
    let worker = Arc::new(DependencyWorker::new(paper_dependencies()));

    Evaluator::new(16)
        .run(
            Arc::clone(&worker),
            ["root", "root", "method", "m1", "m2", "m2", "intro"],
        )
        .await
        .unwrap();

    assert!(!worker.overlapped());
}

#[tokio::test]
async fn test_unresolvable_dependency_deadlocks_in_one_round() {
    let worker = Arc::new(DependencyWorker::new([("orphan", vec!["missing"])]));

    let err = Evaluator::new(2)
        .run(Arc::clone(&worker), ["orphan"])
        .await
        .unwrap_err();

    match err {
        EvaluationError::DependencyDeadlock { stuck, round } => {
            assert_eq!(stuck, vec!["orphan".to_string()]);
            assert_eq!(round, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(worker.invocations(&"orphan"), 1);
}

#[tokio::test]
async fn test_deadlock_after_partial_progress() {
    let worker = Arc::new(DependencyWorker::new([
        ("ready", vec![]),
        ("orphan", vec!["missing"]),
    ]));

    let err = Evaluator::new(2)
        .run(Arc::clone(&worker), ["ready", "orphan"])
        .await
        .unwrap_err();

    assert_eq!(err.stuck_nodes().to_vec(), vec!["orphan".to_string()]);
    assert!(matches!(err, EvaluationError::DependencyDeadlock { round: 2, .. }));
    assert!(worker.is_retired(&"ready"));
    assert_eq!(worker.invocations(&"orphan"), 2);
}

/// Tracks the peak number of simultaneous invocations
#[derive(Default)]
struct PeakWorker {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl NodeWorker<u32> for PeakWorker {
    async fn process(&self, _key: &u32) -> Result<Readiness, WorkerError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(Readiness::Ready)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_count_bounds_concurrency() {
    let worker = Arc::new(PeakWorker::default());

    let report = Evaluator::new(3)
        .run(Arc::clone(&worker), 0..30u32)
        .await
        .unwrap();

    assert_eq!(report.retired, 30);
    assert_eq!(report.rounds, 1);
    assert!(worker.peak.load(Ordering::SeqCst) <= 3);
}

/// Fails recoverably on odd keys and records the failures
#[derive(Default)]
struct OddFailures {
    failed: parking_lot::Mutex<Vec<u32>>,
}

#[async_trait]
impl NodeWorker<u32> for OddFailures {
    async fn process(&self, key: &u32) -> Result<Readiness, WorkerError> {
        if key % 2 == 1 {
            return Err(WorkerError::Recoverable(format!("odd {key}")));
        }
        Ok(Readiness::Ready)
    }

    fn on_failure(&self, key: &u32, _error: &WorkerError) {
        self.failed.lock().push(*key);
    }
}

#[tokio::test]
async fn test_recoverable_failures_retire_keys() {
    let worker = Arc::new(OddFailures::default());

    let report = Evaluator::new(2)
        .run(Arc::clone(&worker), 0..6u32)
        .await
        .unwrap();

    assert_eq!(report.retired, 6);
    let mut failed = worker.failed.lock().clone();
    failed.sort_unstable();
    assert_eq!(failed, vec![1, 3, 5]);
    assert_eq!(report.recovered.len(), 3);
}
