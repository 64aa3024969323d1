use arbor_oracle::{
    CachedOracle, CandidateView, InvalidOracleResponse, Oracle, OracleClient, OracleError,
    OracleRequest, OracleTask, RetryPolicy,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fails the first `failures` calls with a transport error, then answers
/// `answer` to classifications and a fixed summary otherwise
struct Flaky {
    failures: usize,
    answer: Vec<i64>,
    calls: AtomicUsize,
}

impl Flaky {
    fn new(failures: usize, answer: &[i64]) -> Self {
        Self {
            failures,
            answer: answer.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for Flaky {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(OracleError::Transport(format!("attempt {n} reset")));
        }
        Ok(match request.task {
            OracleTask::ClassifyTopLevel { .. } => json!({ "top_headers": self.answer }),
            _ => json!({ "points": [{ "point": "p" }], "keypoint": "k" }),
        })
    }
}

/// Answers with `replies` in order, repeating the last one
struct Replay {
    replies: Mutex<VecDeque<Value>>,
    calls: AtomicUsize,
}

impl Replay {
    fn new(replies: Vec<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Oracle for Replay {
    async fn complete(&self, _request: &OracleRequest) -> Result<Value, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut replies = self.replies.lock();
        let reply = if replies.len() > 1 {
            replies.pop_front()
        } else {
            replies.front().cloned()
        };
        reply.ok_or_else(|| OracleError::Transport("no reply".into()))
    }
}

fn views(titles: &[&str]) -> Vec<CandidateView> {
    titles
        .iter()
        .enumerate()
        .map(|(index, title)| CandidateView {
            index,
            title: (*title).to_string(),
            preview: String::new(),
        })
        .collect()
}

fn fast(retries: u32) -> RetryPolicy {
    RetryPolicy::new(retries, Duration::ZERO)
}

#[tokio::test]
async fn test_transient_failures_within_budget_succeed() {
    let oracle = Arc::new(Flaky::new(2, &[1, 0, 1]));
    let client = OracleClient::new(Arc::clone(&oracle)).with_retry(fast(2));

    let tops = client.classify_top_level(views(&["a", "b", "c"])).await.unwrap();

    assert_eq!(tops, vec![0, 1]);
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn test_exhausted_retries_report_attempts() {
    let oracle = Arc::new(Flaky::new(10, &[]));
    let client = OracleClient::new(Arc::clone(&oracle)).with_retry(fast(2));

    let err = client.title_paragraph("text").await.unwrap_err();

    assert!(matches!(err, OracleError::RetriesExhausted { attempts: 3, .. }));
    assert!(matches!(err.root_cause(), OracleError::Transport(_)));
    assert_eq!(oracle.calls(), 3);
}

#[tokio::test]
async fn test_invalid_answer_is_retried_once() {
    let oracle = Arc::new(Flaky::new(0, &[4]));
    let client = OracleClient::new(Arc::clone(&oracle)).with_retry(fast(5));

    let err = client.classify_top_level(views(&["a", "b"])).await.unwrap_err();

    assert!(matches!(
        err,
        OracleError::Invalid(InvalidOracleResponse::IndexOutOfRange { index: 4, len: 2 })
    ));
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_cached_oracle_deduplicates_identical_requests() {
    let inner = Flaky::new(0, &[0]);
    let cached = Arc::new(CachedOracle::new(inner, 64));
    let client = OracleClient::new(Arc::clone(&cached)).with_retry(fast(0));

    let first = client.classify_top_level(views(&["a", "b"])).await.unwrap();
    let second = client.classify_top_level(views(&["a", "b"])).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(cached.inner().calls(), 1);

    let high = client.clone().with_high_quality(true);
    high.classify_top_level(views(&["a", "b"])).await.unwrap();
    assert_eq!(cached.inner().calls(), 2);
}

#[tokio::test]
async fn test_cached_oracle_does_not_cache_failures() {
    let cached = Arc::new(CachedOracle::new(Flaky::new(1, &[]), 64));
    let client = OracleClient::new(Arc::clone(&cached)).with_retry(RetryPolicy::none());

    tokio_test::assert_err!(client.summarize_paragraph("T", "body", None).await);
    let response = tokio_test::assert_ok!(client.summarize_paragraph("T", "body", None).await);

    assert_eq!(response.keypoint, "k");
    assert_eq!(cached.inner().calls(), 2);
}

#[tokio::test]
async fn test_cached_malformed_answer_is_retried_fresh() {
    let inner = Replay::new(vec![json!({ "headers": [0] }), json!({ "top_headers": [0] })]);
    let cached = Arc::new(CachedOracle::new(inner, 64));
    let client = OracleClient::new(Arc::clone(&cached)).with_retry(fast(3));

    let tops = client.classify_top_level(views(&["a", "b", "c"])).await.unwrap();
    assert_eq!(tops, vec![0]);
    assert_eq!(cached.inner().calls(), 2);

    // the accepted answer stays cached
    let again = client.classify_top_level(views(&["a", "b", "c"])).await.unwrap();
    assert_eq!(again, vec![0]);
    assert_eq!(cached.inner().calls(), 2);
}

#[tokio::test]
async fn test_cached_out_of_range_answer_is_retried_fresh() {
    let inner = Replay::new(vec![json!({ "top_headers": [9] }), json!({ "top_headers": [0] })]);
    let cached = Arc::new(CachedOracle::new(inner, 64));
    let client = OracleClient::new(Arc::clone(&cached)).with_retry(fast(3));

    let tops = client.classify_top_level(views(&["a", "b", "c"])).await.unwrap();

    assert_eq!(tops, vec![0]);
    assert_eq!(cached.inner().calls(), 2);
}

#[tokio::test]
async fn test_rejected_answer_does_not_outlive_the_call() {
    let inner = Replay::new(vec![json!({ "title": 7 }), json!({ "title": "Fixed" })]);
    let cached = Arc::new(CachedOracle::new(inner, 64));
    let strict = OracleClient::new(Arc::clone(&cached)).with_retry(RetryPolicy::none());

    tokio_test::assert_err!(strict.title_paragraph("text").await);
    let title = tokio_test::assert_ok!(strict.title_paragraph("text").await);

    assert_eq!(title, "Fixed");
    assert_eq!(cached.inner().calls(), 2);
}
