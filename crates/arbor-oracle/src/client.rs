//! Typed oracle calls
//!
//! [`OracleClient`] turns raw completions into validated answers and
//! applies the [`RetryPolicy`] around each call. A rejected answer is
//! reported through [`Oracle::reject`] before the retry, so a retried
//! invalid answer is a fresh oracle round trip even behind a cache.

use crate::error::{InvalidOracleResponse, OracleError};
use crate::request::{
    parse_response, CandidateView, OracleRequest, OracleTask, PointsResponse, SectionDigest,
    TitleResponse, TopLevelResponse,
};
use crate::retry::RetryPolicy;
use crate::Oracle;
use serde_json::Value;
use std::sync::Arc;

/// Validate a top-level answer against `len` candidates
///
/// Returns the indices sorted ascending without duplicates. An empty
/// answer is valid and means "no headings at this level".
///
/// # Errors
/// - [`InvalidOracleResponse::IndexOutOfRange`] for any index outside `0..len`
/// - [`InvalidOracleResponse::SelfCoveringScope`] when every candidate is top-level
pub fn validate_top_level(raw: &[i64], len: usize) -> Result<Vec<usize>, InvalidOracleResponse> {
    let mut indices = Vec::with_capacity(raw.len());
    for &index in raw {
        match usize::try_from(index) {
            Ok(i) if i < len => indices.push(i),
            _ => return Err(InvalidOracleResponse::IndexOutOfRange { index, len }),
        }
    }
    indices.sort_unstable();
    indices.dedup();
    if len > 1 && indices.len() == len {
        return Err(InvalidOracleResponse::SelfCoveringScope { len });
    }
    Ok(indices)
}

/// One completion of `request`, interpreted by `accept`
async fn attempt<O, T>(
    oracle: &O,
    request: &OracleRequest,
    accept: impl FnOnce(Value) -> Result<T, OracleError>,
) -> Result<T, OracleError>
where
    O: Oracle + ?Sized,
{
    let value = oracle.complete(request).await?;
    let accepted = accept(value);
    if accepted.is_err() {
        oracle.reject(request).await;
    }
    accepted
}

/// Validated, retried access to an [`Oracle`]
pub struct OracleClient<O: Oracle + ?Sized> {
    oracle: Arc<O>,
    retry: RetryPolicy,
    high_quality: bool,
}

impl<O: Oracle + ?Sized> Clone for OracleClient<O> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            retry: self.retry,
            high_quality: self.high_quality,
        }
    }
}

impl<O: Oracle + ?Sized> OracleClient<O> {
    #[must_use]
    pub fn new(oracle: Arc<O>) -> Self {
        Self {
            oracle,
            retry: RetryPolicy::default(),
            high_quality: false,
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_high_quality(mut self, high_quality: bool) -> Self {
        self.high_quality = high_quality;
        self
    }

    #[inline]
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    #[inline]
    #[must_use]
    pub fn oracle(&self) -> &Arc<O> {
        &self.oracle
    }

    /// Indices of the top-level candidates, sorted ascending
    ///
    /// # Errors
    /// Any [`OracleError`] left after retries.
    pub async fn classify_top_level(
        &self,
        candidates: Vec<CandidateView>,
    ) -> Result<Vec<usize>, OracleError> {
        let len = candidates.len();
        let request =
            OracleRequest::new(OracleTask::ClassifyTopLevel { candidates }, self.high_quality);
        let request = &request;
        let oracle = &self.oracle;
        self.retry
            .run(request.task.name(), || {
                attempt(oracle.as_ref(), request, move |value| {
                    let parsed: TopLevelResponse = parse_response(request.task.name(), value)?;
                    Ok(validate_top_level(&parsed.top_headers, len)?)
                })
            })
            .await
    }

    /// Key points of one paragraph
    ///
    /// # Errors
    /// Any [`OracleError`] left after retries.
    pub async fn summarize_paragraph(
        &self,
        title: &str,
        content: &str,
        context: Option<&str>,
    ) -> Result<PointsResponse, OracleError> {
        let task = OracleTask::SummarizeParagraph {
            title: title.to_owned(),
            content: content.to_owned(),
            context: context.map(str::to_owned),
        };
        self.points(task).await
    }

    /// Key points of a section from its children's digests
    ///
    /// # Errors
    /// Any [`OracleError`] left after retries.
    pub async fn summarize_section(
        &self,
        title: &str,
        children: Vec<SectionDigest>,
        context: Option<&str>,
    ) -> Result<PointsResponse, OracleError> {
        let task = OracleTask::SummarizeSection {
            title: title.to_owned(),
            children,
            context: context.map(str::to_owned),
        };
        self.points(task).await
    }

    /// A one-sentence title for untitled content
    ///
    /// # Errors
    /// Any [`OracleError`] left after retries.
    pub async fn title_paragraph(&self, content: &str) -> Result<String, OracleError> {
        let request = OracleRequest::new(
            OracleTask::TitleParagraph {
                content: content.to_owned(),
            },
            self.high_quality,
        );
        let request = &request;
        let oracle = &self.oracle;
        self.retry
            .run(request.task.name(), || {
                attempt(oracle.as_ref(), request, move |value| {
                    let parsed: TitleResponse = parse_response(request.task.name(), value)?;
                    Ok(parsed.title)
                })
            })
            .await
    }

    async fn points(&self, task: OracleTask) -> Result<PointsResponse, OracleError> {
        let request = OracleRequest::new(task, self.high_quality);
        let request = &request;
        let oracle = &self.oracle;
        self.retry
            .run(request.task.name(), || {
                attempt(oracle.as_ref(), request, move |value| {
                    parse_response::<PointsResponse>(request.task.name(), value)
                })
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Replays canned completions in order
    struct Sequence {
        replies: Mutex<VecDeque<Result<Value, OracleError>>>,
        seen: Mutex<Vec<OracleRequest>>,
    }

    impl Sequence {
        fn new(replies: Vec<Result<Value, OracleError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().len()
        }
    }

    #[async_trait]
    impl Oracle for Sequence {
        async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
            self.seen.lock().push(request.clone());
            self.replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(OracleError::Transport("no reply".into())))
        }
    }

    fn views(n: usize) -> Vec<CandidateView> {
        (0..n)
            .map(|index| CandidateView {
                index,
                title: format!("c{index}"),
                preview: String::new(),
            })
            .collect()
    }

    fn client(oracle: &Arc<Sequence>) -> OracleClient<Sequence> {
        OracleClient::new(Arc::clone(oracle)).with_retry(RetryPolicy::new(2, Duration::ZERO))
    }

    #[test]
    fn validate_sorts_and_dedups() {
        assert_eq!(validate_top_level(&[3, 0, 3], 5).unwrap(), vec![0, 3]);
        assert_eq!(validate_top_level(&[], 5).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert_eq!(
            validate_top_level(&[0, 5], 5),
            Err(InvalidOracleResponse::IndexOutOfRange { index: 5, len: 5 })
        );
        assert_eq!(
            validate_top_level(&[-1], 5),
            Err(InvalidOracleResponse::IndexOutOfRange { index: -1, len: 5 })
        );
    }

    #[test]
    fn validate_rejects_self_covering_set() {
        assert_eq!(
            validate_top_level(&[2, 1, 0], 3),
            Err(InvalidOracleResponse::SelfCoveringScope { len: 3 })
        );
    }

    #[tokio::test]
    async fn classify_retries_malformed_then_succeeds() {
        let oracle = Sequence::new(vec![
            Ok(json!({"headers": [0]})),
            Ok(json!({"top_headers": [2, 0]})),
        ]);
        let indices = client(&oracle).classify_top_level(views(4)).await.unwrap();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn classify_surfaces_invalid_after_one_retry() {
        let oracle = Sequence::new(vec![
            Ok(json!({"top_headers": [9]})),
            Ok(json!({"top_headers": [9]})),
            Ok(json!({"top_headers": [0]})),
        ]);
        let err = client(&oracle)
            .classify_top_level(views(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OracleError::Invalid(InvalidOracleResponse::IndexOutOfRange { index: 9, len: 3 })
        ));
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn transport_failures_exhaust_budget() {
        let oracle = Sequence::new(vec![]);
        let err = client(&oracle)
            .title_paragraph("body")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OracleError::RetriesExhausted { attempts: 3, .. }
        ));
        assert_eq!(oracle.calls(), 3);
    }

    #[tokio::test]
    async fn high_quality_flag_reaches_request() {
        let oracle = Sequence::new(vec![Ok(json!({
            "points": [{"point": "p", "evidence": "e"}],
            "keypoint": "k"
        }))]);
        let points = client(&oracle)
            .with_high_quality(true)
            .summarize_paragraph("T", "body", Some("abstract"))
            .await
            .unwrap();
        assert_eq!(points.keypoint, "k");
        let seen = oracle.seen.lock();
        assert!(seen[0].high_quality);
        assert!(seen[0].prompt.contains("abstract"));
    }
}
