//! Memoizing oracle wrapper using moka
//!
//! Successful completions are keyed by a Blake3 hash of the request's
//! task payload and quality flag. Failures are never cached, and an
//! answer the client rejects is evicted through [`Oracle::reject`].

use crate::error::OracleError;
use crate::request::OracleRequest;
use crate::Oracle;
use async_trait::async_trait;
use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;

/// Oracle decorator that answers repeated requests from memory
pub struct CachedOracle<O> {
    inner: O,
    cache: Cache<[u8; 32], Value>,
}

impl<O: Oracle> CachedOracle<O> {
    #[inline]
    #[must_use]
    pub fn new(inner: O, max_capacity: u64) -> Self {
        Self {
            inner,
            cache: Cache::new(max_capacity),
        }
    }

    /// Entries expire `ttl` after insertion
    #[inline]
    #[must_use]
    pub fn with_ttl(inner: O, max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    #[inline]
    #[must_use]
    pub fn inner(&self) -> &O {
        &self.inner
    }

    #[inline]
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    fn key(request: &OracleRequest) -> Result<[u8; 32], OracleError> {
        let payload = serde_json::to_vec(&(&request.task, request.high_quality))?;
        Ok(*blake3::hash(&payload).as_bytes())
    }
}

#[async_trait]
impl<O: Oracle> Oracle for CachedOracle<O> {
    async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
        let key = Self::key(request)?;
        if let Some(hit) = self.cache.get(&key).await {
            tracing::trace!(task = request.task.name(), key = %hex::encode(&key[..8]), "oracle cache hit");
            return Ok(hit);
        }
        let value = self.inner.complete(request).await?;
        self.cache.insert(key, value.clone()).await;
        Ok(value)
    }

    async fn reject(&self, request: &OracleRequest) {
        if let Ok(key) = Self::key(request) {
            tracing::debug!(task = request.task.name(), key = %hex::encode(&key[..8]), "evicting rejected answer");
            self.cache.invalidate(&key).await;
        }
        self.inner.reject(request).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::OracleTask;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Oracle for Counting {
        async fn complete(&self, _request: &OracleRequest) -> Result<Value, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(OracleError::Transport("down".into()))
            } else {
                Ok(json!({"title": "t"}))
            }
        }
    }

    fn request(content: &str, high_quality: bool) -> OracleRequest {
        OracleRequest::new(
            OracleTask::TitleParagraph {
                content: content.into(),
            },
            high_quality,
        )
    }

    #[tokio::test]
    async fn repeated_request_hits_cache() {
        let oracle = CachedOracle::new(Counting::default(), 16);
        oracle.complete(&request("a", false)).await.unwrap();
        oracle.complete(&request("a", false)).await.unwrap();
        oracle.complete(&request("a", true)).await.unwrap();
        oracle.complete(&request("b", false)).await.unwrap();
        assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let oracle = CachedOracle::new(
            Counting {
                fail: true,
                ..Counting::default()
            },
            16,
        );
        assert!(oracle.complete(&request("a", false)).await.is_err());
        assert!(oracle.complete(&request("a", false)).await.is_err());
        assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_answer_is_evicted() {
        let oracle = CachedOracle::new(Counting::default(), 16);
        oracle.complete(&request("a", false)).await.unwrap();
        oracle.complete(&request("b", false)).await.unwrap();
        oracle.reject(&request("a", false)).await;
        oracle.complete(&request("a", false)).await.unwrap();
        oracle.complete(&request("b", false)).await.unwrap();
        assert_eq!(oracle.inner().calls.load(Ordering::SeqCst), 3);
    }
}
