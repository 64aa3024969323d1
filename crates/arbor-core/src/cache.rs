//! Tree cache boundary
//!
//! Finished wire trees keyed by a hash of their source document. The
//! pipeline treats the cache as optional and never trusts it for
//! correctness: a miss just means the document is rebuilt.

use crate::pipeline::SourceDocument;
use arbor_tree::WireTree;
use async_trait::async_trait;
use moka::future::Cache;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// Stable key of a source document (Blake3 of its JSON form)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey([u8; 32]);

impl DocumentKey {
    /// Hash arbitrary document bytes
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Hash a source document
    ///
    /// # Errors
    /// Propagates JSON encoding failures.
    pub fn of(document: &SourceDocument) -> Result<Self, serde_json::Error> {
        Ok(Self::compute(&serde_json::to_vec(document)?))
    }

    #[inline]
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 16 hex characters, for logs
    #[inline]
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl Display for DocumentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// External key to tree store
#[async_trait]
pub trait TreeCache: Send + Sync {
    async fn get(&self, key: &DocumentKey) -> Option<WireTree>;
    async fn put(&self, key: DocumentKey, tree: WireTree);
}

/// In-process [`TreeCache`] backed by moka
#[derive(Debug, Clone)]
pub struct MemoryTreeCache {
    inner: Cache<DocumentKey, Arc<WireTree>>,
}

impl MemoryTreeCache {
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    #[inline]
    pub async fn invalidate(&self, key: &DocumentKey) {
        self.inner.invalidate(key).await;
    }

    #[inline]
    #[must_use]
    pub async fn contains(&self, key: &DocumentKey) -> bool {
        self.inner.get(key).await.is_some()
    }
}

#[async_trait]
impl TreeCache for MemoryTreeCache {
    async fn get(&self, key: &DocumentKey) -> Option<WireTree> {
        self.inner.get(key).await.map(|tree| (*tree).clone())
    }

    async fn put(&self, key: DocumentKey, tree: WireTree) {
        self.inner.insert(key, Arc::new(tree)).await;
    }
}
