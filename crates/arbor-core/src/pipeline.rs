//! End-to-end document pipeline
//!
//! ```text
//! SourceDocument ─► cache lookup ─► reconstruct ─► abstract + normalize
//!                ─► evaluate (summaries) ─► related figures ─► serialize ─► cache put
//! ```
//!
//! A failure in reconstruction or evaluation fails the whole document;
//! per-node oracle failures only degrade that node's summary.

use crate::cache::{DocumentKey, TreeCache};
use crate::config::ArborConfig;
use crate::error::PipelineError;
use crate::evaluate::{EvaluationReport, Evaluator};
use crate::normalize::{collect_related_figures, extract_abstract, normalize, NormalizeStats};
use crate::reconstruct::{ReconstructStats, Reconstructor};
use crate::summarize::SummaryWorker;
use crate::transport::Publisher;
use arbor_oracle::{Oracle, OracleClient};
use arbor_tree::{serialize, NodeId, NodeKind, Tree, WireTree};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One flat content block, as produced by a scraper
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBlock {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: NodeKind,
}

impl CandidateBlock {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            kind: NodeKind::Generic,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = kind;
        self
    }
}

/// A document in reading order, without structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub title: String,
    #[serde(default)]
    pub source_url: Option<String>,
    pub blocks: Vec<CandidateBlock>,
}

impl SourceDocument {
    #[must_use]
    pub fn new(title: impl Into<String>, blocks: Vec<CandidateBlock>) -> Self {
        Self {
            title: title.into(),
            source_url: None,
            blocks,
        }
    }

    /// # Errors
    /// Malformed JSON or missing `title`/`blocks`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Counters from a full build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub reconstruct: ReconstructStats,
    pub normalize: NormalizeStats,
    pub evaluation: EvaluationReport,
    /// Nodes that received related figures
    pub figure_sections: usize,
}

/// Result of [`DocumentPipeline::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    pub tree: WireTree,
    /// `None` when the document could not be hashed
    pub key: Option<DocumentKey>,
    /// Served from the tree cache; `stats` is `None` then
    pub from_cache: bool,
    pub stats: Option<BuildStats>,
}

/// Reconstructs, annotates and serializes documents
pub struct DocumentPipeline<O: Oracle + ?Sized> {
    client: OracleClient<O>,
    config: ArborConfig,
    cache: Option<Arc<dyn TreeCache>>,
}

impl<O: Oracle + ?Sized + 'static> DocumentPipeline<O> {
    #[must_use]
    pub fn new(oracle: Arc<O>, config: ArborConfig) -> Self {
        let client = OracleClient::new(oracle)
            .with_retry(config.retry_policy())
            .with_high_quality(config.use_high_quality_oracle);
        Self {
            client,
            config,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn TreeCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    /// Produce the wire tree of `document`, consulting the cache first
    ///
    /// # Errors
    /// [`PipelineError`] carrying the stage that failed.
    pub async fn run(&self, document: &SourceDocument) -> Result<PipelineOutput, PipelineError> {
        let key = match DocumentKey::of(document) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("document not hashable, cache bypassed: {e}");
                None
            }
        };

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            if let Some(tree) = cache.get(&key).await {
                tracing::info!(key = %key.short(), nodes = tree.len(), "tree served from cache");
                return Ok(PipelineOutput {
                    tree,
                    key: Some(key),
                    from_cache: true,
                    stats: None,
                });
            }
        }

        let (tree, root, stats) = self.build(document).await?;
        let wire = serialize(&tree, root)?;

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.put(key, wire.clone()).await;
        }

        tracing::info!(title = %document.title, nodes = wire.len(), "document pipeline finished");
        Ok(PipelineOutput {
            tree: wire,
            key,
            from_cache: false,
            stats: Some(stats),
        })
    }

    /// Build the annotated arena without touching the cache
    ///
    /// # Errors
    /// [`PipelineError::EmptyDocument`] for a document without blocks,
    /// otherwise the failing stage's error.
    pub async fn build(
        &self,
        document: &SourceDocument,
    ) -> Result<(Tree, NodeId, BuildStats), PipelineError> {
        if document.blocks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }
        tracing::info!(title = %document.title, blocks = document.blocks.len(), "building tree");

        let mut tree = Tree::new();
        let root = tree.create(&document.title, "", NodeKind::Document);
        let candidates: Vec<NodeId> = document
            .blocks
            .iter()
            .map(|b| tree.create(&b.title, &b.content, b.kind))
            .collect();

        let reconstruct = Reconstructor::new(self.client.clone())
            .with_max_depth(self.config.max_depth)
            .with_preview_chars(self.config.preview_chars)
            .reconstruct(&mut tree, root, &candidates)
            .await?;

        let context = extract_abstract(&mut tree, root)?;
        let normalized = normalize(&mut tree, root)?;

        let order = tree.bfs(root);
        let shared = Arc::new(RwLock::new(tree));
        let worker = SummaryWorker::new(Arc::clone(&shared), self.client.clone())
            .with_context(context);
        let evaluation = Evaluator::new(self.config.worker_count)
            .run(Arc::new(worker), order)
            .await?;

        let mut tree = match Arc::try_unwrap(shared) {
            Ok(lock) => lock.into_inner(),
            Err(shared) => {
                let guard = shared.read();
                guard.clone()
            }
        };
        let figure_sections = collect_related_figures(&mut tree, root)?;

        Ok((
            tree,
            root,
            BuildStats {
                reconstruct,
                normalize: normalized,
                evaluation,
                figure_sections,
            },
        ))
    }

    /// Send a finished tree to the viewer service
    ///
    /// # Errors
    /// [`PipelineError::Publish`].
    pub async fn publish(
        &self,
        output: &PipelineOutput,
        publisher: &dyn Publisher,
    ) -> Result<String, PipelineError> {
        Ok(publisher.publish(&output.tree).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_document_defaults_optional_fields() {
        let doc = SourceDocument::from_json(
            r#"{"title": "Paper", "blocks": [{"title": "Intro"}, {"content": "x", "kind": "figure"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.source_url, None);
        assert_eq!(doc.blocks[0].content, "");
        assert_eq!(doc.blocks[0].kind, NodeKind::Generic);
        assert_eq!(doc.blocks[1].kind, NodeKind::Figure);
    }

    #[test]
    fn missing_blocks_is_an_error() {
        assert!(SourceDocument::from_json(r#"{"title": "Paper"}"#).is_err());
    }
}
