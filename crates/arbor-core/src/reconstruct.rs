//! Hierarchy reconstruction
//!
//! Infers nesting from a flat, ordered candidate list. At each level the
//! oracle names the top-level candidates; each one owns the candidates
//! up to the next top-level index (the last owns everything after it),
//! and the reconstructor recurses into every such scope. Candidates
//! before the first top-level index attach directly to the parent.
//!
//! Every recursive call receives a strictly shorter list, because the
//! scope head itself is consumed, so recursion ends without relying on
//! the oracle. A self-covering answer is rejected by
//! [`arbor_oracle::validate_top_level`].

use crate::error::ReconstructError;
use crate::text::preview;
use arbor_oracle::{CandidateView, Oracle, OracleClient};
use arbor_tree::{NodeId, Tree};
use futures::future::{BoxFuture, FutureExt};

/// Counters from one reconstruction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconstructStats {
    /// Oracle classifications issued
    pub oracle_calls: usize,
    /// Candidates placed in the tree
    pub placed: usize,
    /// Deepest recursion level reached (top call is 0)
    pub max_depth: usize,
}

/// Oracle-driven hierarchy reconstructor
pub struct Reconstructor<O: Oracle + ?Sized> {
    client: OracleClient<O>,
    max_depth: usize,
    preview_chars: usize,
}

impl<O: Oracle + ?Sized> Reconstructor<O> {
    #[must_use]
    pub fn new(client: OracleClient<O>) -> Self {
        Self {
            client,
            max_depth: 16,
            preview_chars: 400,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[must_use]
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    /// Attach `candidates` beneath `parent`, inferring their nesting
    ///
    /// Candidate order is preserved in a pre-order walk of the result
    /// and every candidate is placed exactly once.
    ///
    /// # Errors
    /// - [`ReconstructError::Oracle`] when a classification fails after
    ///   retries or is invalid; no partial result is meaningful then
    /// - [`ReconstructError::RecursionDepthExceeded`] past `max_depth`
    /// - [`ReconstructError::Tree`] for unknown ids
    pub async fn reconstruct(
        &self,
        tree: &mut Tree,
        parent: NodeId,
        candidates: &[NodeId],
    ) -> Result<ReconstructStats, ReconstructError> {
        let mut stats = ReconstructStats::default();
        self.place(tree, parent, candidates, 0, &mut stats).await?;
        tracing::info!(
            placed = stats.placed,
            oracle_calls = stats.oracle_calls,
            depth = stats.max_depth,
            "hierarchy reconstructed"
        );
        Ok(stats)
    }

    fn place<'a>(
        &'a self,
        tree: &'a mut Tree,
        parent: NodeId,
        candidates: &'a [NodeId],
        depth: usize,
        stats: &'a mut ReconstructStats,
    ) -> BoxFuture<'a, Result<(), ReconstructError>> {
        async move {
            if candidates.is_empty() {
                return Ok(());
            }
            if depth > self.max_depth {
                return Err(ReconstructError::RecursionDepthExceeded {
                    depth,
                    max: self.max_depth,
                });
            }
            stats.max_depth = stats.max_depth.max(depth);

            if let [only] = candidates {
                tree.set_parent(*only, parent)?;
                stats.placed += 1;
                return Ok(());
            }

            let views = self.views(tree, candidates)?;
            stats.oracle_calls += 1;
            let tops = self.client.classify_top_level(views).await?;
            tracing::debug!(depth, candidates = candidates.len(), ?tops, "scope classified");

            let Some(&first) = tops.first() else {
                for &c in candidates {
                    tree.set_parent(c, parent)?;
                }
                stats.placed += candidates.len();
                return Ok(());
            };

            for &c in &candidates[..first] {
                tree.set_parent(c, parent)?;
            }
            stats.placed += first;

            for (j, &start) in tops.iter().enumerate() {
                let end = tops.get(j + 1).copied().unwrap_or(candidates.len());
                let head = candidates[start];
                tree.set_parent(head, parent)?;
                stats.placed += 1;
                self.place(tree, head, &candidates[start + 1..end], depth + 1, stats)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    fn views(&self, tree: &Tree, candidates: &[NodeId]) -> Result<Vec<CandidateView>, ReconstructError> {
        candidates
            .iter()
            .enumerate()
            .map(|(index, &id)| {
                let node = tree.node(id)?;
                Ok(CandidateView {
                    index,
                    title: node.title().to_string(),
                    preview: preview(node.content(), self.preview_chars),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_oracle::{OracleError, OracleRequest, OracleTask, RetryPolicy};
    use arbor_tree::NodeKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Arc;

    /// Marks every candidate whose title starts with `#` as top-level
    struct HashHeadings;

    #[async_trait]
    impl Oracle for HashHeadings {
        async fn complete(&self, request: &OracleRequest) -> Result<Value, OracleError> {
            let OracleTask::ClassifyTopLevel { candidates } = &request.task else {
                return Err(OracleError::Format("unexpected task".into()));
            };
            let min_level = candidates
                .iter()
                .map(|c| c.title.chars().take_while(|&ch| ch == '#').count())
                .filter(|&n| n > 0)
                .min();
            let tops: Vec<usize> = candidates
                .iter()
                .filter(|c| {
                    Some(c.title.chars().take_while(|&ch| ch == '#').count()) == min_level
                })
                .map(|c| c.index)
                .collect();
            Ok(json!({ "top_headers": tops }))
        }
    }

    fn build(titles: &[&str]) -> (Tree, NodeId, Vec<NodeId>) {
        let mut tree = Tree::new();
        let root = tree.create("root", "", NodeKind::Document);
        let ids = titles
            .iter()
            .map(|t| tree.create(*t, "", NodeKind::Generic))
            .collect();
        (tree, root, ids)
    }

    fn reconstructor() -> Reconstructor<HashHeadings> {
        Reconstructor::new(OracleClient::new(Arc::new(HashHeadings)).with_retry(RetryPolicy::none()))
    }

    #[tokio::test]
    async fn nests_by_heading_level() {
        let (mut tree, root, ids) = build(&["intro", "# A", "a1", "## A.1", "a11", "# B", "b1"]);
        let stats = reconstructor()
            .reconstruct(&mut tree, root, &ids)
            .await
            .unwrap();

        assert_eq!(tree.children(root), &[ids[0], ids[1], ids[5]]);
        assert_eq!(tree.children(ids[1]), &[ids[2], ids[3]]);
        assert_eq!(tree.children(ids[3]), &[ids[4]]);
        assert_eq!(tree.children(ids[5]), &[ids[6]]);
        assert_eq!(stats.placed, ids.len());

        let order: Vec<NodeId> = tree.dfs(root).into_iter().skip(1).collect();
        assert_eq!(order, ids);
    }

    #[tokio::test]
    async fn depth_limit_is_enforced() {
        let (mut tree, root, ids) = build(&["# A", "## B", "### C", "#### D", "x"]);
        let err = reconstructor()
            .with_max_depth(2)
            .reconstruct(&mut tree, root, &ids)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::RecursionDepthExceeded { depth: 3, max: 2 }
        ));
    }

    #[tokio::test]
    async fn empty_candidates_is_noop() {
        let (mut tree, root, _) = build(&[]);
        let stats = reconstructor()
            .reconstruct(&mut tree, root, &[])
            .await
            .unwrap();
        assert_eq!(stats, ReconstructStats::default());
        assert!(tree.children(root).is_empty());
    }
}
