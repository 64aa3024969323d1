//! Summary worker
//!
//! The per-node computation run by the [`Evaluator`](crate::Evaluator):
//! leaves are summarized from their own text, sections from their
//! children's summaries once every child has one, figures and tables
//! are skipped. A node that already carries a [`Summary`] is ready
//! without further work, which makes repeated invocation harmless.
//!
//! Tree locks are never held across an oracle call.

use crate::error::WorkerError;
use crate::evaluate::{NodeWorker, Readiness};
use crate::text::plain_text;
use arbor_oracle::{Oracle, OracleClient, PointsResponse, SectionDigest};
use arbor_tree::{KeyPoint, NodeId, NodeKind, Summary, SummaryFailure, Tree};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

/// Prefix of oracle-generated paragraph titles
pub const GENERATED_TITLE_PREFIX: &str = "¶ ";

enum Plan {
    Done,
    Pending,
    Skip,
    Leaf {
        title: String,
        text: String,
    },
    Section {
        title: String,
        digests: Vec<SectionDigest>,
        outline: Option<String>,
    },
}

/// Computes a [`Summary`] for one node of a shared tree
pub struct SummaryWorker<O: Oracle + ?Sized> {
    tree: Arc<RwLock<Tree>>,
    client: OracleClient<O>,
    context: Option<String>,
}

impl<O: Oracle + ?Sized> SummaryWorker<O> {
    #[must_use]
    pub fn new(tree: Arc<RwLock<Tree>>, client: OracleClient<O>) -> Self {
        Self {
            tree,
            client,
            context: None,
        }
    }

    /// Document abstract sent along with every request
    #[must_use]
    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    fn plan(&self, id: NodeId) -> Result<Plan, WorkerError> {
        let tree = self.tree.read();
        let node = tree.node(id)?;
        if node.has::<Summary>() {
            return Ok(Plan::Done);
        }
        if node.kind().is_media() {
            return Ok(Plan::Skip);
        }
        if node.is_leaf() {
            let text = plain_text(node.content());
            if text.is_empty() {
                return Ok(Plan::Skip);
            }
            return Ok(Plan::Leaf {
                title: node.title().to_string(),
                text,
            });
        }

        let mut digests = Vec::with_capacity(node.children().len());
        let mut outline = Vec::new();
        for &child_id in node.children() {
            let child = tree.node(child_id)?;
            let Some(summary) = child.get::<Summary>() else {
                return Ok(Plan::Pending);
            };
            if summary.has_summary() {
                let caption = if summary.short_content.is_empty() {
                    child.title().to_string()
                } else {
                    summary.short_content.clone()
                };
                digests.push(SectionDigest {
                    caption,
                    summary: summary.resummary_text().unwrap_or_default(),
                });
            }
            outline.push(format!("<strong>{}</strong>", child.title()));
            if !summary.short_content.is_empty() {
                outline.push(summary.short_content.clone());
            }
        }
        // a document root keeps its own content (the abstract)
        let keep_content = node.kind() == NodeKind::Document && !node.content().is_empty();
        Ok(Plan::Section {
            title: node.title().to_string(),
            digests,
            outline: (!keep_content).then(|| outline.join("\n\n<br/>")),
        })
    }
}

fn to_summary(response: PointsResponse) -> Summary {
    let points = response
        .points
        .into_iter()
        .map(|entry| {
            let point = KeyPoint::new(entry.point);
            match entry.evidence {
                Some(evidence) if !evidence.is_empty() => point.with_evidence(evidence),
                _ => point,
            }
        })
        .collect();
    Summary::with_points(points, response.keypoint)
}

#[async_trait]
impl<O: Oracle + ?Sized + 'static> NodeWorker<NodeId> for SummaryWorker<O> {
    async fn process(&self, id: &NodeId) -> Result<Readiness, WorkerError> {
        let context = self.context.as_deref();
        match self.plan(*id)? {
            Plan::Done => {}
            Plan::Pending => return Ok(Readiness::Pending),
            Plan::Skip => {
                self.tree.write().attach(*id, Summary::skipped())?;
            }
            Plan::Leaf { title, text } => {
                let response = self.client.summarize_paragraph(&title, &text, context).await?;
                let generated_title = if title.is_empty() {
                    let generated = self.client.title_paragraph(&text).await?;
                    Some(format!("{GENERATED_TITLE_PREFIX}{}", generated.trim()))
                } else {
                    None
                };
                let mut tree = self.tree.write();
                if let Some(generated) = generated_title {
                    tree.node_mut(*id)?.set_title(generated);
                }
                tree.attach(*id, to_summary(response))?;
            }
            Plan::Section {
                title,
                digests,
                outline,
            } => {
                let response = self.client.summarize_section(&title, digests, context).await?;
                let mut tree = self.tree.write();
                if let Some(outline) = outline {
                    tree.node_mut(*id)?.set_content(outline);
                }
                tree.attach(*id, to_summary(response))?;
            }
        }
        Ok(Readiness::Ready)
    }

    fn on_failure(&self, id: &NodeId, error: &WorkerError) {
        let mut tree = self.tree.write();
        let Ok(node) = tree.node_mut(*id) else {
            return;
        };
        if !node.has::<Summary>() {
            node.update(Summary::failed());
        }
        node.update(SummaryFailure::new(error.to_string()));
    }
}
