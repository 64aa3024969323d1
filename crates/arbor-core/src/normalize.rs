//! Tree normalization passes
//!
//! Run between reconstruction and evaluation to tidy what scraping and
//! reconstruction leave behind. Each pass returns how many nodes it
//! changed.

use arbor_tree::{NodeId, NodeKind, RelatedFigures, Tree, TreeError};
use std::collections::HashMap;

/// Untitled content shorter than this many characters is folded into
/// its next sibling
pub const MERGE_THRESHOLD: usize = 5000;

/// Joins merged contents
pub const MERGE_SEPARATOR: &str = "<br/>";

/// Title that marks the document abstract
pub const ABSTRACT_TITLE: &str = "Abstract";

/// Counters from [`normalize`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    pub merged: usize,
    pub pruned: usize,
    pub collapsed: usize,
}

/// Run the merge, prune and collapse passes in that order
///
/// # Errors
/// [`TreeError`] if the arena is inconsistent.
pub fn normalize(tree: &mut Tree, root: NodeId) -> Result<NormalizeStats, TreeError> {
    let stats = NormalizeStats {
        merged: merge_untitled_siblings(tree, root)?,
        pruned: prune_empty_leaves(tree, root)?,
        collapsed: collapse_lone_leaves(tree, root)?,
    };
    tracing::debug!(?stats, "tree normalized");
    Ok(stats)
}

/// Prepend short untitled content to an untitled next sibling
///
/// The donor is left empty; [`prune_empty_leaves`] removes it when it
/// has no children.
///
/// # Errors
/// [`TreeError::NodeNotFound`] for unknown ids.
pub fn merge_untitled_siblings(tree: &mut Tree, root: NodeId) -> Result<usize, TreeError> {
    let mut merged = 0;
    for parent in tree.dfs(root) {
        let children = tree.children(parent).to_vec();
        for pair in children.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let donor = tree.node(current)?;
            if !donor.title().is_empty()
                || !tree.node(next)?.title().is_empty()
                || donor.content().chars().count() >= MERGE_THRESHOLD
            {
                continue;
            }
            let moved = donor.content().to_string();
            let receiver = tree.node_mut(next)?;
            let combined = format!("{moved}{MERGE_SEPARATOR}{}", receiver.content());
            receiver.set_content(combined);
            tree.node_mut(current)?.set_content(String::new());
            merged += 1;
        }
    }
    Ok(merged)
}

/// Detach untitled, content-less, childless nodes
///
/// # Errors
/// [`TreeError::NodeNotFound`] for unknown ids.
pub fn prune_empty_leaves(tree: &mut Tree, root: NodeId) -> Result<usize, TreeError> {
    let mut pruned = 0;
    for id in tree.dfs(root) {
        if id == root {
            continue;
        }
        let node = tree.node(id)?;
        if node.title().is_empty() && node.content().is_empty() && node.is_leaf() {
            tree.detach(id)?;
            pruned += 1;
        }
    }
    Ok(pruned)
}

/// A non-root node whose only child is a leaf absorbs that child's content
///
/// The root is left alone so its content (the abstract) survives.
///
/// # Errors
/// [`TreeError::NodeNotFound`] for unknown ids.
pub fn collapse_lone_leaves(tree: &mut Tree, root: NodeId) -> Result<usize, TreeError> {
    let mut collapsed = 0;
    for id in tree.dfs(root).into_iter().skip(1) {
        let &[only] = tree.children(id) else {
            continue;
        };
        let child = tree.node(only)?;
        if !child.is_leaf() || child.kind().is_media() {
            continue;
        }
        let content = child.content().to_string();
        tree.node_mut(id)?.set_content(content);
        tree.detach(only)?;
        collapsed += 1;
    }
    Ok(collapsed)
}

/// Detach the first top-level node titled `Abstract`
///
/// Its content becomes the root's content and is returned for use as
/// summary context.
///
/// # Errors
/// [`TreeError::NodeNotFound`] for unknown ids.
pub fn extract_abstract(tree: &mut Tree, root: NodeId) -> Result<Option<String>, TreeError> {
    let found = tree
        .children(root)
        .iter()
        .copied()
        .find(|&id| tree.get(id).is_some_and(|n| n.title().trim() == ABSTRACT_TITLE));
    let Some(id) = found else {
        return Ok(None);
    };
    let content = tree.node(id)?.content().to_string();
    tree.detach(id)?;
    tree.node_mut(root)?.set_content(content.clone());
    Ok(Some(content))
}

/// Attach [`RelatedFigures`] to every section-like node
///
/// A node collects the content of its figure children plus everything
/// its section-like children collected. Section-like means a sectional
/// kind, or any non-media node with children.
///
/// # Errors
/// [`TreeError::NodeNotFound`] or [`TreeError::DuplicateAnnotation`].
pub fn collect_related_figures(tree: &mut Tree, root: NodeId) -> Result<usize, TreeError> {
    let mut collected: HashMap<NodeId, Vec<String>> = HashMap::new();
    for id in tree.dfs(root).into_iter().rev() {
        let mut figures = Vec::new();
        for &child in tree.children(id) {
            let node = tree.node(child)?;
            if node.kind() == NodeKind::Figure {
                figures.push(node.content().to_string());
            }
        }
        for &child in tree.children(id) {
            if let Some(nested) = collected.get(&child) {
                figures.extend(nested.iter().cloned());
            }
        }
        let node = tree.node(id)?;
        let section_like =
            node.kind().is_sectional() || (!node.is_leaf() && !node.kind().is_media());
        if section_like && !figures.is_empty() {
            collected.insert(id, figures);
        }
    }

    let count = collected.len();
    for (id, figures) in collected {
        tree.attach(id, RelatedFigures { figures })?;
    }
    Ok(count)
}
