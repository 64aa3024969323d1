//! Node arena
//!
//! Every link change goes through [`Tree::set_parent`] or
//! [`Tree::detach`], each of which rewrites exactly the arena entries
//! involved. A node has at most one parent, and reattachment is refused
//! when the new parent lies inside the node's own subtree.

use crate::annotation::Annotation;
use crate::error::TreeError;
use crate::node::{Node, NodeId, NodeKind};
use std::collections::{HashMap, HashSet, VecDeque};

/// Arena of nodes addressed by [`NodeId`]
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
}

impl Tree {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a standalone node and return its id
    pub fn create(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
        kind: NodeKind,
    ) -> NodeId {
        self.insert(Node::new(title, content, kind))
    }

    /// Move a standalone node into the arena
    ///
    /// Links carried by `node` are cleared; use [`Tree::set_parent`] to
    /// attach it.
    pub fn insert(&mut self, mut node: Node) -> NodeId {
        node.parent = None;
        node.children.clear();
        let id = node.id();
        self.nodes.insert(id, node);
        id
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// # Errors
    /// [`TreeError::NodeNotFound`] for unknown ids.
    pub fn node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NodeNotFound(id))
    }

    /// # Errors
    /// [`TreeError::NodeNotFound`] for unknown ids.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::NodeNotFound(id))
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(Node::parent)
    }

    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map(Node::children).unwrap_or(&[])
    }

    /// Attach `child` as the last child of `parent`
    ///
    /// If `child` already has a parent it is detached from it first, so
    /// ownership transfers rather than being shared.
    ///
    /// # Errors
    /// - [`TreeError::NodeNotFound`] if either id is unknown
    /// - [`TreeError::CycleDetected`] if `parent` is `child` or one of its descendants
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<(), TreeError> {
        if !self.contains(child) {
            return Err(TreeError::NodeNotFound(child));
        }
        if !self.contains(parent) {
            return Err(TreeError::NodeNotFound(parent));
        }
        if child == parent || self.is_ancestor(child, parent)? {
            return Err(TreeError::CycleDetected { child, parent });
        }

        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);

        debug_assert!(self.check_links().is_ok(), "links corrupted by set_parent");
        Ok(())
    }

    /// Clear both sides of the link between `id` and its parent
    ///
    /// The node keeps its own subtree. Detaching a root is a no-op.
    ///
    /// # Errors
    /// [`TreeError::NodeNotFound`] for unknown ids.
    pub fn detach(&mut self, id: NodeId) -> Result<(), TreeError> {
        let Some(parent) = self.node(id)?.parent else {
            return Ok(());
        };
        let siblings = &mut self.node_mut(parent)?.children;
        let before = siblings.len();
        siblings.retain(|c| *c != id);
        if siblings.len() == before {
            return Err(TreeError::CorruptedLinks(parent));
        }
        self.node_mut(id)?.parent = None;
        Ok(())
    }

    /// Whether `candidate` is a proper ancestor of `id`
    ///
    /// # Errors
    /// [`TreeError::CorruptedLinks`] if the walk to the root does not end.
    pub fn is_ancestor(&self, candidate: NodeId, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.ancestors(id)?.contains(&candidate))
    }

    /// Ancestors of `id`, nearest first
    ///
    /// # Errors
    /// [`TreeError::CorruptedLinks`] if the walk exceeds the arena size.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut out = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(p) = current {
            if out.len() > self.nodes.len() {
                return Err(TreeError::CorruptedLinks(id));
            }
            out.push(p);
            current = self.node(p)?.parent;
        }
        Ok(out)
    }

    /// Number of edges between `id` and its root
    ///
    /// # Errors
    /// See [`Tree::ancestors`].
    pub fn depth(&self, id: NodeId) -> Result<usize, TreeError> {
        Ok(self.ancestors(id)?.len())
    }

    /// Breadth-first order of the subtree rooted at `root`
    #[must_use]
    pub fn bfs(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            queue.extend(self.children(id).iter().copied());
        }
        order
    }

    /// Depth-first pre-order of the subtree rooted at `root`
    #[must_use]
    pub fn dfs(&self, root: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Leaves of the subtree in document order
    #[must_use]
    pub fn leaves(&self, root: NodeId) -> Vec<NodeId> {
        self.dfs(root)
            .into_iter()
            .filter(|id| self.children(*id).is_empty())
            .collect()
    }

    /// Attach an annotation to a node
    ///
    /// # Errors
    /// [`TreeError::NodeNotFound`] or [`TreeError::DuplicateAnnotation`].
    pub fn attach<A: Annotation>(&mut self, id: NodeId, annotation: A) -> Result<(), TreeError> {
        self.node_mut(id)?.attach(annotation)
    }

    /// Annotation lookup by node and kind
    #[must_use]
    pub fn annotation<A: Annotation>(&self, id: NodeId) -> Option<&A> {
        self.nodes.get(&id).and_then(Node::get::<A>)
    }

    /// Verify the arena forms a forest
    ///
    /// Every child must point back at the parent listing it, every
    /// parent must list the child, and every ancestor walk must end.
    ///
    /// # Errors
    /// [`TreeError::CorruptedLinks`] naming the first offending node.
    pub fn check_links(&self) -> Result<(), TreeError> {
        for (id, node) in &self.nodes {
            for child in node.children() {
                let back = self.node(*child).map_err(|_| TreeError::CorruptedLinks(*id))?;
                if back.parent != Some(*id) {
                    return Err(TreeError::CorruptedLinks(*child));
                }
            }
            if let Some(parent) = node.parent {
                let listed = self
                    .node(parent)
                    .map(|p| p.children.iter().filter(|c| *c == id).count())
                    .map_err(|_| TreeError::CorruptedLinks(*id))?;
                if listed != 1 {
                    return Err(TreeError::CorruptedLinks(*id));
                }
            }
            self.ancestors(*id)?;
        }
        Ok(())
    }
}
