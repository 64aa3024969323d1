//! Node identity and per-node state
//!
//! A [`Node`] owns its title, content and annotations. Its parent and
//! children are plain [`NodeId`]s that only [`Tree`](crate::Tree) may
//! rewrite, so links can never be edited from one side alone.

use crate::annotation::{Annotation, Annotations};
use crate::error::TreeError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use uuid::Uuid;

/// Stable node identifier, assigned at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub Uuid);

impl NodeId {
    /// Generate a fresh random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural role of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Whole document (tree root)
    Document,
    /// Top-level section
    Section,
    /// Nested section
    Subsection,
    /// Running text
    Paragraph,
    /// Figure with caption
    Figure,
    /// Table with caption
    Table,
    /// Anything the source did not classify
    #[default]
    Generic,
}

impl NodeKind {
    /// Tag used as `nodeTypeName` on the wire
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Section => "section",
            Self::Subsection => "subsection",
            Self::Paragraph => "paragraph",
            Self::Figure => "figure",
            Self::Table => "table",
            Self::Generic => "generic",
        }
    }

    /// Figures and tables carry a payload rather than prose
    #[inline]
    #[must_use]
    pub const fn is_media(self) -> bool {
        matches!(self, Self::Figure | Self::Table)
    }

    /// Document, section or subsection
    #[inline]
    #[must_use]
    pub const fn is_sectional(self) -> bool {
        matches!(self, Self::Document | Self::Section | Self::Subsection)
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural unit of a document
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    title: String,
    content: String,
    kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    annotations: Annotations,
}

impl Node {
    /// Create a standalone node (no parent, no children)
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::new(),
            title: title.into(),
            content: content.into(),
            kind,
            parent: None,
            children: Vec::new(),
            annotations: Annotations::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[inline]
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[inline]
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[inline]
    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = kind;
    }

    /// Current parent, if attached
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Attach an annotation of a kind this node does not carry yet
    ///
    /// # Errors
    /// [`TreeError::DuplicateAnnotation`] if one of that kind exists.
    pub fn attach<A: Annotation>(&mut self, annotation: A) -> Result<(), TreeError> {
        self.annotations
            .attach(annotation)
            .map_err(|kind| TreeError::DuplicateAnnotation {
                node: self.id,
                kind,
            })
    }

    /// Lookup by kind; `None` means "not processed yet"
    #[inline]
    #[must_use]
    pub fn get<A: Annotation>(&self) -> Option<&A> {
        self.annotations.get::<A>()
    }

    #[inline]
    pub fn get_mut<A: Annotation>(&mut self) -> Option<&mut A> {
        self.annotations.get_mut::<A>()
    }

    #[inline]
    #[must_use]
    pub fn has<A: Annotation>(&self) -> bool {
        self.annotations.contains::<A>()
    }

    /// Explicit upsert, returning the previous value of that kind
    #[inline]
    pub fn update<A: Annotation>(&mut self, annotation: A) -> Option<A> {
        self.annotations.update(annotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Summary;

    #[test]
    fn new_node_is_standalone() {
        let node = Node::new("Intro", "<p>x</p>", NodeKind::Section);
        assert!(node.parent().is_none());
        assert!(node.is_leaf());
        assert_eq!(node.title(), "Intro");
        assert_eq!(node.kind().as_str(), "section");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(NodeId::new(), NodeId::new());
    }

    #[test]
    fn attach_twice_fails_with_node_id() {
        let mut node = Node::new("", "", NodeKind::Paragraph);
        node.attach(Summary::text("first")).unwrap();
        let err = node.attach(Summary::text("second")).unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicateAnnotation {
                node: node.id(),
                kind: crate::AnnotationKind::Summary
            }
        );
        assert_eq!(node.get::<Summary>().unwrap().content.as_deref(), Some("first"));
    }

    #[test]
    fn update_replaces_existing() {
        let mut node = Node::new("", "", NodeKind::Paragraph);
        assert!(node.update(Summary::text("a")).is_none());
        let previous = node.update(Summary::text("b")).unwrap();
        assert_eq!(previous.content.as_deref(), Some("a"));
        assert_eq!(node.get::<Summary>().unwrap().content.as_deref(), Some("b"));
    }

    #[test]
    fn kind_predicates() {
        assert!(NodeKind::Figure.is_media());
        assert!(NodeKind::Table.is_media());
        assert!(!NodeKind::Paragraph.is_media());
        assert!(NodeKind::Subsection.is_sectional());
    }
}
