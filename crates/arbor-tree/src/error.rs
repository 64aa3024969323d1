//! Error types for the tree model
//!
//! - [`TreeError`]: arena link and annotation errors
//! - [`WireError`]: invalid or unparsable wire payloads

use crate::annotation::AnnotationKind;
use crate::node::NodeId;

/// Errors raised by arena operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// Id is not present in the arena
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Reattachment would make a node its own ancestor
    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { child: NodeId, parent: NodeId },

    /// A second annotation of the same kind was attached
    #[error("node {node} already has a {kind} annotation")]
    DuplicateAnnotation { node: NodeId, kind: AnnotationKind },

    /// Parent and child lists disagree, or an ancestor walk did not end
    #[error("corrupted links at node {0}")]
    CorruptedLinks(NodeId),
}

/// Errors raised while parsing or validating a [`WireTree`](crate::WireTree)
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Payload is not valid JSON for the wire schema
    #[error("invalid wire payload: {0}")]
    Json(#[from] serde_json::Error),

    /// `metadata.rootId` has no entry in `nodeDict`
    #[error("root {0} is missing from the node dictionary")]
    MissingRoot(String),

    /// More than one entry (or the wrong entry) has a null parent
    #[error("expected a single root with null parent, found {0:?}")]
    RootMismatch(Vec<String>),

    /// A parent reference points outside the dictionary
    #[error("node {node} references unknown parent {parent}")]
    DanglingParent { node: String, parent: String },

    /// A child reference points outside the dictionary
    #[error("node {node} references unknown child {child}")]
    DanglingChild { node: String, child: String },

    /// Parent lists a child whose own parent field disagrees
    #[error("node {child} is listed under {parent} but records a different parent")]
    AsymmetricLink { parent: String, child: String },

    /// Entries that cannot be reached from the root
    #[error("unreachable nodes: {0:?}")]
    Unreachable(Vec<String>),
}
