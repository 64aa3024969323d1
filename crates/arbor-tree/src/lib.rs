//! Arbor Tree
//!
//! The data model shared by every stage of the pipeline:
//!
//! - [`Tree`]: arena of [`Node`]s; parent/child links are ids, never pointers
//! - [`Annotation`]: typed derived state attached to a node, one per kind
//! - [`WireTree`]: the flattened, transmissible form of an annotated tree
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_tree::{NodeKind, Summary, Tree};
//!
//! let mut tree = Tree::new();
//! let doc = tree.create("Paper", "", NodeKind::Document);
//! let intro = tree.create("Introduction", "<p>...</p>", NodeKind::Section);
//! tree.set_parent(intro, doc)?;
//! tree.attach(intro, Summary::text("A short introduction."))?;
//!
//! let wire = arbor_tree::serialize(&tree, doc)?;
//! assert_eq!(wire.len(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod annotation;
mod error;
mod markup;
mod node;
mod tree;
mod wire;

pub use annotation::{
    Annotation, AnnotationKind, AnnotationValue, Annotations, KeyPoint, RelatedFigures, Summary,
    SummaryFailure, FAILED_SUMMARY,
};
pub use error::{TreeError, WireError};
pub use markup::{escape_html, html_component};
pub use node::{Node, NodeId, NodeKind};
pub use tree::Tree;
pub use wire::{serialize, TreeMetadata, WireNode, WireTree, TOOL_PANELS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
