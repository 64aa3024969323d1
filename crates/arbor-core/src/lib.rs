//! Arbor Core
//!
//! Turns a flat sequence of content blocks into an annotated document
//! tree:
//!
//! 1. [`Reconstructor`] infers nesting with one oracle classification
//!    per scope
//! 2. [`normalize`] tidies the result and [`extract_abstract`] lifts the
//!    abstract to the root
//! 3. [`Evaluator`] runs the [`SummaryWorker`] bottom-up over a bounded
//!    worker pool
//! 4. [`arbor_tree::serialize`] flattens the tree for [`Publisher`]s
//!
//! [`DocumentPipeline`] wires the stages together behind an optional
//! [`TreeCache`].
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_core::{ArborConfig, CandidateBlock, DocumentPipeline, SourceDocument};
//!
//! let pipeline = DocumentPipeline::new(oracle, ArborConfig::default());
//! let document = SourceDocument::new("Paper", vec![
//!     CandidateBlock::new("Introduction", "<p>...</p>"),
//!     CandidateBlock::new("", "<p>...</p>"),
//! ]);
//! let output = pipeline.run(&document).await?;
//! println!("{}", output.tree.to_json()?);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod config;
mod error;
mod evaluate;
mod normalize;
mod pipeline;
mod reconstruct;
mod summarize;
mod text;
mod transport;

pub use cache::{DocumentKey, MemoryTreeCache, TreeCache};
pub use config::{ArborConfig, OracleSettings, TransportSettings};
pub use error::{
    ConfigError, EvaluationError, PipelineError, PublishError, ReconstructError, WorkerError,
};
pub use evaluate::{EvaluationReport, Evaluator, NodeWorker, Readiness};
pub use normalize::{
    collapse_lone_leaves, collect_related_figures, extract_abstract, merge_untitled_siblings,
    normalize, prune_empty_leaves, NormalizeStats, ABSTRACT_TITLE, MERGE_SEPARATOR,
    MERGE_THRESHOLD,
};
pub use pipeline::{BuildStats, CandidateBlock, DocumentPipeline, PipelineOutput, SourceDocument};
pub use reconstruct::{ReconstructStats, Reconstructor};
pub use summarize::{SummaryWorker, GENERATED_TITLE_PREFIX};
pub use text::{plain_text, preview};
pub use transport::{HttpPublisher, PublishRequest, Publisher};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
