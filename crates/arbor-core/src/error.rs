//! Error types for Arbor Core
//!
//! One enum per stage; [`PipelineError`] is the document-level error
//! that wraps whichever stage failed.

use arbor_oracle::OracleError;
use arbor_tree::{TreeError, WireError};

/// Hierarchy reconstruction failure
#[derive(Debug, thiserror::Error)]
pub enum ReconstructError {
    /// Oracle failed after retries, or answered invalidly
    #[error("oracle failed during reconstruction: {0}")]
    Oracle(#[from] OracleError),

    /// Arena rejected a link change
    #[error("tree error during reconstruction: {0}")]
    Tree(#[from] TreeError),

    /// Nesting went deeper than the configured limit
    #[error("recursion depth {depth} exceeds limit {max}")]
    RecursionDepthExceeded { depth: usize, max: usize },
}

/// Failure raised by a node worker
///
/// The evaluator recovers from [`WorkerError::Recoverable`] locally and
/// aborts the round on [`WorkerError::Fatal`].
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{0}")]
    Recoverable(String),

    #[error("{0}")]
    Fatal(String),
}

impl WorkerError {
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

impl From<OracleError> for WorkerError {
    fn from(value: OracleError) -> Self {
        Self::Recoverable(value.to_string())
    }
}

impl From<TreeError> for WorkerError {
    fn from(value: TreeError) -> Self {
        Self::Fatal(value.to_string())
    }
}

/// Dependency-ordered evaluation failure
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// A round retired no node
    #[error("dependency deadlock in round {round}: {} node(s) stuck: {}", .stuck.len(), .stuck.join(", "))]
    DependencyDeadlock { stuck: Vec<String>, round: usize },

    /// A worker raised a fatal error
    #[error("worker aborted on node {node}: {message}")]
    WorkerAborted { node: String, message: String },

    /// A worker task was cancelled by the runtime
    #[error("worker task cancelled: {0}")]
    Cancelled(String),
}

impl EvaluationError {
    /// Ids of the nodes that could not make progress
    #[must_use]
    pub fn stuck_nodes(&self) -> &[String] {
        match self {
            Self::DependencyDeadlock { stuck, .. } => stuck,
            _ => &[],
        }
    }
}

/// Configuration loading failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("environment variable {0} is not set")]
    MissingEnv(String),
}

/// Tree publishing failure
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Network failure or timeout
    #[error("publish request failed: {0}")]
    Http(String),

    /// Viewer service answered with a non-success status
    #[error("viewer service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body lacked a tree identifier
    #[error("viewer service response has no tree_id")]
    MissingTreeId,

    /// Payload failed local validation
    #[error("refusing to publish invalid tree: {0}")]
    Wire(#[from] WireError),
}

impl PublishError {
    /// Network failures and server errors are worth retrying
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::MissingTreeId | Self::Wire(_) => false,
        }
    }
}

/// Document-level pipeline failure, carrying the originating cause
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("document has no content blocks")]
    EmptyDocument,

    #[error("reconstruction failed: {0}")]
    Reconstruct(#[from] ReconstructError),

    #[error("evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}
