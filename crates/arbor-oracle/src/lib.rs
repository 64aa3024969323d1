//! Arbor Oracle
//!
//! The boundary to the external classification/generation service:
//!
//! - [`Oracle`]: one JSON completion per [`OracleRequest`]
//! - [`OracleClient`]: typed calls with response validation and the
//!   bounded [`RetryPolicy`]
//! - [`HttpOracle`]: OpenAI-compatible chat-completions backend
//! - [`CachedOracle`]: memoizes accepted completions by request hash
//!
//! Requests carry their structured payload in [`OracleTask`] next to
//! the rendered prompt, so deterministic test oracles can answer from
//! the payload without reading prose.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod client;
mod error;
mod http;
mod prompt;
mod request;
mod retry;

pub use cache::CachedOracle;
pub use client::{validate_top_level, OracleClient};
pub use error::{InvalidOracleResponse, OracleError};
pub use http::{HttpOracle, HttpOracleConfig};
pub use prompt::render_prompt;
pub use request::{
    CandidateView, OracleRequest, OracleTask, PointEntry, PointsResponse, SectionDigest,
    TitleResponse, TopLevelResponse,
};
pub use retry::RetryPolicy;

use async_trait::async_trait;
use std::sync::Arc;

/// External judgment service
///
/// Implementations return the parsed JSON object of one completion.
/// Transport problems map to [`OracleError::Transport`], unparsable
/// bodies to [`OracleError::Format`].
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, request: &OracleRequest) -> Result<serde_json::Value, OracleError>;

    /// Called when the answer to `request` failed validation
    ///
    /// Memoizing implementations drop what they stored for `request` so
    /// the next attempt reaches the service again.
    async fn reject(&self, _request: &OracleRequest) {}
}

#[async_trait]
impl<T: Oracle + ?Sized> Oracle for Arc<T> {
    async fn complete(&self, request: &OracleRequest) -> Result<serde_json::Value, OracleError> {
        (**self).complete(request).await
    }

    async fn reject(&self, request: &OracleRequest) {
        (**self).reject(request).await;
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
