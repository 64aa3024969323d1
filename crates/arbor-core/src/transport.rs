//! Wire transport to the tree viewer service
//!
//! `PUT {host}/api/createTree` with `{ tree, root_id }`; the service
//! answers with the identifier it stored the tree under.

use crate::error::PublishError;
use arbor_tree::WireTree;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Body of a publish call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub tree: WireTree,
    pub root_id: String,
}

impl From<WireTree> for PublishRequest {
    fn from(tree: WireTree) -> Self {
        let root_id = tree.root_id().to_string();
        Self { tree, root_id }
    }
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    tree_id: Option<String>,
}

/// Consumer of finished trees
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Deliver a tree and return the identifier the receiver assigned
    async fn publish(&self, tree: &WireTree) -> Result<String, PublishError>;
}

/// [`Publisher`] for the HTTP viewer service
#[derive(Clone)]
pub struct HttpPublisher {
    host: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl HttpPublisher {
    /// # Errors
    /// [`PublishError::Http`] if the HTTP client cannot be built.
    pub fn new(host: impl Into<String>, timeout: Duration) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Http(e.to_string()))?;
        Ok(Self {
            host: host.into(),
            token: None,
            client,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/api/createTree", self.host.trim_end_matches('/'))
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, tree: &WireTree) -> Result<String, PublishError> {
        tree.validate()?;
        let body = PublishRequest::from(tree.clone());

        let mut request = self.client.put(self.endpoint()).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Http(e.to_string()))?;
        let tree_id = parsed
            .tree_id
            .filter(|id| !id.is_empty())
            .ok_or(PublishError::MissingTreeId)?;
        tracing::info!(%tree_id, nodes = tree.len(), "tree published");
        Ok(tree_id)
    }
}
