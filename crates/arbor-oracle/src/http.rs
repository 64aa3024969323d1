//! Chat-completions backend
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol in JSON
//! mode and returns the parsed message content.

use crate::error::OracleError;
use crate::request::OracleRequest;
use crate::Oracle;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const SYSTEM_PROMPT: &str =
    "You are an assistant that reads scientific documents. Always answer with one JSON object.";

/// Connection settings for [`HttpOracle`]
#[derive(Debug, Clone)]
pub struct HttpOracleConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,
    pub api_key: String,
    /// Model for ordinary requests
    pub model: String,
    /// Model for requests flagged `high_quality`
    pub high_quality_model: String,
    pub timeout: Duration,
}

impl HttpOracleConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            high_quality_model: "gpt-4o".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    #[must_use]
    pub fn with_models(mut self, model: impl Into<String>, high_quality: impl Into<String>) -> Self {
        self.model = model.into();
        self.high_quality_model = high_quality.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

/// Oracle backed by a chat-completions HTTP API
#[derive(Clone)]
pub struct HttpOracle {
    config: HttpOracleConfig,
    client: reqwest::Client,
}

impl HttpOracle {
    /// # Errors
    /// [`OracleError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpOracleConfig) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn model_for(&self, request: &OracleRequest) -> &str {
        if request.high_quality {
            &self.config.high_quality_model
        } else {
            &self.config.model
        }
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<serde_json::Value, OracleError> {
        let body = serde_json::json!({
            "model": self.model_for(request),
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": &request.prompt}
            ],
            "temperature": 0.1,
            "response_format": {"type": "json_object"}
        });

        tracing::debug!(task = request.task.name(), model = self.model_for(request), "oracle request");

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OracleError::Transport(format!("HTTP {status}: {text}")));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Format(e.to_string()))?;
        let content = api
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::Format("completion has no content".into()))?;

        parse_content(&content)
    }
}

/// Parse message content as a JSON object
///
/// Tolerates a fenced code block around the object.
fn parse_content(content: &str) -> Result<serde_json::Value, OracleError> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed);
    let value: serde_json::Value = serde_json::from_str(unfenced.trim())?;
    if value.is_object() {
        Ok(value)
    } else {
        Err(OracleError::Format(format!("expected JSON object, got {value}")))
    }
}
