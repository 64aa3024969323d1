//! Arbor configuration
//!
//! One explicit object replaces process-wide toggles. Every field has a
//! default, so a TOML file only needs the keys it changes.

use crate::error::ConfigError;
use arbor_oracle::{HttpOracleConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArborConfig {
    /// Route oracle calls to the high-quality model
    pub use_high_quality_oracle: bool,
    /// Retries after the first attempt of a failed oracle call
    pub max_retries: u32,
    /// Fixed pause between oracle retries
    pub retry_backoff_ms: u64,
    /// Concurrent node workers in the evaluator
    pub worker_count: usize,
    /// Deepest nesting the reconstructor will build
    pub max_depth: usize,
    /// Characters of content shown to the oracle per candidate
    pub preview_chars: usize,
    /// Entries kept by the in-memory tree cache
    pub tree_cache_capacity: u64,
    pub oracle: OracleSettings,
    pub transport: TransportSettings,
}

impl ArborConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// [`ConfigError::Parse`] for malformed TOML, [`ConfigError::Invalid`]
    /// if the result fails [`ArborConfig::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ArborConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    /// [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::Invalid("worker_count must be at least 1".into()));
        }
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid("max_depth must be at least 1".into()));
        }
        if self.preview_chars == 0 {
            return Err(ConfigError::Invalid("preview_chars must be at least 1".into()));
        }
        if self.oracle.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("oracle.endpoint must not be empty".into()));
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn with_high_quality_oracle(mut self, enabled: bool) -> Self {
        self.use_high_quality_oracle = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.worker_count = workers;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_tree_cache_capacity(mut self, capacity: u64) -> Self {
        self.tree_cache_capacity = capacity;
        self
    }

    /// Retry policy derived from `max_retries` and `retry_backoff_ms`
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_backoff_ms))
    }
}

impl Default for ArborConfig {
    fn default() -> Self {
        Self {
            use_high_quality_oracle: false,
            max_retries: 3,
            retry_backoff_ms: 500,
            worker_count: 20,
            max_depth: 16,
            preview_chars: 400,
            tree_cache_capacity: 256,
            oracle: OracleSettings::default(),
            transport: TransportSettings::default(),
        }
    }
}

/// Chat-completions backend settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    pub endpoint: String,
    pub model: String,
    pub high_quality_model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
    /// Memoized completions; 0 disables the response cache
    pub cache_capacity: u64,
}

impl OracleSettings {
    /// Resolve the API key and build the HTTP backend settings
    ///
    /// # Errors
    /// [`ConfigError::MissingEnv`] if the key variable is unset.
    pub fn http_config(&self) -> Result<HttpOracleConfig, ConfigError> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| ConfigError::MissingEnv(self.api_key_env.clone()))?;
        Ok(HttpOracleConfig::new(&self.endpoint, api_key)
            .with_models(&self.model, &self.high_quality_model)
            .with_timeout(Duration::from_secs(self.timeout_secs)))
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            high_quality_model: "gpt-4o".into(),
            api_key_env: "OPENAI_API_KEY".into(),
            timeout_secs: 60,
            cache_capacity: 4096,
        }
    }
}

/// Tree viewer service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub host: String,
    /// Environment variable holding an optional bearer token
    pub token_env: Option<String>,
}

impl TransportSettings {
    /// Bearer token, if a variable is configured and set
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|t| !t.is_empty())
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            host: "http://localhost:29999".into(),
            token_env: None,
        }
    }
}
