//! Embedding configuration and backend construction.

use hubsearch_core::{Error, Result, RetryPolicy};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::backend::EmbeddingBackend;
use crate::cache::CachedEmbeddingBackend;
use crate::http::HttpEmbeddingBackend;
use crate::mock::MockEmbeddingBackend;

/// Which embedding backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic vectors, no model.
    #[default]
    Mock,
    /// Remote embedding service over HTTP.
    Http,
    /// Local fastembed model (requires `embed-fastembed`).
    Fastembed,
}

/// Embedding engine configuration.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend to construct.
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Base URL of the embedding service (HTTP provider).
    #[serde(default = "default_url")]
    pub url: String,

    /// Model name (e.g., "all-minilm-l6-v2").
    #[serde(default = "default_model")]
    pub model: String,

    /// Expected embedding dimension.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Normalize to unit length unless a call says otherwise.
    #[serde(default = "default_true")]
    pub normalize: bool,

    /// Character budget for preprocessed text.
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,

    /// Maximum texts per backend request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// LRU cache capacity in vectors; 0 disables the cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per request, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Log dimension mismatches instead of failing.
    #[serde(default)]
    pub allow_dimension_mismatch: bool,

    /// Directory for downloaded model files (fastembed provider).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
}

fn default_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_model() -> String {
    "all-minilm-l6-v2".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_true() -> bool {
    true
}

fn default_max_text_chars() -> usize {
    8192
}

fn default_max_batch_size() -> usize {
    100
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            url: default_url(),
            model: default_model(),
            dimension: default_dimension(),
            normalize: default_true(),
            max_text_chars: default_max_text_chars(),
            max_batch_size: default_max_batch_size(),
            cache_capacity: default_cache_capacity(),
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            allow_dimension_mismatch: false,
            cache_dir: None,
        }
    }
}

impl EmbeddingConfig {
    /// Retry policy for backend requests.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }

    /// Reject settings no backend can work with.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::config("embedding.dimension must be greater than 0"));
        }
        if self.max_text_chars == 0 {
            return Err(Error::config("embedding.max_text_chars must be greater than 0"));
        }
        if self.max_batch_size == 0 {
            return Err(Error::config("embedding.max_batch_size must be greater than 0"));
        }
        if self.provider == EmbeddingProviderKind::Http && self.url.trim().is_empty() {
            return Err(Error::config("embedding.url is required for the http provider"));
        }
        Ok(())
    }
}

/// Construct the configured backend, wrapped in a cache when enabled.
///
/// The backend is not initialized; call
/// [`EmbeddingBackend::initialize`] before first use.
pub fn build_backend(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    config.validate()?;

    let backend: Arc<dyn EmbeddingBackend> = match config.provider {
        EmbeddingProviderKind::Mock => Arc::new(MockEmbeddingBackend::new(config.dimension)),
        EmbeddingProviderKind::Http => Arc::new(HttpEmbeddingBackend::new(config)?),
        EmbeddingProviderKind::Fastembed => build_fastembed(config)?,
    };

    info!(
        "Embedding backend: {} (dimension {}, cache {})",
        backend.name(),
        backend.dimension(),
        config.cache_capacity
    );

    if config.cache_capacity == 0 {
        return Ok(backend);
    }
    Ok(Arc::new(CachedEmbeddingBackend::new(
        backend,
        config.cache_capacity,
    )?))
}

#[cfg(feature = "embed-fastembed")]
fn build_fastembed(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    Ok(Arc::new(crate::fastembed::FastEmbedBackend::new(
        &config.model,
        config.cache_dir.as_deref(),
    )?))
}

#[cfg(not(feature = "embed-fastembed"))]
fn build_fastembed(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    Err(Error::config(
        "embedding provider 'fastembed' requires the embed-fastembed feature",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, EmbeddingProviderKind::Mock);
        assert_eq!(config.dimension, 384);
        assert_eq!(config.max_batch_size, 100);
        assert!(config.normalize);
        assert!(!config.allow_dimension_mismatch);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: EmbeddingConfig =
            serde_json::from_str(r#"{"provider":"http","url":"http://embed:8001"}"#).unwrap();
        assert_eq!(config.provider, EmbeddingProviderKind::Http);
        assert_eq!(config.url, "http://embed:8001");
        assert_eq!(config.model, "all-minilm-l6-v2");
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let config = EmbeddingConfig {
            dimension: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = EmbeddingConfig {
            retry_attempts: 5,
            retry_delay_ms: 250,
            timeout_ms: 2000,
            ..Default::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(250));
        assert_eq!(policy.timeout(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_build_mock_backend_is_cached() {
        let backend = build_backend(&EmbeddingConfig::default()).unwrap();
        assert_eq!(backend.name(), "mock");
        assert_eq!(backend.dimension(), 384);
        assert_eq!(backend.cache_stats().capacity, 10_000);
    }

    #[test]
    fn test_build_without_cache() {
        let config = EmbeddingConfig {
            cache_capacity: 0,
            ..Default::default()
        };
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.cache_stats().capacity, 0);
    }

    #[cfg(not(feature = "embed-fastembed"))]
    #[test]
    fn test_fastembed_requires_feature() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderKind::Fastembed,
            ..Default::default()
        };
        assert!(matches!(build_backend(&config), Err(Error::Config(_))));
    }
}
