//! Vector store configuration and backend construction.

use hubsearch_core::{Error, Result, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::VectorBackend;
use crate::memory::MemoryVectorBackend;
use crate::types::{CollectionSpec, Distance};

/// Which vector backend to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackendKind {
    /// In-process exact search.
    #[default]
    Memory,
    /// LanceDB (requires `vector-lancedb`).
    Lancedb,
}

/// Vector store configuration.
///
/// Loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Backend to construct.
    #[serde(default)]
    pub backend: VectorBackendKind,

    /// Backend location (LanceDB URI or directory).
    #[serde(default = "default_url")]
    pub url: String,

    /// Credential for hosted backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per request, including the first.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Delay between attempts in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Vector dimension of the required collections.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Similarity metric of the required collections.
    #[serde(default)]
    pub distance: Distance,

    /// Logical to physical collection names. Every entry is created on connect.
    #[serde(default = "default_collections")]
    pub collections: BTreeMap<String, String>,

    /// Search limit used by callers that do not pass one.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Score threshold applied when a search does not set one.
    #[serde(default)]
    pub default_score_threshold: f32,

    /// Copies of each shard.
    #[serde(default = "default_one")]
    pub replication_factor: u32,

    /// Replicas that must acknowledge a write.
    #[serde(default = "default_one")]
    pub write_consistency_factor: u32,

    /// Point count at which the ANN index is built.
    #[serde(default = "default_indexing_threshold")]
    pub indexing_threshold: usize,

    /// Target segment count.
    #[serde(default = "default_segment_number")]
    pub segment_number: usize,
}

fn default_url() -> String {
    "data/vectors".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_dimension() -> usize {
    384
}

fn default_collections() -> BTreeMap<String, String> {
    [
        ("conversations", "projecthub_conversations"),
        ("user_memory", "projecthub_user_memory"),
        ("institutional_knowledge", "projecthub_institutional_knowledge"),
        ("projects", "projecthub_projects"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_limit() -> usize {
    10
}

fn default_one() -> u32 {
    1
}

fn default_indexing_threshold() -> usize {
    20_000
}

fn default_segment_number() -> usize {
    2
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackendKind::default(),
            url: default_url(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            dimension: default_dimension(),
            distance: Distance::default(),
            collections: default_collections(),
            default_limit: default_limit(),
            default_score_threshold: 0.0,
            replication_factor: default_one(),
            write_consistency_factor: default_one(),
            indexing_threshold: default_indexing_threshold(),
            segment_number: default_segment_number(),
        }
    }
}

impl VectorStoreConfig {
    /// Retry policy for backend calls.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_delay_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }

    /// Physical name for a logical collection; unmapped names pass through.
    pub fn physical_name<'a>(&'a self, logical: &'a str) -> &'a str {
        self.collections
            .get(logical)
            .map(String::as_str)
            .unwrap_or(logical)
    }

    /// Creation settings for a collection of the given shape.
    pub fn collection_spec(&self, dimension: usize, distance: Distance) -> CollectionSpec {
        CollectionSpec {
            dimension,
            distance,
            replication_factor: self.replication_factor,
            write_consistency_factor: self.write_consistency_factor,
            indexing_threshold: self.indexing_threshold,
            segment_number: self.segment_number,
        }
    }

    /// Reject settings no backend can work with.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::config("vector.dimension must be greater than 0"));
        }
        if self.collections.iter().any(|(k, v)| k.trim().is_empty() || v.trim().is_empty()) {
            return Err(Error::config("vector.collections entries cannot be empty"));
        }
        Ok(())
    }
}

/// Construct the configured backend.
pub async fn build_backend(config: &VectorStoreConfig) -> Result<Arc<dyn VectorBackend>> {
    config.validate()?;
    match config.backend {
        VectorBackendKind::Memory => Ok(Arc::new(MemoryVectorBackend::new())),
        VectorBackendKind::Lancedb => build_lancedb(config).await,
    }
}

#[cfg(feature = "vector-lancedb")]
async fn build_lancedb(config: &VectorStoreConfig) -> Result<Arc<dyn VectorBackend>> {
    let backend =
        crate::lancedb::LancedbBackend::connect(&config.url, config.api_key.as_deref()).await?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "vector-lancedb"))]
async fn build_lancedb(_config: &VectorStoreConfig) -> Result<Arc<dyn VectorBackend>> {
    Err(Error::config(
        "vector backend 'lancedb' requires the vector-lancedb feature",
    ))
}
