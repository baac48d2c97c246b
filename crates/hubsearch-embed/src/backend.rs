//! Embedding backend trait.
//!
//! A backend produces raw (possibly unnormalized) vectors. Everything the
//! caller sees, such as normalization and dimension checks, happens in the
//! engine; backends stay substitutable.

use async_trait::async_trait;
use hubsearch_core::Result;
use serde::{Deserialize, Serialize};

use crate::text::estimate_tokens;

/// Result of one batched backend call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendEmbeddings {
    /// One vector per input text, in input order.
    pub embeddings: Vec<Vec<f32>>,
    /// Per-input flag: served from cache rather than computed.
    pub from_cache: Vec<bool>,
    /// Estimated tokens consumed by the texts actually computed.
    pub total_tokens: usize,
    /// Number of inputs served from cache.
    pub cache_hits: usize,
    /// Number of inputs computed by the backend.
    pub cache_misses: usize,
}

impl BackendEmbeddings {
    /// Wrap freshly computed vectors (no cache involved).
    pub fn computed(texts: &[String], embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            from_cache: vec![false; embeddings.len()],
            total_tokens: texts.iter().map(|t| estimate_tokens(t)).sum(),
            cache_hits: 0,
            cache_misses: embeddings.len(),
            embeddings,
        }
    }
}

/// Cumulative cache counters reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups answered from cache.
    pub hits: u64,
    /// Lookups that reached the backend.
    pub misses: u64,
    /// Entries currently cached.
    pub size: usize,
    /// Maximum number of entries.
    pub capacity: usize,
}

impl CacheStats {
    /// Fraction of lookups answered from cache (0.0 with no lookups).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Trait for generating raw text embeddings.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// across request tasks as `Arc<dyn EmbeddingBackend>`.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// One-time startup (model load, health probe). Defaults to a no-op.
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    fn is_ready(&self) -> bool {
        true
    }

    /// Generate one raw embedding.
    async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate raw embeddings for a batch of texts in one call.
    ///
    /// Default implementation calls `generate_single_embedding` for each
    /// text sequentially. Backends that support native batching should
    /// override this.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.generate_single_embedding(text).await?);
        }
        Ok(BackendEmbeddings::computed(texts, embeddings))
    }

    /// Cache counters; backends without a cache report zeros.
    fn cache_stats(&self) -> CacheStats {
        CacheStats::default()
    }

    /// The embedding dimension this backend produces.
    fn dimension(&self) -> usize;

    /// The backend or model name for diagnostics.
    fn name(&self) -> &str;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Constant;

    #[async_trait]
    impl EmbeddingBackend for Constant {
        async fn generate_single_embedding(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 2.0])
        }

        fn dimension(&self) -> usize {
            2
        }

        fn name(&self) -> &str {
            "constant"
        }
    }

    #[tokio::test]
    async fn test_default_batch_calls_single() {
        let texts = vec!["abcd".to_string(), "abcdefgh".to_string()];
        let out = Constant.generate_embeddings(&texts).await.unwrap();

        assert_eq!(out.embeddings, vec![vec![1.0, 2.0]; 2]);
        assert_eq!(out.from_cache, vec![false, false]);
        assert_eq!(out.total_tokens, 3);
        assert_eq!(out.cache_misses, 2);
        assert_eq!(out.cache_hits, 0);
    }

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            size: 4,
            capacity: 10,
        };
        assert!((stats.hit_rate() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_trait_object_safety() {
        fn _assert_object_safe(_: &dyn EmbeddingBackend) {}
    }
}
