//! Content-keyed LRU cache in front of an embedding backend.
//!
//! Keys are BLAKE3 digests of the exact text sent to the backend, so two
//! texts share an entry only if they are byte-identical. The lock is never
//! held across an `.await`: lookups and inserts happen in short critical
//! sections on either side of the one inner backend call.

use async_trait::async_trait;
use hubsearch_core::{Error, Result};
use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::backend::{BackendEmbeddings, CacheStats, EmbeddingBackend};

type CacheKey = blake3::Hash;

/// Caching wrapper around any [`EmbeddingBackend`].
pub struct CachedEmbeddingBackend<B: ?Sized = dyn EmbeddingBackend> {
    inner: Arc<B>,
    cache: Mutex<LruCache<CacheKey, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<B: EmbeddingBackend + ?Sized> CachedEmbeddingBackend<B> {
    /// Wrap `inner` with a cache holding at most `capacity` vectors.
    pub fn new(inner: Arc<B>, capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| Error::config("embedding cache capacity must be greater than 0"))?;
        Ok(Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &Arc<B> {
        &self.inner
    }

    fn key(text: &str) -> CacheKey {
        blake3::hash(text.as_bytes())
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<CacheKey, Vec<f32>>>> {
        self.cache
            .lock()
            .map_err(|e| Error::backend("embedding cache", format!("Mutex poisoned: {e}")))
    }
}

#[async_trait]
impl<B: EmbeddingBackend + ?Sized> EmbeddingBackend for CachedEmbeddingBackend<B> {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let key = Self::key(text);
        let cached = self.lock()?.get(&key).cloned();
        if let Some(hit) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(hit);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let embedding = self.inner.generate_single_embedding(text).await?;
        self.lock()?.put(key, embedding.clone());
        Ok(embedding)
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
        let keys: Vec<CacheKey> = texts.iter().map(|t| Self::key(t)).collect();
        let mut slots: Vec<Option<Vec<f32>>> = {
            let mut cache = self.lock()?;
            keys.iter().map(|k| cache.get(k).cloned()).collect()
        };

        let miss_idx: Vec<usize> = (0..texts.len()).filter(|&i| slots[i].is_none()).collect();
        let cache_hits = texts.len() - miss_idx.len();
        let mut total_tokens = 0;

        if !miss_idx.is_empty() {
            let miss_texts: Vec<String> = miss_idx.iter().map(|&i| texts[i].clone()).collect();
            let computed = self.inner.generate_embeddings(&miss_texts).await?;
            if computed.embeddings.len() != miss_texts.len() {
                return Err(Error::backend(
                    "generate_embeddings",
                    format!(
                        "backend returned {} embeddings for {} texts",
                        computed.embeddings.len(),
                        miss_texts.len()
                    ),
                ));
            }
            total_tokens = computed.total_tokens;

            let mut cache = self.lock()?;
            for (&i, embedding) in miss_idx.iter().zip(computed.embeddings) {
                cache.put(keys[i], embedding.clone());
                slots[i] = Some(embedding);
            }
        }

        self.hits.fetch_add(cache_hits as u64, Ordering::Relaxed);
        self.misses.fetch_add(miss_idx.len() as u64, Ordering::Relaxed);
        debug!("Embedding cache: {} hits, {} misses", cache_hits, miss_idx.len());

        let mut from_cache = vec![true; texts.len()];
        for &i in &miss_idx {
            from_cache[i] = false;
        }
        let embeddings = slots.into_iter().flatten().collect();

        Ok(BackendEmbeddings {
            embeddings,
            from_cache,
            total_tokens,
            cache_hits,
            cache_misses: miss_idx.len(),
        })
    }

    fn cache_stats(&self) -> CacheStats {
        let (size, capacity) = match self.cache.lock() {
            Ok(cache) => (cache.len(), cache.cap().get()),
            Err(_) => (0, 0),
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size,
            capacity,
        }
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

impl<B: ?Sized> std::fmt::Debug for CachedEmbeddingBackend<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedEmbeddingBackend")
            .field("hits", &self.hits.load(Ordering::Relaxed))
            .field("misses", &self.misses.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::MockEmbeddingBackend;
    use std::sync::atomic::AtomicUsize;

    /// Counts inner batch calls and texts seen.
    struct Counting {
        inner: MockEmbeddingBackend,
        calls: AtomicUsize,
        texts: AtomicUsize,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MockEmbeddingBackend::new(4),
                calls: AtomicUsize::new(0),
                texts: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EmbeddingBackend for Counting {
        async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(1, Ordering::SeqCst);
            self.inner.generate_single_embedding(text).await
        }

        async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            self.inner.generate_embeddings(texts).await
        }

        fn dimension(&self) -> usize {
            4
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = CachedEmbeddingBackend::new(Counting::new(), 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_single_hit_after_miss() {
        let inner = Counting::new();
        let cached = CachedEmbeddingBackend::new(inner.clone(), 8).unwrap();

        let a = cached.generate_single_embedding("hello").await.unwrap();
        let b = cached.generate_single_embedding("hello").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        let stats = cached.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.size), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_batch_makes_one_inner_call_for_misses() {
        let inner = Counting::new();
        let cached = CachedEmbeddingBackend::new(inner.clone(), 8).unwrap();
        cached.generate_single_embedding("b").await.unwrap();

        let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let out = cached.generate_embeddings(&texts).await.unwrap();

        assert_eq!(out.embeddings.len(), 3);
        assert_eq!(out.from_cache, vec![false, true, false]);
        assert_eq!(out.cache_hits, 1);
        assert_eq!(out.cache_misses, 2);
        // one single call + one batch call carrying the two misses
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(inner.texts.load(Ordering::SeqCst), 3);

        let direct = MockEmbeddingBackend::new(4)
            .generate_single_embedding("c")
            .await
            .unwrap();
        assert_eq!(out.embeddings[2], direct);
    }

    #[tokio::test]
    async fn test_full_hit_batch_skips_inner() {
        let inner = Counting::new();
        let cached = CachedEmbeddingBackend::new(inner.clone(), 8).unwrap();
        let texts = vec!["x".to_string(), "y".to_string()];

        cached.generate_embeddings(&texts).await.unwrap();
        let again = cached.generate_embeddings(&texts).await.unwrap();

        assert_eq!(again.from_cache, vec![true, true]);
        assert_eq!(again.total_tokens, 0);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let inner = Counting::new();
        let cached = CachedEmbeddingBackend::new(inner.clone(), 2).unwrap();

        for t in ["one", "two", "three"] {
            cached.generate_single_embedding(t).await.unwrap();
        }
        assert_eq!(cached.cache_stats().size, 2);

        // "one" was evicted
        cached.generate_single_embedding("one").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 4);
    }
}
