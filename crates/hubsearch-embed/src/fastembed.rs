//! FastEmbed embedding backend.
//!
//! Wraps the `fastembed` crate for local embedding generation with
//! pre-trained models. The model is loaded by
//! [`initialize`](EmbeddingBackend::initialize), not by the constructor,
//! so a service can start answering health checks while the download runs.
//!
//! # Thread Safety
//!
//! `fastembed::TextEmbedding` needs exclusive access per call, so it sits
//! behind `Arc<Mutex<>>` and every call runs on `tokio::task::spawn_blocking`.
//!
//! # Feature Gate
//!
//! This module requires the `embed-fastembed` feature.

use async_trait::async_trait;
use hubsearch_core::{Error, Result};
use log::info;
use std::sync::{Arc, Mutex, OnceLock};

use crate::backend::{BackendEmbeddings, EmbeddingBackend};

/// Map a model name to its fastembed variant and output dimension.
fn resolve_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match name {
        "all-minilm-l6-v2" | "all-MiniLM-L6-v2" | "AllMiniLML6V2" => {
            Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384))
        }
        "bge-small-en-v1.5" | "BGESmallENV15" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
        "bge-base-en-v1.5" | "BGEBaseENV15" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" | "BGELargeENV15" => {
            Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024))
        }
        other => Err(Error::config(format!(
            "Unknown embedding model: '{other}'. Supported: all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5"
        ))),
    }
}

type SharedModel = Arc<Mutex<fastembed::TextEmbedding>>;

/// FastEmbed-based embedding backend.
///
/// | Name | Dimension |
/// |------|-----------|
/// | `all-minilm-l6-v2` | 384 |
/// | `bge-small-en-v1.5` | 384 |
/// | `bge-base-en-v1.5` | 768 |
/// | `bge-large-en-v1.5` | 1024 |
pub struct FastEmbedBackend {
    model: OnceLock<SharedModel>,
    variant: fastembed::EmbeddingModel,
    dimension: usize,
    model_name: String,
    cache_dir: Option<String>,
}

impl FastEmbedBackend {
    /// Create a backend for `model_name`. Fails fast on unknown names.
    pub fn new(model_name: &str, cache_dir: Option<&str>) -> Result<Self> {
        let (variant, dimension) = resolve_model(model_name)?;
        Ok(Self {
            model: OnceLock::new(),
            variant,
            dimension,
            model_name: model_name.to_string(),
            cache_dir: cache_dir.map(str::to_string),
        })
    }

    fn loaded(&self) -> Result<SharedModel> {
        self.model
            .get()
            .cloned()
            .ok_or_else(|| Error::not_initialized("fastembed backend"))
    }

    async fn embed_blocking(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let model = self.loaded()?;
        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|e| Error::backend("embed", format!("Mutex poisoned: {e}")))?;
            model
                .embed(texts, None)
                .map_err(|e| Error::backend("embed", format!("Embedding failed: {e}")))
        })
        .await
        .map_err(|e| Error::backend("embed", format!("spawn_blocking failed: {e}")))?
    }
}

#[async_trait]
impl EmbeddingBackend for FastEmbedBackend {
    async fn initialize(&self) -> Result<()> {
        if self.model.get().is_some() {
            return Ok(());
        }

        let mut init = fastembed::InitOptions::new(self.variant.clone());
        if let Some(dir) = &self.cache_dir {
            init = init.with_cache_dir(std::path::PathBuf::from(dir));
        }
        let name = self.model_name.clone();
        info!("Loading embedding model: {name}");

        let text_embedding = tokio::task::spawn_blocking(move || {
            fastembed::TextEmbedding::try_new(init).map_err(|e| {
                Error::backend_unavailable("initialize", format!("Failed to load model {name}: {e}"))
            })
        })
        .await
        .map_err(|e| Error::backend("initialize", format!("spawn_blocking failed: {e}")))??;

        // A concurrent initialize may have won; either model is equivalent.
        let _ = self.model.set(Arc::new(Mutex::new(text_embedding)));
        info!("Model loaded successfully");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.model.get().is_some()
    }

    async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_blocking(vec![text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::backend("embed", "No embedding returned"))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
        let embeddings = self.embed_blocking(texts.to_vec()).await?;
        Ok(BackendEmbeddings::computed(texts, embeddings))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl std::fmt::Debug for FastEmbedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedBackend")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension)
            .field("loaded", &self.is_ready())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_known() {
        assert_eq!(resolve_model("all-minilm-l6-v2").unwrap().1, 384);
        assert_eq!(resolve_model("bge-base-en-v1.5").unwrap().1, 768);
        assert_eq!(resolve_model("bge-large-en-v1.5").unwrap().1, 1024);
    }

    #[test]
    fn test_resolve_model_unknown() {
        let err = resolve_model("nonexistent-model").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding model"));
    }

    #[tokio::test]
    async fn test_not_ready_before_initialize() {
        let backend = FastEmbedBackend::new("all-minilm-l6-v2", None).unwrap();
        assert!(!backend.is_ready());
        let err = backend.generate_single_embedding("hi").await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[tokio::test]
    #[ignore = "requires model download (~80MB)"]
    async fn test_fastembed_embed_batch() {
        let backend = FastEmbedBackend::new("all-minilm-l6-v2", None).unwrap();
        backend.initialize().await.unwrap();
        let texts = vec!["Hello".to_string(), "World".to_string()];
        let out = backend.generate_embeddings(&texts).await.unwrap();

        assert_eq!(out.embeddings.len(), 2);
        assert!(out.embeddings.iter().all(|e| e.len() == 384));
    }
}
