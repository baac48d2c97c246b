//! Deterministic embedding backend for tests and offline development.

use async_trait::async_trait;
use hubsearch_core::Result;

use crate::backend::{BackendEmbeddings, EmbeddingBackend};

/// A mock embedding backend.
///
/// Each component is derived from the text bytes, so the same input always
/// yields the same vector and different inputs almost always differ.
/// Vectors are deliberately left unnormalized; normalization is the
/// engine's job.
#[derive(Debug, Clone)]
pub struct MockEmbeddingBackend {
    dimension: usize,
}

impl MockEmbeddingBackend {
    /// Create a new mock backend with the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn deterministic_embedding(&self, text: &str) -> Vec<f32> {
        let bytes = text.as_bytes();
        if bytes.is_empty() {
            return vec![0.0; self.dimension];
        }
        (0..self.dimension)
            .map(|i| {
                let byte_val = bytes[i % bytes.len()] as usize;
                ((byte_val + i * 7) % 256) as f32 / 64.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.deterministic_embedding(text))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
        let embeddings = texts
            .iter()
            .map(|t| self.deterministic_embedding(t))
            .collect();
        Ok(BackendEmbeddings::computed(texts, embeddings))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Tests
// ============================================================================
