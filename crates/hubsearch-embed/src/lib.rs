//! Embedding engine for Hubsearch.
//!
//! Turns free text into fixed-length vectors. The [`EmbeddingEngine`]
//! owns validation, preprocessing, normalization, and dimension checks;
//! raw vectors come from a pluggable [`EmbeddingBackend`].
//!
//! # Backends
//!
//! - [`MockEmbeddingBackend`]: deterministic vectors for tests and offline use
//! - [`CachedEmbeddingBackend`]: content-keyed LRU cache in front of any backend
//! - [`HttpEmbeddingBackend`]: remote embedding service over HTTP
//! - `FastEmbedBackend`: local ONNX models (requires `embed-fastembed`)
//!
//! # Example
//!
//! ```rust,ignore
//! use hubsearch_embed::{EmbeddingConfig, EmbeddingEngine, build_backend};
//!
//! let config = EmbeddingConfig::default();
//! let backend = build_backend(&config)?;
//! backend.initialize().await?;
//! let engine = EmbeddingEngine::new(backend, config);
//! let result = engine.generate_embedding("hello world", None, None).await?;
//! assert_eq!(result.embedding.len(), 384);
//! ```

pub mod backend;
pub mod cache;
pub mod config;
pub mod engine;
pub mod http;
pub mod mock;
pub mod text;
pub mod types;

#[cfg(feature = "embed-fastembed")]
pub mod fastembed;

// Re-exports
pub use backend::{BackendEmbeddings, CacheStats, EmbeddingBackend};
pub use cache::CachedEmbeddingBackend;
pub use config::{EmbeddingConfig, EmbeddingProviderKind, build_backend};
pub use engine::EmbeddingEngine;
pub use http::HttpEmbeddingBackend;
pub use mock::MockEmbeddingBackend;
pub use text::{estimate_tokens, preprocess_text_for_embedding};
pub use types::{
    BatchEmbeddingResult, ConversationMessage, EmbeddingMetadata, EmbeddingOptions,
    EmbeddingResult, InstitutionalFact, MemoryNote, MessageRole,
};

#[cfg(feature = "embed-fastembed")]
pub use fastembed::FastEmbedBackend;
