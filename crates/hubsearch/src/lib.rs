//! Hubsearch: hybrid retrieval for project discovery.
//!
//! Re-exports the component crates and adds the glue between them:
//!
//! - [`embed`]: text to vectors ([`EmbeddingEngine`](embed::EmbeddingEngine))
//! - [`vector`]: vector collections with a connect/close lifecycle
//! - [`lexical`]: filtered full-text project search
//! - [`semantic`]: [`SemanticIndex`] joins the embedding engine to the store
//! - [`hybrid`]: Reciprocal Rank Fusion over semantic and lexical rankings
//!
//! # Features
//!
//! - `lexical-tantivy` (default): Tantivy project store
//! - `vector-lancedb`: LanceDB vector backend
//! - `embed-fastembed`: local ONNX embeddings
//! - `service`: HTTP embedding service
//! - `full`: all of the above

pub use hubsearch_core as core;
pub use hubsearch_embed as embed;
pub use hubsearch_lexical as lexical;
pub use hubsearch_vector as vector;

#[cfg(feature = "service")]
pub use hubsearch_service as service;

pub use hubsearch_core::{Error, Result};

pub mod hybrid;
pub mod semantic;

// Re-exports
pub use hybrid::{DEFAULT_RRF_K, FusedHit, HitSource, fuse_rankings, search_projects_hybrid, semantic_key};
pub use semantic::{
    CONVERSATIONS, INSTITUTIONAL_KNOWLEDGE, IndexItem, PROJECTS, SemanticIndex, USER_MEMORY,
};
