//! Vector store for Hubsearch.
//!
//! Stores embedding vectors in named collections and answers similarity
//! queries over them. The [`VectorStore`] is an explicitly constructed
//! client with a `connect()`/`close()` lifecycle; every data operation
//! checks readiness first and fails fast otherwise.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     hubsearch-vector                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorStore (lifecycle, retries, stamping, validation)     │
//! │  ├── Payload (typed union + open extension map)             │
//! │  └── Filter (Eq / In / And predicate AST)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  VectorBackend trait                                        │
//! │  ├── MemoryVectorBackend (always available)                 │
//! │  └── LancedbBackend (feature: vector-lancedb)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hubsearch_vector::{MemoryVectorBackend, Payload, SearchOptions, VectorStore, VectorStoreConfig};
//! use std::sync::Arc;
//!
//! let store = VectorStore::new(Arc::new(MemoryVectorBackend::new()), VectorStoreConfig::default());
//! store.connect().await?;
//!
//! let id = store.store_vector("conversations", vec![0.1; 384], Payload::generic(), None).await?;
//! let hits = store
//!     .search_similar("conversations", &[0.1; 384], SearchOptions::new().with_limit(1))
//!     .await?;
//! assert_eq!(hits[0].id, id);
//! ```

pub mod backend;
pub mod config;
pub mod filter;
pub mod memory;
pub mod payload;
pub mod store;
pub mod types;

#[cfg(feature = "vector-lancedb")]
pub mod lancedb;

// Re-exports
pub use backend::VectorBackend;
pub use config::{VectorBackendKind, VectorStoreConfig, build_backend};
pub use filter::Filter;
pub use memory::MemoryVectorBackend;
pub use payload::{Payload, PayloadKind};
pub use store::{StoreState, VectorStore};
pub use types::{
    CollectionInfo, CollectionSpec, CollectionStatus, Distance, HealthState, HealthStatus,
    PointInput, RetrievedPoint, ScoredPoint, ScrollOptions, ScrollPage, SearchOptions,
    StoredVector, VectorPoint, VectorSearchResult,
};

#[cfg(feature = "vector-lancedb")]
pub use lancedb::LancedbBackend;
