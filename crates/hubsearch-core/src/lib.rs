//! Hubsearch Core: shared errors, vector math, retry policy and documents.
//!
//! This crate has no internal Hubsearch dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`math`]: L2 normalization, dot product, cosine similarity
//! - [`retry`]: Timeout + fixed-delay retry budget for backend calls
//! - [`document`]: The logical unit of text handed to the embedding engine

pub mod document;
pub mod error;
pub mod math;
pub mod retry;

// Re-export key types at crate root for convenience
pub use document::{Document, DocumentType};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
