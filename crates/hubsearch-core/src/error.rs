//! Error types for Hubsearch operations.
//!
//! This module provides the common `Error` type and `Result<T>` alias used
//! across all Hubsearch crates. Uses `thiserror` for derive macros.
//!
//! # Taxonomy
//!
//! | Variant | Class | Retried |
//! |---------|-------|---------|
//! | `Validation` | client | never |
//! | `DimensionMismatch` | client | never |
//! | `SearchParameter` | client | never |
//! | `BackendUnavailable` | transient | up to the retry budget |
//! | `Backend` | backend rejected the request | never |
//! | `NotInitialized` | lifecycle | never |
//!
//! A missing vector point is not an error: lookups return `Ok(None)`.

use thiserror::Error;

/// Errors that can occur in Hubsearch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before reaching any backend (empty text, malformed filter).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Two vectors (or a vector and a collection) disagree on length.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The expected dimensionality.
        expected: usize,
        /// The dimensionality actually supplied.
        actual: usize,
    },

    /// A backend could not be reached or timed out.
    #[error("{operation}: backend unavailable: {message}")]
    BackendUnavailable {
        /// Operation that failed.
        operation: String,
        /// Backend-supplied message.
        message: String,
    },

    /// A backend was reached but rejected the request.
    #[error("{operation}: backend error: {message}")]
    Backend {
        /// Operation that failed.
        operation: String,
        /// Backend-supplied message.
        message: String,
    },

    /// A component was used before its initialization sequence completed.
    #[error("{0} is not initialized")]
    NotInitialized(String),

    /// A search query could not be sanitized into something searchable.
    #[error("Invalid search parameter: {0}")]
    SearchParameter(String),

    /// A named resource (e.g. a collection) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a transient backend error for `operation`.
    pub fn backend_unavailable(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a non-transient backend error for `operation`.
    pub fn backend(operation: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: msg.into(),
        }
    }

    /// Create a not-initialized error for the named component.
    pub fn not_initialized(component: impl Into<String>) -> Self {
        Self::NotInitialized(component.into())
    }

    /// Create a search parameter error.
    pub fn search_parameter(msg: impl Into<String>) -> Self {
        Self::SearchParameter(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the retry policy may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable { .. })
    }

    /// Whether the caller supplied bad input (HTTP 4xx class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::DimensionMismatch { .. } | Self::SearchParameter(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using Hubsearch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Tests
// ============================================================================
