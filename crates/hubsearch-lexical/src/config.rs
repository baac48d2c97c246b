//! Lexical search configuration.

use hubsearch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::store::{MemoryProjectStore, ProjectStore};
use crate::types::ProjectStatus;

/// Which project store to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LexicalBackendKind {
    /// Token-AND in-memory store.
    Memory,
    /// Tantivy BM25 store (requires `lexical-tantivy`).
    #[default]
    Tantivy,
}

/// Lexical search configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Store to construct.
    #[serde(default)]
    pub backend: LexicalBackendKind,

    /// Page size when a query sets none.
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest accepted page size.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Abstract window length in characters.
    #[serde(default = "default_snippet_length")]
    pub snippet_length: usize,

    /// Inserted before each highlighted term.
    #[serde(default = "default_highlight_open")]
    pub highlight_open: String,

    /// Inserted after each highlighted term.
    #[serde(default = "default_highlight_close")]
    pub highlight_close: String,

    /// Sanitized query text is cut to this many characters.
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,

    /// Most candidates ranked per query.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Status applied when a public query sets none.
    #[serde(default)]
    pub default_status: ProjectStatus,

    /// Related tags offered with zero-result suggestions.
    #[serde(default = "default_related_tag_limit")]
    pub related_tag_limit: usize,
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_snippet_length() -> usize {
    200
}

fn default_highlight_open() -> String {
    "<mark>".to_string()
}

fn default_highlight_close() -> String {
    "</mark>".to_string()
}

fn default_max_query_chars() -> usize {
    200
}

fn default_max_candidates() -> usize {
    10_000
}

fn default_related_tag_limit() -> usize {
    5
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            backend: LexicalBackendKind::default(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            snippet_length: default_snippet_length(),
            highlight_open: default_highlight_open(),
            highlight_close: default_highlight_close(),
            max_query_chars: default_max_query_chars(),
            max_candidates: default_max_candidates(),
            default_status: ProjectStatus::default(),
            related_tag_limit: default_related_tag_limit(),
        }
    }
}

impl LexicalConfig {
    /// Reject unusable settings.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(Error::config("lexical limits must be greater than 0"));
        }
        if self.default_limit > self.max_limit {
            return Err(Error::config(
                "lexical.default_limit cannot exceed lexical.max_limit",
            ));
        }
        if self.max_query_chars == 0 || self.max_candidates == 0 {
            return Err(Error::config(
                "lexical.max_query_chars and lexical.max_candidates must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Construct the configured store.
pub fn build_store(config: &LexicalConfig) -> Result<Arc<dyn ProjectStore>> {
    config.validate()?;
    match config.backend {
        LexicalBackendKind::Memory => Ok(Arc::new(MemoryProjectStore::new())),
        LexicalBackendKind::Tantivy => build_tantivy(),
    }
}

#[cfg(feature = "lexical-tantivy")]
fn build_tantivy() -> Result<Arc<dyn ProjectStore>> {
    Ok(Arc::new(crate::tantivy_store::TantivyProjectStore::new()?))
}

#[cfg(not(feature = "lexical-tantivy"))]
fn build_tantivy() -> Result<Arc<dyn ProjectStore>> {
    Err(Error::config(
        "lexical backend 'tantivy' requires the lexical-tantivy feature",
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LexicalConfig::default();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.max_limit, 100);
        assert_eq!(config.default_status, ProjectStatus::Approved);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let config = LexicalConfig {
            default_limit: 200,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_build_memory_store() {
        let config = LexicalConfig {
            backend: LexicalBackendKind::Memory,
            ..Default::default()
        };
        assert_eq!(build_store(&config).unwrap().name(), "memory");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LexicalConfig = serde_json::from_str(r#"{"max_limit": 50}"#).unwrap();
        assert_eq!(config.max_limit, 50);
        assert_eq!(config.highlight_open, "<mark>");
    }
}
