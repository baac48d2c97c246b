//! Configuration for the `hubsearch` binary.
//!
//! Aggregates the component configurations into [`HubsearchConfig`] and
//! loads it with `confyg`.
//!
//! # Loading Priority
//!
//! 1. Explicit `--config <path>` flag
//! 2. `HUBSEARCH_CONFIG` environment variable
//! 3. Platform default: `~/.config/hubsearch/config.toml`
//! 4. Built-in defaults
//!
//! `HUBSEARCH_<SECTION>_<KEY>` environment variables overlay the file.

use confyg::{Confygery, env};
use hubsearch_core::{Error, Result};
use hubsearch_embed::EmbeddingConfig;
use hubsearch_lexical::LexicalConfig;
use hubsearch_service::ServerConfig;
use hubsearch_vector::VectorStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "HUBSEARCH";
/// Config path override variable.
pub const CONFIG_ENV: &str = "HUBSEARCH_CONFIG";

const SECTIONS: [&str; 4] = ["embedding", "vector", "lexical", "server"];

/// Full Hubsearch configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubsearchConfig {
    /// Embedding engine.
    pub embedding: EmbeddingConfig,

    /// Vector store.
    pub vector: VectorStoreConfig,

    /// Lexical search.
    pub lexical: LexicalConfig,

    /// Embedding service listener.
    pub server: ServerConfig,
}

impl HubsearchConfig {
    /// Load configuration from file, environment, and defaults.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder =
            Confygery::new().map_err(|e| Error::config(format!("config init: {e}")))?;

        if let Some(path) = Self::resolve_config_path(config_path)
            && path.exists()
        {
            builder
                .add_file(&path.to_string_lossy())
                .map_err(|e| Error::config(format!("config file: {e}")))?;
        }

        let mut env_opts = env::Options::with_top_level(ENV_PREFIX);
        for section in SECTIONS {
            env_opts.add_section(section);
        }
        builder
            .add_env(env_opts)
            .map_err(|e| Error::config(format!("config env: {e}")))?;

        let config: Self = builder
            .build()
            .map_err(|e| Error::config(format!("config build: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.embedding.validate()?;
        self.vector.validate()?;
        self.lexical.validate()?;
        self.server.validate()?;
        if self.embedding.dimension != self.vector.dimension {
            log::warn!(
                "embedding.dimension ({}) differs from vector.dimension ({})",
                self.embedding.dimension,
                self.vector.dimension
            );
        }
        Ok(())
    }

    /// Resolve the config file path from explicit flag, env var, or the
    /// platform default.
    pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        Self::default_config_path()
    }

    /// The platform default config path.
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hubsearch").join("config.toml"))
    }

    /// Serialize this config to pretty-printed TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use hubsearch_embed::EmbeddingProviderKind;
    use hubsearch_vector::VectorBackendKind;

    #[test]
    fn test_defaults() {
        let config = HubsearchConfig::default();
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Mock);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.vector.backend, VectorBackendKind::Memory);
        assert_eq!(config.lexical.max_limit, 100);
        assert_eq!(config.server.port, 8001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config: HubsearchConfig = toml::from_str(
            r#"
                [embedding]
                provider = "http"
                url = "http://embedder:8001"

                [server]
                port = 9001
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProviderKind::Http);
        assert_eq!(config.embedding.url, "http://embedder:8001");
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = HubsearchConfig::default();
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("[embedding]"));
        assert!(text.contains("[lexical]"));
        let parsed: HubsearchConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
                [lexical]
                default_limit = 5

                [server]
                host = "127.0.0.1"
            "#,
        )
        .unwrap();

        let config = HubsearchConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.lexical.default_limit, 5);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = HubsearchConfig::load(Some("/nonexistent/hubsearch.toml")).unwrap();
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[lexical]\ndefault_limit = 500\n").unwrap();
        let err = HubsearchConfig::load(Some(path.to_str().unwrap())).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_resolve_config_path() {
        let explicit = HubsearchConfig::resolve_config_path(Some("/explicit/config.toml"));
        assert_eq!(explicit, Some(PathBuf::from("/explicit/config.toml")));

        if let Some(default) = HubsearchConfig::default_config_path() {
            assert!(default.ends_with("hubsearch/config.toml"));
        }
    }
}
