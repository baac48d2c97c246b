//! The `hubsearch` application: logging setup and command dispatch.

use hubsearch_core::Result;
use hubsearch_embed::{EmbeddingEngine, build_backend};
use hubsearch_vector::{HealthState, HealthStatus, VectorStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{CliArgs, Command};
use crate::config::HubsearchConfig;
use crate::config_handlers;

// ============================================================================
// Reports
// ============================================================================

/// Embedding half of the health report.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingHealth {
    /// Overall flag.
    pub status: HealthState,
    /// Configured model.
    pub model: String,
    /// Configured dimension.
    pub dimension: usize,
    /// Initialization failure, when unhealthy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Report printed by `hubsearch health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Healthy only when every component is.
    pub status: HealthState,
    /// Embedding backend.
    pub embedding: EmbeddingHealth,
    /// Vector store.
    pub vector: HealthStatus,
}

/// Summary printed by `hubsearch embed`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedSummary {
    /// Vector length.
    pub dimension: usize,
    /// L2 norm of the vector.
    pub norm: f32,
    /// Engine processing time.
    pub processing_time_ms: u64,
}

// ============================================================================
// HubsearchCli
// ============================================================================

/// The CLI application over a loaded configuration.
pub struct HubsearchCli {
    config: Arc<HubsearchConfig>,
    version: String,
}

impl HubsearchCli {
    /// Load configuration named by the arguments.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = HubsearchConfig::load(args.config.as_deref())?;
        Ok(Self::new(config))
    }

    /// Create from an already loaded configuration.
    pub fn new(config: HubsearchConfig) -> Self {
        Self {
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &HubsearchConfig {
        &self.config
    }

    /// Install the tracing subscriber.
    ///
    /// `RUST_LOG` wins when set; otherwise the verbosity flags pick the level.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Already set in tests.
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Run a parsed command line.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);

        match args.command {
            Some(Command::Serve { host, port }) => self.serve(host, port).await,
            Some(Command::Health) => {
                let report = self.health_report().await;
                println!("{}", to_json(&report)?);
                Ok(())
            }
            Some(Command::Embed { text }) => {
                let summary = self.embed(&text).await?;
                println!("Dimension: {}", summary.dimension);
                println!("Norm: {:.6}", summary.norm);
                println!("Processing time: {}ms", summary.processing_time_ms);
                Ok(())
            }
            Some(Command::Config(cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), cmd.command)
            }
            Some(Command::Version) => {
                println!("hubsearch {}", self.version);
                Ok(())
            }
            None => {
                println!("hubsearch {}; use --help for usage", self.version);
                Ok(())
            }
        }
    }

    async fn serve(&self, host: Option<String>, port: Option<u16>) -> Result<()> {
        let mut server = self.config.server.clone();
        if let Some(host) = host {
            server.host = host;
        }
        if let Some(port) = port {
            server.port = port;
        }

        let backend = build_backend(&self.config.embedding)?;
        let engine = Arc::new(EmbeddingEngine::new(backend, self.config.embedding.clone()));
        hubsearch_service::serve(&server, engine, shutdown_signal()).await
    }

    /// Probe the embedding backend and the vector store.
    ///
    /// Backend failures become unhealthy entries rather than errors.
    pub async fn health_report(&self) -> HealthReport {
        let embedding = self.embedding_health().await;
        let vector = self.vector_health().await;
        let status = if embedding.status == HealthState::Healthy && vector.is_healthy() {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        };
        HealthReport {
            status,
            embedding,
            vector,
        }
    }

    async fn embedding_health(&self) -> EmbeddingHealth {
        let config = &self.config.embedding;
        let error = match build_backend(config) {
            Ok(backend) => backend.initialize().await.err().map(|e| e.to_string()),
            Err(e) => Some(e.to_string()),
        };
        EmbeddingHealth {
            status: if error.is_none() {
                HealthState::Healthy
            } else {
                HealthState::Unhealthy
            },
            model: config.model.clone(),
            dimension: config.dimension,
            error,
        }
    }

    async fn vector_health(&self) -> HealthStatus {
        let config = &self.config.vector;
        let backend = match hubsearch_vector::build_backend(config).await {
            Ok(backend) => backend,
            Err(e) => return HealthStatus::unhealthy(e.to_string()),
        };
        let store = VectorStore::new(backend, config.clone());
        if let Err(e) = store.connect().await {
            return HealthStatus::unhealthy(e.to_string());
        }
        let status = store.get_health_status().await;
        store.close().await;
        status
    }

    /// Embed one text with the configured backend.
    pub async fn embed(&self, text: &str) -> Result<EmbedSummary> {
        let backend = build_backend(&self.config.embedding)?;
        backend.initialize().await?;
        let engine = EmbeddingEngine::new(backend, self.config.embedding.clone());

        let started = Instant::now();
        let result = engine.generate_embedding(text, None, None).await?;
        info!("Embedded {} chars in {:?}", text.len(), started.elapsed());

        Ok(EmbedSummary {
            dimension: result.embedding.len(),
            norm: result.embedding.iter().map(|x| x * x).sum::<f32>().sqrt(),
            processing_time_ms: result.metadata.processing_time_ms,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| hubsearch_core::Error::Serialization(e.to_string()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use hubsearch_embed::EmbeddingProviderKind;

    fn cli() -> HubsearchCli {
        HubsearchCli::new(HubsearchConfig::default())
    }

    #[tokio::test]
    async fn test_run_version_command() {
        let args = CliArgs::parse_from(["hubsearch", "version"]);
        assert!(cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_without_command() {
        let args = CliArgs::parse_from(["hubsearch"]);
        assert!(cli().run(args).await.is_ok());
    }

    #[tokio::test]
    async fn test_health_with_defaults_is_healthy() {
        let report = cli().health_report().await;
        assert_eq!(report.status, HealthState::Healthy);
        assert!(report.vector.collections.len() >= 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["embedding"]["model"], "all-minilm-l6-v2");
    }

    #[tokio::test]
    async fn test_health_reports_unreachable_embedding_service() {
        let mut config = HubsearchConfig::default();
        config.embedding.provider = EmbeddingProviderKind::Http;
        config.embedding.url = "http://127.0.0.1:1".to_string();
        config.embedding.retry_attempts = 1;
        config.embedding.timeout_ms = 500;

        let report = HubsearchCli::new(config).health_report().await;
        assert_eq!(report.status, HealthState::Unhealthy);
        assert!(report.embedding.error.is_some());
        assert!(report.vector.is_healthy());
    }

    #[tokio::test]
    async fn test_embed_summary() {
        let summary = cli().embed("hello world").await.unwrap();
        assert_eq!(summary.dimension, 384);
        assert!((summary.norm - 1.0).abs() < 1e-4);
        assert!(cli().embed("   ").await.is_err());
    }
}
