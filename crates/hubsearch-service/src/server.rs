//! Listener lifecycle.

use hubsearch_core::Result;
use hubsearch_embed::EmbeddingEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::routes::{AppState, router};

/// Initialize the engine's backend in the background.
///
/// The listener comes up immediately; `/health` reports
/// `model_loaded: false` and `/embed` answers 503 until this completes.
pub fn spawn_model_load(engine: Arc<EmbeddingEngine>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Loading embedding model: {}", engine.config().model);
        match engine.backend().initialize().await {
            Ok(()) => info!("Embedding model loaded: {}", engine.config().model),
            Err(e) => error!("Failed to load embedding model: {e}"),
        }
    })
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(
    listener: TcpListener,
    engine: Arc<EmbeddingEngine>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(AppState::new(engine));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `config`, start loading the model, and serve until `shutdown`
/// resolves.
pub async fn serve<F>(config: &ServerConfig, engine: Arc<EmbeddingEngine>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;
    let listener = TcpListener::bind(config.bind_addr()).await?;
    info!("Embedding service listening on {}", listener.local_addr()?);

    let loader = spawn_model_load(engine.clone());
    let result = serve_listener(listener, engine, shutdown).await;
    loader.abort();
    info!("Embedding service stopped");
    result
}

// ============================================================================
// Tests
// ============================================================================
