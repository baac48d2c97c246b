//! Route table and handlers.
//!
//! CORS is permissive: any origin, method and header may call the service
//! from a browser.
//!
//! `POST /embed` rejects blank entries with 400 instead of embedding them.
//! The engine refuses blank text, and the response must stay positionally
//! aligned with the request, so the whole batch is refused up front.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use hubsearch_embed::http::{EmbedRequest, EmbedResponse, HealthResponse};
use hubsearch_embed::{EmbeddingEngine, EmbeddingOptions};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::{ApiError, ApiResult};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    engine: Arc<EmbeddingEngine>,
}

impl AppState {
    /// Wrap an engine.
    pub fn new(engine: Arc<EmbeddingEngine>) -> Self {
        Self { engine }
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Arc<EmbeddingEngine> {
        &self.engine
    }

    fn model(&self) -> String {
        self.engine.config().model.clone()
    }
}

/// Service descriptor returned by `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    /// Service name.
    pub service: String,
    /// Configured model.
    pub model: String,
    /// Configured embedding dimension.
    pub dimensions: usize,
    /// Endpoint paths.
    pub endpoints: Endpoints,
}

/// Endpoint paths advertised by `GET /`.
#[derive(Debug, Clone, Serialize)]
pub struct Endpoints {
    /// Health path.
    pub health: String,
    /// Embedding path.
    pub embed: String,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/embed", post(embed))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "hubsearch embedding service".to_string(),
        model: state.model(),
        dimensions: state.engine.dimension(),
        endpoints: Endpoints {
            health: "/health".to_string(),
            embed: "/embed".to_string(),
        },
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.model(),
        model_loaded: state.engine.is_ready(),
    })
}

async fn embed(
    State(state): State<AppState>,
    body: Result<Json<EmbedRequest>, JsonRejection>,
) -> ApiResult<Json<EmbedResponse>> {
    if !state.engine.is_ready() {
        return Err(ApiError::ModelNotLoaded);
    }
    let Json(request) = body.map_err(|e| ApiError::Unprocessable(e.body_text()))?;

    let max = state.engine.config().max_batch_size;
    if request.texts.is_empty() {
        return Err(ApiError::BadRequest("No texts provided".to_string()));
    }
    if request.texts.len() > max {
        return Err(ApiError::BadRequest(format!(
            "Maximum {max} texts per request"
        )));
    }
    if let Some(i) = request.texts.iter().position(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest(format!("Text at index {i} is empty")));
    }

    let options = EmbeddingOptions::default()
        .with_normalize(request.normalize)
        .with_preprocess(false);
    let batch = state
        .engine
        .generate_batch_embeddings(&request.texts, None, Some(options))
        .await
        .map_err(|e| {
            error!("Error generating embeddings: {e}");
            ApiError::from(e)
        })?;

    let embeddings: Vec<Vec<f32>> = batch.embeddings.into_iter().map(|r| r.embedding).collect();
    if embeddings.len() != request.texts.len() {
        return Err(ApiError::Internal(format!(
            "generated {} embeddings for {} texts",
            embeddings.len(),
            request.texts.len()
        )));
    }
    info!("Generated {} embeddings", embeddings.len());

    Ok(Json(EmbedResponse {
        dimensions: embeddings.first().map_or(0, Vec::len),
        embeddings,
        model: state.model(),
    }))
}

// ============================================================================
// Tests
// ============================================================================
