//! HTTP embedding backend.
//!
//! Talks to an embedding service exposing `GET /health` and `POST /embed`
//! (see the `hubsearch-service` crate). Batches larger than the service's
//! per-request cap are split into several requests; each request runs
//! under the configured [`RetryPolicy`].
//!
//! Connection failures, timeouts, and 5xx responses map to
//! [`Error::BackendUnavailable`] (retried); 4xx responses map to
//! [`Error::Backend`] (not retried).

use async_trait::async_trait;
use hubsearch_core::{Error, Result, RetryPolicy};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::backend::{BackendEmbeddings, EmbeddingBackend};
use crate::config::EmbeddingConfig;

// ============================================================================
// Wire types
// ============================================================================

/// `POST /embed` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Texts to embed.
    pub texts: Vec<String>,
    /// Whether the service should L2-normalize its output.
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

fn default_normalize() -> bool {
    true
}

/// `POST /embed` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedResponse {
    /// One vector per input text.
    pub embeddings: Vec<Vec<f32>>,
    /// Model that produced them.
    pub model: String,
    /// Length of each vector (0 when there are none).
    pub dimensions: usize,
}

/// `GET /health` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" when the service answers.
    pub status: String,
    /// Configured model name.
    pub model: String,
    /// Whether the model is loaded and requests will be served.
    pub model_loaded: bool,
}

/// Error body returned by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable reason.
    pub detail: String,
}

// ============================================================================
// Backend
// ============================================================================

/// Embedding backend backed by a remote HTTP service.
#[derive(Debug)]
pub struct HttpEmbeddingBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimension: usize,
    max_batch_size: usize,
    retry: RetryPolicy,
    ready: AtomicBool,
}

impl HttpEmbeddingBackend {
    /// Create a backend from configuration. No request is made until
    /// [`initialize`](EmbeddingBackend::initialize).
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            max_batch_size: config.max_batch_size.max(1),
            retry: config.retry_policy(),
            ready: AtomicBool::new(false),
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn probe(&self) -> Result<HealthResponse> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error("health", e))?;
        let response = check_status("health", response).await?;
        let health: HealthResponse = response
            .json()
            .await
            .map_err(|e| Error::backend("health", format!("invalid response: {e}")))?;

        if !health.model_loaded {
            return Err(Error::backend_unavailable("health", "model not loaded"));
        }
        Ok(health)
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.base_url);
        let body = EmbedRequest {
            texts: texts.to_vec(),
            normalize: false,
        };
        let (client, url, body) = (&self.client, url.as_str(), &body);

        let response = self
            .retry
            .run("embed", || async move {
                let response = client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| transport_error("embed", e))?;
                let response = check_status("embed", response).await?;
                response
                    .json::<EmbedResponse>()
                    .await
                    .map_err(|e| Error::backend("embed", format!("invalid response: {e}")))
            })
            .await?;

        if response.embeddings.len() != texts.len() {
            return Err(Error::backend(
                "embed",
                format!(
                    "service returned {} embeddings for {} texts",
                    response.embeddings.len(),
                    texts.len()
                ),
            ));
        }
        Ok(response.embeddings)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::not_initialized("HTTP embedding backend"))
        }
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingBackend {
    async fn initialize(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }
        let health = self.retry.run("health", || self.probe()).await?;
        if health.model != self.model {
            info!(
                "Embedding service reports model '{}' (configured '{}')",
                health.model, self.model
            );
        }
        self.ready.store(true, Ordering::Release);
        info!("Embedding service ready at {}", self.base_url);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    async fn generate_single_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.ensure_ready()?;
        let mut out = self.embed_chunk(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| Error::backend("embed", "no embedding returned"))
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<BackendEmbeddings> {
        self.ensure_ready()?;
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.max_batch_size) {
            debug!("Requesting {} embeddings from {}", chunk.len(), self.base_url);
            embeddings.extend(self.embed_chunk(chunk).await?);
        }
        Ok(BackendEmbeddings::computed(texts, embeddings))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Map a transport-level failure: everything that never produced a response
/// is treated as transient.
fn transport_error(operation: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Error::backend_unavailable(operation, err.to_string())
    } else {
        Error::backend(operation, err.to_string())
    }
}

/// Turn a non-success response into an error carrying the service's `detail`.
async fn check_status(operation: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.detail)
        .unwrap_or(body);
    let message = format!("HTTP {}: {detail}", status.as_u16());

    if status.is_server_error() {
        Err(Error::backend_unavailable(operation, message))
    } else {
        Err(Error::backend(operation, message))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config(url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            url: url.to_string(),
            timeout_ms: 200,
            retry_attempts: 1,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let backend = HttpEmbeddingBackend::new(&config("http://localhost:8001/")).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8001");
        assert!(!backend.is_ready());
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let backend = HttpEmbeddingBackend::new(&config("http://127.0.0.1:9")).unwrap();
        let err = backend.generate_single_embedding("hi").await.unwrap_err();
        assert!(matches!(err, Error::NotInitialized(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_unavailable() {
        // Port 9 (discard) is essentially never listening on loopback.
        let backend = HttpEmbeddingBackend::new(&config("http://127.0.0.1:9")).unwrap();
        let err = backend.initialize().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err}");
        assert!(!backend.is_ready());
    }

    #[test]
    fn test_embed_request_default_normalize() {
        let req: EmbedRequest = serde_json::from_str(r#"{"texts":["a"]}"#).unwrap();
        assert!(req.normalize);
    }
}
