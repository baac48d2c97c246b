//! HTTP embedding service for Hubsearch.
//!
//! Exposes an [`EmbeddingEngine`](hubsearch_embed::EmbeddingEngine) over
//! HTTP so that other processes can use
//! [`HttpEmbeddingBackend`](hubsearch_embed::HttpEmbeddingBackend):
//!
//! | Method | Path      | Response                                        |
//! |--------|-----------|-------------------------------------------------|
//! | GET    | `/`       | `{service, model, dimensions, endpoints}`       |
//! | GET    | `/health` | `{status, model, model_loaded}`                 |
//! | POST   | `/embed`  | `{embeddings, model, dimensions}`               |
//!
//! Errors are `{"detail": "..."}` with status 400, 422, 500, or 503.

pub mod config;
pub mod error;
pub mod routes;
pub mod server;

// Re-exports
pub use config::ServerConfig;
pub use error::{ApiError, ApiResult};
pub use routes::{AppState, Endpoints, ServiceInfo, router};
pub use server::{serve, serve_listener, spawn_model_load};
