//! The vector store client.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──connect()──▶ Connecting ──▶ CollectionsReady ──▶ Ready
//!       ▲                          │ (ping or provisioning failed)     │
//!       └──────────────────────────┴──────────────close()──────────────┘
//! ```
//!
//! `ensure_collection` is allowed once `connect()` has started; every
//! other operation requires `Ready` and otherwise fails with
//! [`Error::NotInitialized`]. All backend calls run under the configured
//! [`RetryPolicy`]. Callers use logical collection names; the store maps
//! them to physical names through [`VectorStoreConfig::collections`].

use chrono::Utc;
use hubsearch_core::{Error, Result, RetryPolicy, math};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::backend::VectorBackend;
use crate::config::VectorStoreConfig;
use crate::filter::Filter;
use crate::payload::{CREATED_AT_KEY, Payload, TYPE_KEY, UPDATED_AT_KEY};
use crate::types::{
    CollectionInfo, Distance, HealthState, HealthStatus, PointInput, ScrollOptions, ScrollPage,
    SearchOptions, StoredVector, VectorPoint, VectorSearchResult,
};

/// Readiness of a [`VectorStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Not connected.
    Uninitialized,
    /// Backend probe in progress.
    Connecting,
    /// Required collections exist.
    CollectionsReady,
    /// Serving requests.
    Ready,
}

/// Explicitly connected vector store client.
pub struct VectorStore {
    backend: Arc<dyn VectorBackend>,
    config: VectorStoreConfig,
    retry: RetryPolicy,
    state: RwLock<StoreState>,
    connect_lock: Mutex<()>,
    dimensions: RwLock<HashMap<String, usize>>,
}

impl VectorStore {
    /// Create a store over `backend`. No I/O happens until [`connect`](Self::connect).
    pub fn new(backend: Arc<dyn VectorBackend>, config: VectorStoreConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            backend,
            config,
            retry,
            state: RwLock::new(StoreState::Uninitialized),
            connect_lock: Mutex::new(()),
            dimensions: RwLock::new(HashMap::new()),
        }
    }

    /// Store configuration.
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> StoreState {
        *self.state.read().await
    }

    /// Whether the store is serving requests.
    pub async fn is_ready(&self) -> bool {
        self.state().await == StoreState::Ready
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Probe the backend and provision every configured collection.
    ///
    /// Idempotent once ready. On failure the store returns to
    /// `Uninitialized` and the error is surfaced.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;
        if self.state().await == StoreState::Ready {
            return Ok(());
        }

        self.set_state(StoreState::Connecting).await;
        info!("Connecting vector store (backend: {})", self.backend.name());

        match self.provision().await {
            Ok(()) => {
                self.set_state(StoreState::Ready).await;
                info!(
                    "Vector store ready ({} collections)",
                    self.config.collections.len()
                );
                Ok(())
            }
            Err(e) => {
                self.set_state(StoreState::Uninitialized).await;
                warn!("Vector store connection failed: {e}");
                Err(e)
            }
        }
    }

    /// Return to `Uninitialized`. Data on the backend is untouched.
    pub async fn close(&self) {
        let _guard = self.connect_lock.lock().await;
        self.set_state(StoreState::Uninitialized).await;
        self.dimensions.write().await.clear();
        info!("Vector store closed");
    }

    async fn provision(&self) -> Result<()> {
        self.retry.run("connect", || self.backend.ping()).await?;
        for logical in self.config.collections.keys() {
            self.ensure_collection_unchecked(logical, self.config.dimension, self.config.distance)
                .await?;
        }
        self.set_state(StoreState::CollectionsReady).await;
        Ok(())
    }

    async fn set_state(&self, next: StoreState) {
        let mut state = self.state.write().await;
        debug!("Vector store state: {:?} -> {:?}", *state, next);
        *state = next;
    }

    async fn ready(&self) -> Result<()> {
        if self.state().await == StoreState::Ready {
            Ok(())
        } else {
            Err(Error::not_initialized("vector store"))
        }
    }

    // ------------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------------

    /// Create a collection if it does not exist.
    ///
    /// An existing collection is never an error; if its shape differs from
    /// the request a warning is logged and the existing one is kept.
    pub async fn ensure_collection(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        if self.state().await == StoreState::Uninitialized {
            return Err(Error::not_initialized("vector store"));
        }
        self.ensure_collection_unchecked(collection, dimension, distance)
            .await
    }

    async fn ensure_collection_unchecked(
        &self,
        collection: &str,
        dimension: usize,
        distance: Distance,
    ) -> Result<()> {
        if dimension == 0 {
            return Err(Error::validation("collection dimension must be greater than 0"));
        }
        let physical = self.config.physical_name(collection);

        let existing = self
            .retry
            .run("ensure_collection", || self.backend.collection_spec(physical))
            .await?;

        let dimension = match existing {
            Some(found) => {
                if found.dimension != dimension || found.distance != distance {
                    warn!(
                        "Collection '{physical}' exists as {}d/{} (requested {dimension}d/{}); keeping it",
                        found.dimension,
                        found.distance.as_str(),
                        distance.as_str()
                    );
                } else {
                    debug!("Collection '{physical}' already exists");
                }
                found.dimension
            }
            None => {
                let spec = self.config.collection_spec(dimension, distance);
                let created = self
                    .retry
                    .run("ensure_collection", || {
                        self.backend.create_collection(physical, &spec)
                    })
                    .await?;
                if created {
                    info!("Created collection '{physical}' ({dimension}d, {})", distance.as_str());
                } else {
                    debug!("Collection '{physical}' appeared concurrently");
                }
                dimension
            }
        };

        self.dimensions
            .write()
            .await
            .insert(physical.to_string(), dimension);
        Ok(())
    }

    /// Diagnostic snapshot of a collection.
    pub async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        self.ready().await?;
        let physical = self.config.physical_name(collection);
        self.retry
            .run("get_collection_info", || self.backend.collection_info(physical))
            .await
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Upsert one vector; returns its id (generated when `id` is `None`).
    pub async fn store_vector(
        &self,
        collection: &str,
        vector: Vec<f32>,
        payload: Payload,
        id: Option<String>,
    ) -> Result<String> {
        let mut ids = self
            .store_points(
                "store_vector",
                collection,
                vec![PointInput {
                    id,
                    vector,
                    payload,
                }],
            )
            .await?;
        ids.pop()
            .ok_or_else(|| Error::backend("store_vector", "no id assigned"))
    }

    /// Upsert many vectors in one backend call; ids come back in input order.
    ///
    /// Every point is validated and assigned an id before the call, so a
    /// bad point rejects the whole batch and a retried call is idempotent.
    pub async fn store_batch_vectors(
        &self,
        collection: &str,
        points: Vec<PointInput>,
    ) -> Result<Vec<String>> {
        self.store_points("store_batch_vectors", collection, points)
            .await
    }

    async fn store_points(
        &self,
        operation: &str,
        collection: &str,
        inputs: Vec<PointInput>,
    ) -> Result<Vec<String>> {
        self.ready().await?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let physical = self.config.physical_name(collection);
        let expected = self.known_dimension(physical).await;
        let now = Utc::now();

        let mut ids = Vec::with_capacity(inputs.len());
        let mut points = Vec::with_capacity(inputs.len());
        for (i, input) in inputs.into_iter().enumerate() {
            validate_vector(&input.vector, expected)?;
            let id = match input.id {
                Some(id) if id.trim().is_empty() => {
                    return Err(Error::validation(format!("point {i}: id cannot be empty")));
                }
                Some(id) => id,
                None => Uuid::new_v4().to_string(),
            };

            let mut payload = input.payload;
            payload.created_at.get_or_insert(now);
            payload.updated_at = Some(now);

            ids.push(id.clone());
            points.push(VectorPoint {
                id,
                vector: input.vector,
                payload: payload.into_map(),
            });
        }

        self.retry
            .run(operation, || self.backend.upsert(physical, points.clone()))
            .await?;
        debug!("Stored {} vectors in '{physical}'", ids.len());
        Ok(ids)
    }

    /// Merge `patch` into a point's payload and refresh `updatedAt`.
    ///
    /// `type` and `createdAt` are protected and ignored if present. The
    /// vector is never touched. Returns `false` when the point is absent.
    pub async fn update_vector_payload(
        &self,
        collection: &str,
        id: &str,
        mut patch: Map<String, Value>,
    ) -> Result<bool> {
        self.ready().await?;
        for key in [TYPE_KEY, CREATED_AT_KEY] {
            if patch.remove(key).is_some() {
                debug!("Ignoring protected payload key '{key}'");
            }
        }
        patch.insert(UPDATED_AT_KEY.into(), Value::from(Utc::now().to_rfc3339()));

        let physical = self.config.physical_name(collection);
        self.retry
            .run("update_vector_payload", || {
                self.backend.set_payload(physical, id, patch.clone())
            })
            .await
    }

    /// Delete one point. Returns whether it existed.
    pub async fn delete_vector(&self, collection: &str, id: &str) -> Result<bool> {
        self.ready().await?;
        let physical = self.config.physical_name(collection);
        let ids = [id.to_string()];
        let removed = self
            .retry
            .run("delete_vector", || self.backend.delete(physical, &ids))
            .await?;
        Ok(removed > 0)
    }

    /// Delete every point matching `filter`. Returns how many were removed.
    pub async fn delete_vectors_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize> {
        self.ready().await?;
        filter.validate()?;
        let physical = self.config.physical_name(collection);
        let removed = self
            .retry
            .run("delete_vectors_by_filter", || {
                self.backend.delete_by_filter(physical, filter)
            })
            .await?;
        info!("Deleted {removed} vectors from '{physical}' by filter");
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Nearest neighbours of `query`.
    ///
    /// At most `limit` results, each scoring at least the threshold
    /// (`options.score_threshold` or the configured default), in
    /// descending score order.
    pub async fn search_similar(
        &self,
        collection: &str,
        query: &[f32],
        options: SearchOptions,
    ) -> Result<Vec<VectorSearchResult>> {
        self.ready().await?;
        let physical = self.config.physical_name(collection);
        validate_vector(query, self.known_dimension(physical).await)?;
        if let Some(filter) = &options.filter {
            filter.validate()?;
        }
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let threshold = options
            .score_threshold
            .unwrap_or(self.config.default_score_threshold);
        let request = SearchOptions {
            score_threshold: Some(threshold),
            ..options
        };

        let mut hits = self
            .retry
            .run("search_similar", || {
                self.backend.search(physical, query, &request)
            })
            .await?;

        hits.retain(|h| h.score >= threshold);
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.limit);
        debug!("search_similar '{physical}': {} hits", hits.len());

        Ok(hits
            .into_iter()
            .map(|h| {
                let mut result = VectorSearchResult::from(h);
                if !request.with_vector {
                    result.vector = None;
                }
                result
            })
            .collect())
    }

    /// Fetch one point; absence is `Ok(None)`.
    pub async fn get_vector(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> Result<Option<StoredVector>> {
        self.ready().await?;
        let physical = self.config.physical_name(collection);
        let point = self
            .retry
            .run("get_vector", || self.backend.retrieve(physical, id, with_vector))
            .await?;
        Ok(point.map(StoredVector::from))
    }

    /// Exact point count, optionally filtered.
    pub async fn count_vectors(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        self.ready().await?;
        if let Some(filter) = filter {
            filter.validate()?;
        }
        let physical = self.config.physical_name(collection);
        self.retry
            .run("count_vectors", || self.backend.count(physical, filter))
            .await
    }

    /// One page of a cursor-based scan. Feed `next_offset` back in to
    /// continue; it is `None` once the collection is exhausted.
    pub async fn scroll_vectors(
        &self,
        collection: &str,
        options: ScrollOptions,
    ) -> Result<ScrollPage> {
        self.ready().await?;
        if options.limit == 0 {
            return Err(Error::validation("scroll limit must be greater than 0"));
        }
        if let Some(filter) = &options.filter {
            filter.validate()?;
        }
        let physical = self.config.physical_name(collection);
        let page = self
            .retry
            .run("scroll_vectors", || self.backend.scroll(physical, &options))
            .await?;
        Ok(ScrollPage {
            points: page.points.into_iter().map(StoredVector::from).collect(),
            next_offset: page.next_offset,
        })
    }

    // ------------------------------------------------------------------------
    // Health
    // ------------------------------------------------------------------------

    /// Health report. Never fails: probe errors become `unhealthy`.
    pub async fn get_health_status(&self) -> HealthStatus {
        if !self.is_ready().await {
            return HealthStatus::unhealthy("vector store is not initialized");
        }
        match self.probe().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Vector store health probe failed: {e}");
                HealthStatus::unhealthy(e.to_string())
            }
        }
    }

    async fn probe(&self) -> Result<HealthStatus> {
        let once = RetryPolicy::new(1, Duration::ZERO, self.retry.timeout());
        once.run("health", || self.backend.ping()).await?;
        let collections = once
            .run("health", || self.backend.list_collections())
            .await?;
        let mut total_vectors = 0;
        for name in &collections {
            total_vectors += once.run("health", || self.backend.count(name, None)).await?;
        }
        Ok(HealthStatus {
            status: HealthState::Healthy,
            collections,
            total_vectors,
            error: None,
        })
    }

    async fn known_dimension(&self, physical: &str) -> Option<usize> {
        self.dimensions.read().await.get(physical).copied()
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("backend", &self.backend.name())
            .field("collections", &self.config.collections)
            .finish_non_exhaustive()
    }
}

fn validate_vector(vector: &[f32], expected: Option<usize>) -> Result<()> {
    if vector.is_empty() {
        return Err(Error::validation("vector cannot be empty"));
    }
    if !math::all_finite(vector) {
        return Err(Error::validation("vector contains non-finite values"));
    }
    if let Some(expected) = expected
        && vector.len() != expected
    {
        return Err(Error::dimension_mismatch(expected, vector.len()));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
