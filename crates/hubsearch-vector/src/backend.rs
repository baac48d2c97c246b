//! Vector backend trait.
//!
//! The operation set an ANN engine must offer. Backends work on physical
//! collection names and raw JSON payloads; id generation, stamping,
//! readiness, and retries live in [`VectorStore`](crate::VectorStore).

use async_trait::async_trait;
use hubsearch_core::Result;
use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::types::{
    CollectionInfo, CollectionSpec, RetrievedPoint, ScoredPoint, ScrollOptions, ScrollPage,
    SearchOptions, VectorPoint,
};

/// Trait for vector storage engines.
///
/// Operations on a collection that does not exist fail with
/// [`Error::NotFound`](hubsearch_core::Error::NotFound). Transient
/// connectivity problems must surface as
/// [`Error::BackendUnavailable`](hubsearch_core::Error::BackendUnavailable)
/// so the store can retry them.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;

    /// Physical collection names.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Settings of an existing collection, or `None`.
    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>>;

    /// Create a collection. Returns `false` if it already existed
    /// (the existing one is left untouched).
    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool>;

    /// Insert or overwrite points by id. Every vector must match the
    /// collection dimension.
    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()>;

    /// Fetch one point.
    async fn retrieve(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> Result<Option<RetrievedPoint>>;

    /// Merge `patch` into a point's payload. Returns `false` if the point
    /// does not exist.
    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<bool>;

    /// Delete points by id. Returns how many existed.
    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize>;

    /// Delete every point matching `filter`. Returns how many were removed.
    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize>;

    /// Similarity search honoring every field of `options`.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredPoint>>;

    /// Exact count, optionally filtered.
    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64>;

    /// One page of points in id order.
    async fn scroll(
        &self,
        collection: &str,
        options: &ScrollOptions,
    ) -> Result<ScrollPage<RetrievedPoint>>;

    /// Diagnostic snapshot.
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;

    /// Backend name for diagnostics.
    fn name(&self) -> &str;
}
