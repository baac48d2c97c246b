//! Common types for the vector store.
//!
//! These types are shared by every backend and are always available
//! regardless of feature flags.

use hubsearch_core::{Result, math};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::payload::Payload;

// ============================================================================
// Collections
// ============================================================================

/// Similarity metric of a collection. Scores are always "higher is closer".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Cosine similarity in `[-1, 1]`.
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
    /// Euclidean distance `d`, scored as `1 / (1 + d)`.
    Euclid,
}

impl Distance {
    /// Score `candidate` against `query`.
    pub fn score(&self, query: &[f32], candidate: &[f32]) -> Result<f32> {
        match self {
            Self::Cosine => math::cosine_similarity(query, candidate),
            Self::Dot => math::dot(query, candidate),
            Self::Euclid => math::euclidean_distance(query, candidate).map(|d| 1.0 / (1.0 + d)),
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Dot => "dot",
            Self::Euclid => "euclid",
        }
    }

    /// Parse a lowercase name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(Self::Cosine),
            "dot" => Some(Self::Dot),
            "euclid" => Some(Self::Euclid),
            _ => None,
        }
    }
}

/// Settings a collection is created with. Fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    /// Vector length every point must have.
    pub dimension: usize,
    /// Similarity metric.
    pub distance: Distance,
    /// Copies of each shard.
    pub replication_factor: u32,
    /// Replicas that must acknowledge a write.
    pub write_consistency_factor: u32,
    /// Point count at which the ANN index is built.
    pub indexing_threshold: usize,
    /// Target segment count.
    pub segment_number: usize,
}

impl CollectionSpec {
    /// Spec with baseline replication and optimizer settings.
    pub fn new(dimension: usize, distance: Distance) -> Self {
        Self {
            dimension,
            distance,
            replication_factor: 1,
            write_consistency_factor: 1,
            indexing_threshold: 20_000,
            segment_number: 2,
        }
    }
}

/// Optimizer state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionStatus {
    /// Fully optimized.
    Green,
    /// Optimizing.
    Yellow,
    /// Failed.
    Red,
}

/// Read-only diagnostic snapshot of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionInfo {
    /// Stored vectors.
    pub vectors_count: u64,
    /// Vectors covered by the ANN index.
    pub indexed_vectors_count: u64,
    /// Stored points.
    pub points_count: u64,
    /// Storage segments.
    pub segments_count: u64,
    /// Optimizer status.
    pub status: CollectionStatus,
}

// ============================================================================
// Points
// ============================================================================

/// A point as handed to a backend: raw JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    /// Point id.
    pub id: String,
    /// Embedding.
    pub vector: Vec<f32>,
    /// Payload fields.
    pub payload: Map<String, Value>,
}

/// A point as returned by a backend lookup or scroll.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedPoint {
    /// Point id.
    pub id: String,
    /// Payload fields.
    pub payload: Map<String, Value>,
    /// Embedding, when requested.
    pub vector: Option<Vec<f32>>,
}

/// A backend similarity hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    /// Point id.
    pub id: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Payload fields.
    pub payload: Map<String, Value>,
    /// Embedding, when requested.
    pub vector: Option<Vec<f32>>,
}

/// One point for a batch store call.
#[derive(Debug, Clone, PartialEq)]
pub struct PointInput {
    /// Explicit id; a UUID is generated when absent.
    pub id: Option<String>,
    /// Embedding.
    pub vector: Vec<f32>,
    /// Typed payload.
    pub payload: Payload,
}

impl PointInput {
    /// A point with a generated id.
    pub fn new(vector: Vec<f32>, payload: Payload) -> Self {
        Self {
            id: None,
            vector,
            payload,
        }
    }

    /// Sets an explicit id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A stored point with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredVector {
    /// Point id.
    pub id: String,
    /// Typed payload.
    pub payload: Payload,
    /// Embedding, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl From<RetrievedPoint> for StoredVector {
    fn from(p: RetrievedPoint) -> Self {
        Self {
            id: p.id,
            payload: Payload::from_map(p.payload),
            vector: p.vector,
        }
    }
}

/// A similarity search hit with its typed payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchResult {
    /// Point id.
    pub id: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Typed payload.
    pub payload: Payload,
    /// Embedding, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl From<ScoredPoint> for VectorSearchResult {
    fn from(p: ScoredPoint) -> Self {
        Self {
            id: p.id,
            score: p.score,
            payload: Payload::from_map(p.payload),
            vector: p.vector,
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// Similarity search parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// Maximum results.
    pub limit: usize,
    /// Minimum score; the store default applies when `None`.
    pub score_threshold: Option<f32>,
    /// Candidate restriction.
    pub filter: Option<Filter>,
    /// Return raw vectors.
    pub with_vector: bool,
    /// Results to skip.
    pub offset: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            score_threshold: None,
            filter: None,
            with_vector: false,
            offset: 0,
        }
    }
}

impl SearchOptions {
    /// Default options (limit 10).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Sets the minimum score.
    pub fn with_score_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = Some(threshold);
        self
    }

    /// Restricts candidates.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Requests raw vectors.
    pub fn with_vector(mut self, with_vector: bool) -> Self {
        self.with_vector = with_vector;
        self
    }

    /// Skips the first `offset` results.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

/// Scroll (bulk iteration) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollOptions {
    /// Page size.
    pub limit: usize,
    /// Cursor from the previous page's `next_offset`.
    pub offset: Option<String>,
    /// Candidate restriction.
    pub filter: Option<Filter>,
    /// Return raw vectors.
    pub with_vector: bool,
}

impl Default for ScrollOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            offset: None,
            filter: None,
            with_vector: false,
        }
    }
}

impl ScrollOptions {
    /// Default options (page size 100).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Resumes from a cursor.
    pub fn with_offset(mut self, offset: impl Into<String>) -> Self {
        self.offset = Some(offset.into());
        self
    }

    /// Restricts candidates.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Requests raw vectors.
    pub fn with_vector(mut self, with_vector: bool) -> Self {
        self.with_vector = with_vector;
        self
    }
}

/// One page of a scroll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollPage<T = StoredVector> {
    /// Points on this page.
    pub points: Vec<T>,
    /// Cursor for the next page; `None` once exhausted.
    pub next_offset: Option<String>,
}

// ============================================================================
// Health
// ============================================================================

/// Overall health flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// Backend reachable and store ready.
    Healthy,
    /// Anything else.
    Unhealthy,
}

/// Health report. Produced without ever failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    /// Overall flag.
    pub status: HealthState,
    /// Physical collection names present on the backend.
    pub collections: Vec<String>,
    /// Sum of points across those collections.
    pub total_vectors: u64,
    /// Probe failure, when unhealthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    /// An unhealthy report carrying `error`.
    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unhealthy,
            collections: Vec::new(),
            total_vectors: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the status is healthy.
    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}
