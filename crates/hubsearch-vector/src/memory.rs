//! In-memory vector backend.
//!
//! Exact (brute-force) scoring over every point of a collection. Always
//! available; used as the test double and for small deployments.
//!
//! Bulk upserts are atomic: every point is checked before any is written.
//! Scroll cursors are point ids; a page starts at the first id greater
//! than or equal to the cursor.

use async_trait::async_trait;
use hubsearch_core::{Error, Result};
use log::debug;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::RwLock;

use crate::backend::VectorBackend;
use crate::filter::Filter;
use crate::types::{
    CollectionInfo, CollectionSpec, CollectionStatus, RetrievedPoint, ScoredPoint, ScrollOptions,
    ScrollPage, SearchOptions, VectorPoint,
};

#[derive(Debug, Clone)]
struct StoredPoint {
    vector: Vec<f32>,
    payload: Map<String, Value>,
}

#[derive(Debug)]
struct Collection {
    spec: CollectionSpec,
    points: BTreeMap<String, StoredPoint>,
}

impl Collection {
    fn retrieved(&self, id: &str, p: &StoredPoint, with_vector: bool) -> RetrievedPoint {
        RetrievedPoint {
            id: id.to_string(),
            payload: p.payload.clone(),
            vector: with_vector.then(|| p.vector.clone()),
        }
    }
}

/// In-memory exact-search backend.
#[derive(Debug)]
pub struct MemoryVectorBackend {
    collections: RwLock<BTreeMap<String, Collection>>,
    available: AtomicBool,
    failures: AtomicU32,
}

impl Default for MemoryVectorBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVectorBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        }
    }

    /// Simulate the backend going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Make the next `n` calls fail as unavailable, then recover.
    pub fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn check(&self, operation: &str) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(Error::backend_unavailable(operation, "connection refused"));
        }
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(Error::backend_unavailable(operation, "injected failure"));
        }
        Ok(())
    }
}

fn missing(collection: &str) -> Error {
    Error::not_found(format!("collection '{collection}'"))
}

#[async_trait]
impl VectorBackend for MemoryVectorBackend {
    async fn ping(&self) -> Result<()> {
        self.check("ping")
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.check("list_collections")?;
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        self.check("collection_spec")?;
        Ok(self
            .collections
            .read()
            .await
            .get(name)
            .map(|c| c.spec.clone()))
    }

    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool> {
        self.check("create_collection")?;
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(
            name.to_string(),
            Collection {
                spec: spec.clone(),
                points: BTreeMap::new(),
            },
        );
        Ok(true)
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        self.check("upsert")?;
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != col.spec.dimension) {
            return Err(Error::dimension_mismatch(col.spec.dimension, bad.vector.len()));
        }

        debug!("Upserting {} points into '{collection}'", points.len());
        for p in points {
            col.points.insert(
                p.id,
                StoredPoint {
                    vector: p.vector,
                    payload: p.payload,
                },
            );
        }
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> Result<Option<RetrievedPoint>> {
        self.check("retrieve")?;
        let collections = self.collections.read().await;
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;
        Ok(col
            .points
            .get(id)
            .map(|p| col.retrieved(id, p, with_vector)))
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<bool> {
        self.check("set_payload")?;
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        match col.points.get_mut(id) {
            Some(point) => {
                point.payload.extend(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        self.check("delete")?;
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        Ok(ids.iter().filter(|id| col.points.remove(*id).is_some()).count())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize> {
        self.check("delete_by_filter")?;
        let mut collections = self.collections.write().await;
        let col = collections
            .get_mut(collection)
            .ok_or_else(|| missing(collection))?;
        let before = col.points.len();
        col.points.retain(|_, p| !filter.matches(&p.payload));
        Ok(before - col.points.len())
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredPoint>> {
        self.check("search")?;
        let collections = self.collections.read().await;
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;
        if query.len() != col.spec.dimension {
            return Err(Error::dimension_mismatch(col.spec.dimension, query.len()));
        }

        let mut hits = Vec::new();
        for (id, p) in &col.points {
            if let Some(filter) = &options.filter
                && !filter.matches(&p.payload)
            {
                continue;
            }
            let score = col.spec.distance.score(query, &p.vector)?;
            if options.score_threshold.is_some_and(|t| score < t) {
                continue;
            }
            hits.push(ScoredPoint {
                id: id.clone(),
                score,
                payload: p.payload.clone(),
                vector: options.with_vector.then(|| p.vector.clone()),
            });
        }

        // BTreeMap iteration is id-ordered and the sort is stable, so ties
        // resolve by ascending id.
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(hits
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        self.check("count")?;
        let collections = self.collections.read().await;
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;
        let n = match filter {
            Some(f) => col.points.values().filter(|p| f.matches(&p.payload)).count(),
            None => col.points.len(),
        };
        Ok(n as u64)
    }

    async fn scroll(
        &self,
        collection: &str,
        options: &ScrollOptions,
    ) -> Result<ScrollPage<RetrievedPoint>> {
        self.check("scroll")?;
        let collections = self.collections.read().await;
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;

        let start = match &options.offset {
            Some(cursor) => Bound::Included(cursor.clone()),
            None => Bound::Unbounded,
        };
        let mut matching = col
            .points
            .range((start, Bound::Unbounded))
            .filter(|(_, p)| options.filter.as_ref().is_none_or(|f| f.matches(&p.payload)));

        let points: Vec<RetrievedPoint> = matching
            .by_ref()
            .take(options.limit)
            .map(|(id, p)| col.retrieved(id, p, options.with_vector))
            .collect();
        let next_offset = matching.next().map(|(id, _)| id.clone());

        Ok(ScrollPage {
            points,
            next_offset,
        })
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        self.check("collection_info")?;
        let collections = self.collections.read().await;
        let col = collections.get(collection).ok_or_else(|| missing(collection))?;
        let n = col.points.len() as u64;
        let indexed = if col.points.len() >= col.spec.indexing_threshold {
            n
        } else {
            0
        };
        Ok(CollectionInfo {
            vectors_count: n,
            indexed_vectors_count: indexed,
            points_count: n,
            segments_count: col.spec.segment_number as u64,
            status: CollectionStatus::Green,
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================
