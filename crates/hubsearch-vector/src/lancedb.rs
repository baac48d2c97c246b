//! LanceDB vector backend.
//!
//! One LanceDB table per collection, embedded on disk (or any URI LanceDB
//! accepts).
//!
//! # Schema
//!
//! | Column | Type | Purpose |
//! |--------|------|---------|
//! | `id` | Utf8 | Point id |
//! | `payload` | Utf8 | JSON-serialized payload |
//! | `vector` | FixedSizeList<Float32> | Embedding vector |
//!
//! Collection settings are kept in the table's schema metadata. Scores are
//! recomputed from the returned vectors with the collection's [`Distance`]
//! so every backend reports the same scale.
//!
//! # Filters
//!
//! A [`Filter`] is pushed down as its SQL prefilter, and every candidate is
//! then confirmed with [`Filter::matches`], so array membership behaves as
//! it does on the in-memory backend. Filtered searches widen their fetch
//! until enough confirmed hits are found or the table runs out.
//!
//! # Scrolling
//!
//! Plain LanceDB queries return rows in no particular order, so a scroll
//! page reads every matching row at or after the cursor and orders them by
//! id in memory. The cursor and filter are pushed into the scan, and the
//! vector column is only read when vectors were asked for.
//!
//! # Feature Gate
//!
//! This module requires the `vector-lancedb` feature.

use crate::backend::VectorBackend;
use crate::filter::Filter;
use crate::types::{
    CollectionInfo, CollectionSpec, CollectionStatus, Distance, RetrievedPoint, ScoredPoint,
    ScrollOptions, ScrollPage, SearchOptions, VectorPoint,
};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use hubsearch_core::{Error, Result};
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

const PAYLOAD_COLUMN: &str = "payload";
const META_DIMENSION: &str = "hubsearch.dimension";
const META_DISTANCE: &str = "hubsearch.distance";
const META_INDEXING_THRESHOLD: &str = "hubsearch.indexing_threshold";
const META_SEGMENTS: &str = "hubsearch.segment_number";

/// LanceDB-backed vector backend.
pub struct LancedbBackend {
    connection: lancedb::Connection,
    uri: String,
}

impl LancedbBackend {
    /// Open (or create) the database at `uri`.
    pub async fn connect(uri: &str, api_key: Option<&str>) -> Result<Self> {
        if api_key.is_some() {
            warn!("vector.api_key is ignored by the embedded LanceDB backend");
        }
        let connection = lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| Error::backend_unavailable("connect", e.to_string()))?;
        debug!("Opened LanceDB at {uri}");
        Ok(Self {
            connection,
            uri: uri.to_string(),
        })
    }

    async fn table(&self, operation: &str, name: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| map_error(operation, name, e))
    }

    async fn spec_of(&self, operation: &str, table: &lancedb::Table) -> Result<CollectionSpec> {
        let schema = table
            .schema()
            .await
            .map_err(|e| map_error(operation, table.name(), e))?;
        spec_from_schema(&schema)
    }

    /// Rows passing `predicate` and confirmed by `filter`.
    async fn scan(
        &self,
        operation: &str,
        table: &lancedb::Table,
        predicate: Option<String>,
        filter: Option<&Filter>,
        with_vector: bool,
    ) -> Result<Vec<Row>> {
        let mut query = table.query();
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }
        if !with_vector {
            query = query.select(Select::columns(&["id", PAYLOAD_COLUMN]));
        }
        let batches: Vec<RecordBatch> = query
            .execute()
            .await
            .map_err(|e| map_error(operation, table.name(), e))?
            .try_collect()
            .await
            .map_err(|e| map_error(operation, table.name(), e))?;
        Ok(confirm(parse_rows(&batches)?, filter))
    }

    async fn nearest(
        &self,
        table: &lancedb::Table,
        query: &[f32],
        distance: Distance,
        predicate: Option<&str>,
        fetch: usize,
    ) -> Result<Vec<Row>> {
        let mut request = table
            .vector_search(query.to_vec())
            .map_err(|e| map_error("search", table.name(), e))?
            .distance_type(distance_type(distance))
            .limit(fetch);
        if let Some(predicate) = predicate {
            request = request.only_if(predicate);
        }
        let batches: Vec<RecordBatch> = request
            .execute()
            .await
            .map_err(|e| map_error("search", table.name(), e))?
            .try_collect()
            .await
            .map_err(|e| map_error("search", table.name(), e))?;
        parse_rows(&batches)
    }
}

#[async_trait]
impl VectorBackend for LancedbBackend {
    async fn ping(&self) -> Result<()> {
        self.connection
            .table_names()
            .execute()
            .await
            .map(|_| ())
            .map_err(|e| Error::backend_unavailable("ping", e.to_string()))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::backend_unavailable("list_collections", e.to_string()))
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        if !self.list_collections().await?.iter().any(|n| n == name) {
            return Ok(None);
        }
        let table = self.table("collection_spec", name).await?;
        self.spec_of("collection_spec", &table).await.map(Some)
    }

    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<bool> {
        if self.list_collections().await?.iter().any(|n| n == name) {
            return Ok(false);
        }
        let result = self
            .connection
            .create_empty_table(name, make_schema(spec)?)
            .execute()
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(lancedb::Error::TableAlreadyExists { .. }) => Ok(false),
            Err(e) => Err(map_error("create_collection", name, e)),
        }
    }

    async fn upsert(&self, collection: &str, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let table = self.table("upsert", collection).await?;
        let spec = self.spec_of("upsert", &table).await?;
        if let Some(bad) = points.iter().find(|p| p.vector.len() != spec.dimension) {
            return Err(Error::dimension_mismatch(spec.dimension, bad.vector.len()));
        }

        let batch = build_record_batch(&points, &spec)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| map_error("upsert", collection, e))?;
        Ok(())
    }

    async fn retrieve(
        &self,
        collection: &str,
        id: &str,
        with_vector: bool,
    ) -> Result<Option<RetrievedPoint>> {
        let table = self.table("retrieve", collection).await?;
        let batches = table
            .query()
            .only_if(id_predicate(&[id]))
            .execute()
            .await
            .map_err(|e| map_error("retrieve", collection, e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| map_error("retrieve", collection, e))?;
        let mut rows = parse_rows(&batches)?;
        Ok(rows.pop().map(|row| row.into_retrieved(with_vector)))
    }

    async fn set_payload(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<bool> {
        let Some(current) = self.retrieve(collection, id, true).await? else {
            return Ok(false);
        };
        let mut payload = current.payload;
        payload.extend(patch);
        let point = VectorPoint {
            id: current.id,
            vector: current.vector.unwrap_or_default(),
            payload,
        };
        self.upsert(collection, vec![point]).await?;
        Ok(true)
    }

    async fn delete(&self, collection: &str, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let table = self.table("delete", collection).await?;
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let predicate = id_predicate(&refs);
        let existing = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| map_error("delete", collection, e))?;
        if existing > 0 {
            table
                .delete(&predicate)
                .await
                .map_err(|e| map_error("delete", collection, e))?;
        }
        Ok(existing)
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<usize> {
        let table = self.table("delete_by_filter", collection).await?;
        let predicate = filter.to_sql(PAYLOAD_COLUMN)?;
        let ids: Vec<String> = self
            .scan("delete_by_filter", &table, Some(predicate), Some(filter), false)
            .await?
            .into_iter()
            .map(|row| row.id)
            .collect();
        self.delete(collection, &ids).await
    }

    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        options: &SearchOptions,
    ) -> Result<Vec<ScoredPoint>> {
        let table = self.table("search", collection).await?;
        let spec = self.spec_of("search", &table).await?;
        if query.len() != spec.dimension {
            return Err(Error::dimension_mismatch(spec.dimension, query.len()));
        }
        if options.limit == 0 {
            return Ok(Vec::new());
        }

        let filter = options.filter.as_ref();
        let predicate = filter.map(|f| f.to_sql(PAYLOAD_COLUMN)).transpose()?;
        let wanted = options.offset.saturating_add(options.limit);
        let mut fetch = wanted;
        let rows = loop {
            let fetched = self
                .nearest(&table, query, spec.distance, predicate.as_deref(), fetch)
                .await?;
            let exhausted = fetched.len() < fetch;
            let rows = confirm(fetched, filter);
            if exhausted || rows.len() >= wanted {
                break rows;
            }
            fetch = fetch.saturating_mul(2);
        };

        let threshold = options.score_threshold.unwrap_or(f32::NEG_INFINITY);
        let mut hits = Vec::new();
        for row in rows {
            let vector = row.vector.clone().unwrap_or_default();
            let score = spec.distance.score(query, &vector)?;
            if score >= threshold {
                hits.push(ScoredPoint {
                    id: row.id,
                    score,
                    payload: row.payload,
                    vector: options.with_vector.then_some(vector),
                });
            }
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        Ok(hits
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect())
    }

    async fn count(&self, collection: &str, filter: Option<&Filter>) -> Result<u64> {
        let table = self.table("count", collection).await?;
        let Some(filter) = filter else {
            let n = table
                .count_rows(None)
                .await
                .map_err(|e| map_error("count", collection, e))?;
            return Ok(n as u64);
        };
        let predicate = filter.to_sql(PAYLOAD_COLUMN)?;
        let rows = self
            .scan("count", &table, Some(predicate), Some(filter), false)
            .await?;
        Ok(rows.len() as u64)
    }

    async fn scroll(
        &self,
        collection: &str,
        options: &ScrollOptions,
    ) -> Result<ScrollPage<RetrievedPoint>> {
        let table = self.table("scroll", collection).await?;
        let filter = options.filter.as_ref();
        let predicate = scroll_predicate(options.offset.as_deref(), filter)?;
        let mut rows = self
            .scan("scroll", &table, predicate, filter, options.with_vector)
            .await?;
        rows.sort_by(|a, b| a.id.cmp(&b.id));

        let mut page: Vec<Row> = rows.into_iter().take(options.limit.saturating_add(1)).collect();
        let next_offset = if page.len() > options.limit {
            page.pop().map(|r| r.id)
        } else {
            None
        };
        Ok(ScrollPage {
            points: page
                .into_iter()
                .map(|r| r.into_retrieved(options.with_vector))
                .collect(),
            next_offset,
        })
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let table = self.table("collection_info", collection).await?;
        let spec = self.spec_of("collection_info", &table).await?;
        let points = table
            .count_rows(None)
            .await
            .map_err(|e| map_error("collection_info", collection, e))? as u64;
        let indices = table
            .list_indices()
            .await
            .map_err(|e| map_error("collection_info", collection, e))?;
        let indexed = indices
            .iter()
            .any(|idx| idx.columns.iter().any(|c| c == "vector"));

        let status = if indexed || points < spec.indexing_threshold as u64 {
            CollectionStatus::Green
        } else {
            CollectionStatus::Yellow
        };
        Ok(CollectionInfo {
            vectors_count: points,
            indexed_vectors_count: if indexed { points } else { 0 },
            points_count: points,
            segments_count: spec.segment_number as u64,
            status,
        })
    }

    fn name(&self) -> &str {
        "lancedb"
    }
}

impl std::fmt::Debug for LancedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LancedbBackend")
            .field("uri", &self.uri)
            .finish()
    }
}

fn map_error(operation: &str, table: &str, err: lancedb::Error) -> Error {
    match err {
        lancedb::Error::TableNotFound { .. } => Error::not_found(format!("collection '{table}'")),
        other => Error::backend(operation, other.to_string()),
    }
}

fn distance_type(distance: Distance) -> lancedb::DistanceType {
    match distance {
        Distance::Cosine => lancedb::DistanceType::Cosine,
        Distance::Dot => lancedb::DistanceType::Dot,
        Distance::Euclid => lancedb::DistanceType::L2,
    }
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn id_predicate(ids: &[&str]) -> String {
    let list: Vec<String> = ids.iter().map(|id| quote(id)).collect();
    format!("id IN ({})", list.join(", "))
}

/// Prefilter for a scroll page starting at `cursor`.
fn scroll_predicate(cursor: Option<&str>, filter: Option<&Filter>) -> Result<Option<String>> {
    let cursor = cursor.map(|c| format!("id >= {}", quote(c)));
    let filter = filter.map(|f| f.to_sql(PAYLOAD_COLUMN)).transpose()?;
    Ok(match (cursor, filter) {
        (Some(c), Some(f)) => Some(format!("({c}) AND ({f})")),
        (c, f) => c.or(f),
    })
}

fn confirm(rows: Vec<Row>, filter: Option<&Filter>) -> Vec<Row> {
    match filter {
        Some(filter) => rows.into_iter().filter(|r| filter.matches(&r.payload)).collect(),
        None => rows,
    }
}

// ============================================================================
// Arrow schema and batch construction
// ============================================================================

fn vector_item() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

/// Arrow schema for a collection, with its settings in the metadata.
fn make_schema(spec: &CollectionSpec) -> Result<Arc<Schema>> {
    let dimension = i32::try_from(spec.dimension)
        .map_err(|_| Error::validation(format!("dimension {} is too large", spec.dimension)))?;
    let metadata: HashMap<String, String> = [
        (META_DIMENSION, spec.dimension.to_string()),
        (META_DISTANCE, spec.distance.as_str().to_string()),
        (META_INDEXING_THRESHOLD, spec.indexing_threshold.to_string()),
        (META_SEGMENTS, spec.segment_number.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Ok(Arc::new(Schema::new_with_metadata(
        vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(PAYLOAD_COLUMN, DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(vector_item(), dimension),
                false,
            ),
        ],
        metadata,
    )))
}

/// Recover collection settings from a table schema. The dimension always
/// comes from the vector column; missing metadata falls back to defaults.
fn spec_from_schema(schema: &Schema) -> Result<CollectionSpec> {
    let dimension = match schema.field_with_name("vector").map(|f| f.data_type()) {
        Ok(DataType::FixedSizeList(_, size)) => *size as usize,
        _ => return Err(Error::backend("schema", "table has no fixed-size 'vector' column")),
    };
    let meta = schema.metadata();
    let distance = meta
        .get(META_DISTANCE)
        .and_then(|d| Distance::parse(d))
        .unwrap_or_default();

    let mut spec = CollectionSpec::new(dimension, distance);
    if let Some(n) = meta.get(META_INDEXING_THRESHOLD).and_then(|v| v.parse().ok()) {
        spec.indexing_threshold = n;
    }
    if let Some(n) = meta.get(META_SEGMENTS).and_then(|v| v.parse().ok()) {
        spec.segment_number = n;
    }
    Ok(spec)
}

fn build_record_batch(points: &[VectorPoint], spec: &CollectionSpec) -> Result<RecordBatch> {
    let schema = make_schema(spec)?;

    let ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
    let payloads = points
        .iter()
        .map(|p| serde_json::to_string(&p.payload))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Serialization(e.to_string()))?;
    let payload_refs: Vec<&str> = payloads.iter().map(String::as_str).collect();

    let all_values: Vec<f32> = points.iter().flat_map(|p| p.vector.iter().copied()).collect();
    let vector_array = FixedSizeListArray::try_new(
        vector_item(),
        spec.dimension as i32,
        Arc::new(Float32Array::from(all_values)),
        None,
    )
    .map_err(|e| Error::backend("upsert", format!("failed to create vector array: {e}")))?;

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(payload_refs)),
            Arc::new(vector_array),
        ],
    )
    .map_err(|e| Error::backend("upsert", format!("failed to create RecordBatch: {e}")))
}

#[derive(Debug)]
struct Row {
    id: String,
    payload: Map<String, Value>,
    vector: Option<Vec<f32>>,
}

impl Row {
    fn into_retrieved(self, with_vector: bool) -> RetrievedPoint {
        RetrievedPoint {
            id: self.id,
            payload: self.payload,
            vector: if with_vector { self.vector } else { None },
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::backend("read", format!("missing '{name}' column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::backend("read", format!("'{name}' column is not Utf8")))
}

fn parse_rows(batches: &[RecordBatch]) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    for batch in batches {
        let ids = string_column(batch, "id")?;
        let payloads = string_column(batch, PAYLOAD_COLUMN)?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());

        for i in 0..batch.num_rows() {
            let payload = match serde_json::from_str::<Value>(payloads.value(i)) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            };
            let vector = vectors.and_then(|list| {
                list.value(i)
                    .as_any()
                    .downcast_ref::<Float32Array>()
                    .map(|values| values.values().to_vec())
            });
            rows.push(Row {
                id: ids.value(i).to_string(),
                payload,
                vector,
            });
        }
    }
    Ok(rows)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points(dimension: usize) -> Vec<VectorPoint> {
        [("p1", "u1", 0.1), ("p2", "u2", 0.2), ("p3", "u1", 0.3)]
            .into_iter()
            .map(|(id, user, v)| VectorPoint {
                id: id.to_string(),
                vector: (0..dimension).map(|i| v + i as f32 * 0.05).collect(),
                payload: json!({"type": "conversation", "userId": user})
                    .as_object()
                    .cloned()
                    .unwrap(),
            })
            .collect()
    }

    async fn backend() -> (tempfile::TempDir, LancedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let uri = dir.path().join("vectors");
        let backend = LancedbBackend::connect(uri.to_str().unwrap(), None)
            .await
            .unwrap();
        (dir, backend)
    }

    #[test]
    fn test_schema_round_trips_spec() {
        let mut spec = CollectionSpec::new(8, Distance::Dot);
        spec.indexing_threshold = 500;
        let schema = make_schema(&spec).unwrap();
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(2).name(), "vector");

        let back = spec_from_schema(&schema).unwrap();
        assert_eq!(back.dimension, 8);
        assert_eq!(back.distance, Distance::Dot);
        assert_eq!(back.indexing_threshold, 500);
    }

    #[test]
    fn test_record_batch_and_parse() {
        let spec = CollectionSpec::new(4, Distance::Cosine);
        let batch = build_record_batch(&points(4), &spec).unwrap();
        assert_eq!(batch.num_rows(), 3);

        let rows = parse_rows(&[batch]).unwrap();
        assert_eq!(rows[0].id, "p1");
        assert_eq!(rows[1].payload["userId"], "u2");
        assert_eq!(rows[2].vector.as_ref().unwrap().len(), 4);
    }

    #[test]
    fn test_id_predicate_escapes() {
        assert_eq!(id_predicate(&["a", "o'b"]), "id IN ('a', 'o''b')");
    }

    #[test]
    fn test_scroll_predicate_pushes_cursor() {
        assert_eq!(scroll_predicate(None, None).unwrap(), None);
        assert_eq!(
            scroll_predicate(Some("o'b"), None).unwrap().unwrap(),
            "id >= 'o''b'"
        );

        let filter = Filter::eq("userId", "u1");
        let both = scroll_predicate(Some("p2"), Some(&filter)).unwrap().unwrap();
        assert!(both.starts_with("(id >= 'p2') AND ("));
        assert!(both.contains("json_extract(payload, '$.userId') = 'u1'"));
        assert!(scroll_predicate(None, Some(&Filter::eq("", "x"))).is_err());
    }

    #[test]
    fn test_confirm_matches_array_members() {
        let spec = CollectionSpec::new(2, Distance::Cosine);
        let mut tagged = points(2);
        tagged[0].payload.insert("tags".into(), json!(["rust", "ml"]));
        tagged[1].payload.insert("tags".into(), json!("rust"));
        tagged[2].payload.insert("tags".into(), json!(["go"]));
        let rows = parse_rows(&[build_record_batch(&tagged, &spec).unwrap()]).unwrap();

        let kept = confirm(rows, Some(&Filter::eq("tags", "rust")));
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (_dir, backend) = backend().await;
        let spec = CollectionSpec::new(4, Distance::Cosine);
        assert!(backend.create_collection("notes", &spec).await.unwrap());
        assert!(!backend.create_collection("notes", &spec).await.unwrap());
        assert_eq!(backend.list_collections().await.unwrap(), vec!["notes"]);

        let found = backend.collection_spec("notes").await.unwrap().unwrap();
        assert_eq!(found.dimension, 4);
        assert!(backend.collection_spec("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_search_and_delete() {
        let (_dir, backend) = backend().await;
        backend
            .create_collection("notes", &CollectionSpec::new(4, Distance::Cosine))
            .await
            .unwrap();
        let pts = points(4);
        let query = pts[0].vector.clone();
        backend.upsert("notes", pts).await.unwrap();
        assert_eq!(backend.count("notes", None).await.unwrap(), 3);

        let hits = backend
            .search("notes", &query, &SearchOptions::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "p1");
        assert!((hits[0].score - 1.0).abs() < 1e-4);

        let by_user = Filter::eq("userId", "u1");
        assert_eq!(backend.count("notes", Some(&by_user)).await.unwrap(), 2);
        assert_eq!(backend.delete_by_filter("notes", &by_user).await.unwrap(), 2);
        assert_eq!(backend.delete("notes", &["p2".to_string()]).await.unwrap(), 1);
        assert_eq!(backend.count("notes", None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_payload_and_scroll() {
        let (_dir, backend) = backend().await;
        backend
            .create_collection("notes", &CollectionSpec::new(4, Distance::Cosine))
            .await
            .unwrap();
        backend.upsert("notes", points(4)).await.unwrap();

        let mut patch = Map::new();
        patch.insert("topic".into(), json!("ml"));
        assert!(backend.set_payload("notes", "p2", patch).await.unwrap());
        let p2 = backend.retrieve("notes", "p2", false).await.unwrap().unwrap();
        assert_eq!(p2.payload["topic"], "ml");
        assert_eq!(p2.payload["userId"], "u2");

        let first = backend
            .scroll("notes", &ScrollOptions::new().with_limit(2))
            .await
            .unwrap();
        assert_eq!(first.points.len(), 2);
        assert_eq!(first.next_offset.as_deref(), Some("p3"));
    }

    #[tokio::test]
    async fn test_scroll_walks_every_page() {
        let (_dir, backend) = backend().await;
        backend
            .create_collection("notes", &CollectionSpec::new(4, Distance::Cosine))
            .await
            .unwrap();
        let pts: Vec<VectorPoint> = (0..7)
            .map(|i| VectorPoint {
                id: format!("n{i}"),
                vector: vec![1.0, i as f32, 0.5, 0.25],
                payload: json!({"userId": if i % 2 == 0 { "even" } else { "odd" }})
                    .as_object()
                    .cloned()
                    .unwrap(),
            })
            .collect();
        backend.upsert("notes", pts).await.unwrap();

        let mut seen = Vec::new();
        let mut options = ScrollOptions::new().with_limit(3);
        loop {
            let page = backend.scroll("notes", &options).await.unwrap();
            assert!(page.points.iter().all(|p| p.vector.is_none()));
            seen.extend(page.points.into_iter().map(|p| p.id));
            match page.next_offset {
                Some(next) => options.offset = Some(next),
                None => break,
            }
        }
        assert_eq!(seen, vec!["n0", "n1", "n2", "n3", "n4", "n5", "n6"]);

        let evens = ScrollOptions {
            offset: Some("n3".to_string()),
            filter: Some(Filter::eq("userId", "even")),
            with_vector: true,
            ..ScrollOptions::new().with_limit(10)
        };
        let page = backend.scroll("notes", &evens).await.unwrap();
        let ids: Vec<&str> = page.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["n4", "n6"]);
        assert!(page.points.iter().all(|p| p.vector.is_some()));
        assert!(page.next_offset.is_none());
    }

    #[tokio::test]
    async fn test_array_fields_match_by_membership() {
        let (_dir, backend) = backend().await;
        backend
            .create_collection("notes", &CollectionSpec::new(4, Distance::Cosine))
            .await
            .unwrap();
        let mut pts = points(4);
        let query = pts[2].vector.clone();
        pts[0].payload.insert("tags".into(), json!(["rust", "ml"]));
        pts[1].payload.insert("tags".into(), json!(["go"]));
        pts[2].payload.insert("tags".into(), json!("rust"));
        backend.upsert("notes", pts).await.unwrap();

        let rust = Filter::eq("tags", "rust");
        assert_eq!(backend.count("notes", Some(&rust)).await.unwrap(), 2);

        let hits = backend
            .search(
                "notes",
                &query,
                &SearchOptions::new().with_limit(5).with_filter(rust.clone()),
            )
            .await
            .unwrap();
        let mut ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["p1", "p3"]);

        let either = Filter::any_of("tags", ["ml", "go"]);
        assert_eq!(backend.count("notes", Some(&either)).await.unwrap(), 2);
        assert_eq!(backend.delete_by_filter("notes", &rust).await.unwrap(), 2);
        assert_eq!(backend.count("notes", None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let (_dir, backend) = backend().await;
        let err = backend.count("nope", None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
