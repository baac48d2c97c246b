//! Project datastore trait and the in-memory store.

use async_trait::async_trait;
use hubsearch_core::{Error, Result};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::query::{SearchFilters, SortField, SortOrder, recency_then_id};
use crate::sanitize::tokenize;
use crate::types::{ProjectRecord, RankedRecord};

/// Order a store applies to matches before cutting its result window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrder {
    /// Highest text rank first.
    TextRank,
    /// A record field in a direction.
    Field(SortField, SortOrder),
}

impl RecordOrder {
    /// Sort `hits` in place. Ties break newest first, then by id.
    pub fn sort(self, hits: &mut [RankedRecord]) {
        match self {
            Self::TextRank => hits.sort_by(|a, b| {
                b.text_rank
                    .total_cmp(&a.text_rank)
                    .then_with(|| recency_then_id(&a.record, &b.record))
            }),
            Self::Field(field, order) => {
                hits.sort_by(|a, b| field.compare(&a.record, &b.record, order))
            }
        }
    }
}

/// Datastore holding searchable projects.
///
/// `text` is sanitized query text; a record matches when it contains
/// every token of it in its title or abstract. `search` returns the first
/// `limit` matches under a [`RecordOrder`] with their raw text rank;
/// `count` applies the same predicate without a limit.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert or replace a record by id.
    async fn upsert(&self, record: ProjectRecord) -> Result<()>;

    /// Remove a record. Returns whether it existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Fetch a record by id.
    async fn get(&self, id: &str) -> Result<Option<ProjectRecord>>;

    /// The first `limit` records matching `text` and `filters` under `order`.
    async fn search(
        &self,
        text: Option<&str>,
        filters: &SearchFilters,
        order: RecordOrder,
        limit: usize,
    ) -> Result<Vec<RankedRecord>>;

    /// Exact number of records matching `text` and `filters`.
    async fn count(&self, text: Option<&str>, filters: &SearchFilters) -> Result<u64>;

    /// Store name for diagnostics.
    fn name(&self) -> &str;
}

/// In-memory store with a token-AND text predicate.
///
/// Text rank is the summed term frequency over title and abstract,
/// divided by `1 + ln(1 + tokens)` so long abstracts do not dominate.
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    records: RwLock<BTreeMap<String, ProjectRecord>>,
}

impl MemoryProjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

/// Rank of `record` for `terms`, or `None` if any term is missing.
fn text_rank(record: &ProjectRecord, terms: &[String]) -> Option<f32> {
    let mut tokens = tokenize(&record.title);
    tokens.extend(tokenize(&record.abstract_text));

    let mut total = 0usize;
    for term in terms {
        let tf = tokens.iter().filter(|t| *t == term).count();
        if tf == 0 {
            return None;
        }
        total += tf;
    }
    let norm = 1.0 + (1.0 + tokens.len() as f32).ln();
    Some(total as f32 / norm)
}

fn rank_if_match(
    record: &ProjectRecord,
    terms: Option<&[String]>,
    filters: &SearchFilters,
) -> Option<f32> {
    if !filters.matches(record) {
        return None;
    }
    match terms {
        Some(terms) => text_rank(record, terms),
        None => Some(0.0),
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn upsert(&self, record: ProjectRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(Error::validation("project id cannot be empty"));
        }
        self.records.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn get(&self, id: &str) -> Result<Option<ProjectRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn search(
        &self,
        text: Option<&str>,
        filters: &SearchFilters,
        order: RecordOrder,
        limit: usize,
    ) -> Result<Vec<RankedRecord>> {
        let terms = text.map(tokenize);
        let mut hits: Vec<RankedRecord> = {
            let records = self.records.read().await;
            records
                .values()
                .filter_map(|r| {
                    rank_if_match(r, terms.as_deref(), filters).map(|text_rank| RankedRecord {
                        record: r.clone(),
                        text_rank,
                    })
                })
                .collect()
        };
        order.sort(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, text: Option<&str>, filters: &SearchFilters) -> Result<u64> {
        let terms = text.map(tokenize);
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| rank_if_match(r, terms.as_deref(), filters).is_some())
            .count() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// Tests
// ============================================================================
