//! Tantivy-backed project store.
//!
//! Title and abstract are indexed as full text and scored with BM25,
//! title matches weighted higher.
//! Structured attributes are indexed as exact, lowercased terms and
//! queried as zero-weight clauses, so they restrict the candidate set
//! without moving scores. Queries are built from typed query objects;
//! user text never reaches a query parser.
//!
//! Tantivy only stores ids. Entities are recovered from an id → record
//! map kept beside the index.
//!
//! `search` scores every match and sorts the recovered records under the
//! requested order before cutting the window, so deep pages and score
//! ties agree with the in-memory store at O(matches) per query.
//!
//! # Feature Gate
//!
//! This module requires the `lexical-tantivy` feature.

use async_trait::async_trait;
use hubsearch_core::{Error, Result};
use log::debug;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, BooleanQuery, BoostQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, INDEXED, IndexRecordOption, STORED, STRING, Schema, TEXT, Value};
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term,
};

use crate::query::{SearchFilters, fold_case};
use crate::sanitize::tokenize;
use crate::store::{ProjectStore, RecordOrder};
use crate::types::{ProjectRecord, RankedRecord};

const WRITER_HEAP_BYTES: usize = 50_000_000;

// A term in the title must outweigh the same term in a rarer abstract.
const TITLE_WEIGHT: f32 = 3.0;
const ABSTRACT_WEIGHT: f32 = 1.0;

#[derive(Debug, Clone, Copy)]
struct Fields {
    id: Field,
    title: Field,
    abstract_text: Field,
    specialization: Field,
    difficulty: Field,
    year: Field,
    tags: Field,
    technologies: Field,
    owner_id: Field,
    group: Field,
    status: Field,
}

impl Fields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            id: builder.add_text_field("id", STRING | STORED),
            title: builder.add_text_field("title", TEXT),
            abstract_text: builder.add_text_field("abstract", TEXT),
            specialization: builder.add_text_field("specialization", STRING),
            difficulty: builder.add_text_field("difficulty", STRING),
            year: builder.add_i64_field("year", INDEXED),
            tags: builder.add_text_field("tags", STRING),
            technologies: builder.add_text_field("technologies", STRING),
            owner_id: builder.add_text_field("owner_id", STRING),
            group: builder.add_bool_field("group", INDEXED),
            status: builder.add_text_field("status", STRING),
        };
        (builder.build(), fields)
    }

    fn document(&self, record: &ProjectRecord) -> TantivyDocument {
        let mut doc = TantivyDocument::default();
        doc.add_text(self.id, &record.id);
        doc.add_text(self.title, &record.title);
        doc.add_text(self.abstract_text, &record.abstract_text);
        doc.add_text(self.specialization, fold_case(&record.specialization));
        doc.add_text(self.difficulty, fold_case(&record.difficulty));
        doc.add_i64(self.year, i64::from(record.year));
        for tag in &record.tags {
            doc.add_text(self.tags, fold_case(tag));
        }
        for tech in &record.technology_stack {
            doc.add_text(self.technologies, fold_case(tech));
        }
        doc.add_text(self.owner_id, fold_case(&record.owner_id));
        doc.add_bool(self.group, record.is_group_project);
        doc.add_text(self.status, record.status.as_str());
        doc
    }

    fn query(&self, text: Option<&str>, filters: &SearchFilters) -> Box<dyn Query> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        for term in text.map(tokenize).unwrap_or_default() {
            let either: Vec<(Occur, Box<dyn Query>)> = [
                (self.title, TITLE_WEIGHT),
                (self.abstract_text, ABSTRACT_WEIGHT),
            ]
            .into_iter()
            .map(|(field, weight)| {
                let tq = TermQuery::new(
                    Term::from_field_text(field, &term),
                    IndexRecordOption::WithFreqs,
                );
                let q: Box<dyn Query> = Box::new(BoostQuery::new(Box::new(tq), weight));
                (Occur::Should, q)
            })
            .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(either))));
        }

        let mut restrict = |terms: Vec<Term>| {
            if !terms.is_empty() {
                clauses.push((Occur::Must, Box::new(BoostQuery::new(any_term(terms), 0.0))));
            }
        };
        restrict(text_terms(self.specialization, &filters.specializations));
        restrict(text_terms(self.difficulty, &filters.difficulties));
        restrict(
            filters
                .years
                .iter()
                .map(|y| Term::from_field_i64(self.year, i64::from(*y)))
                .collect(),
        );
        restrict(text_terms(self.tags, &filters.tags));
        restrict(text_terms(self.technologies, &filters.technologies));
        restrict(text_terms(self.owner_id, &filters.owner_ids));
        restrict(
            filters
                .is_group_project
                .map(|g| Term::from_field_bool(self.group, g))
                .into_iter()
                .collect(),
        );
        restrict(
            filters
                .status
                .map(|s| Term::from_field_text(self.status, s.as_str()))
                .into_iter()
                .collect(),
        );

        if clauses.is_empty() {
            Box::new(AllQuery)
        } else {
            Box::new(BooleanQuery::new(clauses))
        }
    }
}

fn text_terms(field: Field, values: &[String]) -> Vec<Term> {
    values
        .iter()
        .map(|v| Term::from_field_text(field, &fold_case(v)))
        .collect()
}

fn any_term(terms: Vec<Term>) -> Box<dyn Query> {
    let should: Vec<(Occur, Box<dyn Query>)> = terms
        .into_iter()
        .map(|t| {
            let q: Box<dyn Query> = Box::new(TermQuery::new(t, IndexRecordOption::Basic));
            (Occur::Should, q)
        })
        .collect();
    Box::new(BooleanQuery::new(should))
}

fn index_error(operation: &str) -> impl Fn(tantivy::TantivyError) -> Error + '_ {
    move |e| Error::backend(operation, e.to_string())
}

fn poisoned(operation: &str) -> Error {
    Error::backend(operation, "lexical index lock poisoned")
}

/// In-RAM Tantivy project store.
pub struct TantivyProjectStore {
    fields: Fields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    records: RwLock<HashMap<String, ProjectRecord>>,
}

impl TantivyProjectStore {
    /// Create an empty in-memory index.
    pub fn new() -> Result<Self> {
        let (schema, fields) = Fields::schema();
        let index = Index::create_in_ram(schema);
        let writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(index_error("open_index"))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(index_error("open_index"))?;

        Ok(Self {
            fields,
            writer: Mutex::new(writer),
            reader,
            records: RwLock::new(HashMap::new()),
        })
    }

    fn writer(&self, operation: &str) -> Result<MutexGuard<'_, IndexWriter>> {
        self.writer.lock().map_err(|_| poisoned(operation))
    }

    fn commit(&self, operation: &str, writer: &mut IndexWriter) -> Result<()> {
        writer.commit().map_err(index_error(operation))?;
        self.reader.reload().map_err(index_error(operation))
    }

    fn recover(
        &self,
        searcher: &Searcher,
        top_docs: Vec<(f32, DocAddress)>,
        scored: bool,
    ) -> Result<Vec<RankedRecord>> {
        let records = self.records.read().map_err(|_| poisoned("search"))?;
        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(index_error("search"))?;
            let Some(id) = doc.get_first(self.fields.id).and_then(|v| v.as_str()) else {
                continue;
            };
            if let Some(record) = records.get(id) {
                hits.push(RankedRecord {
                    record: record.clone(),
                    text_rank: if scored { score } else { 0.0 },
                });
            }
        }
        Ok(hits)
    }
}

#[async_trait]
impl ProjectStore for TantivyProjectStore {
    async fn upsert(&self, record: ProjectRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(Error::validation("project id cannot be empty"));
        }
        {
            let mut writer = self.writer("upsert")?;
            writer.delete_term(Term::from_field_text(self.fields.id, &record.id));
            writer
                .add_document(self.fields.document(&record))
                .map_err(index_error("upsert"))?;
            self.commit("upsert", &mut writer)?;
        }
        debug!("Indexed project '{}'", record.id);
        self.records
            .write()
            .map_err(|_| poisoned("upsert"))?
            .insert(record.id.clone(), record);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let existed = self
            .records
            .write()
            .map_err(|_| poisoned("remove"))?
            .remove(id)
            .is_some();
        if existed {
            let mut writer = self.writer("remove")?;
            writer.delete_term(Term::from_field_text(self.fields.id, id));
            self.commit("remove", &mut writer)?;
        }
        Ok(existed)
    }

    async fn get(&self, id: &str) -> Result<Option<ProjectRecord>> {
        Ok(self
            .records
            .read()
            .map_err(|_| poisoned("get"))?
            .get(id)
            .cloned())
    }

    async fn search(
        &self,
        text: Option<&str>,
        filters: &SearchFilters,
        order: RecordOrder,
        limit: usize,
    ) -> Result<Vec<RankedRecord>> {
        let searcher = self.reader.searcher();
        // Every match is scored so ties break the same way as other stores.
        let window = searcher.num_docs() as usize;
        // TopDocs rejects a zero limit.
        if limit == 0 || window == 0 {
            return Ok(Vec::new());
        }
        let query = self.fields.query(text, filters);
        let top_docs = searcher
            .search(query.as_ref(), &TopDocs::with_limit(window))
            .map_err(index_error("search"))?;

        let mut hits = self.recover(&searcher, top_docs, text.is_some())?;
        order.sort(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self, text: Option<&str>, filters: &SearchFilters) -> Result<u64> {
        let query = self.fields.query(text, filters);
        let n = self
            .reader
            .searcher()
            .search(query.as_ref(), &Count)
            .map_err(index_error("count"))?;
        Ok(n as u64)
    }

    fn name(&self) -> &str {
        "tantivy"
    }
}

impl std::fmt::Debug for TantivyProjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let docs = self.reader.searcher().num_docs();
        f.debug_struct("TantivyProjectStore")
            .field("documents", &docs)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::query::{SortField, SortOrder};
    use crate::types::ProjectStatus;

    async fn seeded() -> TantivyProjectStore {
        let store = TantivyProjectStore::new().unwrap();
        for record in [
            ProjectRecord::new("p1", "Machine Learning Basics")
                .with_specialization("AI")
                .with_year(2024)
                .with_tags(["ML", "intro"]),
            ProjectRecord::new("p2", "Compilers")
                .with_abstract("A compiler that uses machine learning for register allocation")
                .with_specialization("Systems")
                .with_year(2023)
                .with_group(true),
            ProjectRecord::new("p3", "Gardening Robots")
                .with_specialization("Robotics")
                .with_status(ProjectStatus::Draft),
        ] {
            store.upsert(record).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_text_search_ranks_and_counts() {
        let store = seeded().await;
        let all = SearchFilters::default();
        let hits = store
            .search(Some("machine learning"), &all, RecordOrder::TextRank, 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.text_rank > 0.0));
        assert_eq!(store.count(Some("machine learning"), &all).await.unwrap(), 2);
        assert_eq!(store.count(Some("machine gardening"), &all).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_filters_restrict_without_scoring() {
        let store = seeded().await;
        let filters = SearchFilters {
            specializations: vec!["systems".into()],
            is_group_project: Some(true),
            ..Default::default()
        };
        let hits = store
            .search(Some("machine"), &filters, RecordOrder::TextRank, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "p2");

        let by_tag = SearchFilters {
            tags: vec!["ml".into()],
            years: vec![2024],
            ..Default::default()
        };
        assert_eq!(store.count(None, &by_tag).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_status_filter() {
        let store = seeded().await;
        let drafts = SearchFilters {
            status: Some(ProjectStatus::Draft),
            ..Default::default()
        };
        let hits = store
            .search(None, &drafts, RecordOrder::TextRank, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "p3");
        assert_eq!(hits[0].text_rank, 0.0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_remove_deletes() {
        let store = seeded().await;
        store
            .upsert(ProjectRecord::new("p1", "Quantum Gravity"))
            .await
            .unwrap();
        let all = SearchFilters::default();
        assert_eq!(store.count(None, &all).await.unwrap(), 3);
        assert_eq!(store.count(Some("quantum"), &all).await.unwrap(), 1);
        assert_eq!(store.count(Some("basics"), &all).await.unwrap(), 0);

        assert!(store.remove("p1").await.unwrap());
        assert!(!store.remove("p1").await.unwrap());
        assert_eq!(store.count(None, &all).await.unwrap(), 2);
        assert!(store.get("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_zero_limit_is_empty() {
        let store = seeded().await;
        assert!(
            store
                .search(None, &SearchFilters::default(), RecordOrder::TextRank, 0)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_field_order_sees_every_match() {
        let store = seeded().await;
        store
            .upsert(ProjectRecord::new("p0", "Popular").with_engagement(500, 0))
            .await
            .unwrap();
        let order = RecordOrder::Field(SortField::Views, SortOrder::Desc);
        let hits = store
            .search(None, &SearchFilters::default(), order, 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, "p0");
    }

    #[tokio::test]
    async fn test_filters_fold_non_ascii_case() {
        let store = seeded().await;
        store
            .upsert(ProjectRecord::new("p4", "Data Ethics").with_specialization("Ética"))
            .await
            .unwrap();
        let filters = SearchFilters {
            specializations: vec!["ÉTICA".into()],
            ..Default::default()
        };
        assert_eq!(store.count(None, &filters).await.unwrap(), 1);
    }
}
