//! The lexical search pipeline.
//!
//! 1. Sanitize the text (if any); nothing searchable left is an error.
//! 2. Count matches under the full predicate. This is `total`, computed
//!    before any slicing so it does not depend on `offset`.
//! 3. Zero matches: ask the [`Suggester`] and return an empty page.
//! 4. Fetch candidates in order. Field sorts are ordered by the store and
//!    fetched exactly up to `offset + limit`. Relevance takes the store's
//!    top text ranks (at least `max_candidates`, never fewer than
//!    `offset + limit`) and re-ranks them by
//!    `relevance = text_rank × field_boost`.
//! 5. Slice the page and highlight it (text queries only).

use hubsearch_core::{Error, Result};
use log::debug;
use std::sync::Arc;

use crate::config::LexicalConfig;
use crate::highlight::Highlighter;
use crate::query::{SearchFilters, SearchQuery, SortField, SortOrder, recency_then_id};
use crate::sanitize::{query_terms, sanitize_query, tokenize};
use crate::store::{ProjectStore, RecordOrder};
use crate::suggest::{StoreSuggester, Suggester};
use crate::types::{Highlights, ProjectHit, ProjectRecord, ProjectStatus, SearchResults};

/// Boost when the query text appears in the title.
pub const TITLE_BOOST: f32 = 2.0;
/// Boost when the query text appears in the abstract only.
pub const ABSTRACT_BOOST: f32 = 1.5;

/// Filtered full-text search over a [`ProjectStore`].
pub struct LexicalSearchEngine {
    store: Arc<dyn ProjectStore>,
    suggester: Arc<dyn Suggester>,
    config: LexicalConfig,
}

impl LexicalSearchEngine {
    /// Create an engine with the store-probing suggester.
    pub fn new(store: Arc<dyn ProjectStore>, config: LexicalConfig) -> Self {
        let suggester = Arc::new(StoreSuggester::new(
            store.clone(),
            config.related_tag_limit,
            config.max_candidates,
        ));
        Self {
            store,
            suggester,
            config,
        }
    }

    /// Replace the suggestion collaborator.
    pub fn with_suggester(mut self, suggester: Arc<dyn Suggester>) -> Self {
        self.suggester = suggester;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn ProjectStore> {
        &self.store
    }

    /// Engine configuration.
    pub fn config(&self) -> &LexicalConfig {
        &self.config
    }

    /// Public search. Without an explicit status the query is scoped to
    /// the configured default status.
    pub async fn search_projects(&self, query: &SearchQuery) -> Result<SearchResults> {
        let mut filters = query.filters.clone();
        filters.status.get_or_insert(self.config.default_status);
        self.run(query, filters).await
    }

    /// Administrative search scoped to one status and optionally one owner.
    pub async fn search_projects_by_status(
        &self,
        status: ProjectStatus,
        query: &SearchQuery,
        owner_id: Option<&str>,
    ) -> Result<SearchResults> {
        let mut filters = query.filters.clone();
        filters.status = Some(status);
        if let Some(owner) = owner_id {
            filters.owner_ids = vec![owner.to_string()];
        }
        self.run(query, filters).await
    }

    /// Most popular projects (`views + 2 × bookmarks`), newest first on ties.
    pub async fn get_popular_projects(&self, limit: usize) -> Result<Vec<ProjectRecord>> {
        let limit = self.page_limit(Some(limit))?;
        let filters = SearchFilters {
            status: Some(self.config.default_status),
            ..SearchFilters::default()
        };
        let order = RecordOrder::Field(SortField::Popularity, SortOrder::Desc);
        Ok(self
            .store
            .search(None, &filters, order, limit)
            .await?
            .into_iter()
            .map(|hit| hit.record)
            .collect())
    }

    fn page_limit(&self, requested: Option<usize>) -> Result<usize> {
        match requested.unwrap_or(self.config.default_limit) {
            0 => Err(Error::search_parameter("limit must be at least 1")),
            n => Ok(n.min(self.config.max_limit)),
        }
    }

    async fn run(&self, query: &SearchQuery, filters: SearchFilters) -> Result<SearchResults> {
        let limit = self.page_limit(query.limit)?;
        let offset = query.offset;
        let text = query
            .text_query()
            .map(|t| sanitize_query(t, self.config.max_query_chars))
            .transpose()?;
        let text = text.as_deref();

        let total = self.store.count(text, &filters).await?;
        if total == 0 {
            debug!("Lexical search matched nothing; collecting suggestions");
            let suggestions = self.suggester.suggest(text, &filters).await;
            return Ok(SearchResults {
                items: Vec::new(),
                total,
                limit,
                offset,
                suggestions: Some(suggestions),
            });
        }

        let window = offset.saturating_add(limit);
        let (order, window) = match sort_key(query, text.is_some()) {
            SortField::Relevance => (
                RecordOrder::TextRank,
                window.max(self.config.max_candidates),
            ),
            field => (RecordOrder::Field(field, query.sort_order), window),
        };
        let candidates = self.store.search(text, &filters, order, window).await?;
        if order == RecordOrder::TextRank && (candidates.len() as u64) < total {
            debug!(
                "Re-ranking the top {} of {total} text matches",
                candidates.len()
            );
        }

        let mut ranked: Vec<(ProjectRecord, Option<f32>)> = candidates
            .into_iter()
            .map(|c| {
                let relevance = text.map(|t| c.text_rank * field_boost(&c.record, t));
                (c.record, relevance)
            })
            .collect();
        if order == RecordOrder::TextRank {
            sort_by_relevance(&mut ranked);
        }

        let highlighter = text
            .map(|t| {
                Highlighter::new(
                    &query_terms(t),
                    &self.config.highlight_open,
                    &self.config.highlight_close,
                )
            })
            .transpose()?;

        let items = ranked
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(project, relevance)| {
                let highlights = highlighter.as_ref().map(|h| Highlights {
                    title: h.highlight(&project.title),
                    abstract_text: h
                        .highlight(&h.window(&project.abstract_text, self.config.snippet_length)),
                });
                ProjectHit {
                    project,
                    relevance,
                    highlights,
                }
            })
            .collect();

        Ok(SearchResults {
            items,
            total,
            limit,
            offset,
            suggestions: None,
        })
    }
}

impl std::fmt::Debug for LexicalSearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexicalSearchEngine")
            .field("store", &self.store.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Title and abstract are compared in the same normalized form as the
/// sanitized query (lowercase tokens joined by single spaces).
fn field_boost(record: &ProjectRecord, text: &str) -> f32 {
    let normalized = |s: &str| tokenize(s).join(" ");
    if normalized(&record.title).contains(text) {
        TITLE_BOOST
    } else if normalized(&record.abstract_text).contains(text) {
        ABSTRACT_BOOST
    } else {
        1.0
    }
}

fn sort_key(query: &SearchQuery, has_text: bool) -> SortField {
    match query.sort_by {
        None | Some(SortField::Relevance) if has_text => SortField::Relevance,
        None | Some(SortField::Relevance) => SortField::CreatedAt,
        Some(field) => field,
    }
}

/// Relevance is always descending.
fn sort_by_relevance(ranked: &mut [(ProjectRecord, Option<f32>)]) {
    ranked.sort_by(|(a, ra), (b, rb)| {
        let (ra, rb) = (ra.unwrap_or(0.0), rb.unwrap_or(0.0));
        rb.total_cmp(&ra).then_with(|| recency_then_id(a, b))
    });
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::LexicalBackendKind;
    use crate::store::MemoryProjectStore;
    use crate::types::Suggestions;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    fn at(day: i64) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
    }

    fn catalogue() -> Vec<ProjectRecord> {
        vec![
            ProjectRecord::new("title-hit", "Machine Learning Basics")
                .with_abstract("An introduction to supervised models")
                .with_specialization("AI")
                .with_year(2024)
                .with_tags(["ml"])
                .with_owner("u1")
                .with_engagement(10, 0)
                .with_created_at(at(1)),
            ProjectRecord::new("abstract-hit", "Compiler Heuristics")
                .with_abstract("We apply machine learning to register allocation")
                .with_specialization("Systems")
                .with_year(2023)
                .with_tags(["compilers", "ml"])
                .with_owner("u2")
                .with_engagement(2, 1)
                .with_created_at(at(2)),
            ProjectRecord::new("other", "Urban Gardening")
                .with_abstract("Soil sensors for rooftop gardens")
                .with_specialization("IoT")
                .with_year(2024)
                .with_tags(["sensors"])
                .with_owner("u1")
                .with_engagement(10, 0)
                .with_created_at(at(3)),
            ProjectRecord::new("draft", "Machine Learning Draft")
                .with_owner("u1")
                .with_status(ProjectStatus::Draft)
                .with_created_at(at(4)),
        ]
    }

    async fn engine_with(config: LexicalConfig) -> LexicalSearchEngine {
        let store = crate::config::build_store(&config).unwrap();
        for record in catalogue() {
            store.upsert(record).await.unwrap();
        }
        LexicalSearchEngine::new(store, config)
    }

    async fn engine() -> LexicalSearchEngine {
        engine_with(LexicalConfig {
            backend: LexicalBackendKind::Memory,
            ..Default::default()
        })
        .await
    }

    fn ids(results: &SearchResults) -> Vec<&str> {
        results.items.iter().map(|h| h.project.id.as_str()).collect()
    }

    // ------------------------------------------------------------------------
    // Ranking
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_title_match_ranks_above_abstract_match() {
        let results = engine()
            .await
            .search_projects(&SearchQuery::text("machine learning"))
            .await
            .unwrap();
        assert_eq!(ids(&results), vec!["title-hit", "abstract-hit"]);
        assert_eq!(results.total, 2);
        assert!(results.suggestions.is_none());
        assert!(results.items[0].relevance.unwrap() > results.items[1].relevance.unwrap());
    }

    #[cfg(feature = "lexical-tantivy")]
    #[tokio::test]
    async fn test_title_match_ranks_first_on_tantivy() {
        let engine = engine_with(LexicalConfig::default()).await;
        assert_eq!(engine.store().name(), "tantivy");
        let results = engine
            .search_projects(&SearchQuery::text("machine learning"))
            .await
            .unwrap();
        assert_eq!(ids(&results)[0], "title-hit");
        assert_eq!(results.total, 2);
    }

    #[test]
    fn test_field_boost() {
        let record = ProjectRecord::new("p", "Deep  Learning!").with_abstract("graph learning");
        assert_eq!(field_boost(&record, "deep learning"), TITLE_BOOST);
        assert_eq!(field_boost(&record, "graph learning"), ABSTRACT_BOOST);
        assert_eq!(field_boost(&record, "graph deep"), 1.0);
    }

    #[tokio::test]
    async fn test_relevance_ignores_sort_order() {
        let engine = engine().await;
        let asc = SearchQuery::text("machine learning").with_sort(SortField::Relevance, SortOrder::Asc);
        let results = engine.search_projects(&asc).await.unwrap();
        assert_eq!(ids(&results), vec!["title-hit", "abstract-hit"]);
    }

    #[tokio::test]
    async fn test_without_text_sorts_by_field() {
        let engine = engine().await;
        let default = engine.search_projects(&SearchQuery::new()).await.unwrap();
        assert_eq!(ids(&default), vec!["other", "abstract-hit", "title-hit"]);
        assert!(default.items.iter().all(|h| h.relevance.is_none()));

        let by_year = SearchQuery::new().with_sort(SortField::Year, SortOrder::Asc);
        let results = engine.search_projects(&by_year).await.unwrap();
        // year ties break newest first
        assert_eq!(ids(&results), vec!["abstract-hit", "other", "title-hit"]);
    }

    // ------------------------------------------------------------------------
    // Filters and pagination
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_default_status_scope() {
        let engine = engine().await;
        let results = engine
            .search_projects(&SearchQuery::text("draft"))
            .await
            .unwrap();
        assert_eq!(results.total, 0);
    }

    #[tokio::test]
    async fn test_total_is_stable_across_offsets() {
        let engine = engine().await;
        let mut totals = Vec::new();
        let mut seen = Vec::new();
        for offset in 0..4 {
            let page = engine
                .search_projects(&SearchQuery::new().with_page(1, offset))
                .await
                .unwrap();
            totals.push(page.total);
            seen.extend(page.items.into_iter().map(|h| h.project.id));
        }
        assert!(totals.iter().all(|t| *t == 3));
        assert_eq!(seen.len(), 3);
    }

    fn backends() -> Vec<LexicalBackendKind> {
        let mut kinds = vec![LexicalBackendKind::Memory];
        if cfg!(feature = "lexical-tantivy") {
            kinds.push(LexicalBackendKind::Tantivy);
        }
        kinds
    }

    /// Three matches against a candidate window of two; the most viewed
    /// record sorts last by id.
    async fn crowded(backend: LexicalBackendKind) -> LexicalSearchEngine {
        let config = LexicalConfig {
            backend,
            max_candidates: 2,
            ..Default::default()
        };
        let store = crate::config::build_store(&config).unwrap();
        for (id, title, views, bookmarks, day) in [
            ("a", "Widget Alpha", 0, 0, 1),
            ("b", "Widget Beta", 1, 0, 2),
            ("c", "Widget Gamma", 100, 50, 3),
        ] {
            store
                .upsert(
                    ProjectRecord::new(id, title)
                        .with_engagement(views, bookmarks)
                        .with_created_at(at(day)),
                )
                .await
                .unwrap();
        }
        LexicalSearchEngine::new(store, config)
    }

    #[tokio::test]
    async fn test_field_sorts_beyond_candidate_window() {
        for backend in backends() {
            let engine = crowded(backend).await;

            let popular = engine.get_popular_projects(1).await.unwrap();
            assert_eq!(popular[0].id, "c", "backend {backend:?}");

            let by_views = SearchQuery::new().with_sort(SortField::Views, SortOrder::Desc);
            let first = engine
                .search_projects(&by_views.clone().with_page(1, 0))
                .await
                .unwrap();
            assert_eq!(ids(&first), vec!["c"], "backend {backend:?}");
            assert_eq!(first.total, 3);

            let last = engine
                .search_projects(&by_views.with_page(1, 2))
                .await
                .unwrap();
            assert_eq!(ids(&last), vec!["a"], "backend {backend:?}");
            assert_eq!(last.total, 3);
        }
    }

    #[tokio::test]
    async fn test_pages_cover_matches_beyond_candidate_window() {
        for backend in backends() {
            let engine = crowded(backend).await;
            for query in [SearchQuery::new(), SearchQuery::text("widget")] {
                let mut seen = Vec::new();
                for offset in 0..3 {
                    let page = engine
                        .search_projects(&query.clone().with_page(1, offset))
                        .await
                        .unwrap();
                    assert_eq!(page.total, 3, "backend {backend:?}");
                    seen.extend(page.items.into_iter().map(|h| h.project.id));
                }
                seen.sort();
                assert_eq!(seen, vec!["a", "b", "c"], "backend {backend:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_filters_combine() {
        let engine = engine().await;
        let query = SearchQuery::text("machine").with_filters(SearchFilters {
            years: vec![2023],
            tags: vec!["ml".into()],
            ..Default::default()
        });
        let results = engine.search_projects(&query).await.unwrap();
        assert_eq!(ids(&results), vec!["abstract-hit"]);
    }

    #[tokio::test]
    async fn test_limit_is_clamped_and_zero_rejected() {
        let engine = engine().await;
        let results = engine
            .search_projects(&SearchQuery::new().with_page(10_000, 0))
            .await
            .unwrap();
        assert_eq!(results.limit, 100);

        let results = engine.search_projects(&SearchQuery::new()).await.unwrap();
        assert_eq!(results.limit, 20);

        assert!(matches!(
            engine.search_projects(&SearchQuery::new().with_page(0, 0)).await,
            Err(Error::SearchParameter(_))
        ));
    }

    #[tokio::test]
    async fn test_unsearchable_text_is_rejected() {
        let err = engine()
            .await
            .search_projects(&SearchQuery::text("&&!!"))
            .await
            .unwrap_err();
        assert!(err.is_client_error());
    }

    // ------------------------------------------------------------------------
    // Highlighting and suggestions
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_highlights_only_for_text_queries() {
        let engine = engine().await;
        let results = engine
            .search_projects(&SearchQuery::text("machine learning"))
            .await
            .unwrap();
        let h = results.items[0].highlights.as_ref().unwrap();
        assert_eq!(h.title, "<mark>Machine</mark> <mark>Learning</mark> Basics");

        let h = results.items[1].highlights.as_ref().unwrap();
        assert!(h.abstract_text.contains("<mark>machine</mark> <mark>learning</mark>"));

        let plain = engine.search_projects(&SearchQuery::new()).await.unwrap();
        assert!(plain.items.iter().all(|h| h.highlights.is_none()));
    }

    #[tokio::test]
    async fn test_zero_results_carry_suggestions() {
        let query = SearchQuery::new().with_filters(SearchFilters {
            specializations: vec!["AI".into()],
            years: vec![2023],
            ..Default::default()
        });
        let results = engine().await.search_projects(&query).await.unwrap();
        assert_eq!(results.total, 0);
        assert!(results.items.is_empty());
        let suggestions = results.suggestions.unwrap();
        assert!(!suggestions.relaxed_filters.is_empty());
    }

    struct FixedSuggester;

    #[async_trait]
    impl Suggester for FixedSuggester {
        async fn suggest(&self, _text: Option<&str>, _filters: &SearchFilters) -> Suggestions {
            Suggestions {
                message: "fixed".into(),
                ..Default::default()
            }
        }
    }

    #[tokio::test]
    async fn test_custom_suggester() {
        let engine = engine().await.with_suggester(Arc::new(FixedSuggester));
        let results = engine
            .search_projects(&SearchQuery::text("nonexistent"))
            .await
            .unwrap();
        assert_eq!(results.suggestions.unwrap().message, "fixed");
    }

    // ------------------------------------------------------------------------
    // Popular and by-status
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_popular_projects() {
        let popular = engine().await.get_popular_projects(10).await.unwrap();
        let ids: Vec<&str> = popular.iter().map(|p| p.id.as_str()).collect();
        // 10 views ties between "other" and "title-hit"; newer first
        assert_eq!(ids, vec!["other", "title-hit", "abstract-hit"]);
    }

    #[tokio::test]
    async fn test_search_by_status_and_owner() {
        let engine = engine().await;
        let drafts = engine
            .search_projects_by_status(ProjectStatus::Draft, &SearchQuery::text("machine"), Some("u1"))
            .await
            .unwrap();
        assert_eq!(ids(&drafts), vec!["draft"]);

        let none = engine
            .search_projects_by_status(ProjectStatus::Draft, &SearchQuery::new(), Some("u2"))
            .await
            .unwrap();
        assert_eq!(none.total, 0);

        let approved_u1 = engine
            .search_projects_by_status(ProjectStatus::Approved, &SearchQuery::new(), Some("u1"))
            .await
            .unwrap();
        assert_eq!(approved_u1.total, 2);
    }

    #[tokio::test]
    async fn test_empty_store_search() {
        let engine = LexicalSearchEngine::new(
            Arc::new(MemoryProjectStore::new()),
            LexicalConfig::default(),
        );
        let results = engine.search_projects(&SearchQuery::new()).await.unwrap();
        assert_eq!(results.total, 0);
        assert!(results.suggestions.is_some());
    }
}
