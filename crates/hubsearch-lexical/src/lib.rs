//! Lexical project search for Hubsearch.
//!
//! Filtered full-text search over project records with field-weighted
//! ranking, highlighting, stable totals and zero-result suggestions.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     hubsearch-lexical                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LexicalSearchEngine (sanitize, count, rank, page, mark)    │
//! │  ├── Highlighter (regex, HTML-escaped, abstract window)     │
//! │  └── Suggester trait ── StoreSuggester                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ProjectStore trait                                         │
//! │  ├── MemoryProjectStore (always available)                  │
//! │  └── TantivyProjectStore (feature: lexical-tantivy)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hubsearch_lexical::{LexicalConfig, LexicalSearchEngine, ProjectRecord, SearchQuery, build_store};
//!
//! let config = LexicalConfig::default();
//! let store = build_store(&config)?;
//! store.upsert(ProjectRecord::new("p1", "Machine Learning Basics")).await?;
//!
//! let engine = LexicalSearchEngine::new(store, config);
//! let results = engine.search_projects(&SearchQuery::text("machine learning")).await?;
//! assert_eq!(results.total, 1);
//! ```

pub mod config;
pub mod engine;
pub mod highlight;
pub mod query;
pub mod sanitize;
pub mod store;
pub mod suggest;
pub mod types;

#[cfg(feature = "lexical-tantivy")]
pub mod tantivy_store;

// Re-exports
pub use config::{LexicalBackendKind, LexicalConfig, build_store};
pub use engine::{ABSTRACT_BOOST, LexicalSearchEngine, TITLE_BOOST};
pub use highlight::{Highlighter, escape_html};
pub use query::{FilterKey, SearchFilters, SearchQuery, SortField, SortOrder, fold_case, recency_then_id};
pub use sanitize::{query_terms, sanitize_query, tokenize};
pub use store::{MemoryProjectStore, ProjectStore, RecordOrder};
pub use suggest::{StoreSuggester, Suggester};
pub use types::{
    Highlights, ProjectHit, ProjectRecord, ProjectStatus, RankedRecord, RelaxedFilter,
    SearchResults, Suggestions,
};

#[cfg(feature = "lexical-tantivy")]
pub use tantivy_store::TantivyProjectStore;
