//! Zero-result suggestions.

use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::Arc;

use crate::query::{FilterKey, SearchFilters, fold_case};
use crate::store::{ProjectStore, RecordOrder};
use crate::types::{RelaxedFilter, Suggestions};

/// Produces alternative search options for a query that found nothing.
///
/// Infallible by contract: implementations degrade to fewer suggestions
/// instead of failing the search.
#[async_trait]
pub trait Suggester: Send + Sync {
    /// Suggestions for sanitized `text` under `filters`.
    async fn suggest(&self, text: Option<&str>, filters: &SearchFilters) -> Suggestions;
}

/// Suggests single-filter relaxations and related tags by probing the
/// store.
///
/// The status constraint scopes visibility and is never offered for
/// relaxation.
pub struct StoreSuggester {
    store: Arc<dyn ProjectStore>,
    related_tag_limit: usize,
    max_candidates: usize,
}

impl StoreSuggester {
    /// Create a suggester over `store`.
    pub fn new(store: Arc<dyn ProjectStore>, related_tag_limit: usize, max_candidates: usize) -> Self {
        Self {
            store,
            related_tag_limit,
            max_candidates,
        }
    }

    async fn relaxations(&self, text: Option<&str>, filters: &SearchFilters) -> Vec<RelaxedFilter> {
        let mut out = Vec::new();
        for key in filters.active_keys() {
            if key == FilterKey::Status {
                continue;
            }
            let mut relaxed = filters.clone();
            relaxed.clear(key);
            match self.store.count(text, &relaxed).await {
                Ok(total) if total > 0 => out.push(RelaxedFilter { key, total }),
                Ok(_) => {}
                Err(e) => warn!("Suggestion probe for '{key}' failed: {e}"),
            }
        }
        if text.is_some() {
            match self.store.count(None, filters).await {
                Ok(total) if total > 0 => out.push(RelaxedFilter {
                    key: FilterKey::Text,
                    total,
                }),
                Ok(_) => {}
                Err(e) => warn!("Suggestion probe for text failed: {e}"),
            }
        }
        out.sort_by(|a, b| b.total.cmp(&a.total));
        out
    }

    async fn related_tags(&self, text: Option<&str>, filters: &SearchFilters) -> Vec<String> {
        if self.related_tag_limit == 0 {
            return Vec::new();
        }
        let scope = SearchFilters {
            status: filters.status,
            ..SearchFilters::default()
        };

        let mut candidates = match self
            .store
            .search(text, &scope, RecordOrder::TextRank, self.max_candidates)
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Related-tag lookup failed: {e}");
                return Vec::new();
            }
        };
        if candidates.is_empty() && text.is_some() {
            candidates = self
                .store
                .search(None, &scope, RecordOrder::TextRank, self.max_candidates)
                .await
                .unwrap_or_default();
        }

        let mut counts: HashMap<String, (usize, String)> = HashMap::new();
        for hit in &candidates {
            for tag in &hit.record.tags {
                let key = fold_case(tag);
                if filters.tags.iter().any(|t| fold_case(t) == key) {
                    continue;
                }
                counts.entry(key).or_insert_with(|| (0, tag.clone())).0 += 1;
            }
        }

        let mut ranked: Vec<(usize, String)> = counts.into_values().collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        ranked
            .into_iter()
            .take(self.related_tag_limit)
            .map(|(_, tag)| tag)
            .collect()
    }
}

#[async_trait]
impl Suggester for StoreSuggester {
    async fn suggest(&self, text: Option<&str>, filters: &SearchFilters) -> Suggestions {
        let relaxed_filters = self.relaxations(text, filters).await;
        let related_tags = self.related_tags(text, filters).await;

        let message = if !relaxed_filters.is_empty() {
            "No projects matched. Removing one of the listed filters would return results."
        } else if !related_tags.is_empty() {
            "No projects matched. Try searching one of the related tags."
        } else {
            "No projects matched. Try a broader search."
        };

        Suggestions {
            message: message.to_string(),
            relaxed_filters,
            related_tags,
        }
    }
}

impl std::fmt::Debug for StoreSuggester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSuggester")
            .field("store", &self.store.name())
            .field("related_tag_limit", &self.related_tag_limit)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryProjectStore;
    use crate::types::{ProjectRecord, ProjectStatus};

    async fn suggester() -> StoreSuggester {
        let store = Arc::new(MemoryProjectStore::new());
        for record in [
            ProjectRecord::new("p1", "Vision Transformers")
                .with_year(2024)
                .with_tags(["ml", "vision"]),
            ProjectRecord::new("p2", "Speech Models")
                .with_year(2023)
                .with_tags(["ml", "audio"]),
            ProjectRecord::new("p3", "Secret Draft")
                .with_tags(["hidden"])
                .with_status(ProjectStatus::Draft),
        ] {
            store.upsert(record).await.unwrap();
        }
        StoreSuggester::new(store, 5, 1000)
    }

    #[tokio::test]
    async fn test_offers_relaxations_that_help() {
        let s = suggester().await;
        let filters = SearchFilters {
            years: vec![2022],
            tags: vec!["vision".into()],
            status: Some(ProjectStatus::Approved),
            ..Default::default()
        };
        let out = s.suggest(None, &filters).await;

        let keys: Vec<FilterKey> = out.relaxed_filters.iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![FilterKey::Year]);
        assert_eq!(out.relaxed_filters[0].total, 1);
        assert!(!out.message.is_empty());
    }

    #[tokio::test]
    async fn test_related_tags_respect_status_and_skip_requested() {
        let s = suggester().await;
        let filters = SearchFilters {
            tags: vec!["vision".into()],
            years: vec![1999],
            status: Some(ProjectStatus::Approved),
            ..Default::default()
        };
        let out = s.suggest(None, &filters).await;
        assert_eq!(out.related_tags, vec!["ml", "audio"]);
        assert!(!out.related_tags.contains(&"hidden".to_string()));
    }

    #[tokio::test]
    async fn test_text_relaxation() {
        let s = suggester().await;
        let filters = SearchFilters {
            status: Some(ProjectStatus::Approved),
            ..Default::default()
        };
        let out = s.suggest(Some("quantum"), &filters).await;
        assert!(out.relaxed_filters.iter().any(|r| r.key == FilterKey::Text && r.total == 2));
        // no text hits, so related tags come from the whole approved set
        assert_eq!(out.related_tags[0], "ml");
    }
}
