//! Search queries and structured filters.
//!
//! Queries are plain values. Clearing filters returns a new query and
//! never touches pagination or sort (`limit`, `offset`, `sortBy`,
//! `sortOrder`).

use hubsearch_core::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::types::{ProjectRecord, ProjectStatus};

/// Field a result page is ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    /// Text relevance (text queries only; always descending).
    #[default]
    Relevance,
    /// Creation time.
    CreatedAt,
    /// Title, case-insensitive.
    Title,
    /// Academic year.
    Year,
    /// View count.
    Views,
    /// `views + 2 × bookmarks`.
    Popularity,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    Asc,
    /// Largest first.
    #[default]
    Desc,
}

impl SortField {
    /// Compare two records by this field in `order`, then newest first,
    /// then id ascending.
    ///
    /// Records carry no relevance of their own, so `Relevance` compares
    /// like `CreatedAt` here.
    pub fn compare(self, a: &ProjectRecord, b: &ProjectRecord, order: SortOrder) -> Ordering {
        let primary = match self {
            Self::Relevance | Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::Title => fold_case(&a.title).cmp(&fold_case(&b.title)),
            Self::Year => a.year.cmp(&b.year),
            Self::Views => a.views.cmp(&b.views),
            Self::Popularity => a.popularity().cmp(&b.popularity()),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| recency_then_id(a, b))
    }
}

/// Newest first, then id ascending.
pub fn recency_then_id(a: &ProjectRecord, b: &ProjectRecord) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Case folding applied to filter values and filterable record fields by
/// every store.
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Structured constraints, combined as a conjunction.
///
/// Empty sets and `None` mean "unconstrained". Set-valued record fields
/// (tags, technologies) match when they share any value with the set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    /// Accepted specializations.
    pub specializations: Vec<String>,
    /// Accepted difficulties.
    pub difficulties: Vec<String>,
    /// Accepted years.
    pub years: Vec<i32>,
    /// Required tag overlap.
    pub tags: Vec<String>,
    /// Required technology overlap.
    pub technologies: Vec<String>,
    /// Accepted owners.
    pub owner_ids: Vec<String>,
    /// Group flag.
    pub is_group_project: Option<bool>,
    /// Lifecycle status.
    pub status: Option<ProjectStatus>,
}

impl SearchFilters {
    /// Whether `record` satisfies every constraint.
    pub fn matches(&self, record: &ProjectRecord) -> bool {
        in_set(&self.specializations, &record.specialization)
            && in_set(&self.difficulties, &record.difficulty)
            && (self.years.is_empty() || self.years.contains(&record.year))
            && overlaps(&self.tags, &record.tags)
            && overlaps(&self.technologies, &record.technology_stack)
            && in_set(&self.owner_ids, &record.owner_id)
            && self
                .is_group_project
                .is_none_or(|g| g == record.is_group_project)
            && self.status.is_none_or(|s| s == record.status)
    }

    /// Keys with an active constraint, in declaration order.
    pub fn active_keys(&self) -> Vec<FilterKey> {
        FilterKey::FILTERS
            .into_iter()
            .filter(|key| self.is_active(*key))
            .collect()
    }

    /// Whether `key` constrains anything.
    pub fn is_active(&self, key: FilterKey) -> bool {
        match key {
            FilterKey::Text => false,
            FilterKey::Specialization => !self.specializations.is_empty(),
            FilterKey::Difficulty => !self.difficulties.is_empty(),
            FilterKey::Year => !self.years.is_empty(),
            FilterKey::Tags => !self.tags.is_empty(),
            FilterKey::Technologies => !self.technologies.is_empty(),
            FilterKey::OwnerId => !self.owner_ids.is_empty(),
            FilterKey::GroupProject => self.is_group_project.is_some(),
            FilterKey::Status => self.status.is_some(),
        }
    }

    /// Drop the constraint on `key`.
    pub fn clear(&mut self, key: FilterKey) {
        match key {
            FilterKey::Text => {}
            FilterKey::Specialization => self.specializations.clear(),
            FilterKey::Difficulty => self.difficulties.clear(),
            FilterKey::Year => self.years.clear(),
            FilterKey::Tags => self.tags.clear(),
            FilterKey::Technologies => self.technologies.clear(),
            FilterKey::OwnerId => self.owner_ids.clear(),
            FilterKey::GroupProject => self.is_group_project = None,
            FilterKey::Status => self.status = None,
        }
    }
}

fn in_set(set: &[String], value: &str) -> bool {
    if set.is_empty() {
        return true;
    }
    let value = fold_case(value);
    set.iter().any(|s| fold_case(s) == value)
}

fn overlaps(set: &[String], values: &[String]) -> bool {
    set.is_empty() || values.iter().any(|v| in_set(set, v))
}

/// A clearable part of a [`SearchQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKey {
    /// The free-text query.
    Text,
    /// `filters.specializations`
    Specialization,
    /// `filters.difficulties`
    Difficulty,
    /// `filters.years`
    Year,
    /// `filters.tags`
    Tags,
    /// `filters.technologies`
    Technologies,
    /// `filters.ownerIds`
    OwnerId,
    /// `filters.isGroupProject`
    GroupProject,
    /// `filters.status`
    Status,
}

impl FilterKey {
    /// Every structured filter key.
    pub const FILTERS: [FilterKey; 8] = [
        Self::Specialization,
        Self::Difficulty,
        Self::Year,
        Self::Tags,
        Self::Technologies,
        Self::OwnerId,
        Self::GroupProject,
        Self::Status,
    ];

    /// Keys that can never be cleared.
    pub const PROTECTED: [&'static str; 4] = ["limit", "offset", "sortBy", "sortOrder"];

    /// Whether `key` names a pagination or sort field.
    pub fn is_protected(key: &str) -> bool {
        Self::PROTECTED.iter().any(|p| *p == key)
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Specialization => "specialization",
            Self::Difficulty => "difficulty",
            Self::Year => "year",
            Self::Tags => "tags",
            Self::Technologies => "technologies",
            Self::OwnerId => "ownerId",
            Self::GroupProject => "groupProject",
            Self::Status => "status",
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s {
            "text" | "q" => Self::Text,
            "specialization" | "specializations" => Self::Specialization,
            "difficulty" | "difficulties" => Self::Difficulty,
            "year" | "years" => Self::Year,
            "tags" | "tag" => Self::Tags,
            "technologies" | "technology" | "technologyStack" => Self::Technologies,
            "ownerId" | "ownerIds" => Self::OwnerId,
            "groupProject" | "isGroupProject" => Self::GroupProject,
            "status" => Self::Status,
            other if FilterKey::is_protected(other) => {
                return Err(Error::search_parameter(format!(
                    "'{other}' is a pagination or sort key and cannot be cleared"
                )));
            }
            other => {
                return Err(Error::search_parameter(format!("unknown filter key '{other}'")));
            }
        };
        Ok(key)
    }
}

/// A lexical search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    /// Free text; blank counts as absent.
    pub text: Option<String>,
    /// Structured constraints.
    pub filters: SearchFilters,
    /// Sort field; relevance when unset and text is present, else creation time.
    pub sort_by: Option<SortField>,
    /// Sort direction for explicit field sorts.
    pub sort_order: SortOrder,
    /// Page size; the engine's default when unset.
    pub limit: Option<usize>,
    /// Results to skip.
    pub offset: usize,
}

impl SearchQuery {
    /// An unconstrained query.
    pub fn new() -> Self {
        Self::default()
    }

    /// A free-text query.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Sets the structured filters.
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Sets the sort.
    pub fn with_sort(mut self, field: SortField, order: SortOrder) -> Self {
        self.sort_by = Some(field);
        self.sort_order = order;
        self
    }

    /// Sets the page.
    pub fn with_page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Non-blank text, if any.
    pub fn text_query(&self) -> Option<&str> {
        self.text.as_deref().filter(|t| !t.trim().is_empty())
    }

    /// A copy with the text and every filter removed; pagination and sort
    /// are kept.
    pub fn clear_all_filters(&self) -> Self {
        Self {
            text: None,
            filters: SearchFilters::default(),
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// A copy with the named keys removed.
    ///
    /// Protected keys are ignored; unknown keys are a
    /// [`SearchParameter`](Error::SearchParameter) error.
    pub fn clear_specific_filters<'k>(
        &self,
        keys: impl IntoIterator<Item = &'k str>,
    ) -> Result<Self> {
        let mut next = self.clone();
        for raw in keys {
            if FilterKey::is_protected(raw) {
                debug!("Ignoring protected key '{raw}'");
                continue;
            }
            match raw.parse::<FilterKey>()? {
                FilterKey::Text => next.text = None,
                key => next.filters.clear(key),
            }
        }
        Ok(next)
    }
}

// ============================================================================
// Tests
// ============================================================================
