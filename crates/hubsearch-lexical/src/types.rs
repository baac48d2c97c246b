//! Lexical records and the search result envelope.

use chrono::{DateTime, Utc};
use hubsearch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    /// Being written by its owner.
    Draft,
    /// Submitted, awaiting review.
    Pending,
    /// Visible in public search.
    #[default]
    Approved,
    /// Declined by a reviewer.
    Rejected,
    /// Finished.
    Completed,
    /// Hidden from listings.
    Archived,
}

impl ProjectStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            "archived" => Ok(Self::Archived),
            other => Err(Error::search_parameter(format!("unknown project status '{other}'"))),
        }
    }
}

/// A searchable project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    /// Unique id.
    pub id: String,
    /// Title (full-text searched).
    pub title: String,
    /// Abstract (full-text searched).
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Academic specialization.
    pub specialization: String,
    /// Difficulty level.
    pub difficulty: String,
    /// Academic year.
    pub year: i32,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Technologies used.
    #[serde(default)]
    pub technology_stack: Vec<String>,
    /// Owning user.
    pub owner_id: String,
    /// Whether the project is done by a group.
    #[serde(default)]
    pub is_group_project: bool,
    /// Lifecycle status.
    #[serde(default)]
    pub status: ProjectStatus,
    /// View count.
    #[serde(default)]
    pub views: u64,
    /// Bookmark count.
    #[serde(default)]
    pub bookmarks: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// A record with the given id and title; every other field is empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            abstract_text: String::new(),
            specialization: String::new(),
            difficulty: String::new(),
            year: 0,
            tags: Vec::new(),
            technology_stack: Vec::new(),
            owner_id: String::new(),
            is_group_project: false,
            status: ProjectStatus::default(),
            views: 0,
            bookmarks: 0,
            created_at: Utc::now(),
        }
    }

    /// Sets the abstract.
    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = text.into();
        self
    }

    /// Sets the specialization.
    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = specialization.into();
        self
    }

    /// Sets the difficulty.
    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = difficulty.into();
        self
    }

    /// Sets the year.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = year;
        self
    }

    /// Sets the tags.
    pub fn with_tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the technology stack.
    pub fn with_technologies<S: Into<String>>(mut self, tech: impl IntoIterator<Item = S>) -> Self {
        self.technology_stack = tech.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the owner.
    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    /// Marks the project as a group project.
    pub fn with_group(mut self, is_group: bool) -> Self {
        self.is_group_project = is_group;
        self
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ProjectStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the engagement counters.
    pub fn with_engagement(mut self, views: u64, bookmarks: u64) -> Self {
        self.views = views;
        self.bookmarks = bookmarks;
        self
    }

    /// Sets the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// `views + 2 × bookmarks`.
    pub fn popularity(&self) -> u64 {
        self.views.saturating_add(self.bookmarks.saturating_mul(2))
    }
}

/// A record as returned by a [`ProjectStore`](crate::ProjectStore)
/// together with its raw text rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedRecord {
    /// The entity.
    pub record: ProjectRecord,
    /// Token-frequency rank; `0.0` when no text predicate was applied.
    pub text_rank: f32,
}

/// Highlighted fragments of a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    /// Title with matched terms wrapped in markers.
    pub title: String,
    /// Abstract window with matched terms wrapped in markers.
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// One item of a search result page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHit {
    /// The project.
    #[serde(flatten)]
    pub project: ProjectRecord,
    /// `text_rank × field_boost`, present for text queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
    /// Present for text queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Highlights>,
}

/// A relaxation that would produce results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxedFilter {
    /// The constraint to drop.
    pub key: crate::query::FilterKey,
    /// Results the query would have without it.
    pub total: u64,
}

/// Alternative search options offered when a search finds nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestions {
    /// Human-readable hint.
    pub message: String,
    /// Single-constraint relaxations that would produce results.
    pub relaxed_filters: Vec<RelaxedFilter>,
    /// Tags common among related projects.
    pub related_tags: Vec<String>,
}

/// One page of lexical search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    /// Hits on this page.
    pub items: Vec<ProjectHit>,
    /// Matches across all pages.
    pub total: u64,
    /// Effective page size.
    pub limit: usize,
    /// Effective offset.
    pub offset: usize,
    /// Present only when `total == 0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Suggestions>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_parse() {
        assert_eq!("Approved".parse::<ProjectStatus>().unwrap(), ProjectStatus::Approved);
        assert!(matches!(
            "bogus".parse::<ProjectStatus>(),
            Err(Error::SearchParameter(_))
        ));
    }

    #[test]
    fn test_popularity() {
        let p = ProjectRecord::new("p", "t").with_engagement(10, 3);
        assert_eq!(p.popularity(), 16);
    }

    #[test]
    fn test_record_wire_shape() {
        let p = ProjectRecord::new("p1", "Title").with_abstract("Body");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["abstract"], "Body");
        assert_eq!(v["ownerId"], "");
        assert_eq!(v["status"], "approved");
        assert_eq!(v["technologyStack"], json!([]));
    }

    #[test]
    fn test_hit_flattens_project() {
        let hit = ProjectHit {
            project: ProjectRecord::new("p1", "Title"),
            relevance: Some(1.5),
            highlights: None,
        };
        let v = serde_json::to_value(&hit).unwrap();
        assert_eq!(v["id"], "p1");
        assert_eq!(v["relevance"], 1.5);
        assert!(v.get("highlights").is_none());
    }
}
