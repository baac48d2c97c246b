//! Hybrid rank fusion.
//!
//! Reciprocal Rank Fusion merges a semantic list and a lexical list by
//! rank alone, so the two score scales never need calibrating against each
//! other: `score(d) = Σ 1 / (k + rank(d))` over the lists containing `d`,
//! with 1-based ranks.

use hubsearch_core::Result;
use hubsearch_lexical::{LexicalSearchEngine, ProjectHit, SearchQuery};
use hubsearch_vector::{Filter, PayloadKind, SearchOptions, VectorSearchResult};
use log::warn;
use serde::Serialize;
use std::collections::HashMap;

use crate::semantic::{PROJECTS, SemanticIndex};

/// Conventional RRF damping constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Which list(s) a fused hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    /// Semantic list only.
    Semantic,
    /// Lexical list only.
    Lexical,
    /// Both lists.
    Both,
}

/// One fused result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FusedHit {
    /// Project id (or point id for non-project semantic hits).
    pub key: String,
    /// Fused score.
    pub score: f32,
    /// Contributing lists.
    pub source: HitSource,
    /// 1-based rank in the semantic list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_rank: Option<usize>,
    /// 1-based rank in the lexical list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical_rank: Option<usize>,
    /// The semantic result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic: Option<VectorSearchResult>,
    /// The lexical result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexical: Option<ProjectHit>,
}

impl FusedHit {
    fn best_rank(&self) -> usize {
        self.semantic_rank
            .into_iter()
            .chain(self.lexical_rank)
            .min()
            .unwrap_or(usize::MAX)
    }
}

/// Fusion key of a semantic hit: its project id for project payloads,
/// otherwise the point id.
pub fn semantic_key(result: &VectorSearchResult) -> &str {
    match &result.payload.kind {
        PayloadKind::Project { project_id, .. } => project_id,
        _ => &result.id,
    }
}

/// Merge `semantic` and `lexical` rankings by Reciprocal Rank Fusion.
///
/// Inputs must be in rank order. A key repeated within one list counts
/// only at its first position. Ties break by best single-list rank, then
/// key. A non-positive or non-finite `k` falls back to [`DEFAULT_RRF_K`].
pub fn fuse_rankings(
    semantic: Vec<VectorSearchResult>,
    lexical: Vec<ProjectHit>,
    limit: usize,
    k: f32,
) -> Vec<FusedHit> {
    let k = if k.is_finite() && k > 0.0 {
        k
    } else {
        warn!("Invalid RRF k {k}; using {DEFAULT_RRF_K}");
        DEFAULT_RRF_K
    };
    let contribution = |rank: usize| 1.0 / (k + rank as f32);

    let mut fused: HashMap<String, FusedHit> = HashMap::new();

    for (i, result) in semantic.into_iter().enumerate() {
        let rank = i + 1;
        let key = semantic_key(&result).to_string();
        if fused.contains_key(&key) {
            continue;
        }
        fused.insert(
            key.clone(),
            FusedHit {
                key,
                score: contribution(rank),
                source: HitSource::Semantic,
                semantic_rank: Some(rank),
                lexical_rank: None,
                semantic: Some(result),
                lexical: None,
            },
        );
    }

    for (i, hit) in lexical.into_iter().enumerate() {
        let rank = i + 1;
        let key = hit.project.id.clone();
        match fused.get_mut(&key) {
            Some(existing) if existing.lexical_rank.is_some() => {}
            Some(existing) => {
                existing.score += contribution(rank);
                existing.source = HitSource::Both;
                existing.lexical_rank = Some(rank);
                existing.lexical = Some(hit);
            }
            None => {
                fused.insert(
                    key.clone(),
                    FusedHit {
                        key,
                        score: contribution(rank),
                        source: HitSource::Lexical,
                        semantic_rank: None,
                        lexical_rank: Some(rank),
                        semantic: None,
                        lexical: Some(hit),
                    },
                );
            }
        }
    }

    let mut out: Vec<FusedHit> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.best_rank().cmp(&b.best_rank()))
            .then_with(|| a.key.cmp(&b.key))
    });
    out.truncate(limit);
    out
}

/// Run `text` through both engines over projects and fuse the results.
///
/// The semantic side is restricted to the lexical engine's default status
/// so both lists see the same visibility scope.
pub async fn search_projects_hybrid(
    semantic: &SemanticIndex,
    lexical: &LexicalSearchEngine,
    text: &str,
    limit: usize,
) -> Result<Vec<FusedHit>> {
    let depth = limit.max(1).saturating_mul(2).min(lexical.config().max_limit);
    let status = lexical.config().default_status.as_str();

    let lexical_hits = lexical
        .search_projects(&SearchQuery::text(text).with_page(depth, 0))
        .await?
        .items;
    let semantic_hits = semantic
        .search_text(
            PROJECTS,
            text,
            SearchOptions::new()
                .with_limit(depth)
                .with_filter(Filter::eq("status", status)),
        )
        .await?;

    Ok(fuse_rankings(semantic_hits, lexical_hits, limit, DEFAULT_RRF_K))
}

// ============================================================================
// Tests
// ============================================================================
