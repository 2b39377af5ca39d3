//! Entity resolver
//!
//! Disambiguates one keyword to at most one Wikidata item. Candidates from
//! the search service are ranked by a weighted mix of the service's own
//! ranking and the extractor's confidence in the keyword.
//!
//! Author: hephaex@gmail.com

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::instrument;
use wdlink_core::{
    normalize_keyword, Candidate, EntitySearch, Keyword, Resolution, ResolverConfig, Result,
    WdlinkError,
};

use crate::cache::ResolutionCache;

// ============================================================================
// Scoring
// ============================================================================

/// Weighted combination of search relevance and extractor confidence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub rank_weight: f32,
    pub extractor_weight: f32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            rank_weight: 1.0,
            extractor_weight: 1.0,
        }
    }
}

impl ScoringPolicy {
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self {
            rank_weight: config.rank_weight,
            extractor_weight: config.extractor_weight,
        }
    }

    /// Combined score, normalized by the weight sum so it stays in [0, 1]
    pub fn combined(&self, match_score: f32, extractor_score: f32) -> f32 {
        let total = self.rank_weight + self.extractor_weight;
        if total <= 0.0 {
            return 0.0;
        }
        (match_score * self.rank_weight + extractor_score * self.extractor_weight) / total
    }

    /// Pick the best candidate and its combined score.
    ///
    /// Order: higher combined score, then a non-empty description, then the
    /// lexicographically smallest QID. The order is total, so the choice does
    /// not depend on the order of `candidates`.
    pub fn select<'a>(
        &self,
        candidates: &'a [Candidate],
        extractor_score: f32,
    ) -> Option<(&'a Candidate, f32)> {
        candidates
            .iter()
            .map(|c| (c, self.combined(c.match_score, extractor_score)))
            .max_by(|(a, score_a), (b, score_b)| compare(a, *score_a, b, *score_b))
    }
}

fn compare(a: &Candidate, score_a: f32, b: &Candidate, score_b: f32) -> Ordering {
    score_a
        .total_cmp(&score_b)
        .then_with(|| a.has_description().cmp(&b.has_description()))
        // smaller QID ranks higher
        .then_with(|| b.qid.as_str().cmp(a.qid.as_str()))
}

// ============================================================================
// Entity Resolver
// ============================================================================

/// Keyword -> entity resolver backed by a search service and a shared cache
pub struct EntityResolver {
    search: Arc<dyn EntitySearch>,
    cache: ResolutionCache,
    policy: ScoringPolicy,
    search_limit: usize,
    min_combined_score: f32,
}

impl EntityResolver {
    pub fn new(
        search: Arc<dyn EntitySearch>,
        cache: ResolutionCache,
        config: &ResolverConfig,
        search_limit: usize,
    ) -> Self {
        Self {
            search,
            cache,
            policy: ScoringPolicy::from_config(config),
            search_limit,
            min_combined_score: config.min_combined_score,
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    /// Resolve a keyword, consulting the cache first.
    ///
    /// An empty search result resolves to the unresolved marker and is
    /// cached like any other outcome. Search failures are wrapped in
    /// `ResolutionFailed` and are not cached.
    #[instrument(skip(self, keyword), fields(keyword = %keyword.normalized, search = self.search.name()))]
    pub async fn resolve(&self, keyword: &Keyword) -> Result<Resolution> {
        let normalized = normalize_keyword(&keyword.text);
        if normalized.is_empty() {
            return Err(WdlinkError::InvalidKeyword(keyword.text.clone()));
        }

        if let Some(cached) = self.cache.get(&normalized).await {
            tracing::debug!("resolution cache hit");
            return Ok(cached);
        }

        let candidates = self
            .search
            .search(&normalized, self.search_limit)
            .await
            .map_err(|e| WdlinkError::ResolutionFailed {
                keyword: normalized.clone(),
                source: Box::new(e),
            })?;

        let resolution = match self.policy.select(&candidates, keyword.score) {
            Some((best, score)) if score >= self.min_combined_score => {
                tracing::debug!(qid = %best.qid, score, candidates = candidates.len(), "keyword resolved");
                Resolution::resolved(normalized.clone(), best, score)
            }
            Some((best, score)) => {
                tracing::debug!(qid = %best.qid, score, "best candidate below threshold");
                Resolution::unresolved(normalized.clone())
            }
            None => {
                tracing::debug!("no candidates");
                Resolution::unresolved(normalized.clone())
            }
        };

        Ok(self.cache.put(&normalized, resolution).await)
    }
}
