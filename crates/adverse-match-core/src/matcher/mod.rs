//! Medicine matcher: resolves free-text names to ranked catalog candidates.
//!
//! Pipeline: Normalize → Exact short-circuit → Coarse retrieval → Classify → Rank

mod classify;

pub use classify::*;

use std::sync::Arc;

use tracing::debug;

use crate::config::MatchOptions;
use crate::error::EngineResult;
use crate::index::SearchIndex;
use crate::models::{SimilarityScore, Suggestion};

/// Resolves medicine names against the search index.
pub struct MedicineMatcher {
    index: Arc<SearchIndex>,
}

impl MedicineMatcher {
    pub fn new(index: Arc<SearchIndex>) -> Self {
        Self { index }
    }

    /// Ranked candidates for a free-text medicine name.
    ///
    /// Blank queries return an empty list. Record store failures while
    /// building the index are returned as errors.
    pub fn match_medicines(&self, query: &str, options: &MatchOptions) -> EngineResult<Vec<SimilarityScore>> {
        let prepared = PreparedQuery::new(query);
        if prepared.is_empty() || options.max_results == 0 {
            return Ok(Vec::new());
        }

        // One snapshot for the whole query, even if a refresh lands midway
        let snapshot = self.index.snapshot()?;

        if options.include_exact {
            if let Some((medicine, kind)) = snapshot.exact_match(query) {
                debug!(query = %prepared.normalized, medicine_id = %medicine.record.id, "exact match short-circuit");
                return Ok(vec![exact_hit(medicine, kind)]);
            }
        }

        let candidates = snapshot.candidates(&prepared.normalized, self.index.candidate_limit());
        let candidate_count = candidates.len();

        let mut scored: Vec<SimilarityScore> = candidates
            .iter()
            .filter_map(|c| {
                let medicine = snapshot.medicine(c.index)?;
                let score = classify(&prepared, medicine, c.coarse_score);
                if score.is_none() {
                    debug!(medicine_id = %medicine.record.id, "skipping unscorable candidate");
                }
                score
            })
            .filter(|s| s.combined_score >= options.min_score)
            .collect();

        scored.sort_by(|a, b| a.rank_cmp(b));
        scored.truncate(options.max_results);

        debug!(
            query = %prepared.normalized,
            candidates = candidate_count,
            results = scored.len(),
            generation = snapshot.generation(),
            "medicine match"
        );
        Ok(scored)
    }

    /// Typeahead suggestions for a partially typed name.
    ///
    /// Exact hits still rank first, but sibling products stay visible.
    /// Everything except the result count and the exact short-circuit comes
    /// from `base`.
    pub fn suggestions(&self, partial_name: &str, limit: usize, base: &MatchOptions) -> EngineResult<Vec<Suggestion>> {
        let options = MatchOptions {
            max_results: limit,
            include_exact: false,
            ..base.clone()
        };
        Ok(self
            .match_medicines(partial_name, &options)?
            .into_iter()
            .map(Suggestion::from)
            .collect())
    }

    pub fn index(&self) -> &Arc<SearchIndex> {
        &self.index
    }
}
