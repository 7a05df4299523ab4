//! Caller-facing facade over the matcher and the duplicate detector.

use std::sync::Arc;

use tracing::info;

use crate::config::{EngineConfig, MatchOptions};
use crate::duplicates::{BatchAnalysis, DuplicateDetector, FetchControl};
use crate::error::EngineResult;
use crate::index::{IndexStats, SearchIndex};
use crate::matcher::MedicineMatcher;
use crate::models::{DuplicateAssessment, DuplicateCheck, ReportSummary, SimilarityScore, Suggestion};
use crate::store::RecordStore;

/// Matching and duplicate detection over one record store.
///
/// Construct once and share; every method takes `&self` and is safe to call
/// from many threads.
pub struct MatchEngine {
    config: EngineConfig,
    index: Arc<SearchIndex>,
    matcher: MedicineMatcher,
    detector: DuplicateDetector,
}

impl MatchEngine {
    /// Validate the configuration and wire the components to `store`.
    ///
    /// The search index is built lazily on the first query.
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;

        let index = Arc::new(SearchIndex::new(Arc::clone(&store), config.index.clone()));
        let matcher = MedicineMatcher::new(Arc::clone(&index));
        let detector = DuplicateDetector::new(store, config.duplicates.clone());

        info!(
            ttl_secs = config.index.ttl_secs,
            threshold = config.duplicates.similarity_threshold,
            window_hours = config.duplicates.time_window_hours,
            "match engine ready"
        );
        Ok(Self {
            config,
            index,
            matcher,
            detector,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Ranked matches for a medicine name. `None` uses the configured defaults.
    pub fn search_medicines(&self, query: &str, options: Option<&MatchOptions>) -> EngineResult<Vec<SimilarityScore>> {
        self.matcher
            .match_medicines(query, options.unwrap_or(&self.config.matching))
    }

    pub fn get_suggestions(&self, partial_name: &str, limit: usize) -> EngineResult<Vec<Suggestion>> {
        self.matcher
            .suggestions(partial_name, limit, &self.config.matching)
    }

    pub fn find_duplicates_for_report(&self, report_id: &str) -> EngineResult<Vec<DuplicateAssessment>> {
        self.find_duplicates_for_report_with(report_id, &FetchControl::none())
    }

    /// [`find_duplicates_for_report`](Self::find_duplicates_for_report) with a
    /// deadline or cancellation signal on the candidate fetch.
    pub fn find_duplicates_for_report_with(
        &self,
        report_id: &str,
        control: &FetchControl,
    ) -> EngineResult<Vec<DuplicateAssessment>> {
        self.detector.find_duplicates_for_report(report_id, control)
    }

    pub fn check_duplicates_before_submission(&self, draft: &ReportSummary) -> EngineResult<DuplicateCheck> {
        self.check_duplicates_before_submission_with(draft, &FetchControl::none())
    }

    pub fn check_duplicates_before_submission_with(
        &self,
        draft: &ReportSummary,
        control: &FetchControl,
    ) -> EngineResult<DuplicateCheck> {
        self.detector.check_before_submission(draft, control)
    }

    /// Duplicate analysis over many persisted reports, throttled by the
    /// configured batch delay.
    pub fn analyze_batch(&self, report_ids: &[String], control: &FetchControl) -> BatchAnalysis {
        self.detector.analyze_batch(report_ids, control)
    }

    /// Rebuild the search index now, regardless of TTL.
    pub fn force_refresh_index(&self) -> EngineResult<IndexStats> {
        let snapshot = self.index.force_refresh()?;
        Ok(IndexStats {
            generation: snapshot.generation(),
            built_at: snapshot.built_at(),
            record_count: snapshot.len(),
            fingerprint: snapshot.fingerprint().to_string(),
        })
    }

    /// Stats for the current snapshot; `None` before the first build.
    pub fn index_stats(&self) -> Option<IndexStats> {
        self.index.stats()
    }
}
