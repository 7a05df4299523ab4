//! Candidate generation and ranking for duplicate reports.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{DuplicateScorer, FetchControl};
use crate::config::DuplicateConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::{DuplicateAssessment, DuplicateCheck, ReportSummary};
use crate::store::{RecordStore, ReportWindowQuery};

/// Batch delays are slept in slices so cancellation is noticed promptly.
const DELAY_SLICE: Duration = Duration::from_millis(50);

/// Outcome for one report in a batch analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItemOutcome {
    pub report_id: String,
    pub duplicates: Vec<DuplicateAssessment>,
    /// Set when this report could not be analyzed
    pub error: Option<String>,
}

/// Result of [`DuplicateDetector::analyze_batch`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchAnalysis {
    /// One entry per analyzed report, in input order
    pub items: Vec<BatchItemOutcome>,
    /// The batch stopped early on cancellation or deadline
    pub interrupted: bool,
}

/// Finds likely duplicates of a report among recent reports in the store.
pub struct DuplicateDetector {
    store: Arc<dyn RecordStore>,
    scorer: DuplicateScorer,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn RecordStore>, config: DuplicateConfig) -> Self {
        Self {
            store,
            scorer: DuplicateScorer::new(config),
        }
    }

    pub fn scorer(&self) -> &DuplicateScorer {
        &self.scorer
    }

    fn config(&self) -> &DuplicateConfig {
        self.scorer.config()
    }

    /// Ranked potential duplicates of a persisted report. The report itself is
    /// never among the results.
    pub fn find_duplicates(
        &self,
        report: &ReportSummary,
        control: &FetchControl,
    ) -> EngineResult<Vec<DuplicateAssessment>> {
        self.scan(report, self.config().report_candidate_limit, control)
    }

    /// Look up a report by ID, then find its duplicates.
    pub fn find_duplicates_for_report(
        &self,
        report_id: &str,
        control: &FetchControl,
    ) -> EngineResult<Vec<DuplicateAssessment>> {
        control.check()?;
        let report = self
            .store
            .find_report(report_id)?
            .ok_or_else(|| EngineError::ReportNotFound(report_id.to_string()))?;
        self.find_duplicates(&report, control)
    }

    /// Duplicate check for a report that has not been submitted yet.
    pub fn check_before_submission(
        &self,
        draft: &ReportSummary,
        control: &FetchControl,
    ) -> EngineResult<DuplicateCheck> {
        let duplicates = self.scan(draft, self.config().submission_candidate_limit, control)?;
        Ok(DuplicateCheck::new(duplicates))
    }

    /// Analyze many reports in sequence, pausing between items.
    ///
    /// Per-report failures are recorded and the batch moves on. Cancellation
    /// or an expired deadline stops the batch and marks it interrupted.
    pub fn analyze_batch(&self, report_ids: &[String], control: &FetchControl) -> BatchAnalysis {
        let mut items = Vec::with_capacity(report_ids.len());
        let mut interrupted = false;

        for (position, report_id) in report_ids.iter().enumerate() {
            if position > 0 && !self.pause(control) {
                interrupted = true;
                break;
            }

            match self.find_duplicates_for_report(report_id, control) {
                Ok(duplicates) => items.push(BatchItemOutcome {
                    report_id: report_id.clone(),
                    duplicates,
                    error: None,
                }),
                Err(e @ (EngineError::Cancelled | EngineError::DeadlineExceeded)) => {
                    debug!(report_id = %report_id, error = %e, "batch analysis stopped");
                    interrupted = true;
                    break;
                }
                Err(e) => {
                    warn!(report_id = %report_id, error = %e, "batch item failed");
                    items.push(BatchItemOutcome {
                        report_id: report_id.clone(),
                        duplicates: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(
            requested = report_ids.len(),
            analyzed = items.len(),
            interrupted,
            "batch duplicate analysis finished"
        );
        BatchAnalysis { items, interrupted }
    }

    fn scan(
        &self,
        report: &ReportSummary,
        limit: usize,
        control: &FetchControl,
    ) -> EngineResult<Vec<DuplicateAssessment>> {
        let medicine_id = Some(report.medicine_id.trim())
            .filter(|m| !m.is_empty())
            .map(String::from);
        let query = ReportWindowQuery {
            medicine_id,
            patient_id: report.patient_ref().map(String::from),
            since: Utc::now()
                .checked_sub_signed(self.config().window())
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            exclude_report_id: report.report_id.clone(),
            limit,
        };
        if !query.has_reference() {
            debug!("report has no medicine or patient reference, nothing to compare");
            return Ok(Vec::new());
        }

        control.check()?;
        let candidates = self.store.find_reports_by_window(&query)?;
        control.check()?;

        let fetched = candidates.len();
        let mut duplicates: Vec<DuplicateAssessment> = candidates
            .iter()
            .filter(|c| c.report_id.is_some() && c.report_id != report.report_id)
            .map(|c| self.scorer.score(report, c))
            .filter(|a| a.is_potential_duplicate)
            .collect();
        duplicates.sort_by(|a, b| a.rank_cmp(b));

        debug!(
            report_id = report.report_id.as_deref().unwrap_or("<draft>"),
            candidates = fetched,
            duplicates = duplicates.len(),
            "duplicate scan"
        );
        Ok(duplicates)
    }

    /// Sleep the configured batch delay. Returns false if the control fired.
    fn pause(&self, control: &FetchControl) -> bool {
        let mut left = self.config().batch_delay();
        while !left.is_zero() {
            if control.check().is_err() {
                return false;
            }
            let mut slice = left.min(DELAY_SLICE);
            if let Some(remaining) = control.remaining() {
                slice = slice.min(remaining);
            }
            thread::sleep(slice);
            left = left.saturating_sub(slice);
        }
        control.check().is_ok()
    }
}
