//! Record store adapter contract.
//!
//! The engine reads canonical medicines and candidate reports through
//! [`RecordStore`]; it never writes. [`crate::db::SqliteStore`] is the bundled
//! implementation.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{MedicineRecord, ReportSummary};

/// Adapter-level failure.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
}

impl From<crate::db::DbError> for StoreError {
    fn from(e: crate::db::DbError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Windowed candidate query for duplicate detection.
///
/// Matches active, non-deleted reports created at or after `since` that share
/// the medicine OR the patient reference, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportWindowQuery {
    pub medicine_id: Option<String>,
    pub patient_id: Option<String>,
    pub since: DateTime<Utc>,
    pub exclude_report_id: Option<String>,
    pub limit: usize,
}

impl ReportWindowQuery {
    /// A query with neither reference can match nothing.
    pub fn has_reference(&self) -> bool {
        self.medicine_id.is_some() || self.patient_id.is_some()
    }
}

/// Read-only access to the datastore.
pub trait RecordStore: Send + Sync {
    /// Every active medicine, for index builds.
    fn list_all_medicines(&self) -> StoreResult<Vec<MedicineRecord>>;

    /// Candidate reports for duplicate scoring.
    fn find_reports_by_window(&self, query: &ReportWindowQuery) -> StoreResult<Vec<ReportSummary>>;

    /// A single persisted report.
    fn find_report(&self, report_id: &str) -> StoreResult<Option<ReportSummary>>;
}
