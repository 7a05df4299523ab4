//! Engine error taxonomy.

use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by matching and duplicate detection.
///
/// Empty or blank queries are not errors: they produce an empty result list.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    RecordStoreUnavailable(#[from] StoreError),

    #[error("Search index has not been built yet")]
    IndexNotReady,

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Candidate fetch exceeded its deadline")]
    DeadlineExceeded,

    #[error("Candidate fetch was cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
