//! Adverse-Match Core Library
//!
//! Fuzzy medicine-name matching and duplicate adverse-event report detection.
//!
//! # Architecture
//!
//! ```text
//!   free-text name                              report / draft report
//!         │                                             │
//!         ▼                                             ▼
//!   ┌───────────────┐   snapshot   ┌──────────┐   ┌───────────────────┐
//!   │MedicineMatcher│◄─────────────│SearchIndex│   │ DuplicateDetector │
//!   └───────┬───────┘              └─────┬────┘   └─────────┬─────────┘
//!           │ classify + rank            │ TTL rebuild       │ windowed fetch
//!           ▼                            ▼                   ▼
//!   SimilarityScore[]            ┌─────────────────────────────────┐
//!                                │   RecordStore (SqliteStore)     │
//!                                └─────────────────────────────────┘
//! ```
//!
//! # Core Principle
//!
//! **A score of exactly 1.0 means exact equality.** Fuzzy matches and
//! non-identical reports are capped below it.
//!
//! # Modules
//!
//! - [`similarity`]: string metrics (edit, Jaro-Winkler, bigram, word overlap)
//! - [`index`]: TTL-refreshed, atomically swapped catalog snapshots
//! - [`matcher`]: medicine matching and match-type classification
//! - [`duplicates`]: duplicate report scoring and candidate generation
//! - [`db`]: SQLite record store
//! - [`engine`]: caller-facing facade

pub mod config;
pub mod db;
pub mod duplicates;
pub mod engine;
pub mod error;
pub mod index;
pub mod matcher;
pub mod models;
pub mod similarity;
pub mod store;

// Re-export commonly used types
pub use config::{DuplicateConfig, DuplicateWeights, EngineConfig, IndexConfig, MatchOptions};
pub use db::{Database, SqliteStore};
pub use duplicates::{BatchAnalysis, BatchItemOutcome, DuplicateDetector, DuplicateScorer, FetchControl};
pub use engine::MatchEngine;
pub use error::{EngineError, EngineResult};
pub use index::{IndexStats, SearchIndex};
pub use matcher::MedicineMatcher;
pub use models::{
    DuplicateAssessment, DuplicateCheck, DuplicateMatchDetails, MatchKind, MatchType, MedicineRecord,
    ReportSummary, SimilarityScore, Strength, Suggestion,
};
pub use store::{RecordStore, ReportWindowQuery, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum AdverseMatchError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Interrupted: {0}")]
    Interrupted(String),
}

impl From<db::DbError> for AdverseMatchError {
    fn from(e: db::DbError) -> Self {
        AdverseMatchError::DatabaseError(e.to_string())
    }
}

impl From<EngineError> for AdverseMatchError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::RecordStoreUnavailable(_) | EngineError::IndexNotReady => {
                AdverseMatchError::StoreUnavailable(e.to_string())
            }
            EngineError::ReportNotFound(id) => AdverseMatchError::NotFound(id),
            EngineError::DeadlineExceeded | EngineError::Cancelled => {
                AdverseMatchError::Interrupted(e.to_string())
            }
            EngineError::InvalidConfig(msg) => AdverseMatchError::InvalidInput(msg),
        }
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path.
///
/// `config_json` may be a partial [`EngineConfig`] document.
#[uniffi::export]
pub fn open_engine(path: String, config_json: Option<String>) -> Result<Arc<AdverseMatchCore>, AdverseMatchError> {
    let config = match config_json {
        Some(json) => EngineConfig::from_json_str(&json)?,
        None => EngineConfig::default(),
    };
    AdverseMatchCore::build(SqliteStore::open(&path)?, config)
}

/// Create an engine over an in-memory database (for testing).
#[uniffi::export]
pub fn open_engine_in_memory() -> Result<Arc<AdverseMatchCore>, AdverseMatchError> {
    AdverseMatchCore::build(SqliteStore::open_in_memory()?, EngineConfig::default())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Engine plus its backing store, for FFI hosts.
#[derive(uniffi::Object)]
pub struct AdverseMatchCore {
    store: Arc<SqliteStore>,
    engine: MatchEngine,
}

impl AdverseMatchCore {
    fn build(store: SqliteStore, config: EngineConfig) -> Result<Arc<Self>, AdverseMatchError> {
        let store = Arc::new(store);
        let engine = MatchEngine::new(store.clone(), config)?;
        Ok(Arc::new(Self { store, engine }))
    }
}

#[uniffi::export]
impl AdverseMatchCore {
    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Add or update a medicine. Visible to matching after the next index refresh.
    pub fn upsert_medicine(&self, medicine: FfiMedicine) -> Result<(), AdverseMatchError> {
        let record: MedicineRecord = medicine.into();
        self.store.with_db(|db| db.upsert_medicine(&record))?;
        Ok(())
    }

    pub fn get_medicine(&self, id: String) -> Result<Option<FfiMedicine>, AdverseMatchError> {
        let medicine = self.store.with_db(|db| db.get_medicine(&id))?;
        Ok(medicine.map(|m| m.into()))
    }

    /// Unlist a medicine. Returns false if it does not exist.
    pub fn deactivate_medicine(&self, id: String) -> Result<bool, AdverseMatchError> {
        Ok(self.store.with_db(|db| db.deactivate_medicine(&id))?)
    }

    // =========================================================================
    // Report Operations
    // =========================================================================

    /// Persist a report, assigning an ID when the input has none.
    /// Returns the report ID.
    pub fn insert_report(&self, report: FfiReport) -> Result<String, AdverseMatchError> {
        let mut summary = ReportSummary::try_from(report)?;
        let report_id = summary
            .report_id
            .get_or_insert_with(|| uuid::Uuid::new_v4().to_string())
            .clone();
        self.store.with_db(|db| db.insert_report(&summary, Utc::now()))?;
        Ok(report_id)
    }

    /// Soft-delete a report. Returns false if it does not exist.
    pub fn delete_report(&self, report_id: String) -> Result<bool, AdverseMatchError> {
        Ok(self.store.with_db(|db| db.soft_delete_report(&report_id))?)
    }

    // =========================================================================
    // Matching Operations
    // =========================================================================

    /// Ranked matches for a medicine name. `None` uses the configured defaults.
    pub fn search_medicines(
        &self,
        query: String,
        options: Option<FfiMatchOptions>,
    ) -> Result<Vec<FfiSimilarityScore>, AdverseMatchError> {
        let options = options.map(MatchOptions::from);
        let results = self.engine.search_medicines(&query, options.as_ref())?;
        Ok(results.into_iter().map(|r| r.into()).collect())
    }

    /// Typeahead suggestions for a partially typed name.
    pub fn get_suggestions(&self, partial_name: String, limit: u32) -> Result<Vec<FfiSuggestion>, AdverseMatchError> {
        let suggestions = self.engine.get_suggestions(&partial_name, limit as usize)?;
        Ok(suggestions.into_iter().map(|s| s.into()).collect())
    }

    // =========================================================================
    // Duplicate Detection
    // =========================================================================

    pub fn find_duplicates_for_report(
        &self,
        report_id: String,
    ) -> Result<Vec<FfiDuplicateAssessment>, AdverseMatchError> {
        let duplicates = self.engine.find_duplicates_for_report(&report_id)?;
        Ok(duplicates.into_iter().map(|d| d.into()).collect())
    }

    pub fn check_duplicates_before_submission(
        &self,
        draft: FfiReport,
    ) -> Result<FfiDuplicateCheck, AdverseMatchError> {
        let draft = ReportSummary::try_from(draft)?;
        Ok(self.engine.check_duplicates_before_submission(&draft)?.into())
    }

    /// Throttled duplicate analysis over many reports, optionally bounded in time.
    pub fn analyze_batch(&self, report_ids: Vec<String>, timeout_ms: Option<u64>) -> FfiBatchAnalysis {
        let control = match timeout_ms {
            Some(ms) => FetchControl::none().with_timeout(Duration::from_millis(ms)),
            None => FetchControl::none(),
        };
        self.engine.analyze_batch(&report_ids, &control).into()
    }

    // =========================================================================
    // Index Administration
    // =========================================================================

    pub fn force_refresh_index(&self) -> Result<FfiIndexStats, AdverseMatchError> {
        Ok(self.engine.force_refresh_index()?.into())
    }

    /// `None` until the index has been built.
    pub fn get_index_stats(&self) -> Option<FfiIndexStats> {
        self.engine.index_stats().map(|s| s.into())
    }
}

// =========================================================================
// FFI Record Types
// =========================================================================

/// FFI-safe medicine.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicine {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub category: String,
    pub dosage_form: String,
    pub strength_value: Option<f64>,
    pub strength_unit: Option<String>,
    pub indications: Vec<String>,
    pub active: bool,
}

impl From<FfiMedicine> for MedicineRecord {
    fn from(m: FfiMedicine) -> Self {
        let strength = match (m.strength_value, m.strength_unit) {
            (Some(value), Some(unit)) => Some(Strength { value, unit }),
            _ => None,
        };
        MedicineRecord {
            id: m.id,
            name: m.name,
            generic_name: m.generic_name,
            manufacturer_name: m.manufacturer_name,
            category: m.category,
            dosage_form: m.dosage_form,
            strength,
            indications: m.indications,
            active: m.active,
        }
    }
}

impl From<MedicineRecord> for FfiMedicine {
    fn from(m: MedicineRecord) -> Self {
        let (strength_value, strength_unit) = match m.strength {
            Some(s) => (Some(s.value), Some(s.unit)),
            None => (None, None),
        };
        Self {
            id: m.id,
            name: m.name,
            generic_name: m.generic_name,
            manufacturer_name: m.manufacturer_name,
            category: m.category,
            dosage_form: m.dosage_form,
            strength_value,
            strength_unit,
            indications: m.indications,
            active: m.active,
        }
    }
}

/// FFI-safe report summary. `incident_date` is RFC 3339.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReport {
    /// `None` for drafts
    pub report_id: Option<String>,
    pub medicine_id: String,
    pub patient_id: Option<String>,
    pub side_effect_texts: Vec<String>,
    pub incident_date: Option<String>,
}

impl TryFrom<FfiReport> for ReportSummary {
    type Error = AdverseMatchError;

    fn try_from(r: FfiReport) -> Result<Self, Self::Error> {
        Ok(ReportSummary {
            report_id: r.report_id,
            medicine_id: r.medicine_id,
            patient_id: r.patient_id,
            side_effect_texts: r.side_effect_texts,
            incident_date: r.incident_date.as_deref().map(parse_rfc3339).transpose()?,
        })
    }
}

/// FFI-safe lookup options.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMatchOptions {
    pub max_results: u32,
    pub min_score: f64,
    pub include_exact: bool,
}

impl From<FfiMatchOptions> for MatchOptions {
    fn from(o: FfiMatchOptions) -> Self {
        MatchOptions {
            max_results: o.max_results as usize,
            min_score: o.min_score,
            include_exact: o.include_exact,
        }
    }
}

/// FFI-safe scored match.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSimilarityScore {
    pub candidate_id: String,
    pub candidate_name: String,
    pub generic_name: Option<String>,
    pub per_metric_scores: HashMap<String, f64>,
    pub combined_score: f64,
    pub match_type: String,
}

impl From<SimilarityScore> for FfiSimilarityScore {
    fn from(s: SimilarityScore) -> Self {
        Self {
            candidate_id: s.candidate_id,
            candidate_name: s.candidate_name,
            generic_name: s.generic_name,
            per_metric_scores: s.per_metric_scores.into_iter().collect(),
            combined_score: s.combined_score,
            match_type: s.match_type.to_string(),
        }
    }
}

/// FFI-safe suggestion.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSuggestion {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub score: f64,
    pub match_type: String,
}

impl From<Suggestion> for FfiSuggestion {
    fn from(s: Suggestion) -> Self {
        Self {
            id: s.id,
            name: s.name,
            generic_name: s.generic_name,
            score: s.score,
            match_type: s.match_type.to_string(),
        }
    }
}

/// FFI-safe duplicate assessment, with the match details flattened.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDuplicateAssessment {
    pub candidate_report_id: String,
    pub candidate_incident_date: Option<String>,
    pub score: f64,
    pub is_potential_duplicate: bool,
    pub identical_report: bool,
    pub same_medicine: bool,
    pub same_patient: bool,
    pub side_effect_similarity: f64,
    pub date_proximity: f64,
    pub hours_apart: Option<f64>,
}

impl From<DuplicateAssessment> for FfiDuplicateAssessment {
    fn from(a: DuplicateAssessment) -> Self {
        let d = a.match_details;
        Self {
            candidate_report_id: a.candidate_report_id,
            candidate_incident_date: a.candidate_incident_date.map(|t| t.to_rfc3339()),
            score: a.score,
            is_potential_duplicate: a.is_potential_duplicate,
            identical_report: d.identical_report,
            same_medicine: d.same_medicine,
            same_patient: d.same_patient,
            side_effect_similarity: d.side_effect_similarity,
            date_proximity: d.date_proximity,
            hours_apart: d.hours_apart,
        }
    }
}

/// FFI-safe pre-submission check result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDuplicateCheck {
    pub has_potential_duplicates: bool,
    pub duplicates: Vec<FfiDuplicateAssessment>,
}

impl From<DuplicateCheck> for FfiDuplicateCheck {
    fn from(c: DuplicateCheck) -> Self {
        Self {
            has_potential_duplicates: c.has_potential_duplicates,
            duplicates: c.duplicates.into_iter().map(|d| d.into()).collect(),
        }
    }
}

/// FFI-safe batch item.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatchItem {
    pub report_id: String,
    pub duplicates: Vec<FfiDuplicateAssessment>,
    pub error: Option<String>,
}

/// FFI-safe batch analysis.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBatchAnalysis {
    pub items: Vec<FfiBatchItem>,
    pub interrupted: bool,
}

impl From<BatchAnalysis> for FfiBatchAnalysis {
    fn from(b: BatchAnalysis) -> Self {
        Self {
            items: b
                .items
                .into_iter()
                .map(|i| FfiBatchItem {
                    report_id: i.report_id,
                    duplicates: i.duplicates.into_iter().map(|d| d.into()).collect(),
                    error: i.error,
                })
                .collect(),
            interrupted: b.interrupted,
        }
    }
}

/// FFI-safe index statistics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiIndexStats {
    pub generation: u64,
    pub built_at: String,
    pub record_count: u64,
    pub fingerprint: String,
}

impl From<IndexStats> for FfiIndexStats {
    fn from(s: IndexStats) -> Self {
        Self {
            generation: s.generation,
            built_at: s.built_at.to_rfc3339(),
            record_count: s.record_count as u64,
            fingerprint: s.fingerprint,
        }
    }
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>, AdverseMatchError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AdverseMatchError::InvalidInput(format!("invalid timestamp {value:?}: {e}")))
}
