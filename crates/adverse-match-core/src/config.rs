//! Engine configuration.
//!
//! Every struct deserializes from partial JSON; missing fields take their
//! defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Tolerance when checking that duplicate weights sum to one.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// A century; longer windows are rejected.
const MAX_WINDOW_HOURS: f64 = 24.0 * 365.0 * 100.0;

/// Search index lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Snapshot lifetime before a query triggers a rebuild
    pub ttl_secs: u64,
    /// Coarse candidates handed to full similarity scoring
    pub candidate_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            candidate_limit: 30,
        }
    }
}

impl IndexConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Options for a single medicine lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchOptions {
    pub max_results: usize,
    pub min_score: f64,
    /// Short-circuit on an exact case-insensitive name or generic name match
    pub include_exact: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            min_score: 0.3,
            include_exact: true,
        }
    }
}

/// Weights for the duplicate-report criteria. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplicateWeights {
    pub medicine: f64,
    pub patient: f64,
    pub side_effects: f64,
    pub incident_date: f64,
}

impl Default for DuplicateWeights {
    fn default() -> Self {
        Self {
            medicine: 0.35,
            patient: 0.25,
            side_effects: 0.25,
            incident_date: 0.15,
        }
    }
}

impl DuplicateWeights {
    pub fn total(&self) -> f64 {
        self.medicine + self.patient + self.side_effects + self.incident_date
    }
}

/// Duplicate detection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Candidate window, and the gap at which date proximity reaches zero
    pub time_window_hours: f64,
    /// Score at or above which a pair is flagged
    pub similarity_threshold: f64,
    pub weights: DuplicateWeights,
    /// Candidate fetch limit for persisted reports
    pub report_candidate_limit: usize,
    /// Candidate fetch limit for pre-submission checks
    pub submission_candidate_limit: usize,
    /// Pause between items in batch analysis
    pub batch_delay_ms: u64,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            time_window_hours: 72.0,
            similarity_threshold: 0.7,
            weights: DuplicateWeights::default(),
            report_candidate_limit: 50,
            submission_candidate_limit: 20,
            batch_delay_ms: 250,
        }
    }
}

impl DuplicateConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Saturates at `chrono::Duration::MAX` for windows too large to represent.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::try_milliseconds((self.time_window_hours * 3_600_000.0) as i64)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn validate(&self) -> EngineResult<()> {
        let w = &self.weights;
        if [w.medicine, w.patient, w.side_effects, w.incident_date]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(EngineError::InvalidConfig(
                "duplicate weights must be non-negative".into(),
            ));
        }
        if (w.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvalidConfig(format!(
                "duplicate weights must sum to 1.0, got {}",
                w.total()
            )));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if !self.time_window_hours.is_finite() || self.time_window_hours <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "time_window_hours must be positive".into(),
            ));
        }
        if self.time_window_hours > MAX_WINDOW_HOURS {
            return Err(EngineError::InvalidConfig(format!(
                "time_window_hours must be at most {MAX_WINDOW_HOURS}, got {}",
                self.time_window_hours
            )));
        }
        if self.report_candidate_limit == 0 || self.submission_candidate_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "candidate limits must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub index: IndexConfig,
    pub matching: MatchOptions,
    pub duplicates: DuplicateConfig,
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON document and validate it.
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.index.candidate_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "index candidate_limit must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.matching.min_score) {
            return Err(EngineError::InvalidConfig(format!(
                "min_score must be within [0, 1], got {}",
                self.matching.min_score
            )));
        }
        self.duplicates.validate()
    }
}
