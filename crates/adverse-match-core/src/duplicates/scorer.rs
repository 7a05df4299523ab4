//! Pairwise duplicate scoring for adverse-event reports.

use chrono::{DateTime, Utc};

use crate::config::DuplicateConfig;
use crate::matcher::NON_EXACT_CEILING;
use crate::models::{DuplicateAssessment, DuplicateMatchDetails, ReportSummary};
use crate::similarity::{clamp_unit, word_overlap};

/// Date proximity stays at 1.0 up to this gap.
const FULL_PROXIMITY_HOURS: f64 = 24.0;

/// Threshold comparisons tolerate this much floating-point error.
const THRESHOLD_EPSILON: f64 = 1e-9;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Weighted duplicate scorer. Stateless apart from its configuration.
#[derive(Debug, Clone)]
pub struct DuplicateScorer {
    config: DuplicateConfig,
}

impl DuplicateScorer {
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DuplicateConfig {
        &self.config
    }

    /// Score `candidate` as a possible duplicate of `report`.
    ///
    /// Side-effect similarity is directional: each of `report`'s side effects
    /// is matched against its best counterpart in `candidate`.
    pub fn score(&self, report: &ReportSummary, candidate: &ReportSummary) -> DuplicateAssessment {
        let side_effects = side_effect_similarity(&report.side_effect_texts, &candidate.side_effect_texts);
        self.assess(report, candidate, side_effects)
    }

    /// Order-independent variant of [`score`](Self::score); side-effect
    /// similarity is averaged over both directions.
    pub fn score_symmetric(&self, a: &ReportSummary, b: &ReportSummary) -> DuplicateAssessment {
        let forward = side_effect_similarity(&a.side_effect_texts, &b.side_effect_texts);
        let backward = side_effect_similarity(&b.side_effect_texts, &a.side_effect_texts);
        self.assess(a, b, (forward + backward) / 2.0)
    }

    fn assess(&self, report: &ReportSummary, candidate: &ReportSummary, side_effects: f64) -> DuplicateAssessment {
        let identical_report = matches!(
            (&report.report_id, &candidate.report_id),
            (Some(a), Some(b)) if a == b
        );
        let same_medicine = !report.medicine_id.trim().is_empty()
            && report.medicine_id.trim() == candidate.medicine_id.trim();
        let same_patient = matches!(
            (report.patient_ref(), candidate.patient_ref()),
            (Some(a), Some(b)) if a == b
        );
        let hours_apart = hours_between(report.incident_date, candidate.incident_date);
        let date_proximity = hours_apart
            .map(|h| date_proximity(h, self.config.time_window_hours))
            .unwrap_or(0.0);

        let w = &self.config.weights;
        let score = if identical_report {
            1.0
        } else {
            let weighted = w.medicine * flag(same_medicine)
                + w.patient * flag(same_patient)
                + w.side_effects * side_effects
                + w.incident_date * date_proximity;
            clamp_unit(weighted).min(NON_EXACT_CEILING)
        };

        DuplicateAssessment {
            candidate_report_id: candidate.report_id.clone().unwrap_or_default(),
            candidate_incident_date: candidate.incident_date,
            score,
            match_details: DuplicateMatchDetails {
                identical_report,
                same_medicine,
                same_patient,
                side_effect_similarity: side_effects,
                date_proximity,
                hours_apart,
            },
            is_potential_duplicate: score + THRESHOLD_EPSILON >= self.config.similarity_threshold,
        }
    }
}

/// Mean over `a`'s texts of the best word overlap with any text in `b`.
pub fn side_effect_similarity(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let total: f64 = a
        .iter()
        .map(|text| {
            b.iter()
                .map(|other| word_overlap(text, other))
                .fold(0.0, f64::max)
        })
        .sum();
    clamp_unit(total / a.len() as f64)
}

/// 1.0 within a day, decaying linearly to 0.0 at `window_hours`.
pub fn date_proximity(hours_apart: f64, window_hours: f64) -> f64 {
    let hours = hours_apart.abs();
    if hours <= FULL_PROXIMITY_HOURS {
        1.0
    } else if hours >= window_hours {
        0.0
    } else {
        clamp_unit((window_hours - hours) / (window_hours - FULL_PROXIMITY_HOURS))
    }
}

fn hours_between(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<f64> {
    let (a, b) = (a?, b?);
    Some((a - b).num_milliseconds().unsigned_abs() as f64 / MILLIS_PER_HOUR)
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn report(id: &str, medicine: &str, patient: Option<&str>, effects: &[&str], hour: Option<i64>) -> ReportSummary {
        ReportSummary {
            report_id: Some(id.into()),
            medicine_id: medicine.into(),
            patient_id: patient.map(String::from),
            side_effect_texts: effects.iter().map(|s| s.to_string()).collect(),
            incident_date: hour.map(at),
        }
    }

    fn scorer() -> DuplicateScorer {
        DuplicateScorer::new(DuplicateConfig::default())
    }

    #[test]
    fn test_identical_report_scores_one() {
        let a = report("R-1", "MED-1", None, &[], None);
        let assessment = scorer().score(&a, &a.clone());
        assert_eq!(assessment.score, 1.0);
        assert!(assessment.match_details.identical_report);
        assert!(assessment.is_potential_duplicate);
    }

    #[test]
    fn test_same_content_different_ids_stays_below_one() {
        let a = report("R-1", "MED-1", Some("P-1"), &["severe nausea"], Some(0));
        let b = report("R-2", "MED-1", Some("P-1"), &["severe nausea"], Some(0));
        let assessment = scorer().score(&a, &b);
        assert_eq!(assessment.score, NON_EXACT_CEILING);
        assert!(!assessment.match_details.identical_report);
    }

    #[test]
    fn test_same_medicine_only_ten_days_apart() {
        let a = report("R-1", "MED-1", None, &["skin rash"], Some(0));
        let b = report("R-2", "MED-1", None, &["persistent headache"], Some(240));
        let assessment = scorer().score(&a, &b);

        assert!((assessment.score - 0.35).abs() < 1e-9);
        assert!(!assessment.is_potential_duplicate);
        assert_eq!(assessment.match_details.date_proximity, 0.0);
        assert_eq!(assessment.match_details.hours_apart, Some(240.0));
    }

    #[test]
    fn test_shared_patient_and_symptoms_two_hours_apart() {
        let a = report("R-1", "MED-1", Some("P-1"), &["nausea and vomiting"], Some(0));
        let b = report("R-2", "MED-1", Some("P-1"), &["nausea"], Some(2));
        let assessment = scorer().score(&a, &b);

        assert!(assessment.score >= 0.7);
        assert!(assessment.is_potential_duplicate);
        assert!(assessment.match_details.same_patient);
        assert_eq!(assessment.match_details.date_proximity, 1.0);
    }

    #[test]
    fn test_missing_patient_is_not_a_match() {
        let a = report("R-1", "MED-1", None, &[], None);
        let b = report("R-2", "MED-1", None, &[], None);
        assert!(!scorer().score(&a, &b).match_details.same_patient);

        let blank_a = report("R-3", "MED-1", Some("  "), &[], None);
        let blank_b = report("R-4", "MED-1", Some("  "), &[], None);
        assert!(!scorer().score(&blank_a, &blank_b).match_details.same_patient);
    }

    #[test]
    fn test_missing_date_has_no_proximity() {
        let a = report("R-1", "MED-1", None, &[], Some(0));
        let b = report("R-2", "MED-1", None, &[], None);
        let assessment = scorer().score(&a, &b);
        assert_eq!(assessment.match_details.date_proximity, 0.0);
        assert!(assessment.match_details.hours_apart.is_none());
    }

    #[test]
    fn test_date_proximity_decay() {
        assert_eq!(date_proximity(0.0, 72.0), 1.0);
        assert_eq!(date_proximity(24.0, 72.0), 1.0);
        assert!((date_proximity(48.0, 72.0) - 0.5).abs() < 1e-9);
        assert_eq!(date_proximity(72.0, 72.0), 0.0);
        assert_eq!(date_proximity(500.0, 72.0), 0.0);
        // Window shorter than a day: anything past 24h is out
        assert_eq!(date_proximity(30.0, 12.0), 0.0);
    }

    #[test]
    fn test_side_effects_directional() {
        let narrow = vec!["nausea".to_string()];
        let broad = vec!["nausea".to_string(), "dizziness".to_string()];

        assert_eq!(side_effect_similarity(&narrow, &broad), 1.0);
        assert_eq!(side_effect_similarity(&broad, &narrow), 0.5);
        assert_eq!(side_effect_similarity(&[], &broad), 0.0);
    }

    #[test]
    fn test_symmetric_score_is_order_independent() {
        let a = report("R-1", "MED-1", Some("P-1"), &["nausea"], Some(0));
        let b = report("R-2", "MED-1", Some("P-1"), &["nausea", "dizziness"], Some(30));
        let s = scorer();
        assert_eq!(s.score_symmetric(&a, &b).score, s.score_symmetric(&b, &a).score);
        assert_ne!(s.score(&a, &b).score, s.score(&b, &a).score);
    }

    #[test]
    fn test_custom_threshold() {
        let config = DuplicateConfig {
            similarity_threshold: 0.3,
            ..DuplicateConfig::default()
        };
        let a = report("R-1", "MED-1", None, &[], None);
        let b = report("R-2", "MED-1", None, &[], None);
        assert!(DuplicateScorer::new(config).score(&a, &b).is_potential_duplicate);
    }
}
