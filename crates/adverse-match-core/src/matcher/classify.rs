//! Per-candidate scoring and match-type classification.
//!
//! Rules, first match wins:
//! 1. Exact name (1.0) / exact generic name (0.95)
//! 2. Name contains query (or the reverse): max(name_sim * 0.9, coarse)
//! 3. Generic contains query: max(generic_sim * 0.85, coarse)
//! 4. name_sim > 0.8: max(name_sim * 0.8, coarse)
//! 5. generic_sim > 0.8: max(generic_sim * 0.75, coarse)
//! 6. Fuzzy: coarse
//!
//! Non-exact matches whose name or generic name starts with the query get a
//! 10% boost and the `prefix_` flag.

use std::collections::BTreeMap;

use crate::index::IndexedMedicine;
use crate::models::{MatchKind, MatchType, SimilarityScore};
use crate::similarity::MetricScores;

const EXACT_NAME_SCORE: f64 = 1.0;
const EXACT_GENERIC_SCORE: f64 = 0.95;
const CONTAINS_NAME_FACTOR: f64 = 0.9;
const CONTAINS_GENERIC_FACTOR: f64 = 0.85;
const HIGH_SIMILARITY_NAME_FACTOR: f64 = 0.8;
const HIGH_SIMILARITY_GENERIC_FACTOR: f64 = 0.75;
const HIGH_SIMILARITY_THRESHOLD: f64 = 0.8;
const PREFIX_BOOST: f64 = 1.1;

/// Ceiling for anything short of exact equality; 1.0 is reserved for exact matches.
pub const NON_EXACT_CEILING: f64 = 0.99;

/// Query in the two forms the rules compare against.
#[derive(Debug, Clone)]
pub struct PreparedQuery {
    /// Output of [`crate::similarity::normalize`]
    pub normalized: String,
    /// Trimmed and lower-cased, for exact equality
    pub exact: String,
}

impl PreparedQuery {
    pub fn new(raw: &str) -> Self {
        Self {
            normalized: crate::similarity::normalize(raw),
            exact: raw.trim().to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }
}

/// Score one candidate. Returns `None` when the candidate has no usable name.
pub fn classify(query: &PreparedQuery, medicine: &IndexedMedicine, coarse: f64) -> Option<SimilarityScore> {
    let name = medicine.normalized_name.as_str();
    if name.is_empty() || query.is_empty() {
        return None;
    }
    let q = query.normalized.as_str();

    let name_metrics = MetricScores::compute(q, name);
    let generic = medicine.normalized_generic.as_deref();
    let generic_metrics = generic.map(|g| MetricScores::compute(q, g));
    let name_sim = name_metrics.combined;
    let generic_sim = generic_metrics.map(|m| m.combined).unwrap_or(0.0);

    let (kind, base) = if medicine.exact_name == query.exact {
        (MatchKind::ExactName, EXACT_NAME_SCORE)
    } else if medicine.exact_generic.as_deref() == Some(query.exact.as_str()) {
        (MatchKind::ExactGeneric, EXACT_GENERIC_SCORE)
    } else if contains_either_way(name, q) {
        (MatchKind::ContainsName, (name_sim * CONTAINS_NAME_FACTOR).max(coarse))
    } else if generic.is_some_and(|g| contains_either_way(g, q)) {
        (MatchKind::ContainsGeneric, (generic_sim * CONTAINS_GENERIC_FACTOR).max(coarse))
    } else if name_sim > HIGH_SIMILARITY_THRESHOLD {
        (MatchKind::HighSimilarityName, (name_sim * HIGH_SIMILARITY_NAME_FACTOR).max(coarse))
    } else if generic_sim > HIGH_SIMILARITY_THRESHOLD {
        (
            MatchKind::HighSimilarityGeneric,
            (generic_sim * HIGH_SIMILARITY_GENERIC_FACTOR).max(coarse),
        )
    } else {
        (MatchKind::Fuzzy, coarse)
    };

    let mut match_type = MatchType::new(kind);
    let score = if kind.is_exact() {
        base
    } else {
        let prefixed = name.starts_with(q) || generic.is_some_and(|g| g.starts_with(q));
        let boosted = if prefixed {
            match_type = match_type.with_prefix();
            base * PREFIX_BOOST
        } else {
            base
        };
        boosted.clamp(0.0, NON_EXACT_CEILING)
    };

    let mut per_metric_scores = BTreeMap::new();
    per_metric_scores.insert("coarse".to_string(), coarse);
    per_metric_scores.insert("name_edit".to_string(), name_metrics.edit);
    per_metric_scores.insert("name_jaro_winkler".to_string(), name_metrics.jaro_winkler);
    per_metric_scores.insert("name_ngram".to_string(), name_metrics.ngram);
    per_metric_scores.insert("name_similarity".to_string(), name_sim);
    if let Some(m) = generic_metrics {
        per_metric_scores.insert("generic_edit".to_string(), m.edit);
        per_metric_scores.insert("generic_jaro_winkler".to_string(), m.jaro_winkler);
        per_metric_scores.insert("generic_ngram".to_string(), m.ngram);
        per_metric_scores.insert("generic_similarity".to_string(), m.combined);
    }

    Some(SimilarityScore {
        candidate_id: medicine.record.id.clone(),
        candidate_name: medicine.record.name.clone(),
        generic_name: medicine.record.generic_name.clone(),
        per_metric_scores,
        combined_score: score,
        match_type,
    })
}

/// Result for an exact short-circuit.
pub fn exact_hit(medicine: &IndexedMedicine, kind: MatchKind) -> SimilarityScore {
    let mut per_metric_scores = BTreeMap::new();
    per_metric_scores.insert("exact".to_string(), 1.0);

    SimilarityScore {
        candidate_id: medicine.record.id.clone(),
        candidate_name: medicine.record.name.clone(),
        generic_name: medicine.record.generic_name.clone(),
        per_metric_scores,
        combined_score: EXACT_NAME_SCORE,
        match_type: MatchType::new(kind),
    }
}

fn contains_either_way(field: &str, query: &str) -> bool {
    field.contains(query) || query.contains(field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexSnapshot;
    use crate::models::MedicineRecord;

    fn indexed(name: &str, generic: Option<&str>) -> IndexedMedicine {
        let mut record = MedicineRecord::new("MED-1".into(), name.into());
        record.generic_name = generic.map(String::from);
        let snapshot = IndexSnapshot::build(vec![record], 1);
        snapshot.medicine(0).unwrap().clone()
    }

    fn run(query: &str, name: &str, generic: Option<&str>, coarse: f64) -> SimilarityScore {
        classify(&PreparedQuery::new(query), &indexed(name, generic), coarse).unwrap()
    }

    #[test]
    fn test_exact_name() {
        let score = run("TYLENOL", "Tylenol", Some("Acetaminophen"), 0.5);
        assert_eq!(score.match_type.to_string(), "exact_name");
        assert_eq!(score.combined_score, 1.0);
    }

    #[test]
    fn test_exact_generic() {
        let score = run("acetaminophen", "Tylenol", Some("Acetaminophen"), 0.5);
        assert_eq!(score.match_type.to_string(), "exact_generic");
        assert_eq!(score.combined_score, 0.95);
    }

    #[test]
    fn test_contains_name_with_prefix_boost() {
        let score = run("tylenol", "Tylenol PM", None, 0.0);
        assert_eq!(score.match_type.to_string(), "prefix_contains_name");
        let name_sim = score.per_metric_scores["name_similarity"];
        let expected = (name_sim * 0.9 * 1.1).min(NON_EXACT_CEILING);
        assert!((score.combined_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_contains_name_without_prefix() {
        let score = run("strength", "Tylenol Extra Strength", None, 0.0);
        assert_eq!(score.match_type.to_string(), "contains_name");
    }

    #[test]
    fn test_query_containing_name() {
        let score = run("advil liqui-gels", "Advil", None, 0.0);
        assert_eq!(score.match_type.kind, MatchKind::ContainsName);
    }

    #[test]
    fn test_contains_generic() {
        let score = run("diphenhydramine", "Tylenol PM", Some("Acetaminophen Diphenhydramine"), 0.0);
        assert_eq!(score.match_type.to_string(), "contains_generic");
    }

    #[test]
    fn test_high_similarity_name() {
        let score = run("acetaminofen", "Acetaminophen", None, 0.0);
        assert_eq!(score.match_type.to_string(), "high_similarity_name");
        assert!(score.combined_score >= 0.4);

        let partial = run("acetamin", "Acetaminophen", None, 0.0);
        assert!(partial.match_type.prefix);
    }

    #[test]
    fn test_high_similarity_generic() {
        let score = run("ibuprofin", "Advil", Some("Ibuprofen"), 0.0);
        assert_eq!(score.match_type.kind, MatchKind::HighSimilarityGeneric);
        let generic_sim = score.per_metric_scores["generic_similarity"];
        assert!(generic_sim > 0.8);
    }

    #[test]
    fn test_fuzzy_uses_coarse_score() {
        let score = run("headache", "Tylenol", None, 0.3);
        assert_eq!(score.match_type.to_string(), "fuzzy");
        assert_eq!(score.combined_score, 0.3);
    }

    #[test]
    fn test_coarse_floor_never_reaches_exact_score() {
        let score = run("tylenol", "Tylenol Extra", None, 1.0);
        assert!(score.combined_score < 1.0);
        assert_eq!(score.combined_score, NON_EXACT_CEILING);
    }

    #[test]
    fn test_empty_query_is_skipped() {
        assert!(classify(&PreparedQuery::new("  !! "), &indexed("Tylenol", None), 0.0).is_none());
    }

    #[test]
    fn test_scores_bounded() {
        for (query, name) in [("a", "Advil"), ("zzzz", "Tylenol"), ("tylenol pm extra", "Tylenol")] {
            let score = run(query, name, Some("Generic"), 0.2);
            assert!((0.0..=1.0).contains(&score.combined_score));
            assert!(score.per_metric_scores.values().all(|v| (0.0..=1.0).contains(v)));
        }
    }
}
