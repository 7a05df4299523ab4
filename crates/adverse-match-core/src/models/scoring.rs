//! Scored match results for medicine lookup and duplicate detection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Why a candidate medicine matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    ExactName,
    ExactGeneric,
    ContainsName,
    ContainsGeneric,
    HighSimilarityName,
    HighSimilarityGeneric,
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::ExactName => "exact_name",
            MatchKind::ExactGeneric => "exact_generic",
            MatchKind::ContainsName => "contains_name",
            MatchKind::ContainsGeneric => "contains_generic",
            MatchKind::HighSimilarityName => "high_similarity_name",
            MatchKind::HighSimilarityGeneric => "high_similarity_generic",
            MatchKind::Fuzzy => "fuzzy",
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, MatchKind::ExactName | MatchKind::ExactGeneric)
    }

    /// Tie-break rank: lower ranks win when scores are equal.
    pub fn precedence(&self) -> u8 {
        match self {
            MatchKind::ExactName | MatchKind::ExactGeneric => 0,
            MatchKind::ContainsName | MatchKind::ContainsGeneric => 1,
            MatchKind::HighSimilarityName | MatchKind::HighSimilarityGeneric => 2,
            MatchKind::Fuzzy => 3,
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "exact_name" => MatchKind::ExactName,
            "exact_generic" => MatchKind::ExactGeneric,
            "contains_name" => MatchKind::ContainsName,
            "contains_generic" => MatchKind::ContainsGeneric,
            "high_similarity_name" => MatchKind::HighSimilarityName,
            "high_similarity_generic" => MatchKind::HighSimilarityGeneric,
            "fuzzy" => MatchKind::Fuzzy,
            _ => return None,
        })
    }
}

/// Match classification, optionally flagged as a prefix match.
///
/// Serialized as its label, e.g. `"prefix_contains_name"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchType {
    pub kind: MatchKind,
    pub prefix: bool,
}

const PREFIX_LABEL: &str = "prefix_";

impl MatchType {
    pub fn new(kind: MatchKind) -> Self {
        Self {
            kind,
            prefix: false,
        }
    }

    /// Flag as a prefix match. Exact matches are never prefixed.
    pub fn with_prefix(self) -> Self {
        if self.kind.is_exact() {
            self
        } else {
            Self {
                kind: self.kind,
                prefix: true,
            }
        }
    }

    pub fn is_exact(&self) -> bool {
        self.kind.is_exact()
    }
}

impl From<MatchKind> for MatchType {
    fn from(kind: MatchKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix {
            f.write_str(PREFIX_LABEL)?;
        }
        f.write_str(self.kind.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("Unknown match type: {0}")]
pub struct ParseMatchTypeError(pub String);

impl FromStr for MatchType {
    type Err = ParseMatchTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, label) = match s.strip_prefix(PREFIX_LABEL) {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let kind = MatchKind::parse(label).ok_or_else(|| ParseMatchTypeError(s.to_string()))?;
        if prefix && kind.is_exact() {
            return Err(ParseMatchTypeError(s.to_string()));
        }
        Ok(Self { kind, prefix })
    }
}

impl Serialize for MatchType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(de::Error::custom)
    }
}

/// A candidate medicine scored against a free-text query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimilarityScore {
    /// Catalog ID of the candidate
    pub candidate_id: String,
    /// Candidate brand name
    pub candidate_name: String,
    /// Candidate generic name
    pub generic_name: Option<String>,
    /// Individual signals (0.0 - 1.0), keyed by metric name
    pub per_metric_scores: BTreeMap<String, f64>,
    /// Final score (0.0 - 1.0)
    pub combined_score: f64,
    /// Why the candidate matched
    pub match_type: MatchType,
}

impl SimilarityScore {
    /// Ranking order: higher score, then stronger match type, then shorter
    /// name, then ID.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .combined_score
            .total_cmp(&self.combined_score)
            .then_with(|| {
                self.match_type
                    .kind
                    .precedence()
                    .cmp(&other.match_type.kind.precedence())
            })
            .then_with(|| {
                self.candidate_name
                    .chars()
                    .count()
                    .cmp(&other.candidate_name.chars().count())
            })
            .then_with(|| self.candidate_id.cmp(&other.candidate_id))
    }
}

/// Simplified match result for typeahead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub score: f64,
    pub match_type: MatchType,
}

impl From<SimilarityScore> for Suggestion {
    fn from(score: SimilarityScore) -> Self {
        Self {
            id: score.candidate_id,
            name: score.candidate_name,
            generic_name: score.generic_name,
            score: score.combined_score,
            match_type: score.match_type,
        }
    }
}

/// Per-criterion breakdown of a duplicate assessment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DuplicateMatchDetails {
    /// Both reports carry the same report ID
    pub identical_report: bool,
    /// Same suspected medicine
    pub same_medicine: bool,
    /// Same patient reference (absent on either side counts as no match)
    pub same_patient: bool,
    /// Side-effect text overlap (0.0 - 1.0)
    pub side_effect_similarity: f64,
    /// Incident date proximity (0.0 - 1.0)
    pub date_proximity: f64,
    /// Hours between incident dates, when both are known
    pub hours_apart: Option<f64>,
}

/// Scored judgment of whether a candidate report duplicates the input report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateAssessment {
    pub candidate_report_id: String,
    pub candidate_incident_date: Option<DateTime<Utc>>,
    /// Weighted duplicate likelihood (0.0 - 1.0)
    pub score: f64,
    pub match_details: DuplicateMatchDetails,
    pub is_potential_duplicate: bool,
}

impl DuplicateAssessment {
    /// Ranking order: higher score, then earlier incident date (unknown
    /// dates last), then report ID.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| match (self.candidate_incident_date, other.candidate_incident_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| self.candidate_report_id.cmp(&other.candidate_report_id))
    }
}

/// Result of a pre-submission duplicate check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateCheck {
    pub has_potential_duplicates: bool,
    pub duplicates: Vec<DuplicateAssessment>,
}

impl DuplicateCheck {
    pub fn new(duplicates: Vec<DuplicateAssessment>) -> Self {
        Self {
            has_potential_duplicates: !duplicates.is_empty(),
            duplicates,
        }
    }
}
