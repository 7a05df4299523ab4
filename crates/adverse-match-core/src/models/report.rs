//! Adverse-event report summaries used for duplicate detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The subset of an adverse-event report needed to score duplicates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    /// Persisted report ID - `None` for drafts that have not been submitted
    pub report_id: Option<String>,
    /// Catalog ID of the suspected medicine
    pub medicine_id: String,
    /// Patient reference, when the reporter supplied one
    pub patient_id: Option<String>,
    /// Free-text side effect descriptions
    pub side_effect_texts: Vec<String>,
    /// When the adverse event happened
    pub incident_date: Option<DateTime<Utc>>,
}

impl ReportSummary {
    /// Create a report summary with a freshly assigned ID.
    pub fn new(medicine_id: String) -> Self {
        Self {
            report_id: Some(uuid::Uuid::new_v4().to_string()),
            ..Self::draft(medicine_id)
        }
    }

    /// Create a draft summary with no persisted identity.
    pub fn draft(medicine_id: String) -> Self {
        Self {
            report_id: None,
            medicine_id,
            patient_id: None,
            side_effect_texts: Vec::new(),
            incident_date: None,
        }
    }

    /// Drafts have not been persisted yet.
    pub fn is_draft(&self) -> bool {
        self.report_id.is_none()
    }

    /// Patient reference, ignoring blank values.
    pub fn patient_ref(&self) -> Option<&str> {
        self.patient_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_report_has_id() {
        let report = ReportSummary::new("MED-1".into());
        assert!(!report.is_draft());
        assert_eq!(report.report_id.as_ref().map(|id| id.len()), Some(36)); // UUID format
    }

    #[test]
    fn test_draft_has_no_id() {
        let draft = ReportSummary::draft("MED-1".into());
        assert!(draft.is_draft());
        assert!(draft.side_effect_texts.is_empty());
    }

    #[test]
    fn test_blank_patient_ref() {
        let mut report = ReportSummary::draft("MED-1".into());
        report.patient_id = Some("  ".into());
        assert_eq!(report.patient_ref(), None);

        report.patient_id = Some("PAT-9".into());
        assert_eq!(report.patient_ref(), Some("PAT-9"));
    }
}
