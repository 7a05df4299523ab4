//! Adverse report database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

use super::{format_timestamp, parse_timestamp, Database, DbError, DbResult};
use crate::models::ReportSummary;
use crate::store::ReportWindowQuery;

const REPORT_COLUMNS: &str = "report_id, medicine_id, patient_id, side_effects, incident_date";

impl Database {
    /// Insert a persisted report created at `created_at`.
    pub fn insert_report(&self, report: &ReportSummary, created_at: DateTime<Utc>) -> DbResult<()> {
        let report_id = report
            .report_id
            .as_deref()
            .ok_or_else(|| DbError::Constraint("draft reports cannot be persisted without an ID".into()))?;
        let side_effects_json = serde_json::to_string(&report.side_effect_texts)?;

        self.conn.execute(
            r#"
            INSERT INTO adverse_reports (
                report_id, medicine_id, patient_id, side_effects, incident_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                report_id,
                report.medicine_id,
                report.patient_ref(),
                side_effects_json,
                report.incident_date.as_ref().map(format_timestamp),
                format_timestamp(&created_at),
            ],
        )?;
        Ok(())
    }

    /// Get an active, non-deleted report by ID.
    pub fn get_report(&self, report_id: &str) -> DbResult<Option<ReportSummary>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM adverse_reports \
             WHERE report_id = ? AND active = 1 AND deleted_at IS NULL"
        );
        self.conn
            .query_row(&sql, [report_id], ReportRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Reports sharing the medicine or patient reference, created within the window.
    ///
    /// Rows that fail to decode are skipped with a warning.
    pub fn find_reports_in_window(&self, query: &ReportWindowQuery) -> DbResult<Vec<ReportSummary>> {
        if !query.has_reference() || query.limit == 0 {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM adverse_reports
            WHERE active = 1
              AND deleted_at IS NULL
              AND created_at >= ?1
              AND ((?2 IS NOT NULL AND medicine_id = ?2) OR (?3 IS NOT NULL AND patient_id = ?3))
              AND (?4 IS NULL OR report_id != ?4)
            ORDER BY created_at DESC, report_id
            LIMIT ?5
            "#
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                format_timestamp(&query.since),
                query.medicine_id,
                query.patient_id,
                query.exclude_report_id,
                query.limit as i64,
            ],
            ReportRow::from_row,
        )?;

        let mut reports = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.report_id.clone();
            match ReportSummary::try_from(row) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(report_id = %id, error = %e, "skipping malformed report row"),
            }
        }
        Ok(reports)
    }

    /// Soft delete a report. Deleted reports are never duplicate candidates.
    pub fn soft_delete_report(&self, report_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE adverse_reports SET
                deleted_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            WHERE report_id = ? AND deleted_at IS NULL
            "#,
            [report_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Mark a report as inactive (e.g., withdrawn by the reporter).
    pub fn deactivate_report(&self, report_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE adverse_reports SET active = 0, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE report_id = ?",
            [report_id],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ReportRow {
    report_id: String,
    medicine_id: String,
    patient_id: Option<String>,
    side_effects: String,
    incident_date: Option<String>,
}

impl ReportRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            report_id: row.get(0)?,
            medicine_id: row.get(1)?,
            patient_id: row.get(2)?,
            side_effects: row.get(3)?,
            incident_date: row.get(4)?,
        })
    }
}

impl TryFrom<ReportRow> for ReportSummary {
    type Error = DbError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(ReportSummary {
            report_id: Some(row.report_id),
            medicine_id: row.medicine_id,
            patient_id: row.patient_id,
            side_effect_texts: serde_json::from_str(&row.side_effects)?,
            incident_date: row.incident_date.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}
