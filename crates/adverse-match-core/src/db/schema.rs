//! SQLite schema definition.

/// Complete database schema for adverse-match.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Medicine Catalog
-- ============================================================================

CREATE TABLE IF NOT EXISTS medicines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    generic_name TEXT,
    manufacturer_name TEXT,
    category TEXT NOT NULL DEFAULT '',
    dosage_form TEXT NOT NULL DEFAULT '',
    strength_value REAL,
    strength_unit TEXT,
    indications TEXT NOT NULL DEFAULT '[]',       -- JSON array of strings
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_medicines_active ON medicines(active);

-- ============================================================================
-- Adverse Event Reports
-- ============================================================================

CREATE TABLE IF NOT EXISTS adverse_reports (
    report_id TEXT PRIMARY KEY,
    medicine_id TEXT NOT NULL,
    patient_id TEXT,
    side_effects TEXT NOT NULL DEFAULT '[]',      -- JSON array of strings
    incident_date TEXT,                           -- RFC 3339, UTC
    active INTEGER NOT NULL DEFAULT 1,
    deleted_at TEXT,                              -- NULL unless soft-deleted
    created_at TEXT NOT NULL,                     -- RFC 3339, UTC, millisecond precision
    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

-- Duplicate candidate lookups filter by reference and creation time
CREATE INDEX IF NOT EXISTS idx_reports_medicine ON adverse_reports(medicine_id, created_at);
CREATE INDEX IF NOT EXISTS idx_reports_patient ON adverse_reports(patient_id, created_at);
"#;
