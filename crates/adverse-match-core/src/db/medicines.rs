//! Medicine catalog database operations.

use rusqlite::{params, OptionalExtension, Row};
use tracing::warn;

use super::{Database, DbError, DbResult};
use crate::models::{MedicineRecord, Strength};

const MEDICINE_COLUMNS: &str = "id, name, generic_name, manufacturer_name, category, dosage_form, \
     strength_value, strength_unit, indications, active";

impl Database {
    /// Insert or update a medicine.
    pub fn upsert_medicine(&self, medicine: &MedicineRecord) -> DbResult<()> {
        let indications_json = serde_json::to_string(&medicine.indications)?;
        let (strength_value, strength_unit) = match &medicine.strength {
            Some(s) => (Some(s.value), Some(s.unit.as_str())),
            None => (None, None),
        };

        self.conn.execute(
            r#"
            INSERT INTO medicines (
                id, name, generic_name, manufacturer_name, category, dosage_form,
                strength_value, strength_unit, indications, active, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                generic_name = excluded.generic_name,
                manufacturer_name = excluded.manufacturer_name,
                category = excluded.category,
                dosage_form = excluded.dosage_form,
                strength_value = excluded.strength_value,
                strength_unit = excluded.strength_unit,
                indications = excluded.indications,
                active = excluded.active,
                updated_at = excluded.updated_at
            "#,
            params![
                medicine.id,
                medicine.name,
                medicine.generic_name,
                medicine.manufacturer_name,
                medicine.category,
                medicine.dosage_form,
                strength_value,
                strength_unit,
                indications_json,
                medicine.active,
            ],
        )?;
        Ok(())
    }

    /// Get a medicine by ID.
    pub fn get_medicine(&self, id: &str) -> DbResult<Option<MedicineRecord>> {
        let sql = format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE id = ?");
        self.conn
            .query_row(&sql, [id], MedicineRow::from_row)
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List medicines ordered by ID.
    ///
    /// Rows whose JSON columns cannot be decoded are skipped with a warning.
    pub fn list_medicines(&self, active_only: bool) -> DbResult<Vec<MedicineRecord>> {
        let sql = if active_only {
            format!("SELECT {MEDICINE_COLUMNS} FROM medicines WHERE active = 1 ORDER BY id")
        } else {
            format!("SELECT {MEDICINE_COLUMNS} FROM medicines ORDER BY id")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], MedicineRow::from_row)?;

        let mut medicines = Vec::new();
        for row in rows {
            let row = row?;
            let id = row.id.clone();
            match MedicineRecord::try_from(row) {
                Ok(medicine) => medicines.push(medicine),
                Err(e) => warn!(medicine_id = %id, error = %e, "skipping malformed medicine row"),
            }
        }
        Ok(medicines)
    }

    /// Mark a medicine as inactive (soft delete). Inactive medicines are not indexed.
    pub fn deactivate_medicine(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE medicines SET active = 0, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Delete a medicine.
    pub fn delete_medicine(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute("DELETE FROM medicines WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct MedicineRow {
    id: String,
    name: String,
    generic_name: Option<String>,
    manufacturer_name: Option<String>,
    category: String,
    dosage_form: String,
    strength_value: Option<f64>,
    strength_unit: Option<String>,
    indications: String,
    active: bool,
}

impl MedicineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            generic_name: row.get(2)?,
            manufacturer_name: row.get(3)?,
            category: row.get(4)?,
            dosage_form: row.get(5)?,
            strength_value: row.get(6)?,
            strength_unit: row.get(7)?,
            indications: row.get(8)?,
            active: row.get(9)?,
        })
    }
}

impl TryFrom<MedicineRow> for MedicineRecord {
    type Error = DbError;

    fn try_from(row: MedicineRow) -> Result<Self, Self::Error> {
        let strength = match (row.strength_value, row.strength_unit) {
            (Some(value), Some(unit)) => Some(Strength { value, unit }),
            _ => None,
        };

        Ok(MedicineRecord {
            id: row.id,
            name: row.name,
            generic_name: row.generic_name,
            manufacturer_name: row.manufacturer_name,
            category: row.category,
            dosage_form: row.dosage_form,
            strength,
            indications: serde_json::from_str(&row.indications)?,
            active: row.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn tylenol() -> MedicineRecord {
        let mut medicine = MedicineRecord::new("MED-001".into(), "Tylenol".into());
        medicine.generic_name = Some("Acetaminophen".into());
        medicine.manufacturer_name = Some("Kenvue".into());
        medicine.category = "Analgesic".into();
        medicine.dosage_form = "tablet".into();
        medicine.strength = Some(Strength {
            value: 500.0,
            unit: "mg".into(),
        });
        medicine.indications = vec!["headache".into(), "fever".into()];
        medicine
    }

    #[test]
    fn test_upsert_and_get() {
        let db = setup_db();
        db.upsert_medicine(&tylenol()).unwrap();

        let retrieved = db.get_medicine("MED-001").unwrap().unwrap();
        assert_eq!(retrieved, tylenol());
    }

    #[test]
    fn test_upsert_updates() {
        let db = setup_db();

        let mut medicine = tylenol();
        db.upsert_medicine(&medicine).unwrap();

        medicine.name = "Tylenol Extra Strength".into();
        medicine.strength = None;
        db.upsert_medicine(&medicine).unwrap();

        let retrieved = db.get_medicine("MED-001").unwrap().unwrap();
        assert_eq!(retrieved.name, "Tylenol Extra Strength");
        assert!(retrieved.strength.is_none());
    }

    #[test]
    fn test_get_missing() {
        let db = setup_db();
        assert!(db.get_medicine("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_active_only() {
        let db = setup_db();
        db.upsert_medicine(&tylenol()).unwrap();
        db.upsert_medicine(&MedicineRecord::new("MED-002".into(), "Advil".into()))
            .unwrap();

        db.deactivate_medicine("MED-002").unwrap();

        let active = db.list_medicines(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "MED-001");

        let all = db.list_medicines(false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all[1].active);
    }

    #[test]
    fn test_list_skips_malformed_rows() {
        let db = setup_db();
        db.upsert_medicine(&tylenol()).unwrap();
        db.conn()
            .execute(
                "INSERT INTO medicines (id, name, indications) VALUES ('MED-BAD', 'Broken', 'not json')",
                [],
            )
            .unwrap();

        let medicines = db.list_medicines(true).unwrap();
        assert_eq!(medicines.len(), 1);
        assert_eq!(medicines[0].id, "MED-001");

        // Direct lookups still report the problem
        assert!(matches!(db.get_medicine("MED-BAD"), Err(DbError::Json(_))));
    }

    #[test]
    fn test_delete() {
        let db = setup_db();
        db.upsert_medicine(&tylenol()).unwrap();

        assert!(db.delete_medicine("MED-001").unwrap());
        assert!(!db.delete_medicine("MED-001").unwrap());
        assert!(db.get_medicine("MED-001").unwrap().is_none());
    }
}
