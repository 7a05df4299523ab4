//! Thread-safe record store backed by SQLite.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{Database, DbResult};
use crate::models::{MedicineRecord, ReportSummary};
use crate::store::{RecordStore, ReportWindowQuery, StoreResult};

/// [`RecordStore`] over a single SQLite connection.
pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Create in-memory store (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run writes or ad-hoc queries against the underlying database.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> DbResult<T>) -> DbResult<T> {
        f(&self.lock())
    }

    // A panic mid-statement leaves the connection usable; SQLite rolls back
    // the failed statement itself.
    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordStore for SqliteStore {
    fn list_all_medicines(&self) -> StoreResult<Vec<MedicineRecord>> {
        Ok(self.lock().list_medicines(true)?)
    }

    fn find_reports_by_window(&self, query: &ReportWindowQuery) -> StoreResult<Vec<ReportSummary>> {
        Ok(self.lock().find_reports_in_window(query)?)
    }

    fn find_report(&self, report_id: &str) -> StoreResult<Option<ReportSummary>> {
        Ok(self.lock().get_report(report_id)?)
    }
}
