//! SQLite adapter: Implementation of Storage.
//!
//! Provides local persistence for assessments in a single `patients` table.
//!
//! # Mutex Behavior
//!
//! The connection is protected by a `Mutex`. A poisoned mutex (from a panic
//! in another thread) surfaces as [`StorageError::Poisoned`] instead of
//! reusing a connection that may hold a half-finished statement.
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, types::Type, Connection, Row};

use super::StorageError;
use crate::config::DatabaseLocation;
use crate::domain::{
    Assessment, AssessmentRecord, Build, Classification, NutritionStatus, PatientInput,
};
use crate::ports::{AssessmentPage, Storage};

const SELECT_COLUMNS: &str = r"
    SELECT id, name, age, weight_kg, height_cm, muac_mm,
           bmi, build, nutrition_status, recommendation, recorded_at
    FROM patients
";

/// A stored label that does not name a known category.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} label {label:?}")]
struct UnknownLabel {
    kind: &'static str,
    label: String,
}

/// SQLite storage adapter.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Create a new SQLite storage with the given database path.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Create an in-memory SQLite database (for testing).
    ///
    /// # Errors
    /// Returns error if database cannot be created.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    /// Open whichever database a configured location points at.
    ///
    /// # Errors
    /// Returns error if database cannot be opened or initialized.
    pub fn open(location: &DatabaseLocation) -> Result<Self, StorageError> {
        match location {
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                tracing::info!(path = %path.display(), "Opening SQLite database");
                Self::new(path)
            }
            DatabaseLocation::InMemory => {
                tracing::warn!("Using in-memory database; records are lost on exit");
                Self::in_memory()
            }
        }
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::Poisoned)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r"
            CREATE TABLE IF NOT EXISTS patients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                age INTEGER NOT NULL,
                weight_kg REAL NOT NULL,
                height_cm REAL NOT NULL,
                muac_mm REAL NOT NULL,
                bmi REAL NOT NULL,
                build TEXT NOT NULL,
                nutrition_status TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_patients_name
                ON patients(name);
            ",
        )?;

        Ok(())
    }

    /// Map a `patients` row (in `SELECT_COLUMNS` order) back to a record.
    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AssessmentRecord> {
        let id: i64 = row.get(0)?;
        let age: i64 = row.get(2)?;
        let build_str: String = row.get(7)?;
        let status_str: String = row.get(8)?;
        let recorded_at_str: String = row.get(10)?;

        let input = PatientInput {
            name: row.get(1)?,
            age_years: u32::try_from(age)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Integer, Box::new(e)))?,
            weight_kg: row.get(3)?,
            height_cm: row.get(4)?,
            muac_mm: row.get(5)?,
        };

        let build = Build::from_label(&build_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                Type::Text,
                Box::new(UnknownLabel {
                    kind: "build",
                    label: build_str.clone(),
                }),
            )
        })?;

        let classification = Classification {
            bmi: row.get(6)?,
            build,
            nutrition_status: NutritionStatus::from_label(&status_str),
            recommendation: row.get(9)?,
        };

        let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at_str)
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(e)))?;

        Ok(AssessmentRecord {
            id,
            assessment: Assessment::from_stored(input, classification, recorded_at),
        })
    }
}

impl Storage for SqliteStorage {
    type Error = StorageError;

    fn insert_assessment(&self, assessment: &Assessment) -> Result<AssessmentRecord, Self::Error> {
        let conn = self.conn()?;
        let input = assessment.input();

        conn.execute(
            r"
            INSERT INTO patients (
                name, age, weight_kg, height_cm, muac_mm,
                bmi, build, nutrition_status, recommendation, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
            params![
                input.name,
                i64::from(input.age_years),
                input.weight_kg,
                input.height_cm,
                input.muac_mm,
                assessment.bmi(),
                assessment.build().label(),
                assessment.nutrition_status().label(),
                assessment.recommendation(),
                assessment.recorded_at().to_rfc3339(),
            ],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!("Saved assessment {} to storage", id);
        Ok(AssessmentRecord {
            id,
            assessment: assessment.clone(),
        })
    }

    fn load_assessments(&self) -> Result<Vec<AssessmentRecord>, Self::Error> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC"))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn get_assessment(&self, id: i64) -> Result<Option<AssessmentRecord>, Self::Error> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))?;
        let result = stmt.query_row(params![id], Self::row_to_record);

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load_assessments_paginated(&self, offset: usize, limit: usize) -> Result<AssessmentPage, Self::Error> {
        let conn = self.conn()?;

        let total_count: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;

        // Past i64::MAX there are no rows anyway.
        let sql_limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql_offset = i64::try_from(offset).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id ASC LIMIT ?1 OFFSET ?2"))?;
        let records = stmt
            .query_map(params![sql_limit, sql_offset], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(AssessmentPage::new(records, total_count as usize, offset, limit))
    }

    fn count_assessments(&self) -> Result<usize, Self::Error> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;

        Ok(count as usize)
    }

    fn delete_assessment(&self, id: i64) -> Result<(), Self::Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn clear_all(&self) -> Result<(), Self::Error> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM patients", [])?;
        tracing::warn!("Cleared all assessments from storage");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(name: &str, muac_mm: f64) -> Assessment {
        Assessment::from_input(PatientInput {
            name: name.to_string(),
            age_years: 4,
            weight_kg: 15.0,
            height_cm: 100.0,
            muac_mm,
        })
        .expect("Should classify")
    }

    #[test]
    fn test_assessment_crud() {
        let storage = SqliteStorage::in_memory().expect("Should create db");

        // No assessments initially
        assert_eq!(storage.count_assessments().expect("Should count"), 0);

        let first = storage
            .insert_assessment(&assessment("Amina", 120.0))
            .expect("Should save");
        let second = storage
            .insert_assessment(&assessment("Kofi", 110.0))
            .expect("Should save");
        assert!(second.id > first.id);
        assert_eq!(storage.count_assessments().expect("Should count"), 2);

        let loaded = storage.load_assessments().expect("Should load");
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], first);
        assert_eq!(loaded[1].assessment.nutrition_status(), NutritionStatus::Sam);

        let fetched = storage
            .get_assessment(first.id)
            .expect("Should load")
            .expect("Should exist");
        assert_eq!(fetched.assessment.name(), "Amina");
        assert_eq!(fetched.assessment.build(), Build::SeverelyUnderweight);

        storage.delete_assessment(first.id).expect("Should delete");
        assert!(storage.get_assessment(first.id).expect("Should load").is_none());
        assert_eq!(storage.count_assessments().expect("Should count"), 1);

        storage.clear_all().expect("Should clear");
        assert_eq!(storage.count_assessments().expect("Should count"), 0);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        let first = storage
            .insert_assessment(&assessment("Amina", 120.0))
            .expect("Should save");
        storage.delete_assessment(first.id).expect("Should delete");
        let second = storage
            .insert_assessment(&assessment("Kofi", 130.0))
            .expect("Should save");
        assert!(second.id > first.id);
    }

    #[test]
    fn test_pagination() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        for i in 0..5 {
            storage
                .insert_assessment(&assessment(&format!("Child {i}"), 126.0))
                .expect("Should save");
        }

        let page = storage.load_assessments_paginated(0, 2).expect("Should page");
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.next_offset(), Some(2));

        let last = storage.load_assessments_paginated(4, 2).expect("Should page");
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].assessment.name(), "Child 4");
        assert!(!last.has_more);
    }

    #[test]
    fn test_pagination_offset_beyond_i64() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        storage
            .insert_assessment(&assessment("Amina", 120.0))
            .expect("Should save");

        let page = storage
            .load_assessments_paginated(usize::MAX, 10)
            .expect("Should page");
        assert!(page.items.is_empty());
        assert_eq!(page.total_count, 1);
        assert!(!page.has_more);
    }

    #[test]
    fn test_legacy_status_labels() {
        let storage = SqliteStorage::in_memory().expect("Should create db");
        {
            let conn = storage.conn().expect("Should lock");
            conn.execute(
                r"
                INSERT INTO patients (
                    name, age, weight_kg, height_cm, muac_mm,
                    bmi, build, nutrition_status, recommendation, recorded_at
                ) VALUES ('Old', 2, 9.0, 80.0, 110.0, 14.06, 'Severely underweight',
                          'SAM (Severe Acute Malnutrition)', 'refer', '2024-01-01T00:00:00+00:00')
                ",
                [],
            )
            .expect("Should insert");
        }

        let loaded = storage.load_assessments().expect("Should load");
        assert_eq!(loaded[0].assessment.nutrition_status(), NutritionStatus::Sam);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let location = DatabaseLocation::File(dir.path().join("data").join("patients.db"));

        let saved = {
            let storage = SqliteStorage::open(&location).expect("Should open db");
            storage
                .insert_assessment(&assessment("Amina", 120.0))
                .expect("Should save")
        };

        let reopened = SqliteStorage::open(&location).expect("Should reopen db");
        assert_eq!(reopened.load_assessments().expect("Should load"), vec![saved]);
    }
}
