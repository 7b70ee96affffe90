//! Persistence sink for submissions and predictions.
//!
//! Two append-only record streams backed by SQLite tables:
//!
//! - `Features`: the 11 raw input fields plus a generated identity key
//! - `Predicts`: the predicted label plus a generated identity key
//!
//! The connection is opened once at startup and owned by [`PredictionStore`];
//! every access goes through its mutex, so concurrent requests never share a
//! cursor.

use crate::error::{Result, TriageError};
use crate::types::{FeatureRecord, PredictionResult, RecordStream};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS Features (
        id INTEGER PRIMARY KEY,
        age INTEGER,
        weight INTEGER,
        height INTEGER,
        exercise VARCHAR,
        sleep REAL,
        sugar_intake VARCHAR,
        smoking VARCHAR,
        alcohol VARCHAR,
        married VARCHAR,
        profession VARCHAR,
        bmi REAL
    );
    CREATE TABLE IF NOT EXISTS Predicts (
        id INTEGER PRIMARY KEY,
        predict VARCHAR
    );
";

/// Records destined for one stream.
#[derive(Debug, Clone, Copy)]
pub enum RecordBatch<'a> {
    Features(&'a [FeatureRecord]),
    Predicts(&'a [PredictionResult]),
}

impl RecordBatch<'_> {
    /// Stream the batch is appended to.
    pub fn stream(&self) -> RecordStream {
        match self {
            RecordBatch::Features(_) => RecordStream::Features,
            RecordBatch::Predicts(_) => RecordStream::Predicts,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Features(r) => r.len(),
            RecordBatch::Predicts(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only storage for the two record streams.
pub trait RecordSink: Send + Sync {
    /// Creates both streams if absent. Safe to call repeatedly.
    fn ensure_schema(&self) -> Result<()>;

    /// Appends one or more records, returning their identity keys.
    fn append(&self, batch: RecordBatch<'_>) -> Result<Vec<i64>>;

    /// Cheap liveness check.
    fn ping(&self) -> Result<()>;
}

/// A persisted submission.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFeatures {
    pub id: i64,
    pub record: FeatureRecord,
}

/// A persisted prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPrediction {
    pub id: i64,
    pub predict: String,
}

/// SQLite-backed [`RecordSink`].
pub struct PredictionStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl PredictionStore {
    /// Opens (or creates) the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TriageError::PersistenceInit(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| {
            TriageError::PersistenceInit(format!("cannot open {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "Opened prediction store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| TriageError::PersistenceInit(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends submissions.
    pub fn append_features(&self, records: &[FeatureRecord]) -> Result<Vec<i64>> {
        self.append(RecordBatch::Features(records))
    }

    /// Appends one prediction.
    pub fn append_prediction(&self, result: &PredictionResult) -> Result<i64> {
        let ids = self.append(RecordBatch::Predicts(std::slice::from_ref(result)))?;
        ids.into_iter()
            .next()
            .ok_or_else(|| TriageError::write_failed(RecordStream::Predicts.table_name(), "no row inserted"))
    }

    /// All stored submissions, oldest first.
    pub fn features(&self) -> Result<Vec<StoredFeatures>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, age, weight, height, exercise, sleep, sugar_intake, smoking,
                        alcohol, married, profession, bmi
                 FROM Features ORDER BY id",
            )
            .map_err(read_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredFeatures {
                    id: row.get(0)?,
                    record: FeatureRecord {
                        age: row.get(1)?,
                        weight: row.get(2)?,
                        height: row.get(3)?,
                        exercise: row.get(4)?,
                        sleep: row.get(5)?,
                        sugar_intake: row.get(6)?,
                        smoking: row.get(7)?,
                        alcohol: row.get(8)?,
                        married: row.get(9)?,
                        profession: row.get(10)?,
                        bmi: row.get(11)?,
                    },
                })
            })
            .map_err(read_error)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_error)
    }

    /// All stored predictions, oldest first.
    pub fn predictions(&self) -> Result<Vec<StoredPrediction>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, predict FROM Predicts ORDER BY id")
            .map_err(read_error)?;

        let rows = stmt
            .query_map([], |row| {
                Ok(StoredPrediction {
                    id: row.get(0)?,
                    predict: row.get(1)?,
                })
            })
            .map_err(read_error)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_error)
    }

    /// Number of rows in a stream.
    pub fn count(&self, stream: RecordStream) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", stream.table_name());
        let count: i64 = self
            .conn
            .lock()
            .query_row(&sql, [], |row| row.get(0))
            .map_err(read_error)?;
        Ok(count as u64)
    }

    /// Names of the user tables, sorted.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )
            .map_err(read_error)?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(read_error)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(read_error)
    }
}

impl RecordSink for PredictionStore {
    fn ensure_schema(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(SCHEMA)
            .map_err(|e| TriageError::PersistenceInit(format!("cannot create tables: {}", e)))?;
        debug!("Record streams ready");
        Ok(())
    }

    fn append(&self, batch: RecordBatch<'_>) -> Result<Vec<i64>> {
        let stream = batch.stream();
        let fail = |e: rusqlite::Error| TriageError::write_failed(stream.table_name(), e);

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(fail)?;
        let mut ids = Vec::with_capacity(batch.len());
        {
            match batch {
                RecordBatch::Features(records) => {
                    let mut stmt = tx
                        .prepare_cached(
                            "INSERT INTO Features (age, weight, height, exercise, sleep,
                                 sugar_intake, smoking, alcohol, married, profession, bmi)
                             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        )
                        .map_err(fail)?;
                    for r in records {
                        stmt.execute(params![
                            r.age,
                            r.weight,
                            r.height,
                            r.exercise,
                            r.sleep,
                            r.sugar_intake,
                            r.smoking,
                            r.alcohol,
                            r.married,
                            r.profession,
                            r.bmi,
                        ])
                        .map_err(fail)?;
                        ids.push(tx.last_insert_rowid());
                    }
                }
                RecordBatch::Predicts(results) => {
                    let mut stmt = tx
                        .prepare_cached("INSERT INTO Predicts (predict) VALUES (?1)")
                        .map_err(fail)?;
                    for r in results {
                        stmt.execute(params![r.label]).map_err(fail)?;
                        ids.push(tx.last_insert_rowid());
                    }
                }
            }
        }
        tx.commit().map_err(fail)?;

        debug!(stream = %stream, rows = ids.len(), "Appended records");
        Ok(ids)
    }

    fn ping(&self) -> Result<()> {
        self.conn
            .lock()
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(read_error)
    }
}

fn read_error(e: rusqlite::Error) -> TriageError {
    TriageError::PersistenceRead(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(profession: &str) -> FeatureRecord {
        FeatureRecord {
            age: 34,
            weight: 78,
            height: 175,
            exercise: "regular".into(),
            sleep: 7.5,
            sugar_intake: "low".into(),
            smoking: "no".into(),
            alcohol: "no".into(),
            married: "yes".into(),
            profession: profession.into(),
            bmi: 25.4,
        }
    }

    fn store() -> PredictionStore {
        let store = PredictionStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        store
    }

    #[test]
    fn test_ensure_schema_idempotent() {
        let store = store();
        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        assert_eq!(store.table_names().unwrap(), vec!["Features", "Predicts"]);
    }

    #[test]
    fn test_append_features_roundtrip() {
        let store = store();
        let ids = store
            .append_features(&[record("engineer"), record("teacher")])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let rows = store.features().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record, record("engineer"));
        assert_eq!(rows[1].record.profession, "teacher");
    }

    #[test]
    fn test_identity_keys_increase() {
        let store = store();
        let first = store.append_prediction(&PredictionResult::new("low")).unwrap();
        let second = store.append_prediction(&PredictionResult::new("high")).unwrap();
        assert!(second > first);
        assert_eq!(store.count(RecordStream::Predicts).unwrap(), 2);
        assert_eq!(store.predictions().unwrap()[1].predict, "high");
    }

    #[test]
    fn test_append_without_schema_fails() {
        let store = PredictionStore::open_in_memory().unwrap();
        let err = store.append_prediction(&PredictionResult::new("low")).unwrap_err();
        match err {
            TriageError::PersistenceWrite { stream, .. } => assert_eq!(stream, "Predicts"),
            other => panic!("expected write error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("risk.db");
        {
            let store = PredictionStore::open(&path).unwrap();
            store.ensure_schema().unwrap();
            store.append_features(&[record("doctor")]).unwrap();
        }

        let reopened = PredictionStore::open(&path).unwrap();
        reopened.ensure_schema().unwrap();
        assert_eq!(reopened.count(RecordStream::Features).unwrap(), 1);
        assert!(reopened.ping().is_ok());
    }
}
