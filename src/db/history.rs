use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::sqlite::{open_database, open_memory_database};
use super::DatabaseError;
use crate::models::{Interpretation, PatientProfile};
use crate::pipeline::{CollaboratorError, HistorySink, ProfileLookup};

/// One stored interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub interpretation: Interpretation,
}

/// SQLite-backed interpretation history and profile store.
pub struct SqliteHistoryStore {
    conn: Mutex<Connection>,
}

impl SqliteHistoryStore {
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_database(path)?))
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        Ok(Self::from_connection(open_memory_database()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)
    }

    /// Insert one interpretation and return its id.
    pub fn save_interpretation(
        &self,
        user_id: Option<&str>,
        interpretation: &Interpretation,
    ) -> Result<Uuid, DatabaseError> {
        let id = Uuid::new_v4();
        let json = serde_json::to_string(interpretation)?;
        let result_count = interpretation.analysis_input.lab_results.len() as i64;

        self.conn()?.execute(
            "INSERT INTO interpretations (id, user_id, created_at, result_count, interpretation_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id.to_string(), user_id, Utc::now().to_rfc3339(), result_count, json],
        )?;
        Ok(id)
    }

    /// Most recent interpretations of a user, newest first.
    pub fn list_history(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryRecord>, DatabaseError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, created_at, interpretation_json FROM interpretations
             WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, user_id, created_at, json) = row?;
            records.push(HistoryRecord {
                id: Uuid::parse_str(&id).map_err(|_| DatabaseError::InvalidId(id.clone()))?,
                user_id,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|_| DatabaseError::InvalidTimestamp(created_at.clone()))?
                    .with_timezone(&Utc),
                interpretation: serde_json::from_str(&json)?,
            });
        }
        Ok(records)
    }

    /// Insert or replace a user's stored profile.
    pub fn save_profile(&self, user_id: &str, profile: &PatientProfile) -> Result<(), DatabaseError> {
        let json = serde_json::to_string(profile)?;
        self.conn()?.execute(
            "INSERT INTO patient_profiles (user_id, profile_json, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET profile_json = excluded.profile_json,
                                                updated_at = excluded.updated_at",
            params![user_id, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: &str) -> Result<Option<PatientProfile>, DatabaseError> {
        let json: Option<String> = self
            .conn()?
            .query_row(
                "SELECT profile_json FROM patient_profiles WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j).map_err(DatabaseError::from))
            .transpose()
    }
}

impl HistorySink for SqliteHistoryStore {
    fn persist(
        &self,
        user_id: Option<&str>,
        interpretation: &Interpretation,
    ) -> Result<(), CollaboratorError> {
        self.save_interpretation(user_id, interpretation)
            .map(|_| ())
            .map_err(|e| CollaboratorError::Storage(e.to_string()))
    }
}

impl ProfileLookup for SqliteHistoryStore {
    fn lookup(&self, user_id: &str) -> Result<Option<PatientProfile>, CollaboratorError> {
        self.get_profile(user_id)
            .map_err(|e| CollaboratorError::Storage(e.to_string()))
    }
}
