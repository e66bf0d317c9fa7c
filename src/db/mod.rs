pub mod history;
pub mod sqlite;

pub use history::*;
pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Invalid stored id: {0}")]
    InvalidId(String),

    #[error("Invalid stored timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Database lock poisoned")]
    LockPoisoned,
}
