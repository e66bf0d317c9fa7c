//! Seams to the surrounding application: where interpretations are stored
//! and where patient profiles come from.

use thiserror::Error;

use crate::models::{Interpretation, PatientProfile};

#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Receives every successful interpretation.
pub trait HistorySink: Send + Sync {
    fn persist(
        &self,
        user_id: Option<&str>,
        interpretation: &Interpretation,
    ) -> Result<(), CollaboratorError>;
}

/// Looks up the stored profile of a user.
pub trait ProfileLookup: Send + Sync {
    fn lookup(&self, user_id: &str) -> Result<Option<PatientProfile>, CollaboratorError>;
}
