use serde::{Deserialize, Serialize};

use super::enums::ChunkStatus;
use super::lab::LabResult;
use super::profile::{LabMetadata, PatientProfile};

/// Canonical structured artifact. Both the deterministic parse and the
/// model-assisted extraction converge to this shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisInput {
    pub patient_profile: PatientProfile,
    pub lab_metadata: LabMetadata,
    pub lab_results: Vec<LabResult>,
}

/// Outcome of extracting one chunk. Consumed once by the merge step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub index: usize,
    pub status: ChunkStatus,
    pub partial: Option<AnalysisInput>,
}

impl ChunkResult {
    pub fn succeeded(index: usize, partial: AnalysisInput) -> Self {
        Self {
            index,
            status: ChunkStatus::Ok,
            partial: Some(partial),
        }
    }

    pub fn failed(index: usize) -> Self {
        Self {
            index,
            status: ChunkStatus::Failed,
            partial: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ChunkStatus::Ok && self.partial.is_some()
    }
}

/// Final artifact returned to the caller and handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    pub analysis_input: AnalysisInput,
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub disclaimer: String,
}
