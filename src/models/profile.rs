use serde::{Deserialize, Serialize};

/// Demographic and clinical context. Owned by the profile collaborator;
/// this crate only reads and forwards it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientProfile {
    pub age: Option<u32>,
    pub sex: Option<String>,
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub conditions: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
}

impl PatientProfile {
    pub fn is_empty(&self) -> bool {
        self.age.is_none()
            && self.sex.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.weight_kg.is_none()
            && self.height_cm.is_none()
            && self.conditions.is_empty()
            && self.medications.is_empty()
            && self.allergies.is_empty()
    }
}

/// Report-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabMetadata {
    /// ISO date (`YYYY-MM-DD`) when recognizable, otherwise as reported.
    pub collection_date: Option<String>,
    pub lab_name: Option<String>,
}

impl LabMetadata {
    pub fn is_empty(&self) -> bool {
        blank(&self.collection_date) && blank(&self.lab_name)
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}
