use serde::{Deserialize, Serialize};

use super::enums::{LabFlag, LabStatus};

/// Reference interval printed next to a result. Either bound may be missing
/// (`< 200` only sets `max`, `> 40` only sets `min`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RefRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl RefRange {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Both bounds absent: no reference range known.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Compare a value against the interval. `None` when there is nothing to
    /// compare against.
    pub fn classify(&self, value: f64) -> Option<LabStatus> {
        if !value.is_finite() || self.is_empty() {
            return None;
        }
        if let Some(min) = self.min {
            if value < min {
                return Some(LabStatus::Bajo);
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(LabStatus::Alto);
            }
        }
        Some(LabStatus::Normal)
    }
}

/// One analyte line of a lab report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabResult {
    #[serde(default)]
    pub group: Option<String>,
    pub name: String,
    /// Name as it appeared on the report, before cleaning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_raw: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub value_as_string: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub ref_range: Option<RefRange>,
    #[serde(default)]
    pub flag: Option<LabFlag>,
    #[serde(default)]
    pub status: Option<LabStatus>,
    /// Source line(s), kept verbatim for audit.
    #[serde(default)]
    pub line: String,
}

impl LabResult {
    pub fn new(name: impl Into<String>, line: impl Into<String>) -> Self {
        Self {
            group: None,
            name: name.into(),
            name_raw: None,
            code: None,
            value: None,
            value_as_string: None,
            unit: None,
            ref_range: None,
            flag: None,
            status: None,
            line: line.into(),
        }
    }

    /// Recompute `status` (and the derived `flag`) from `value` and
    /// `ref_range`. Leaves both untouched when no numeric comparison is
    /// possible. Returns true when the status changed.
    pub fn recompute_status(&mut self) -> bool {
        let computed = match (self.value, self.ref_range) {
            (Some(value), Some(range)) => range.classify(value),
            _ => None,
        };
        match computed {
            Some(status) => {
                let changed = self.status != Some(status);
                self.status = Some(status);
                self.flag = status.flag();
                changed
            }
            None => false,
        }
    }

    /// Keep exactly one of `value` / `value_as_string` populated.
    pub fn normalize_value_fields(&mut self) {
        if self.value.is_some() {
            self.value_as_string = None;
        } else if let Some(text) = &self.value_as_string {
            if text.trim().is_empty() {
                self.value_as_string = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_two_sided_range() {
        let range = RefRange::between(70.0, 100.0);
        assert_eq!(range.classify(69.9), Some(LabStatus::Bajo));
        assert_eq!(range.classify(70.0), Some(LabStatus::Normal));
        assert_eq!(range.classify(100.0), Some(LabStatus::Normal));
        assert_eq!(range.classify(100.1), Some(LabStatus::Alto));
    }

    #[test]
    fn classify_half_open_ranges() {
        assert_eq!(RefRange::at_most(200.0).classify(250.0), Some(LabStatus::Alto));
        assert_eq!(RefRange::at_most(200.0).classify(10.0), Some(LabStatus::Normal));
        assert_eq!(RefRange::at_least(40.0).classify(35.0), Some(LabStatus::Bajo));
        assert_eq!(RefRange::at_least(40.0).classify(55.0), Some(LabStatus::Normal));
    }

    #[test]
    fn classify_empty_range_is_none() {
        assert_eq!(RefRange::default().classify(5.0), None);
        assert!(RefRange::default().is_empty());
    }

    #[test]
    fn classify_nan_is_none() {
        assert_eq!(RefRange::between(1.0, 2.0).classify(f64::NAN), None);
    }

    #[test]
    fn recompute_overrides_reported_status() {
        let mut result = LabResult::new("HEMOGLOBINA", "HEMOGLOBINA 20.0 13.5-17.5 g/dL");
        result.value = Some(20.0);
        result.ref_range = Some(RefRange::between(13.5, 17.5));
        result.status = Some(LabStatus::Normal);
        result.flag = Some(LabFlag::Low);

        assert!(result.recompute_status());
        assert_eq!(result.status, Some(LabStatus::Alto));
        assert_eq!(result.flag, Some(LabFlag::High));
    }

    #[test]
    fn recompute_without_range_keeps_reported_status() {
        let mut result = LabResult::new("PCR", "PCR positivo");
        result.status = Some(LabStatus::Alto);
        assert!(!result.recompute_status());
        assert_eq!(result.status, Some(LabStatus::Alto));
    }

    #[test]
    fn normal_status_clears_flag() {
        let mut result = LabResult::new("GLUCOSA", "GLUCOSA 95 H 70-100");
        result.value = Some(95.0);
        result.ref_range = Some(RefRange::between(70.0, 100.0));
        result.flag = Some(LabFlag::High);
        result.recompute_status();
        assert_eq!(result.flag, None);
    }

    #[test]
    fn numeric_value_wins_over_text() {
        let mut result = LabResult::new("GLUCOSA", "GLUCOSA 95");
        result.value = Some(95.0);
        result.value_as_string = Some("95".into());
        result.normalize_value_fields();
        assert!(result.value_as_string.is_none());
    }

    #[test]
    fn deserializes_with_missing_optionals() {
        let result: LabResult = serde_json::from_str(r#"{"name":"UREA","value":30}"#).unwrap();
        assert_eq!(result.name, "UREA");
        assert_eq!(result.value, Some(30.0));
        assert!(result.ref_range.is_none());
        assert!(result.line.is_empty());
    }
}
