use serde::Deserialize;
use serde_json::{Map, Value};

use super::sanitize::sanitize_llm_output;
use super::StructuringError;
use crate::models::{
    AnalysisInput, LabFlag, LabMetadata, LabResult, LabStatus, PatientProfile, RefRange,
};

/// Narrative fields returned by the synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SynthesisOutput {
    pub summary: String,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub disclaimer: Option<String>,
}

/// Extract a JSON block from model output.
/// Handles fenced blocks and text before/after the JSON.
pub fn extract_json_block(response: &str) -> Result<&str, StructuringError> {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return Ok(after_fence[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            let block = after_fence[..end].trim();
            if block.starts_with('{') {
                return Ok(block);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return Ok(&trimmed[start..=end]);
        }
    }

    Err(StructuringError::MalformedResponse(
        "No JSON object found in response".into(),
    ))
}

fn parse_object(response: &str) -> Result<Map<String, Value>, StructuringError> {
    let cleaned = sanitize_llm_output(response);
    let block = extract_json_block(&cleaned)?;
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(StructuringError::MalformedResponse(
            "Top-level JSON is not an object".into(),
        )),
        Err(e) => Err(StructuringError::JsonParsing(e.to_string())),
    }
}

/// Parse one chunk-extraction response into a partial analysis input.
///
/// Accepts the fields at the top level or nested under `analysis_input`.
/// A missing `lab_results` array makes the whole response invalid; bad
/// items inside it are skipped. Statuses are recomputed from value and
/// range whenever both are present.
pub fn parse_chunk_response(response: &str) -> Result<AnalysisInput, StructuringError> {
    let mut root = parse_object(response)?;
    if let Some(Value::Object(nested)) = root.remove("analysis_input") {
        root = nested;
    }

    let items = match root.get("lab_results") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(StructuringError::ResponseParsing(
                "Response has no lab_results array".into(),
            ))
        }
    };

    let mut lab_results: Vec<LabResult> = items.iter().filter_map(lab_result_from_value).collect();
    for result in &mut lab_results {
        result.recompute_status();
        result.normalize_value_fields();
    }

    Ok(AnalysisInput {
        patient_profile: lenient::<PatientProfile>(root.get("patient_profile")),
        lab_metadata: lenient::<LabMetadata>(root.get("lab_metadata")),
        lab_results,
    })
}

/// Parse the synthesis response. An empty summary counts as a failure.
pub fn parse_synthesis_response(response: &str) -> Result<SynthesisOutput, StructuringError> {
    let root = parse_object(response)?;
    let output: SynthesisOutput = serde_json::from_value(Value::Object(root))
        .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;
    if output.summary.trim().is_empty() {
        return Err(StructuringError::ResponseParsing("Empty summary".into()));
    }
    Ok(output)
}

fn lenient<T: for<'de> Deserialize<'de> + Default>(value: Option<&Value>) -> T {
    value
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default()
}

// ── Item normalization ──────────────────────────────────────

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Number, or a string holding one (`"47,4"` included).
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    number_from(obj.get(key)?)
}

fn number_from(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn ref_range_from(obj: &Map<String, Value>) -> Option<RefRange> {
    let (min, max) = match obj.get("ref_range") {
        Some(Value::Object(range)) => (
            number_field(range, "min").or_else(|| number_field(range, "low")),
            number_field(range, "max").or_else(|| number_field(range, "high")),
        ),
        _ => (number_field(obj, "ref_low"), number_field(obj, "ref_high")),
    };
    let range = RefRange { min, max };
    (!range.is_empty()).then_some(range)
}

/// One `lab_results` item. `None` skips the item.
fn lab_result_from_value(value: &Value) -> Option<LabResult> {
    let obj = value.as_object()?;
    let name = text_field(obj, "name")?;
    let line = text_field(obj, "line").unwrap_or_default();
    let mut result = LabResult::new(name.to_uppercase(), line);

    result.group = text_field(obj, "group");
    result.code = text_field(obj, "code");
    result.unit = text_field(obj, "unit");
    result.ref_range = ref_range_from(obj);

    match obj.get("value") {
        Some(v @ (Value::Number(_) | Value::String(_))) => match number_from(v) {
            Some(n) => result.value = Some(n),
            None => result.value_as_string = v.as_str().map(|s| s.trim().to_string()),
        },
        _ => {}
    }
    if result.value.is_none() {
        result.value_as_string = result
            .value_as_string
            .take()
            .or_else(|| text_field(obj, "value_as_string"));
    }
    if result.value.is_none() && result.value_as_string.is_none() {
        return None;
    }

    result.status = text_field(obj, "status").and_then(|s| LabStatus::from_label(&s));
    result.flag = text_field(obj, "flag_from_lab")
        .or_else(|| text_field(obj, "flag"))
        .and_then(|f| LabFlag::from_glyph(&f))
        .or_else(|| result.status.and_then(|s| s.flag()));
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_block_from_fenced() {
        let response = "Here:\n```json\n{\"a\": 1}\n```\nDone";
        assert_eq!(extract_json_block(response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn extract_json_block_from_bare() {
        assert_eq!(extract_json_block("noise {\"a\": {\"b\": 2}} tail").unwrap(), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn extract_json_block_no_json() {
        assert!(matches!(
            extract_json_block("no json here"),
            Err(StructuringError::MalformedResponse(_))
        ));
    }

    #[test]
    fn chunk_response_flat_ref_fields() {
        let response = r#"{
            "patient_profile": {"age": 52, "sex": "F"},
            "lab_metadata": {"collection_date": "2024-05-12", "lab_name": null},
            "lab_results": [
                {"name": "Glucosa", "value": 130, "unit": "mg/dL", "ref_low": 70, "ref_high": 100,
                 "status": "normal", "line": "GLUCOSA 130 70-100 mg/dL"}
            ]
        }"#;
        let input = parse_chunk_response(response).unwrap();
        assert_eq!(input.patient_profile.age, Some(52));
        assert_eq!(input.lab_metadata.collection_date.as_deref(), Some("2024-05-12"));
        let r = &input.lab_results[0];
        assert_eq!(r.name, "GLUCOSA");
        assert_eq!(r.ref_range, Some(RefRange::between(70.0, 100.0)));
        // reported "normal" is overridden by the numbers
        assert_eq!(r.status, Some(LabStatus::Alto));
        assert_eq!(r.flag, Some(LabFlag::High));
    }

    #[test]
    fn chunk_response_nested_under_analysis_input() {
        let response = r#"```json
        {"analysis_input": {"lab_results": [
            {"name": "UREA", "value": "30,5", "ref_range": {"min": "10", "max": 50}}
        ]}}
        ```"#;
        let input = parse_chunk_response(response).unwrap();
        assert_eq!(input.lab_results[0].value, Some(30.5));
        assert_eq!(input.lab_results[0].status, Some(LabStatus::Normal));
    }

    #[test]
    fn qualitative_value_kept_as_string() {
        let response = r#"{"lab_results": [{"name": "VIH", "value": "No reactivo"}]}"#;
        let r = &parse_chunk_response(response).unwrap().lab_results[0];
        assert!(r.value.is_none());
        assert_eq!(r.value_as_string.as_deref(), Some("No reactivo"));
    }

    #[test]
    fn bad_items_skipped() {
        let response = r#"{"lab_results": [
            {"value": 5},
            "not an object",
            {"name": "SIN VALOR"},
            {"name": "SODIO", "value": 140}
        ]}"#;
        let input = parse_chunk_response(response).unwrap();
        assert_eq!(input.lab_results.len(), 1);
        assert_eq!(input.lab_results[0].name, "SODIO");
    }

    #[test]
    fn missing_lab_results_is_error() {
        let err = parse_chunk_response(r#"{"summary": "x"}"#).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn truncated_json_is_error() {
        let err = parse_chunk_response(r#"{"lab_results": [{"name": "GLU"#).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn lab_flag_used_when_no_status_computable() {
        let response = r#"{"lab_results": [{"name": "PCR", "value": 12, "flag_from_lab": "H"}]}"#;
        let r = &parse_chunk_response(response).unwrap().lab_results[0];
        assert_eq!(r.flag, Some(LabFlag::High));
        assert!(r.status.is_none());
    }

    #[test]
    fn malformed_profile_falls_back_to_default() {
        let response = r#"{"patient_profile": "unknown", "lab_results": []}"#;
        let input = parse_chunk_response(response).unwrap();
        assert!(input.patient_profile.is_empty());
    }

    #[test]
    fn synthesis_response_parsed() {
        let response = r#"{"summary": "Glucosa elevada.", "warnings": ["Glucosa alta"],
            "recommendations": [], "disclaimer": "No reemplaza consulta."}"#;
        let out = parse_synthesis_response(response).unwrap();
        assert_eq!(out.summary, "Glucosa elevada.");
        assert_eq!(out.warnings, vec!["Glucosa alta".to_string()]);
        assert_eq!(out.disclaimer.as_deref(), Some("No reemplaza consulta."));
    }

    #[test]
    fn synthesis_without_summary_is_error() {
        assert!(parse_synthesis_response(r#"{"warnings": []}"#).is_err());
        assert!(parse_synthesis_response("not json").is_err());
    }
}
