//! Deterministic extraction: normalize → segment → parse.
//!
//! Used directly by `/ocr/parse`, and as the draft that seeds model-assisted
//! extraction when the caller does not send one.

pub mod lab_parser;
pub mod metadata;
pub mod normalize;
pub mod segment;
pub mod vocabulary;

use serde::Serialize;

pub use lab_parser::parse_row;
pub use metadata::extract_lab_metadata;
pub use normalize::{normalize_document, normalize_line};
pub use segment::{segment_rows, LogicalRow, RowSegmenter};
pub use vocabulary::RULESET_VERSION;

use crate::models::{AnalysisInput, LabMetadata, LabResult, PatientProfile};

/// Output of a deterministic parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedReport {
    pub ruleset_version: &'static str,
    /// Normalized, non-empty lines.
    pub lines: Vec<String>,
    pub lab_metadata: LabMetadata,
    pub lab_results: Vec<LabResult>,
}

impl ParsedReport {
    /// Wrap as an analysis input under the given profile.
    pub fn into_analysis_input(self, patient_profile: PatientProfile) -> AnalysisInput {
        AnalysisInput {
            patient_profile,
            lab_metadata: self.lab_metadata,
            lab_results: self.lab_results,
        }
    }
}

/// Parse raw OCR text.
pub fn parse_lab_report(text: &str) -> ParsedReport {
    parse_lines(normalize_document(text))
}

/// Parse lines that are already normalized.
pub fn parse_lines(lines: Vec<String>) -> ParsedReport {
    let rows = segment_rows(&lines);
    let lab_results: Vec<LabResult> = rows
        .iter()
        .filter_map(|row| {
            let mut result = parse_row(&row.text)?;
            result.group = row.group.clone();
            Some(result)
        })
        .collect();
    let lab_metadata = extract_lab_metadata(&lines);

    tracing::debug!(
        lines = lines.len(),
        rows = rows.len(),
        results = lab_results.len(),
        ruleset = RULESET_VERSION,
        "Deterministic parse complete"
    );

    ParsedReport {
        ruleset_version: RULESET_VERSION,
        lines,
        lab_metadata,
        lab_results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LabFlag, LabStatus, RefRange};

    const REPORT: &str = "LABORATORIO CLINICO SAN JOSE\n\
        Paciente: Ana Torres   Edad: 45 años\n\
        Fecha de toma: 12/05/2024\n\
        Examen            Resultado   Unidades   Valores de referencia\n\
        HEMOGRAMA\n\
        HEMOGLOBINA       20,0        g/dL       13,5 - 17,5\n\
        LEUCOCITOS        7,2 x10^3/uL 4,0-10,0\n\
        BIOQUIMICA\n\
        GLUCOSA U.d.A. 95 70-100 mg/dL\n\
        COLESTEROL LDL    160 mg/dL  < 130\n\
        VIH 1/2 NO REACTIVO\n\
        Validado por: Dra. Pérez\n\
        Página 1 de 1";

    fn find<'a>(report: &'a ParsedReport, name: &str) -> &'a LabResult {
        report
            .lab_results
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("{name} not parsed: {:?}", report.lab_results))
    }

    #[test]
    fn full_report_parses() {
        let report = parse_lab_report(REPORT);
        assert_eq!(report.ruleset_version, RULESET_VERSION);
        assert_eq!(report.lab_results.len(), 5);

        let hb = find(&report, "HEMOGLOBINA");
        assert_eq!(hb.value, Some(20.0));
        assert_eq!(hb.ref_range, Some(RefRange::between(13.5, 17.5)));
        assert_eq!(hb.status, Some(LabStatus::Alto));
        assert_eq!(hb.flag, Some(LabFlag::High));
        assert_eq!(hb.group.as_deref(), Some("HEMOGRAMA"));

        let wbc = find(&report, "LEUCOCITOS");
        assert_eq!(wbc.unit.as_deref(), Some("x10^3/µL"));

        let glucose = find(&report, "GLUCOSA");
        assert_eq!(glucose.value, Some(95.0));
        assert_eq!(glucose.group.as_deref(), Some("BIOQUIMICA"));

        let ldl = find(&report, "COLESTEROL LDL");
        assert_eq!(ldl.status, Some(LabStatus::Alto));

        let hiv = find(&report, "VIH 1/2");
        assert_eq!(hiv.value_as_string.as_deref(), Some("NO REACTIVO"));
    }

    #[test]
    fn metadata_extracted_alongside_results() {
        let report = parse_lab_report(REPORT);
        assert_eq!(report.lab_metadata.collection_date.as_deref(), Some("2024-05-12"));
        assert_eq!(
            report.lab_metadata.lab_name.as_deref(),
            Some("LABORATORIO CLINICO SAN JOSE")
        );
    }

    #[test]
    fn multiline_glucose_parses() {
        let report = parse_lab_report("GLUCOSA\n95\n70-100\nmg/dL");
        assert_eq!(report.lab_results.len(), 1);
        let r = &report.lab_results[0];
        assert_eq!(r.name, "GLUCOSA");
        assert_eq!(r.value, Some(95.0));
        assert_eq!(r.ref_range, Some(RefRange::between(70.0, 100.0)));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.status, Some(LabStatus::Normal));
    }

    #[test]
    fn every_result_has_exactly_one_value_field() {
        let report = parse_lab_report(REPORT);
        for r in &report.lab_results {
            assert!(r.value.is_some() ^ r.value_as_string.is_some(), "{r:?}");
        }
    }

    #[test]
    fn statuses_match_ranges() {
        let report = parse_lab_report(REPORT);
        for r in &report.lab_results {
            if let (Some(v), Some(range)) = (r.value, r.ref_range) {
                assert_eq!(r.status, range.classify(v), "{r:?}");
            }
        }
    }

    #[test]
    fn empty_text_yields_nothing() {
        let report = parse_lab_report("   \n\n");
        assert!(report.lines.is_empty());
        assert!(report.lab_results.is_empty());
        assert!(report.lab_metadata.is_empty());
    }
}
