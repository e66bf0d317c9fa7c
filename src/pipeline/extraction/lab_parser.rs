//! Lab item parser: one logical row → at most one `LabResult`.
//!
//! Strategies run in order and the first success wins:
//! 1. range-first (`VALUE LOW-HIGH UNIT`)
//! 2. bounded inequality (`VALUE < BOUND`)
//! 3. value-only (`NAME VALUE [UNIT]`)
//! 4. qualitative (`NAME NEGATIVO`)
//!
//! The segmenter is deliberately permissive, so every strategy funnels its
//! candidate name through the same cleaning and rejection rules.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use super::vocabulary::{
    contains_ci, is_method_word, BANNED_NAMES, BANNED_NAME_PREFIXES, KNOWN_UNITS,
    QUALITATIVE_VALUES,
};
use crate::models::{LabFlag, LabResult, RefRange};

// No trailing boundary: OCR often glues the unit to the number (`17.9g/dL`).
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?").expect("valid regex"));
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?P<low>\d+(?:\.\d+)?)\s*(?:[-‐‑–—]|\bto\b|\ba\b)\s*(?P<high>\d+(?:\.\d+)?)")
        .expect("valid regex")
});
static COMPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<op><=|>=|≤|≥|<|>)\s*(?P<bound>\d+(?:\.\d+)?)").expect("valid regex")
});
static QUALITATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = QUALITATIVE_VALUES
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).expect("valid regex")
});

/// A numeric token located in a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct NumberToken {
    pub span: (usize, usize),
    pub value: f64,
}

/// A `low–high` range located in a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RangeToken {
    pub span: (usize, usize),
    pub low: f64,
    pub high: f64,
}

/// Numbers that can stand as a value. Exponents and unit fragments
/// (`^3`, `/2`, `1/`) are skipped.
pub(crate) fn numbers_in(text: &str) -> Vec<NumberToken> {
    NUMBER_RE
        .find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            !matches!(before, Some('^' | '/')) && !matches!(after, Some('/' | '^'))
        })
        .filter_map(|m| {
            m.as_str().parse::<f64>().ok().map(|value| NumberToken {
                span: (m.start(), m.end()),
                value,
            })
        })
        .collect()
}

/// Ranges in reading order. Matches with `low > high` are not ranges
/// (dates such as `12-05-2024` produce them) and are skipped.
pub(crate) fn ranges_in(text: &str) -> Vec<RangeToken> {
    let mut ranges = Vec::new();
    let mut from = 0;
    while from < text.len() {
        let Some(caps) = RANGE_RE.captures_at(text, from) else {
            break;
        };
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((from, from));
        let low = caps.name("low").and_then(|m| m.as_str().parse::<f64>().ok());
        let high = caps.name("high").and_then(|m| m.as_str().parse::<f64>().ok());
        match (low, high) {
            (Some(low), Some(high)) if low <= high => {
                ranges.push(RangeToken { span: whole, low, high });
                from = whole.1;
            }
            _ => {
                // Retry from the next number so `12-05-2024` can still yield `05-2024`.
                let low_end = caps.name("low").map(|m| m.end()).unwrap_or(whole.1);
                from = next_char_boundary(text, low_end.max(whole.0 + 1));
            }
        }
    }
    ranges
}

fn next_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

/// True when the row contains a numeric range or a bounded inequality.
pub(crate) fn has_range_token(text: &str) -> bool {
    !ranges_in(text).is_empty() || COMPARATOR_RE.is_match(text)
}

/// True when the row contains a qualitative result word.
pub(crate) fn has_qualitative_value(text: &str) -> bool {
    QUALITATIVE_RE.is_match(text)
}

/// Unit-shaped token: a known unit, anything with `/ % ^ µ`, or a short
/// alphabetic token (`fL`, `pg`, `U`, `seg`).
pub(crate) fn is_unit_token(token: &str) -> bool {
    let token = token.trim_matches(|c: char| c == ',' || c == ';');
    if token.is_empty() || token.chars().count() > 16 {
        return false;
    }
    if contains_ci(KNOWN_UNITS, token) {
        return true;
    }
    if is_method_word(token) || LabFlag::from_glyph(token).is_some() {
        return false;
    }
    let shaped = token
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '%' | '/' | '^' | '.' | '-' | 'µ'));
    if !shaped || !token.chars().any(|c| c.is_alphabetic() || c == '%') {
        return false;
    }
    // Short all-caps tokens are analyte abbreviations (TSH, LDL), not units.
    token.contains(['/', '%', '^', 'µ'])
        || (token.chars().count() <= 4
            && token.chars().all(char::is_alphabetic)
            && token.chars().any(char::is_lowercase))
}

/// First unit-shaped token in a text fragment, skipping flag glyphs.
fn first_unit_in(fragment: &str) -> Option<String> {
    fragment
        .split_whitespace()
        .find(|t| is_unit_token(t))
        .map(|t| t.trim_matches(|c: char| c == ',' || c == ';').to_string())
}

/// Standalone flag glyph (`H`, `L`, `↑`, `↓`). The `L` of `mmol/L` does not count.
fn flag_in(fragment: &str) -> Option<LabFlag> {
    fragment
        .split_whitespace()
        .filter(|t| matches!(*t, "H" | "L" | "↑" | "↓"))
        .find_map(LabFlag::from_glyph)
}

/// Strip method words, decorations and comparators; collapse whitespace.
/// Returns the cleaned name (not yet uppercased).
pub fn clean_name(segment: &str) -> String {
    let kept: Vec<&str> = segment
        .split_whitespace()
        .filter(|t| !is_method_word(t))
        .collect();
    let joined = kept.join(" ");
    let stripped: String = joined
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '#' | '*' | '<' | '>' | '=' | '≤' | '≥' | '↑' | '↓'))
        .collect();
    stripped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| matches!(c, ':' | '.' | '-' | ',' | ';') || c.is_whitespace())
        .to_string()
}

/// Rejection rules shared by all strategies.
pub fn is_acceptable_name(name: &str) -> bool {
    if !name.chars().any(char::is_alphabetic) {
        return false;
    }
    if name.chars().filter(|c| !c.is_whitespace()).count() <= 1 {
        return false;
    }
    let upper = name.to_uppercase();
    if BANNED_NAMES.iter().any(|b| *b == upper) {
        return false;
    }
    if BANNED_NAME_PREFIXES
        .iter()
        .any(|p| starts_with_word(&upper, p))
    {
        return false;
    }
    // Pure methodology rows ("CLIA", "ENZIMATICO") clean down to nothing
    // upstream; a name made only of method words is rejected here too.
    !upper.split_whitespace().all(is_method_word)
}

/// `text` starts with `prefix` followed by a non-alphanumeric char or the end.
pub(crate) fn starts_with_word(text: &str, prefix: &str) -> bool {
    text.strip_prefix(prefix)
        .is_some_and(|rest| rest.chars().next().map_or(true, |c| !c.is_alphanumeric()))
}

/// Build the named result skeleton or reject the row.
fn named_result(row: &str, name_segment: &str) -> Option<LabResult> {
    let name_raw = name_segment.trim();
    let cleaned = clean_name(name_raw);
    if !is_acceptable_name(&cleaned) {
        return None;
    }
    let mut result = LabResult::new(cleaned.to_uppercase(), row);
    result.name_raw = Some(name_raw.to_string());
    Some(result)
}

fn span_inside(span: (usize, usize), outer: &Range<usize>) -> bool {
    span.0 >= outer.start && span.1 <= outer.end
}

/// Strategy 1: locate `low–high`; the nearest number before it is the value.
fn parse_range_first(row: &str) -> Option<LabResult> {
    let range = ranges_in(row).into_iter().next()?;
    let (range_start, range_end) = range.span;

    let value = numbers_in(&row[..range_start]).into_iter().next_back()?;
    let mut result = named_result(row, &row[..value.span.0])?;

    let between = &row[value.span.1..range_start];
    let tail = &row[range_end..];
    let ocr_flag = flag_in(between).or_else(|| flag_in(tail));

    result.value = Some(value.value);
    result.ref_range = Some(RefRange::between(range.low, range.high));
    result.unit = first_unit_in(tail).or_else(|| first_unit_in(between));
    result.recompute_status();

    if ocr_flag.is_some() && ocr_flag != result.flag {
        tracing::trace!(
            ocr_flag = ?ocr_flag,
            computed = ?result.flag,
            "OCR flag glyph disagrees with computed status"
        );
    }
    Some(result)
}

/// Strategy 2: single comparator and bound → half-open reference range.
fn parse_bounded_inequality(row: &str) -> Option<LabResult> {
    let caps = COMPARATOR_RE.captures(row)?;
    let whole = caps.get(0)?;
    let op = caps.name("op")?.as_str();
    let bound: f64 = caps.name("bound")?.as_str().parse().ok()?;

    let value = numbers_in(&row[..whole.start()]).into_iter().next_back()?;
    let mut result = named_result(row, &row[..value.span.0])?;

    let range = match op {
        "<" | "<=" | "≤" => RefRange::at_most(bound),
        _ => RefRange::at_least(bound),
    };

    let between = &row[value.span.1..whole.start()];
    let tail = &row[whole.end()..];
    result.value = Some(value.value);
    result.ref_range = Some(range);
    result.unit = first_unit_in(between).or_else(|| first_unit_in(tail));
    result.recompute_status();
    Some(result)
}

/// Strategy 3: first number outside any range is the value; no range.
fn parse_value_only(row: &str) -> Option<LabResult> {
    let range_spans: Vec<Range<usize>> = ranges_in(row)
        .into_iter()
        .map(|r| r.span.0..r.span.1)
        .collect();
    let value = numbers_in(row)
        .into_iter()
        .find(|n| !range_spans.iter().any(|r| span_inside(n.span, r)))?;
    let mut result = named_result(row, &row[..value.span.0])?;

    let tail = &row[value.span.1..];
    result.value = Some(value.value);
    result.unit = first_unit_in(tail);
    result.flag = flag_in(tail);
    Some(result)
}

/// Strategy 4: qualitative value (`NEGATIVO`, `NO REACTIVO`, ...).
fn parse_qualitative(row: &str) -> Option<LabResult> {
    let found = QUALITATIVE_RE.find(row)?;
    let mut result = named_result(row, &row[..found.start()])?;
    result.value_as_string = Some(found.as_str().to_uppercase());
    Some(result)
}

/// Parse one logical row. `None` means the row is skipped, which is an
/// expected outcome for noise that survived segmentation.
pub fn parse_row(row: &str) -> Option<LabResult> {
    let row = row.trim();
    if row.len() < 3 {
        return None;
    }
    parse_range_first(row)
        .or_else(|| parse_bounded_inequality(row))
        .or_else(|| parse_value_only(row))
        .or_else(|| parse_qualitative(row))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LabStatus;

    #[test]
    fn range_first_basic_row() {
        let r = parse_row("GLUCOSA 95 70-100 mg/dL").unwrap();
        assert_eq!(r.name, "GLUCOSA");
        assert_eq!(r.value, Some(95.0));
        assert_eq!(r.ref_range, Some(RefRange::between(70.0, 100.0)));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.status, Some(LabStatus::Normal));
        assert_eq!(r.flag, None);
        assert_eq!(r.line, "GLUCOSA 95 70-100 mg/dL");
    }

    #[test]
    fn high_value_is_alto_with_h_flag() {
        let r = parse_row("HEMOGLOBINA 20.0 13.5-17.5 g/dL").unwrap();
        assert_eq!(r.status, Some(LabStatus::Alto));
        assert_eq!(r.flag, Some(LabFlag::High));
        assert_eq!(r.unit.as_deref(), Some("g/dL"));
    }

    #[test]
    fn computed_status_overrides_ocr_glyph() {
        let r = parse_row("HEMOGLOBINA 20.0 L 13.5-17.5 g/dL").unwrap();
        assert_eq!(r.status, Some(LabStatus::Alto));
        assert_eq!(r.flag, Some(LabFlag::High));

        let r = parse_row("GLUCOSA 60 ↑ 70-100 mg/dL").unwrap();
        assert_eq!(r.status, Some(LabStatus::Bajo));
        assert_eq!(r.flag, Some(LabFlag::Low));
    }

    #[test]
    fn status_boundaries_inclusive() {
        assert_eq!(parse_row("UREA 10 10-50 mg/dL").unwrap().status, Some(LabStatus::Normal));
        assert_eq!(parse_row("UREA 50 10-50 mg/dL").unwrap().status, Some(LabStatus::Normal));
        assert_eq!(parse_row("UREA 9.9 10-50 mg/dL").unwrap().status, Some(LabStatus::Bajo));
    }

    #[test]
    fn value_never_taken_from_inside_range() {
        assert!(parse_row("GLUCOSA 70-100 mg/dL").is_none());

        let r = parse_row("GLUCOSA 130 70-100 mg/dL").unwrap();
        assert_eq!(r.value, Some(130.0));
        assert_eq!(r.ref_range, Some(RefRange::between(70.0, 100.0)));
    }

    #[test]
    fn unit_glued_to_decimal_value() {
        let r = parse_row("HEMOGLOBINA 17.9g/dL 13.5-17.5").unwrap();
        assert_eq!(r.value, Some(17.9));
        assert_eq!(r.unit.as_deref(), Some("g/dL"));
        assert_eq!(r.status, Some(LabStatus::Alto));
    }

    #[test]
    fn unit_glued_to_integer_value() {
        let r = parse_row("GLUCOSA 95mg/dL 70-100").unwrap();
        assert_eq!(r.name, "GLUCOSA");
        assert_eq!(r.value, Some(95.0));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.status, Some(LabStatus::Normal));
    }

    #[test]
    fn unit_glued_to_range_high_bound() {
        let r = parse_row("HEMOGLOBINA 20.0 13.5-17.5g/dL").unwrap();
        assert_eq!(r.ref_range, Some(RefRange::between(13.5, 17.5)));
        assert_eq!(r.unit.as_deref(), Some("g/dL"));
        assert_eq!(r.status, Some(LabStatus::Alto));
    }

    #[test]
    fn unit_glued_to_value_only() {
        let r = parse_row("FERRITINA 85ng/mL").unwrap();
        assert_eq!(r.value, Some(85.0));
    }

    #[test]
    fn range_variants_dash_and_words() {
        let r = parse_row("SODIO 140 135 – 145 mmol/L").unwrap();
        assert_eq!(r.ref_range, Some(RefRange::between(135.0, 145.0)));
        let r = parse_row("POTASIO 4.2 3.5 a 5.1 mmol/L").unwrap();
        assert_eq!(r.ref_range, Some(RefRange::between(3.5, 5.1)));
        let r = parse_row("CALCIO 9.1 8.5 to 10.5 mg/dL").unwrap();
        assert_eq!(r.ref_range, Some(RefRange::between(8.5, 10.5)));
    }

    #[test]
    fn digits_inside_name_are_not_values() {
        let r = parse_row("VITAMINA B12 350 200-900 pg/mL").unwrap();
        assert_eq!(r.name, "VITAMINA B12");
        assert_eq!(r.value, Some(350.0));
    }

    #[test]
    fn exponent_unit_between_value_and_range() {
        let r = parse_row("LEUCOCITOS 7.2 x10^3/µL 4.0-10.0").unwrap();
        assert_eq!(r.value, Some(7.2));
        assert_eq!(r.unit.as_deref(), Some("x10^3/µL"));
        assert_eq!(r.status, Some(LabStatus::Normal));
    }

    #[test]
    fn method_words_stripped_from_name() {
        let r = parse_row("TSH CLIA 2.1 0.4-4.0 µUI/mL").unwrap();
        assert_eq!(r.name, "TSH");
        assert_eq!(r.name_raw.as_deref(), Some("TSH CLIA"));
    }

    #[test]
    fn decorations_stripped_and_uppercased() {
        let r = parse_row("Colesterol (total)# 180 0-200 mg/dL").unwrap();
        assert_eq!(r.name, "COLESTEROL TOTAL");
    }

    #[test]
    fn bounded_inequality_upper_bound() {
        let r = parse_row("COLESTEROL LDL 160 mg/dL < 130").unwrap();
        assert_eq!(r.name, "COLESTEROL LDL");
        assert_eq!(r.value, Some(160.0));
        assert_eq!(r.ref_range, Some(RefRange::at_most(130.0)));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
        assert_eq!(r.status, Some(LabStatus::Alto));
    }

    #[test]
    fn bounded_inequality_lower_bound() {
        let r = parse_row("HDL 35 > 40 mg/dL").unwrap();
        assert_eq!(r.ref_range, Some(RefRange::at_least(40.0)));
        assert_eq!(r.status, Some(LabStatus::Bajo));
        assert_eq!(r.unit.as_deref(), Some("mg/dL"));
    }

    #[test]
    fn value_only_fallback() {
        let r = parse_row("FERRITINA 85 ng/mL").unwrap();
        assert_eq!(r.value, Some(85.0));
        assert_eq!(r.unit.as_deref(), Some("ng/mL"));
        assert!(r.ref_range.is_none());
        assert!(r.status.is_none());
    }

    #[test]
    fn value_only_keeps_ocr_flag() {
        let r = parse_row("PCR 12 H mg/L").unwrap();
        assert_eq!(r.flag, Some(LabFlag::High));
        assert_eq!(r.unit.as_deref(), Some("mg/L"));
        assert!(r.status.is_none());
    }

    #[test]
    fn liter_unit_is_not_a_low_flag() {
        let r = parse_row("UREA 30 mmol/L").unwrap();
        assert_eq!(r.flag, None);
        assert_eq!(r.unit.as_deref(), Some("mmol/L"));
    }

    #[test]
    fn qualitative_value() {
        let r = parse_row("VIH 1/2 NO REACTIVO").unwrap();
        assert_eq!(r.name, "VIH 1/2");
        assert!(r.value.is_none());
        assert_eq!(r.value_as_string.as_deref(), Some("NO REACTIVO"));
    }

    #[test]
    fn rejects_name_without_letters() {
        assert!(parse_row("12 45 10-50").is_none());
    }

    #[test]
    fn rejects_single_character_name() {
        assert!(parse_row("K 4.2 3.5-5.1").is_none());
    }

    #[test]
    fn rejects_banned_names() {
        assert!(parse_row("RESULTADO 95 70-100").is_none());
        assert!(parse_row("Edad: 45 años").is_none());
        assert!(parse_row("Fecha 12/05/2024").is_none());
        assert!(parse_row("CLIA 5 1-10").is_none());
    }

    #[test]
    fn date_like_dash_triples_do_not_become_ranges() {
        let ranges = ranges_in("12-05-2024");
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].low, 5.0);
        assert_eq!(ranges[0].high, 2024.0);
    }

    #[test]
    fn unit_token_shapes() {
        assert!(is_unit_token("mg/dL"));
        assert!(is_unit_token("%"));
        assert!(is_unit_token("fL"));
        assert!(is_unit_token("x10^3/µL"));
        assert!(!is_unit_token("ENZIMATICO"));
        assert!(!is_unit_token("H"));
        assert!(!is_unit_token("95"));
        assert!(!is_unit_token("GLUCOSA"));
        assert!(!is_unit_token("TSH"));
    }

    #[test]
    fn exponent_digits_are_not_numbers() {
        let nums: Vec<f64> = numbers_in("7.2 x10^3/µL").iter().map(|n| n.value).collect();
        assert_eq!(nums, vec![7.2]);
    }
}
