//! Canonicalization of raw OCR line text.
//!
//! Rules run in a fixed order and are idempotent: normalizing an already
//! normalized line returns it unchanged.

use std::sync::LazyLock;

use regex::Regex;

/// Canonical micro sign used in units (U+00B5).
pub const MICRO: char = 'µ';

static NOISE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bU\.?d\.?A\.?(?:\s|$)").expect("valid regex"));
static TT_FLAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTt\b").expect("valid regex"));
static MICRO_UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:u|mc)(L|g/|mol|UI|IU)").expect("valid regex")
});
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Normalize one raw OCR line. Never fails; may return an empty string.
pub fn normalize_line(raw: &str) -> String {
    let mut text: String = raw
        .chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{2007}' | '\u{202F}' | '\t' => ' ',
            '°' | 'º' | '˚' => '^',
            'μ' => MICRO,
            other => other,
        })
        .collect();

    text = decimal_commas_to_points(&text);
    text = MICRO_UNIT_RE
        .replace_all(&text, |caps: &regex::Captures| format!("{MICRO}{}", &caps[1]))
        .into_owned();
    text = TT_FLAG_RE.replace_all(&text, "↑").into_owned();
    text = NOISE_TOKEN_RE.replace_all(&text, " ").into_owned();
    text = WHITESPACE_RE.replace_all(&text, " ").into_owned();
    text.trim().to_string()
}

/// Split a document on line breaks and normalize each line, dropping lines
/// that normalize to nothing.
pub fn normalize_document(text: &str) -> Vec<String> {
    text.split(['\n', '\r'])
        .map(normalize_line)
        .filter(|line| !line.is_empty())
        .collect()
}

/// `47,4` → `47.4`. A comma only becomes a point when both neighbours are
/// ASCII digits.
fn decimal_commas_to_points(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = c == ','
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        out.push(if between_digits { '.' } else { c });
    }
    out
}
