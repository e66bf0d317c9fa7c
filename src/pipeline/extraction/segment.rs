//! Row segmenter: normalized lines → logical rows inside table regions.
//!
//! A header line opens a table region and a footer line closes it. Documents
//! with no recognizable header are treated as one table region. Inside a
//! region, lines are reassembled when a layout printed one analyte over
//! several lines (name, then value, range and unit each on their own line).

use std::sync::LazyLock;

use regex::Regex;

use super::lab_parser::{has_qualitative_value, has_range_token, is_unit_token, numbers_in};
use super::vocabulary::{
    contains_ci, is_method_word, FOOTER_PHRASES, KNOWN_UNITS, METADATA_PREFIXES, NAME_HEADER_WORDS,
    REFERENCE_HEADER_WORDS, RESULT_HEADER_WORDS, UNIT_HEADER_WORDS,
};

static VALUE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d+(?:\.\d+)?(?:\s*(?:[HL*]|↑|↓))?$").expect("valid regex")
});
static RANGE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:\(?\s*\d+(?:\.\d+)?\s*(?:[-‐‑–—]|to|a)\s*\d+(?:\.\d+)?\s*\)?|(?:<=|>=|≤|≥|<|>)\s*\d+(?:\.\d+)?)$",
    )
    .expect("valid regex")
});
static UNIT_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:%|[A-Za-zµ]+/[A-Za-zµ0-9^.]+|x10\^\d+\S*)$").expect("valid regex")
});

/// One reconstructed table row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalRow {
    /// Source lines joined with single spaces.
    pub text: String,
    /// Section title in effect when the row was read (e.g. `HEMOGRAMA`).
    pub group: Option<String>,
    /// Index of the first source line.
    pub first_line: usize,
    /// Number of source lines merged into this row.
    pub line_count: usize,
}

// ═══════════════════════════════════════════
// Line classification
// ═══════════════════════════════════════════

fn words_lower(line: &str) -> Vec<String> {
    line.split(|c: char| c.is_whitespace() || matches!(c, '|' | ':' | ';' | ','))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

fn has_any(words: &[String], vocabulary: &[&str]) -> bool {
    words.iter().any(|w| vocabulary.contains(&w.as_str()))
}

/// A header names the analyte column plus at least one of the result,
/// reference or unit columns.
pub fn is_header_line(line: &str) -> bool {
    let words = words_lower(line);
    if words.len() < 2 || words.len() > 10 {
        return false;
    }
    if !numbers_in(line).is_empty() {
        return false;
    }
    has_any(&words, NAME_HEADER_WORDS)
        && (has_any(&words, RESULT_HEADER_WORDS)
            || has_any(&words, REFERENCE_HEADER_WORDS)
            || has_any(&words, UNIT_HEADER_WORDS))
}

pub fn is_footer_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    FOOTER_PHRASES.iter().any(|p| lower.contains(p))
}

/// Patient/administrative metadata: the line starts with a metadata label
/// as a whole word (`rut` must not match `rutina`).
pub fn is_metadata_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    METADATA_PREFIXES.iter().any(|prefix| {
        lower.strip_prefix(prefix).is_some_and(|rest| {
            prefix.ends_with('.') || rest.chars().next().map_or(true, |c| !c.is_alphanumeric())
        })
    })
}

/// Section title: one to three uppercase words, letters only.
pub fn is_title_line(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() || words.len() > 3 {
        return false;
    }
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3
        && line
            .chars()
            .all(|c| c.is_whitespace() || (c.is_alphabetic() && !c.is_lowercase()))
}

/// Permissive plausibility check for a single-line row.
pub fn is_candidate_row(line: &str) -> bool {
    if !line.chars().any(char::is_alphabetic) {
        return false;
    }
    if has_range_token(line) || has_qualitative_value(line) {
        return true;
    }
    if let Some(last) = line.split_whitespace().next_back() {
        if contains_ci(KNOWN_UNITS, last) {
            return true;
        }
    }
    if UNIT_SUFFIX_RE.is_match(line) {
        return true;
    }
    let total = line.chars().count();
    let digits = line.chars().filter(char::is_ascii_digit).count();
    digits >= 2 && total > 0 && digits as f64 / total as f64 > 0.15
}

// ── Multi-line reconstruction ───────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece {
    Method,
    Value,
    Range,
    Unit,
}

/// Follower layouts after a name line, longest first.
const FOLLOWER_PATTERNS: &[&[Piece]] = &[
    &[Piece::Method, Piece::Value, Piece::Range, Piece::Unit],
    &[Piece::Method, Piece::Value, Piece::Range],
    &[Piece::Value, Piece::Range, Piece::Unit],
    &[Piece::Method, Piece::Value, Piece::Unit],
    &[Piece::Value, Piece::Range],
    &[Piece::Value, Piece::Unit],
];

fn line_is(piece: Piece, line: &str) -> bool {
    match piece {
        Piece::Method => {
            let mut tokens = line.split_whitespace().peekable();
            tokens.peek().is_some() && tokens.all(is_method_word)
        }
        Piece::Value => VALUE_ONLY_RE.is_match(line),
        Piece::Range => RANGE_ONLY_RE.is_match(line),
        Piece::Unit => !line.contains(char::is_whitespace) && is_unit_token(line),
    }
}

/// A line that could be an analyte name standing alone.
fn is_name_line(line: &str) -> bool {
    line.chars().filter(|c| c.is_alphabetic()).count() >= 2
        && numbers_in(line).is_empty()
        && !has_range_token(line)
        && !line_is(Piece::Method, line)
        && !line_is(Piece::Unit, line)
}

/// Number of lines (name included) forming a multi-line row at `start`.
fn match_multiline(lines: &[String], start: usize) -> Option<usize> {
    if !is_name_line(&lines[start]) {
        return None;
    }
    let followers = &lines[start + 1..];
    FOLLOWER_PATTERNS.iter().find_map(|pattern| {
        let fits = pattern.len() <= followers.len()
            && pattern
                .iter()
                .zip(followers)
                .all(|(piece, line)| line_is(*piece, line));
        fits.then_some(pattern.len() + 1)
    })
}

// ═══════════════════════════════════════════
// Segmenter
// ═══════════════════════════════════════════

/// Stateful walk over a document's lines.
#[derive(Debug, Default)]
pub struct RowSegmenter {
    in_table: bool,
    group: Option<String>,
}

impl RowSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segment normalized lines into logical rows.
    pub fn segment(&mut self, lines: &[String]) -> Vec<LogicalRow> {
        self.in_table = !lines.iter().any(|l| is_header_line(l));
        self.group = None;

        let mut rows = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].as_str();

            if is_footer_line(line) {
                self.in_table = false;
                i += 1;
                continue;
            }
            if is_header_line(line) {
                self.in_table = true;
                i += 1;
                continue;
            }
            if !self.in_table || is_metadata_line(line) {
                i += 1;
                continue;
            }

            if let Some(count) = match_multiline(lines, i) {
                rows.push(LogicalRow {
                    text: lines[i..i + count].join(" "),
                    group: self.group.clone(),
                    first_line: i,
                    line_count: count,
                });
                i += count;
                continue;
            }

            if is_title_line(line) {
                self.group = Some(line.to_string());
            } else if is_candidate_row(line) {
                rows.push(LogicalRow {
                    text: line.to_string(),
                    group: self.group.clone(),
                    first_line: i,
                    line_count: 1,
                });
            }
            i += 1;
        }
        rows
    }
}

/// Convenience wrapper over a fresh `RowSegmenter`.
pub fn segment_rows(lines: &[String]) -> Vec<LogicalRow> {
    RowSegmenter::new().segment(lines)
}
