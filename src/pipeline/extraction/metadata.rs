//! Report-level metadata read straight off the normalized lines.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use super::segment::{is_candidate_row, is_footer_line, is_header_line};
use super::vocabulary::{BIRTH_DATE_MARKERS, DATE_KEYWORDS, LAB_NAME_KEYWORDS};
use crate::models::LabMetadata;

static DMY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})\b").expect("valid regex")
});
static YMD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{4})[/\-.](\d{1,2})[/\-.](\d{1,2})\b").expect("valid regex")
});

const MAX_LAB_NAME_CHARS: usize = 80;

/// Find the collection date and laboratory name.
///
/// Dates are only read from lines carrying a date keyword and no birth-date
/// marker, and are returned as ISO `YYYY-MM-DD`; invalid calendar dates are
/// ignored. The lab name comes from a line outside the table region (header
/// opens it, footer closes it) that is neither a footer nor a result row.
pub fn extract_lab_metadata(lines: &[String]) -> LabMetadata {
    let mut metadata = LabMetadata::default();
    let mut in_table = false;
    for line in lines {
        let lower = line.to_lowercase();
        let footer = is_footer_line(line);
        if footer {
            in_table = false;
        } else if is_header_line(line) {
            in_table = true;
            continue;
        }

        if metadata.collection_date.is_none() && is_collection_date_line(&lower) {
            metadata.collection_date = parse_date(line);
        }
        if metadata.lab_name.is_none()
            && !in_table
            && !footer
            && !is_candidate_row(line)
            && names_laboratory(&lower)
        {
            metadata.lab_name = Some(line.chars().take(MAX_LAB_NAME_CHARS).collect());
        }
        if metadata.collection_date.is_some() && metadata.lab_name.is_some() {
            break;
        }
    }
    metadata
}

fn is_collection_date_line(lower: &str) -> bool {
    DATE_KEYWORDS.iter().any(|k| lower.contains(k))
        && !BIRTH_DATE_MARKERS.iter().any(|m| lower.contains(m))
}

fn names_laboratory(lower: &str) -> bool {
    lower.split_whitespace().any(|word| {
        let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
        LAB_NAME_KEYWORDS
            .iter()
            .any(|k| word == *k || (!k.ends_with('.') && word.starts_with(k)))
    })
}

/// First valid date in the line, formatted as ISO.
pub fn parse_date(line: &str) -> Option<String> {
    let ymd = YMD_RE.captures_iter(line).find_map(|c| {
        NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
    });
    let date = ymd.or_else(|| {
        DMY_RE.captures_iter(line).find_map(|c| {
            NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[2].parse().ok()?, c[1].parse().ok()?)
        })
    })?;
    Some(date.format("%Y-%m-%d").to_string())
}
