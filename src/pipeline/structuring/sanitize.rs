// Sanitize OCR lines before they are placed in a prompt, and model output
// before it is parsed. OCR text is untrusted: a scanned page can carry
// instruction-like text.

use std::sync::LazyLock;

use regex::Regex;

/// Longest single line forwarded to the model (characters).
const MAX_LINE_CHARS: usize = 500;

static UNUSED_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<unused\d+>").expect("valid regex"));
static THINK_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Clean prompt-bound lines. Returns the kept lines and how many were
/// removed as injection attempts. Never logs content.
pub fn sanitize_lines(lines: &[String]) -> (Vec<String>, usize) {
    let cleaned: Vec<String> = lines.iter().map(|l| remove_invisible_chars(l)).collect();
    let mut kept = Vec::with_capacity(cleaned.len());
    let mut removed = 0usize;
    let mut skip_next = false;

    for i in 0..cleaned.len() {
        if skip_next {
            skip_next = false;
            removed += 1;
            continue;
        }

        let lower = cleaned[i].trim().to_lowercase();
        if is_injection_line(&lower) {
            removed += 1;
            continue;
        }

        // Injection split across two lines: neither half matches alone.
        if let Some(next) = cleaned.get(i + 1) {
            let next_lower = next.trim().to_lowercase();
            if !is_injection_line(&next_lower)
                && is_override_attempt(&format!("{lower} {next_lower}"))
            {
                skip_next = true;
                removed += 1;
                continue;
            }
        }

        let line = cleaned[i].trim();
        if !line.is_empty() {
            kept.push(truncate_chars(line, MAX_LINE_CHARS));
        }
    }

    (kept, removed)
}

fn is_injection_line(lower: &str) -> bool {
    is_role_marker(lower) || is_override_attempt(lower) || is_xml_instruction_tag(lower)
}

fn remove_invisible_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if *c == ' ' || *c == '\t' {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'
                    | '\u{200C}'
                    | '\u{200D}'
                    | '\u{200E}'
                    | '\u{200F}'
                    | '\u{202A}'..='\u{202E}'
                    | '\u{2060}'..='\u{2064}'
                    | '\u{FEFF}'
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

fn is_role_marker(trimmed: &str) -> bool {
    const MARKERS: &[&str] = &[
        "system:", "assistant:", "user:", "sistema:", "asistente:", "usuario:",
        "[system]", "[assistant]", "[inst]", "[/inst]", "<<sys>>", "note to ai:",
        "nota para la ia:", "instructions:", "instrucciones:",
    ];
    MARKERS.iter().any(|m| trimmed.starts_with(m))
}

fn is_override_attempt(text: &str) -> bool {
    const PHRASES: &[&str] = &[
        "ignore previous instructions",
        "ignore all instructions",
        "ignore the above instructions",
        "disregard your instructions",
        "forget your instructions",
        "ignora las instrucciones",
        "ignora todas las instrucciones",
        "olvida tus instrucciones",
        "nuevas instrucciones:",
        "new instructions:",
        "override:",
    ];
    PHRASES.iter().any(|p| text.contains(p))
}

fn is_xml_instruction_tag(trimmed: &str) -> bool {
    trimmed.starts_with("<instruction")
        || trimmed.starts_with("</instruction")
        || trimmed.starts_with("<system")
        || trimmed.starts_with("</system")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Strip model artifacts (thinking blocks, stray `<unusedN>` tokens) from
/// raw output before JSON extraction.
pub fn sanitize_llm_output(raw: &str) -> String {
    let mut text = raw.to_string();

    if let Some(idx) = text.find("<unused") {
        if let Some(thought_offset) = text[idx..].find("thought\n") {
            text = text[idx + thought_offset + 8..].to_string();
        }
    }
    text = THINK_BLOCK_RE.replace_all(&text, "").into_owned();
    text = UNUSED_TOKEN_RE.replace_all(&text, "").into_owned();
    text.trim().to_string()
}
