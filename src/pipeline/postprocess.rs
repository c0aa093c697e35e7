//! Post-processing: deterministic cleanup of VLM-generated captions.
//!
//! Even with a one-sentence prompt, models wrap answers in fences or quotes,
//! prefix them with a `Caption:` label, or spread them over several lines.
//! The caption becomes a quiz option verbatim, so it must be a single clean
//! line.
//!
//! ## Rule Order
//!
//! Fences are stripped before labels and quotes so the inner text is what
//! gets inspected; whitespace is collapsed last so the earlier rules can
//! still see line structure.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw VLM output.
///
/// Returns `None` when nothing usable remains.
///
/// Rules (applied in order):
/// 1. Strip outer code fences
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 3. Strip a leading `Caption:` / `Description:` label
/// 4. Strip matching wrapping quotes
/// 5. Collapse every whitespace run (newlines included) to one space
pub fn clean_caption(input: &str) -> Option<String> {
    let s = strip_fences(input);
    let s = remove_invisible_chars(&s);
    let s = strip_label(&s);
    let s = strip_wrapping_quotes(&s);
    let s = collapse_whitespace(&s);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

// ── Rule 1: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    if let Some(caps) = RE_OUTER_FENCES.captures(trimmed) {
        caps[1].to_string()
    } else {
        trimmed.to_string()
    }
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Strip leading label ──────────────────────────────────────────────

static RE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*\**(caption|description)\**\s*:\s*\**\s*").unwrap());

fn strip_label(input: &str) -> String {
    RE_LABEL.replace(input, "").to_string()
}

// ── Rule 4: Strip wrapping quotes ────────────────────────────────────────────

fn strip_wrapping_quotes(input: &str) -> String {
    let t = input.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('“', '”'), ('`', '`')] {
        if t.chars().count() >= 2 && t.starts_with(open) && t.ends_with(close) {
            let inner = &t[open.len_utf8()..t.len() - close.len_utf8()];
            // `"a" and "b"` is two quoted phrases, not one wrapped caption.
            if contains_unescaped(inner, open, close) {
                break;
            }
            return inner.to_string();
        }
    }
    t.to_string()
}

fn contains_unescaped(inner: &str, open: char, close: char) -> bool {
    let mut escaped = false;
    for c in inner.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == open || c == close {
            return true;
        }
    }
    false
}

// ── Rule 5: Collapse whitespace ──────────────────────────────────────────────

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ────────────────────────────────────────────────────────────────────
