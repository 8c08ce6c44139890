//! Whitespace and control-character normalization.
//!
//! Every extractor output passes through [`normalize`] before hashing,
//! chunking, or analysis, so the same file always produces the same text no
//! matter which engine extracted it. The function is pure and idempotent:
//! `normalize(normalize(s)) == normalize(s)` for all inputs.

use sha2::{Digest, Sha256};

/// Normalize extracted text.
///
/// Rules, applied to a fixpoint in one pass:
/// - CRLF becomes LF; stray carriage returns are dropped as control chars
/// - tabs and other non-newline whitespace become single spaces
/// - runs of spaces collapse to one
/// - every line is trimmed
/// - runs of blank lines collapse to a single blank line
/// - non-printable control characters are dropped (newline survives)
/// - the whole document is trimmed
pub fn normalize(input: &str) -> String {
    let unified = input.replace("\r\n", "\n");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    let mut wrote_any = false;

    for raw_line in unified.split('\n') {
        let mut line = String::with_capacity(raw_line.len());
        let mut pending_space = false;
        for ch in raw_line.chars() {
            if ch == '\t' || (ch != '\n' && ch.is_whitespace()) {
                pending_space = true;
                continue;
            }
            if ch.is_control() {
                continue;
            }
            if pending_space && !line.is_empty() {
                line.push(' ');
            }
            pending_space = false;
            line.push(ch);
        }

        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if wrote_any {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(&line);
        wrote_any = true;
    }

    out
}

/// SHA-256 hex digest of a text. Used both for document-level dedup (over
/// the full normalized text) and as the per-chunk embedding cache key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Whitespace-separated token count of the normalized text.
pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

const LANG_MARKERS: &[(&str, &[&str])] = &[
    (
        "en",
        &["the", "and", "of", "to", "in", "is", "for", "with", "that", "was"],
    ),
    (
        "es",
        &["el", "la", "de", "que", "los", "por", "con", "una", "para", "las"],
    ),
    (
        "fr",
        &["le", "la", "les", "des", "et", "une", "pour", "dans", "est", "qui"],
    ),
    (
        "de",
        &["der", "die", "und", "das", "von", "mit", "den", "ist", "nicht", "ein"],
    ),
    (
        "pt",
        &["de", "que", "da", "em", "um", "para", "com", "uma", "dos", "os"],
    ),
];

/// Cheap stop-word language sniff over the first 500 tokens. Returns an ISO
/// 639-1 code, or `None` when no language stands out. The analyzer's answer
/// takes precedence over this when enrichment is enabled.
pub fn detect_language(text: &str) -> Option<String> {
    let tokens: Vec<String> = text
        .split_whitespace()
        .take(500)
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if tokens.len() < 10 {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;
    for (code, markers) in LANG_MARKERS {
        let hits = tokens
            .iter()
            .filter(|t| markers.contains(&t.as_str()))
            .count();
        if hits >= 3 && best.map_or(true, |(_, b)| hits > b) {
            best = Some((code, hits));
        }
    }
    best.map(|(code, _)| code.to_string())
}
