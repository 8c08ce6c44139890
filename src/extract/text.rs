//! Plain and structured text: anything that is already UTF-8 on disk.
//!
//! These formats pass through verbatim (lossy-decoded); the normalizer
//! downstream owns whitespace cleanup.

use super::Extracted;
use crate::error::Result;

/// Non-`text/*` MIME types still treated as text.
const TEXT_APPLICATION_MIMES: &[&str] = &[
    "application/json",
    "application/ld+json",
    "application/xml",
    "application/xhtml+xml",
    "application/javascript",
    "application/x-javascript",
    "application/x-yaml",
    "application/yaml",
    "application/toml",
    "application/x-toml",
    "application/x-sh",
    "application/sql",
    "message/rfc822",
];

pub(super) fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/") || TEXT_APPLICATION_MIMES.contains(&mime)
}

pub(super) fn extract(bytes: &[u8]) -> Result<Extracted> {
    Ok(Extracted::from_text(
        String::from_utf8_lossy(bytes).into_owned(),
    ))
}
