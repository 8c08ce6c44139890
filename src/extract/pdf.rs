//! PDF extraction: local parser, remote service, or hybrid.
//!
//! The local engine pairs `pdf_extract` for text with `lopdf` for page count
//! and the Info dictionary. Hybrid mode asks the remote service first and
//! falls back to the local parser when the call fails or comes back with too
//! little text to be useful.

use super::remote::RemoteExtractionService;
use super::{Extracted, SourceMeta, MIME_PDF};
use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};

pub(super) async fn extract(
    bytes: &[u8],
    config: &ExtractionConfig,
    remote: Option<&dyn RemoteExtractionService>,
) -> Result<Extracted> {
    match config.pdf_engine.as_str() {
        "remote" => {
            let svc = remote.ok_or_else(|| {
                PipelineError::Extraction("remote extraction service not configured".to_string())
            })?;
            extract_remote(bytes, svc).await
        }
        "hybrid" => {
            if let Some(svc) = remote {
                match extract_remote(bytes, svc).await {
                    Ok(ex) if ex.text.chars().count() >= config.min_remote_text_len => {
                        return Ok(ex)
                    }
                    Ok(_) => {
                        tracing::debug!("remote extraction returned too little text, trying local parser");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "remote extraction failed, trying local parser");
                    }
                }
            }
            extract_local(bytes)
        }
        _ => extract_local(bytes),
    }
}

pub(super) fn extract_local(bytes: &[u8]) -> Result<Extracted> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| PipelineError::Extraction(format!("pdf parse: {e}")))?;
    let (page_count, meta) = match lopdf::Document::load_mem(bytes) {
        Ok(doc) => (Some(doc.get_pages().len() as i64), info_meta(&doc)),
        Err(_) => (None, SourceMeta::default()),
    };
    Ok(Extracted {
        text,
        page_count,
        meta,
        used_ocr: false,
    })
}

async fn extract_remote(bytes: &[u8], svc: &dyn RemoteExtractionService) -> Result<Extracted> {
    let text = svc.extract_text(bytes, MIME_PDF).await?;
    // Metadata is auxiliary; a failed call never sinks the document.
    let (page_count, meta) = match svc.extract_metadata(bytes, MIME_PDF).await {
        Ok(json) => (
            json_i64(json.get("xmpTPg:NPages")),
            SourceMeta {
                title: json_str(json.get("dc:title")),
                author: json_str(json.get("dc:creator")),
                created: json_str(json.get("dcterms:created")),
                company: json_str(json.get("extended-properties:Company")),
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, "remote metadata call failed");
            (None, SourceMeta::default())
        }
    };
    Ok(Extracted {
        text,
        page_count,
        meta,
        used_ocr: false,
    })
}

/// Title/author/creation date out of the trailer's Info dictionary.
fn info_meta(doc: &lopdf::Document) -> SourceMeta {
    let info = match doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    {
        Some(d) => d,
        None => return SourceMeta::default(),
    };
    SourceMeta {
        title: dict_string(doc, info, b"Title"),
        author: dict_string(doc, info, b"Author"),
        created: dict_string(doc, info, b"CreationDate")
            .map(|d| d.trim_start_matches("D:").to_string()),
        company: None,
    }
}

fn resolve_dict<'a>(
    doc: &'a lopdf::Document,
    obj: &'a lopdf::Object,
) -> Option<&'a lopdf::Dictionary> {
    match obj {
        lopdf::Object::Dictionary(d) => Some(d),
        lopdf::Object::Reference(id) => match doc.get_object(*id).ok()? {
            lopdf::Object::Dictionary(d) => Some(d),
            _ => None,
        },
        _ => None,
    }
}

fn dict_string(doc: &lopdf::Document, dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    let obj = dict.get(key).ok()?;
    let obj = match obj {
        lopdf::Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    match obj {
        lopdf::Object::String(bytes, _) => {
            let s = decode_pdf_string(bytes);
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or a Latin-1-ish single
/// byte encoding.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn json_str(value: Option<&serde_json::Value>) -> Option<String> {
    match value? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    }
}

/// Tika reports numbers as strings as often as not.
fn json_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    let value = value?;
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
