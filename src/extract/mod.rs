//! Multi-format text extraction.
//!
//! Connectors supply bytes plus a MIME type (or a filename to guess one
//! from); this module returns plain UTF-8 text along with whatever source
//! metadata the format carries. Formats outside the supported set fail with
//! [`PipelineError::UnsupportedFormat`] so the caller never chunks binary
//! noise.

mod office;
mod pdf;
mod remote;
mod sheet;
mod text;

pub use remote::{HttpExtractionService, RemoteExtractionService};

use std::sync::Arc;

use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_XLS: &str = "application/vnd.ms-excel";
pub const MIME_ODT: &str = "application/vnd.oasis.opendocument.text";
pub const MIME_ODP: &str = "application/vnd.oasis.opendocument.presentation";
pub const MIME_ODS: &str = "application/vnd.oasis.opendocument.spreadsheet";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_RTF: &str = "application/rtf";

/// Document properties recovered from the source format itself (PDF Info
/// dictionary, OOXML docProps). Best effort; fields stay `None` when absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub company: Option<String>,
}

/// Output of one extraction.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub page_count: Option<i64>,
    pub meta: SourceMeta,
    /// Set by the OCR fallback when it replaced the text.
    pub used_ocr: bool,
}

impl Extracted {
    pub fn from_text(text: String) -> Self {
        Extracted {
            text,
            page_count: None,
            meta: SourceMeta::default(),
            used_ocr: false,
        }
    }
}

/// Resolve the effective MIME type: the caller's, or a guess from the
/// filename extension.
pub fn resolve_mime(filename: &str, provided: Option<&str>) -> String {
    match provided {
        Some(m) if !m.is_empty() && m != "application/octet-stream" => m.to_string(),
        _ => mime_guess::from_path(filename)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}

/// Format dispatcher. Holds the engine selection and, when configured, the
/// remote extraction client shared across documents.
pub struct Extractor {
    config: ExtractionConfig,
    remote: Option<Arc<dyn RemoteExtractionService>>,
}

impl Extractor {
    pub fn new(
        config: ExtractionConfig,
        remote: Option<Arc<dyn RemoteExtractionService>>,
    ) -> Self {
        Extractor { config, remote }
    }

    /// Extract text from `bytes` according to `mime`.
    ///
    /// PDF honors the configured engine (`local`, `remote`, or `hybrid`);
    /// legacy word-processor formats go to the remote service when one is
    /// configured; everything else is parsed in process.
    pub async fn extract(&self, bytes: &[u8], mime: &str, filename: &str) -> Result<Extracted> {
        match mime {
            MIME_PDF => pdf::extract(bytes, &self.config, self.remote.as_deref()).await,
            MIME_DOCX => office::extract_docx(bytes),
            MIME_PPTX => office::extract_pptx(bytes),
            MIME_ODT | MIME_ODP => office::extract_odf(bytes),
            MIME_XLSX => sheet::extract_xlsx(bytes),
            MIME_XLS => sheet::extract_xls(bytes),
            MIME_ODS => sheet::extract_ods(bytes),
            MIME_DOC | MIME_RTF => match &self.remote {
                Some(remote) => {
                    let text = remote.extract_text(bytes, mime).await?;
                    Ok(Extracted::from_text(text))
                }
                None => Err(PipelineError::UnsupportedFormat(format!(
                    "{mime} requires the remote extraction service"
                ))),
            },
            m if text::is_text_mime(m) => text::extract(bytes),
            other => Err(PipelineError::UnsupportedFormat(format!(
                "{other} ({filename})"
            ))),
        }
    }
}
