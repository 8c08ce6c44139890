//! OCR fallback for scanned documents.
//!
//! When extraction comes back with almost no text (typical for image-only
//! PDFs), the original bytes go to an OCR service. Its answer replaces the
//! extracted text only when it actually found more, and any OCR failure is
//! logged and swallowed: the document proceeds with whatever text it has.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::config::OcrConfig;
use crate::error::{PipelineError, Result};
use crate::extract::Extracted;

#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize text in a document. `languages` are ISO 639-1 hints.
    async fn recognize(&self, bytes: &[u8], languages: &[String]) -> Result<String>;
}

/// Run the OCR pass if warranted and fold the result into `extracted`.
///
/// Triggers automatically when the extraction fell below the configured
/// floor, and unconditionally when `force` is set.
pub async fn apply_fallback(
    engine: Option<&dyn OcrEngine>,
    extracted: &mut Extracted,
    bytes: &[u8],
    mime: &str,
    config: &OcrConfig,
    force: bool,
) {
    let engine = match engine {
        Some(e) => e,
        None => return,
    };
    let extracted_len = extracted.text.trim().chars().count();
    if extracted_len >= config.min_chars && !force {
        return;
    }
    tracing::debug!(mime, extracted_chars = extracted_len, forced = force, "running ocr pass");

    match engine.recognize(bytes, &config.languages).await {
        Ok(text) => {
            if text.chars().count() > extracted.text.chars().count() {
                tracing::info!(
                    ocr_chars = text.chars().count(),
                    extracted_chars = extracted_len,
                    "ocr replaced extracted text"
                );
                extracted.text = text;
                extracted.used_ocr = true;
            } else {
                tracing::debug!("ocr output no longer than extracted text, keeping original");
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "ocr failed, keeping extracted text");
        }
    }
}

#[derive(Debug, Serialize)]
struct OcrRequest {
    content_base64: String,
    languages: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    pages: Option<Vec<OcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrPage {
    #[serde(default)]
    text: Option<String>,
}

pub struct HttpOcrEngine {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpOcrEngine {
    pub fn new(url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpOcrEngine {
            client,
            url: url.to_string(),
            api_key,
        })
    }

    /// Build the engine named by config, reading the bearer token from the
    /// configured env var. `None` when OCR is disabled.
    pub fn from_config(config: &OcrConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let url = config.url.as_deref().ok_or_else(|| {
            PipelineError::Config("ocr.url must be set when ocr.enabled is true".to_string())
        })?;
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());
        Ok(Some(HttpOcrEngine::new(url, api_key, config.timeout_secs)?))
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn recognize(&self, bytes: &[u8], languages: &[String]) -> Result<String> {
        let payload = OcrRequest {
            content_base64: STANDARD.encode(bytes),
            languages: languages.to_vec(),
        };
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::Ocr(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PipelineError::Ocr(format!(
                "ocr service returned {}",
                response.status()
            )));
        }
        let payload: OcrResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Ocr(e.to_string()))?;
        response_text(&payload)
            .ok_or_else(|| PipelineError::Ocr("ocr response had no readable text".to_string()))
    }
}

/// Prefer the structured page list; fall back to the flat text field, where
/// form feeds mark page breaks.
fn response_text(payload: &OcrResponse) -> Option<String> {
    if let Some(pages) = &payload.pages {
        let joined = pages
            .iter()
            .filter_map(|p| p.text.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !joined.is_empty() {
            return Some(joined);
        }
    }
    if let Some(text) = &payload.text {
        let flat = text
            .split('\u{000c}')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !flat.is_empty() {
            return Some(flat);
        }
    }
    None
}
