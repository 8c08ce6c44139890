//! Remote extraction service client (Tika-style).
//!
//! The service takes raw bytes via PUT and answers with plain text, or with
//! a JSON metadata object on the metadata route. Used for PDFs in `remote`
//! and `hybrid` engine modes and for legacy formats the local parsers do
//! not cover.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

#[async_trait]
pub trait RemoteExtractionService: Send + Sync {
    /// Full text of the document.
    async fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String>;
    /// Format metadata as a flat JSON object.
    async fn extract_metadata(&self, bytes: &[u8], mime: &str) -> Result<serde_json::Value>;
}

pub struct HttpExtractionService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExtractionService {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(HttpExtractionService {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn put(&self, path: &str, bytes: &[u8], mime: &str, accept: &str) -> Result<reqwest::Response> {
        let resp = self
            .client
            .put(self.endpoint(path))
            .header("Content-Type", mime)
            .header("Accept", accept)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::Extraction(format!("remote: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Extraction(format!(
                "remote: HTTP {}: {}",
                status.as_u16(),
                snippet(&body)
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl RemoteExtractionService for HttpExtractionService {
    async fn extract_text(&self, bytes: &[u8], mime: &str) -> Result<String> {
        let resp = self.put("tika", bytes, mime, "text/plain").await?;
        resp.text()
            .await
            .map_err(|e| PipelineError::Extraction(format!("remote: {e}")))
    }

    async fn extract_metadata(&self, bytes: &[u8], mime: &str) -> Result<serde_json::Value> {
        let resp = self.put("meta", bytes, mime, "application/json").await?;
        resp.json()
            .await
            .map_err(|e| PipelineError::Extraction(format!("remote: {e}")))
    }
}

/// First part of an error body, enough to diagnose without logging a dump.
fn snippet(body: &str) -> &str {
    let cut = body
        .char_indices()
        .nth(300)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    body[..cut].trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let svc = HttpExtractionService::new("http://tika:9998/", 5).unwrap();
        assert_eq!(svc.endpoint("tika"), "http://tika:9998/tika");
        assert_eq!(svc.endpoint("meta"), "http://tika:9998/meta");
    }

    #[test]
    fn test_snippet_caps_length() {
        let long = "x".repeat(1000);
        assert_eq!(snippet(&long).len(), 300);
        assert_eq!(snippet("short"), "short");
    }
}
