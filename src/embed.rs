//! Embedding generation with content-addressed caching and bounded retry.
//!
//! [`EmbeddingApi`] is the wire seam: one call, one batch, no policy.
//! [`EmbeddingGenerator`] owns the policy above it: per-text SHA-256 cache
//! lookups, batching of the misses, exponential backoff on transient API
//! failures, and write-through of fresh vectors.
//!
//! # Retry strategy
//!
//! - HTTP 429 and 5xx → retry with backoff (2s, 4s, ...)
//! - other 4xx → fail immediately
//! - network errors → retry
//! - attempts are bounded by `embedding.max_retries` (first try included)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, Result};
use crate::normalize::content_hash;
use crate::store::EmbeddingCache;

/// One failed embedding call. `status` is `None` for transport errors that
/// never produced an HTTP response.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl ApiFailure {
    pub fn retryable(&self) -> bool {
        match self.status {
            None => true,
            Some(429) => true,
            Some(s) => s >= 500,
        }
    }
}

impl std::fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "network: {}", self.message),
        }
    }
}

/// A single embeddings call against some backend. Implementations do not
/// retry; the generator owns that.
#[async_trait]
pub trait EmbeddingApi: Send + Sync {
    async fn embed(
        &self,
        texts: &[String],
        model: &str,
        dimensions: usize,
    ) -> std::result::Result<Vec<Vec<f32>>, ApiFailure>;
}

/// OpenAI-compatible embeddings endpoint.
pub struct HttpEmbeddingApi {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpEmbeddingApi {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            tracing::debug!(
                env = %config.api_key_env,
                "no embedding api key in environment, sending unauthenticated requests"
            );
        }
        Ok(HttpEmbeddingApi {
            client,
            url: format!("{}/embeddings", config.url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingApi for HttpEmbeddingApi {
    async fn embed(
        &self,
        texts: &[String],
        model: &str,
        dimensions: usize,
    ) -> std::result::Result<Vec<Vec<f32>>, ApiFailure> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
            "dimensions": dimensions,
        });

        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| ApiFailure {
            status: None,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ApiFailure {
                status: Some(status.as_u16()),
                message: body_text,
            });
        }

        let json: serde_json::Value = response.json().await.map_err(|e| ApiFailure {
            status: None,
            message: format!("invalid response body: {e}"),
        })?;
        parse_embedding_response(&json).map_err(|e| ApiFailure {
            status: None,
            message: e.to_string(),
        })
    }
}

/// Extract `data[].embedding` in input order. The API may return items out
/// of order, so the `index` field wins.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| PipelineError::Embedding("response missing data array".to_string()))?;

    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                PipelineError::Embedding("response item missing embedding".to_string())
            })?;
        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Cache-aware, retrying embedding front end.
pub struct EmbeddingGenerator {
    api: Arc<dyn EmbeddingApi>,
    cache: Arc<dyn EmbeddingCache>,
    config: EmbeddingConfig,
}

impl EmbeddingGenerator {
    pub fn new(
        api: Arc<dyn EmbeddingApi>,
        cache: Arc<dyn EmbeddingCache>,
        config: EmbeddingConfig,
    ) -> Self {
        EmbeddingGenerator { api, cache, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Embed `texts`, returning vectors in input order.
    ///
    /// Cached vectors never touch the API. Cache read/write failures degrade
    /// to misses rather than failing the document; API failures are final
    /// once retries are exhausted.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| content_hash(t)).collect();
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        let mut misses: Vec<usize> = Vec::new();

        for (i, hash) in hashes.iter().enumerate() {
            match self.cache.get(hash, &self.config.model).await {
                Ok(Some(vector)) => out[i] = Some(vector),
                Ok(None) => misses.push(i),
                Err(e) => {
                    tracing::warn!(error = %e, "embedding cache read failed, treating as miss");
                    misses.push(i);
                }
            }
        }
        tracing::debug!(
            total = texts.len(),
            cache_hits = texts.len() - misses.len(),
            "embedding cache consulted"
        );

        for batch in misses.chunks(self.config.batch_size) {
            let batch_texts: Vec<String> = batch.iter().map(|&i| texts[i].clone()).collect();
            let vectors = self.embed_with_retry(&batch_texts).await?;
            if vectors.len() != batch.len() {
                return Err(PipelineError::Embedding(format!(
                    "expected {} vectors, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            for (&i, vector) in batch.iter().zip(vectors.into_iter()) {
                if vector.len() != self.config.dimensions {
                    return Err(PipelineError::Embedding(format!(
                        "expected {} dimensions, got {}",
                        self.config.dimensions,
                        vector.len()
                    )));
                }
                if let Err(e) = self
                    .cache
                    .put(&hashes[i], &self.config.model, &vector)
                    .await
                {
                    tracing::warn!(error = %e, "embedding cache write failed");
                }
                out[i] = Some(vector);
            }
        }

        out.into_iter()
            .map(|v| v.ok_or_else(|| PipelineError::Embedding("missing vector".to_string())))
            .collect()
    }

    async fn embed_with_retry(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut last_err: Option<ApiFailure> = None;
        for attempt in 1..=self.config.max_retries {
            if attempt > 1 {
                // 2s, 4s, 8s, ... capped
                let delay = Duration::from_secs(1 << u64::from(attempt - 1).min(6));
                tokio::time::sleep(delay).await;
            }
            match self
                .api
                .embed(texts, &self.config.model, self.config.dimensions)
                .await
            {
                Ok(vectors) => return Ok(vectors),
                Err(failure) if failure.retryable() => {
                    tracing::warn!(attempt, error = %failure, "embedding attempt failed");
                    last_err = Some(failure);
                }
                Err(failure) => {
                    return Err(PipelineError::Embedding(failure.to_string()));
                }
            }
        }
        let detail = last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_string());
        Err(PipelineError::Embedding(format!(
            "exhausted {} attempts: {detail}",
            self.config.max_retries
        )))
    }
}

/// Encode a float vector as little-endian f32 bytes for BLOB storage.
///
/// ```rust
/// use ragmill::embed::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
