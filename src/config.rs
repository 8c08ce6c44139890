use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::chunk::ChunkParams;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub blobs: BlobConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Root of the file tree the pipeline ingests from. Each scope is a
/// directory directly under this root; document paths are stored relative
/// to the root, scope segment included.
#[derive(Debug, Deserialize, Clone)]
pub struct BlobConfig {
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,
    /// "separators" (default) or "window".
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
            min_chars: default_min_chars(),
            strategy: default_strategy(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkParams {
        ChunkParams {
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
            min_chars: self.min_chars,
            force_window: self.strategy == "window",
        }
    }
}

fn default_max_chars() -> usize {
    1500
}
fn default_overlap_chars() -> usize {
    200
}
fn default_min_chars() -> usize {
    50
}
fn default_strategy() -> String {
    "separators".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// "local", "remote", or "hybrid".
    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,
    #[serde(default)]
    pub remote_url: Option<String>,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    /// Hybrid mode falls back to the local parser when the remote service
    /// returns fewer chars than this.
    #[serde(default = "default_min_remote_text_len")]
    pub min_remote_text_len: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_engine: default_pdf_engine(),
            remote_url: None,
            remote_timeout_secs: default_remote_timeout_secs(),
            min_remote_text_len: default_min_remote_text_len(),
        }
    }
}

fn default_pdf_engine() -> String {
    "local".to_string()
}
fn default_remote_timeout_secs() -> u64 {
    120
}
fn default_min_remote_text_len() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct OcrConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    /// Env var holding the bearer token, if the service wants one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_ocr_languages")]
    pub languages: Vec<String>,
    /// Extractions shorter than this trigger the OCR pass.
    #[serde(default = "default_ocr_min_chars")]
    pub min_chars: usize,
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            api_key_env: None,
            languages: default_ocr_languages(),
            min_chars: default_ocr_min_chars(),
            timeout_secs: default_ocr_timeout_secs(),
        }
    }
}

fn default_ocr_languages() -> Vec<String> {
    vec!["en".to_string()]
}
fn default_ocr_min_chars() -> usize {
    100
}
fn default_ocr_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Total attempts per batch, first try included.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            api_key_env: default_embedding_api_key_env(),
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dimensions() -> usize {
    1536
}
fn default_batch_size() -> usize {
    20
}
fn default_max_retries() -> u32 {
    3
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_embedding_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_analysis_model")]
    pub model: String,
    /// Only this many leading chars of the document go to the model.
    #[serde(default = "default_max_prefix_chars")]
    pub max_prefix_chars: usize,
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_embedding_url(),
            api_key_env: default_embedding_api_key_env(),
            model: default_analysis_model(),
            max_prefix_chars: default_max_prefix_chars(),
            timeout_secs: default_analysis_timeout_secs(),
        }
    }
}

fn default_analysis_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_prefix_chars() -> usize {
    8000
}
fn default_analysis_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    /// Directory names skipped wholesale during enumeration.
    #[serde(default = "default_ignored_dirs")]
    pub ignored_dirs: Vec<String>,
    /// Extra exclude globs on top of the built-in temp-file patterns.
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_file_size_bytes")]
    pub max_file_size_bytes: u64,
    /// Documents ingested concurrently per batch.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignored_dirs: default_ignored_dirs(),
            exclude_globs: Vec::new(),
            max_file_size_bytes: default_max_file_size_bytes(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_ignored_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        "node_modules".to_string(),
        "target".to_string(),
    ]
}
fn default_max_file_size_bytes() -> u64 {
    50 * 1024 * 1024
}
fn default_concurrency() -> usize {
    1
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars * 2 >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be less than half of max_chars");
    }
    if config.chunking.min_chars > config.chunking.max_chars {
        anyhow::bail!("chunking.min_chars must not exceed max_chars");
    }
    match config.chunking.strategy.as_str() {
        "separators" | "window" => {}
        other => anyhow::bail!(
            "Unknown chunking strategy: '{}'. Must be separators or window.",
            other
        ),
    }

    match config.extraction.pdf_engine.as_str() {
        "local" => {}
        "remote" | "hybrid" => {
            if config.extraction.remote_url.is_none() {
                anyhow::bail!(
                    "extraction.remote_url must be set when pdf_engine is '{}'",
                    config.extraction.pdf_engine
                );
            }
        }
        other => anyhow::bail!(
            "Unknown pdf_engine: '{}'. Must be local, remote, or hybrid.",
            other
        ),
    }

    if config.ocr.enabled && config.ocr.url.is_none() {
        anyhow::bail!("ocr.url must be set when ocr.enabled is true");
    }

    if config.embedding.dimensions == 0 {
        anyhow::bail!("embedding.dimensions must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.max_retries == 0 {
        anyhow::bail!("embedding.max_retries must be >= 1");
    }

    if config.analysis.enabled && config.analysis.max_prefix_chars == 0 {
        anyhow::bail!("analysis.max_prefix_chars must be > 0 when analysis is enabled");
    }

    if config.sync.concurrency == 0 {
        anyhow::bail!("sync.concurrency must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config = parse(
            r#"
            [db]
            path = "data/ragmill.db"
            [blobs]
            root = "data/blobs"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.max_chars, 1500);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.chunking.min_chars, 50);
        assert_eq!(config.extraction.pdf_engine, "local");
        assert_eq!(config.extraction.remote_timeout_secs, 120);
        assert_eq!(config.embedding.dimensions, 1536);
        assert_eq!(config.embedding.batch_size, 20);
        assert_eq!(config.embedding.max_retries, 3);
        assert_eq!(config.ocr.min_chars, 100);
        assert!(!config.ocr.enabled);
        assert!(!config.analysis.enabled);
        assert_eq!(config.sync.concurrency, 1);
    }

    #[test]
    fn test_overlap_too_large_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.db"
            [blobs]
            root = "b"
            [chunking]
            max_chars = 400
            overlap_chars = 200
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_remote_engine_requires_url() {
        let err = parse(
            r#"
            [db]
            path = "x.db"
            [blobs]
            root = "b"
            [extraction]
            pdf_engine = "hybrid"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("remote_url"));
    }

    #[test]
    fn test_unknown_pdf_engine_rejected() {
        let err = parse(
            r#"
            [db]
            path = "x.db"
            [blobs]
            root = "b"
            [extraction]
            pdf_engine = "cloud"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("pdf_engine"));
    }

    #[test]
    fn test_ocr_enabled_requires_url() {
        let err = parse(
            r#"
            [db]
            path = "x.db"
            [blobs]
            root = "b"
            [ocr]
            enabled = true
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ocr.url"));
    }

    #[test]
    fn test_chunk_params_mapping() {
        let config = parse(
            r#"
            [db]
            path = "x.db"
            [blobs]
            root = "b"
            [chunking]
            max_chars = 800
            overlap_chars = 100
            min_chars = 40
            strategy = "window"
            "#,
        )
        .unwrap();
        let p = config.chunking.params();
        assert_eq!(p.max_chars, 800);
        assert_eq!(p.overlap_chars, 100);
        assert_eq!(p.min_chars, 40);
        assert!(p.force_window);
    }
}
