//! Core data models used throughout ragmill.
//!
//! These types represent the documents, chunks, and sync records that flow
//! through the ingestion pipeline and into the catalog store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ingestion lifecycle state of a document row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    None,
    Queued,
    Processing,
    Done,
    Failed,
    Skipped,
    Deleted,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::None => "none",
            IngestStatus::Queued => "queued",
            IngestStatus::Processing => "processing",
            IngestStatus::Done => "done",
            IngestStatus::Failed => "failed",
            IngestStatus::Skipped => "skipped",
            IngestStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> IngestStatus {
        match s {
            "queued" => IngestStatus::Queued,
            "processing" => IngestStatus::Processing,
            "done" => IngestStatus::Done,
            "failed" => IngestStatus::Failed,
            "skipped" => IngestStatus::Skipped,
            "deleted" => IngestStatus::Deleted,
            _ => IngestStatus::None,
        }
    }
}

/// Catalog row for one source file within a scope.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    /// Owning drive/project label; one sync run covers one scope.
    pub scope: String,
    /// Path relative to the scope's blob root. Unique within the scope.
    pub source_path: String,
    pub filename: String,
    pub mime: String,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
    /// SHA-256 hex of the normalized extracted text, set after ingest.
    pub content_hash: Option<String>,
    pub status: IngestStatus,
    pub error: Option<String>,
    /// Bumped on every successful re-ingest.
    pub file_version: i64,
    pub last_reindexed_at: Option<DateTime<Utc>>,
    pub chunk_count: i64,
    pub char_count: i64,
    pub word_count: i64,
    pub page_count: Option<i64>,
    pub ocr_applied: bool,
    pub language: Option<String>,
    pub analysis: Option<DocumentAnalysis>,
}

impl Document {
    /// New catalog row in the pre-ingest state.
    pub fn new(
        scope: &str,
        source_path: &str,
        filename: &str,
        mime: &str,
        size_bytes: i64,
        modified_at: DateTime<Utc>,
    ) -> Self {
        Document {
            id: uuid::Uuid::new_v4().to_string(),
            scope: scope.to_string(),
            source_path: source_path.to_string(),
            filename: filename.to_string(),
            mime: mime.to_string(),
            size_bytes,
            modified_at,
            content_hash: None,
            status: IngestStatus::None,
            error: None,
            file_version: 0,
            last_reindexed_at: None,
            chunk_count: 0,
            char_count: 0,
            word_count: 0,
            page_count: None,
            ocr_applied: false,
            language: None,
            analysis: None,
        }
    }
}

/// LLM-derived document metadata. Fields stay `None` when the model could
/// not determine them; the whole struct is absent when analysis was off or
/// failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub doc_type: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub key_entities: Vec<String>,
    #[serde(default)]
    pub key_dates: Vec<String>,
    pub department: Option<String>,
    pub language: Option<String>,
    pub importance: Option<String>,
    #[serde(default)]
    pub analyzed_at: Option<DateTime<Utc>>,
}

/// An embedded chunk of a document's normalized text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    /// Approximate source page for paginated formats.
    pub page: Option<i64>,
    pub text: String,
    /// SHA-256 hex of `text`; the embedding cache key.
    pub content_hash: String,
    pub embedding: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Denormalized per-chunk context carried alongside the vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub filename: String,
    pub mime: String,
    pub language: Option<String>,
    pub char_count: i64,
}

/// Terminal state of one sync run over a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Syncing,
    Done,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Syncing => "syncing",
            SyncStatus::Done => "done",
            SyncStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> SyncStatus {
        match s {
            "syncing" => SyncStatus::Syncing,
            "error" => SyncStatus::Error,
            _ => SyncStatus::Done,
        }
    }
}

/// Aggregate counters for one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub scanned: u64,
    pub new: u64,
    pub updated: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errored: u64,
    pub total_files: u64,
    pub total_chunks: u64,
}

/// Persisted summary of the most recent sync over a scope.
#[derive(Debug, Clone)]
pub struct ScopeSummary {
    pub scope: String,
    pub status: SyncStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub report: SyncReport,
}
