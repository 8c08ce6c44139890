//! Storage seams for the ingestion pipeline.
//!
//! Three narrow traits keep the pipeline testable and the backends
//! swappable: [`BlobStore`] fetches raw source bytes, [`DocumentStore`]
//! owns the document/chunk catalog, and [`EmbeddingCache`] memoizes
//! vectors by content hash.
//!
//! [`sqlite::SqliteStore`] is the production backend (catalog and cache in
//! one database); [`memory::MemoryStore`] backs tests. Implementations must
//! be `Send + Sync`.

pub mod fs;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document, ScopeSummary};

/// Source of raw document bytes, addressed by the path stored on the
/// Document row.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Catalog of documents, their chunks, and per-scope sync summaries.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`upsert_document`](DocumentStore::upsert_document) | Insert or update a row, keyed by (scope, source_path) |
/// | [`begin_processing`](DocumentStore::begin_processing) | Claim a document for one ingestion run |
/// | [`replace_chunks`](DocumentStore::replace_chunks) | Swap a document's full chunk set |
/// | [`get_chunks`](DocumentStore::get_chunks) | Read chunks back in index order |
/// | [`list_documents`](DocumentStore::list_documents) | All rows in a scope, any status |
/// | [`get_scope_summary`](DocumentStore::get_scope_summary) | Last sync outcome for a scope |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    async fn find_by_path(&self, scope: &str, source_path: &str) -> Result<Option<Document>>;

    async fn list_documents(&self, scope: &str) -> Result<Vec<Document>>;

    /// Insert or update a document. An existing row with the same
    /// (scope, source_path) keeps its id; the canonical id is returned.
    async fn upsert_document(&self, doc: &Document) -> Result<String>;

    /// Move a document into `processing` and clear its previous error.
    /// Returns false without touching the row when it is already being
    /// processed (or does not exist); at most one ingestion may be in
    /// flight per document id.
    async fn begin_processing(&self, id: &str) -> Result<bool>;

    /// Delete all prior chunks for the document and insert the new set.
    /// Readers never observe a partial set.
    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()>;

    async fn delete_chunks(&self, document_id: &str) -> Result<()>;

    /// Chunks for a document, ordered by `chunk_index`.
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>>;

    /// Non-deleted documents in a scope.
    async fn count_documents(&self, scope: &str) -> Result<u64>;

    /// Chunks across all documents in a scope.
    async fn count_chunks(&self, scope: &str) -> Result<u64>;

    async fn get_scope_summary(&self, scope: &str) -> Result<Option<ScopeSummary>>;

    async fn put_scope_summary(&self, summary: &ScopeSummary) -> Result<()>;
}

/// Vector memo keyed by `(content_hash, model)`. Values are a pure function
/// of the key, so writes are last-writer-wins and need no coordination.
#[async_trait]
pub trait EmbeddingCache: Send + Sync {
    async fn get(&self, content_hash: &str, model: &str) -> Result<Option<Vec<f32>>>;
    async fn put(&self, content_hash: &str, model: &str, vector: &[f32]) -> Result<()>;
}
