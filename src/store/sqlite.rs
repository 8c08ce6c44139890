//! SQLite-backed catalog and embedding cache.
//!
//! One database file holds documents, chunks, the embedding cache, and
//! per-scope sync summaries. Timestamps are stored as unix milliseconds.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row};

use crate::embed::{blob_to_vec, vec_to_blob};
use crate::error::Result;
use crate::models::{
    Chunk, ChunkMetadata, Document, IngestStatus, ScopeSummary, SyncReport, SyncStatus,
};

use super::{DocumentStore, EmbeddingCache};

/// Rows per INSERT statement when bulk-writing chunks.
const CHUNK_INSERT_BATCH: usize = 50;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(SqliteStore { pool })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Create all tables and indexes. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                scope TEXT NOT NULL,
                source_path TEXT NOT NULL,
                filename TEXT NOT NULL,
                mime TEXT NOT NULL,
                size_bytes INTEGER NOT NULL,
                modified_at INTEGER NOT NULL,
                content_hash TEXT,
                status TEXT NOT NULL DEFAULT 'none',
                error TEXT,
                file_version INTEGER NOT NULL DEFAULT 0,
                last_reindexed_at INTEGER,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                char_count INTEGER NOT NULL DEFAULT 0,
                word_count INTEGER NOT NULL DEFAULT 0,
                page_count INTEGER,
                ocr_applied INTEGER NOT NULL DEFAULT 0,
                language TEXT,
                analysis_json TEXT,
                UNIQUE(scope, source_path)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                page INTEGER,
                text TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                embedding BLOB NOT NULL,
                filename TEXT NOT NULL,
                mime TEXT NOT NULL,
                language TEXT,
                char_count INTEGER NOT NULL,
                UNIQUE(document_id, chunk_index),
                FOREIGN KEY (document_id) REFERENCES documents(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embedding_cache (
                content_hash TEXT NOT NULL,
                model TEXT NOT NULL,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (content_hash, model)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS scope_summaries (
                scope TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                error TEXT,
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                report_json TEXT NOT NULL DEFAULT '{}'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_scope ON documents(scope)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(scope, status)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn row_to_document(row: &SqliteRow) -> Document {
    let status: String = row.get("status");
    let modified_at: i64 = row.get("modified_at");
    let last_reindexed_at: Option<i64> = row.get("last_reindexed_at");
    let analysis_json: Option<String> = row.get("analysis_json");
    let analysis = analysis_json.and_then(|s| serde_json::from_str(&s).ok());

    Document {
        id: row.get("id"),
        scope: row.get("scope"),
        source_path: row.get("source_path"),
        filename: row.get("filename"),
        mime: row.get("mime"),
        size_bytes: row.get("size_bytes"),
        modified_at: from_ms(modified_at),
        content_hash: row.get("content_hash"),
        status: IngestStatus::parse(&status),
        error: row.get("error"),
        file_version: row.get("file_version"),
        last_reindexed_at: last_reindexed_at.map(from_ms),
        chunk_count: row.get("chunk_count"),
        char_count: row.get("char_count"),
        word_count: row.get("word_count"),
        page_count: row.get("page_count"),
        ocr_applied: row.get("ocr_applied"),
        language: row.get("language"),
        analysis,
    }
}

fn row_to_chunk(row: &SqliteRow) -> Chunk {
    let blob: Vec<u8> = row.get("embedding");
    Chunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        page: row.get("page"),
        text: row.get("text"),
        content_hash: row.get("content_hash"),
        embedding: blob_to_vec(&blob),
        metadata: ChunkMetadata {
            filename: row.get("filename"),
            mime: row.get("mime"),
            language: row.get("language"),
            char_count: row.get("char_count"),
        },
    }
}

const DOCUMENT_COLUMNS: &str = "id, scope, source_path, filename, mime, size_bytes, modified_at, \
     content_hash, status, error, file_version, last_reindexed_at, chunk_count, char_count, \
     word_count, page_count, ocr_applied, language, analysis_json";

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_document(&r)))
    }

    async fn find_by_path(&self, scope: &str, source_path: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE scope = ? AND source_path = ?"
        ))
        .bind(scope)
        .bind(source_path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_document(&r)))
    }

    async fn list_documents(&self, scope: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE scope = ? ORDER BY source_path"
        ))
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        // A pre-existing row for this path keeps its id so chunks stay attached.
        let existing_id: Option<String> =
            sqlx::query_scalar("SELECT id FROM documents WHERE scope = ? AND source_path = ?")
                .bind(&doc.scope)
                .bind(&doc.source_path)
                .fetch_optional(&self.pool)
                .await?;
        let doc_id = existing_id.unwrap_or_else(|| doc.id.clone());

        let analysis_json = doc
            .analysis
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO documents (id, scope, source_path, filename, mime, size_bytes, modified_at,
                content_hash, status, error, file_version, last_reindexed_at, chunk_count,
                char_count, word_count, page_count, ocr_applied, language, analysis_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                filename = excluded.filename,
                mime = excluded.mime,
                size_bytes = excluded.size_bytes,
                modified_at = excluded.modified_at,
                content_hash = excluded.content_hash,
                status = excluded.status,
                error = excluded.error,
                file_version = excluded.file_version,
                last_reindexed_at = excluded.last_reindexed_at,
                chunk_count = excluded.chunk_count,
                char_count = excluded.char_count,
                word_count = excluded.word_count,
                page_count = excluded.page_count,
                ocr_applied = excluded.ocr_applied,
                language = excluded.language,
                analysis_json = excluded.analysis_json
            "#,
        )
        .bind(&doc_id)
        .bind(&doc.scope)
        .bind(&doc.source_path)
        .bind(&doc.filename)
        .bind(&doc.mime)
        .bind(doc.size_bytes)
        .bind(to_ms(doc.modified_at))
        .bind(&doc.content_hash)
        .bind(doc.status.as_str())
        .bind(&doc.error)
        .bind(doc.file_version)
        .bind(doc.last_reindexed_at.map(to_ms))
        .bind(doc.chunk_count)
        .bind(doc.char_count)
        .bind(doc.word_count)
        .bind(doc.page_count)
        .bind(doc.ocr_applied)
        .bind(&doc.language)
        .bind(&analysis_json)
        .execute(&self.pool)
        .await?;

        Ok(doc_id)
    }

    async fn begin_processing(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents SET status = 'processing', error = NULL \
             WHERE id = ? AND status <> 'processing'",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for batch in chunks.chunks(CHUNK_INSERT_BATCH) {
            let mut qb = QueryBuilder::new(
                "INSERT INTO chunks (id, document_id, chunk_index, page, text, content_hash, \
                 embedding, filename, mime, language, char_count) ",
            );
            qb.push_values(batch.iter(), |mut b, c| {
                b.push_bind(&c.id)
                    .push_bind(&c.document_id)
                    .push_bind(c.chunk_index)
                    .push_bind(c.page)
                    .push_bind(&c.text)
                    .push_bind(&c.content_hash)
                    .push_bind(vec_to_blob(&c.embedding))
                    .push_bind(&c.metadata.filename)
                    .push_bind(&c.metadata.mime)
                    .push_bind(&c.metadata.language)
                    .push_bind(c.metadata.char_count);
            });
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, page, text, content_hash, embedding, \
             filename, mime, language, char_count \
             FROM chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn count_documents(&self, scope: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE scope = ? AND status <> 'deleted'",
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_chunks(&self, scope: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks \
             JOIN documents ON documents.id = chunks.document_id \
             WHERE documents.scope = ?",
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn get_scope_summary(&self, scope: &str) -> Result<Option<ScopeSummary>> {
        let row = sqlx::query(
            "SELECT scope, status, error, started_at, finished_at, report_json \
             FROM scope_summaries WHERE scope = ?",
        )
        .bind(scope)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let status: String = r.get("status");
            let started_at: i64 = r.get("started_at");
            let finished_at: Option<i64> = r.get("finished_at");
            let report_json: String = r.get("report_json");
            ScopeSummary {
                scope: r.get("scope"),
                status: SyncStatus::parse(&status),
                error: r.get("error"),
                started_at: from_ms(started_at),
                finished_at: finished_at.map(from_ms),
                report: serde_json::from_str::<SyncReport>(&report_json).unwrap_or_default(),
            }
        }))
    }

    async fn put_scope_summary(&self, summary: &ScopeSummary) -> Result<()> {
        let report_json = serde_json::to_string(&summary.report)?;
        sqlx::query(
            r#"
            INSERT INTO scope_summaries (scope, status, error, started_at, finished_at, report_json)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(scope) DO UPDATE SET
                status = excluded.status,
                error = excluded.error,
                started_at = excluded.started_at,
                finished_at = excluded.finished_at,
                report_json = excluded.report_json
            "#,
        )
        .bind(&summary.scope)
        .bind(summary.status.as_str())
        .bind(&summary.error)
        .bind(to_ms(summary.started_at))
        .bind(summary.finished_at.map(to_ms))
        .bind(&report_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EmbeddingCache for SqliteStore {
    async fn get(&self, content_hash: &str, model: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> = sqlx::query_scalar(
            "SELECT embedding FROM embedding_cache WHERE content_hash = ? AND model = ?",
        )
        .bind(content_hash)
        .bind(model)
        .fetch_optional(&self.pool)
        .await?;
        Ok(blob.map(|b| blob_to_vec(&b)))
    }

    async fn put(&self, content_hash: &str, model: &str, vector: &[f32]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO embedding_cache (content_hash, model, embedding, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(content_hash, model) DO UPDATE SET
                embedding = excluded.embedding,
                created_at = excluded.created_at
            "#,
        )
        .bind(content_hash)
        .bind(model)
        .bind(vec_to_blob(vector))
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
