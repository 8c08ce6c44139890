//! In-memory [`DocumentStore`] and [`EmbeddingCache`] for tests.
//!
//! `HashMap` and `Vec` behind `std::sync::RwLock`. Chunk replacement swaps
//! the document's set under one write lock, mirroring the transactional
//! behavior of the SQLite backend.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, Document, IngestStatus, ScopeSummary};

use super::{DocumentStore, EmbeddingCache};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<String, Document>>,
    chunks: RwLock<Vec<Chunk>>,
    cache: RwLock<HashMap<(String, String), Vec<f32>>>,
    summaries: RwLock<HashMap<String, ScopeSummary>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().unwrap().get(id).cloned())
    }

    async fn find_by_path(&self, scope: &str, source_path: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .read()
            .unwrap()
            .values()
            .find(|d| d.scope == scope && d.source_path == source_path)
            .cloned())
    }

    async fn list_documents(&self, scope: &str) -> Result<Vec<Document>> {
        let mut docs: Vec<Document> = self
            .docs
            .read()
            .unwrap()
            .values()
            .filter(|d| d.scope == scope)
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Ok(docs)
    }

    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        let mut docs = self.docs.write().unwrap();
        let existing_id = docs
            .values()
            .find(|d| d.scope == doc.scope && d.source_path == doc.source_path)
            .map(|d| d.id.clone());
        let id = existing_id.unwrap_or_else(|| doc.id.clone());
        let mut stored = doc.clone();
        stored.id = id.clone();
        docs.insert(id.clone(), stored);
        Ok(id)
    }

    async fn begin_processing(&self, id: &str) -> Result<bool> {
        let mut docs = self.docs.write().unwrap();
        match docs.get_mut(id) {
            Some(doc) if doc.status != IngestStatus::Processing => {
                doc.status = IngestStatus::Processing;
                doc.error = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().unwrap();
        stored.retain(|c| c.document_id != document_id);
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<()> {
        self.chunks
            .write()
            .unwrap()
            .retain(|c| c.document_id != document_id);
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> = self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn count_documents(&self, scope: &str) -> Result<u64> {
        Ok(self
            .docs
            .read()
            .unwrap()
            .values()
            .filter(|d| d.scope == scope && d.status != IngestStatus::Deleted)
            .count() as u64)
    }

    async fn count_chunks(&self, scope: &str) -> Result<u64> {
        let docs = self.docs.read().unwrap();
        Ok(self
            .chunks
            .read()
            .unwrap()
            .iter()
            .filter(|c| docs.get(&c.document_id).map_or(false, |d| d.scope == scope))
            .count() as u64)
    }

    async fn get_scope_summary(&self, scope: &str) -> Result<Option<ScopeSummary>> {
        Ok(self.summaries.read().unwrap().get(scope).cloned())
    }

    async fn put_scope_summary(&self, summary: &ScopeSummary) -> Result<()> {
        self.summaries
            .write()
            .unwrap()
            .insert(summary.scope.clone(), summary.clone());
        Ok(())
    }
}

#[async_trait]
impl EmbeddingCache for MemoryStore {
    async fn get(&self, content_hash: &str, model: &str) -> Result<Option<Vec<f32>>> {
        Ok(self
            .cache
            .read()
            .unwrap()
            .get(&(content_hash.to_string(), model.to_string()))
            .cloned())
    }

    async fn put(&self, content_hash: &str, model: &str, vector: &[f32]) -> Result<()> {
        self.cache.write().unwrap().insert(
            (content_hash.to_string(), model.to_string()),
            vector.to_vec(),
        );
        Ok(())
    }
}
