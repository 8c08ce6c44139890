//! Ingestion orchestration for a single document.
//!
//! [`Ingestor::ingest`] drives the full pipeline — download, extract, OCR
//! fallback, normalize, analyze, chunk, embed, persist — and folds every
//! step's error into a structured [`IngestOutcome`]. The method never
//! returns `Err` and never panics across its boundary, so batch callers can
//! always continue with the next document.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::analyze::{AnalysisOutcome, DocumentAnalyzer};
use crate::chunk::{chunk_text, page_for_offset, ChunkParams};
use crate::config::OcrConfig;
use crate::embed::EmbeddingGenerator;
use crate::error::PipelineError;
use crate::extract::{resolve_mime, Extractor, SourceMeta};
use crate::models::{Chunk, ChunkMetadata, Document, IngestStatus};
use crate::normalize::{content_hash, detect_language, normalize, word_count};
use crate::ocr::{self, OcrEngine};
use crate::store::{BlobStore, DocumentStore};

/// Documents whose normalized text is shorter than this carry no signal and
/// are classified skipped, not failed.
const MIN_VIABLE_CHARS: usize = 10;

/// Per-call switches, from CLI flags or the sync layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Run OCR even when extraction produced enough text.
    pub force_ocr: bool,
    /// Re-embed even when the content hash is unchanged.
    pub force_reindex: bool,
    /// Skip LLM enrichment for this document.
    pub skip_analysis: bool,
}

/// One file to ingest. `source_path` is relative to the blob root and
/// unique within the scope.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub scope: String,
    pub source_path: String,
    pub filename: String,
    /// MIME type if the caller knows it; guessed from the filename otherwise.
    pub mime: Option<String>,
    pub size_bytes: i64,
    pub modified_at: DateTime<Utc>,
}

/// What a successful ingestion produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: String,
    pub chunk_count: usize,
    pub char_count: usize,
    pub page_count: Option<i64>,
    pub source_meta: SourceMeta,
    pub ocr_applied: bool,
    pub analysis: Option<crate::models::DocumentAnalysis>,
    pub duration_ms: u128,
}

/// Terminal classification of one ingestion attempt.
#[derive(Debug)]
pub enum IngestOutcome {
    Done(IngestReport),
    Skipped { document_id: String, reason: String },
    Failed { document_id: String, error: String },
}

impl IngestOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, IngestOutcome::Done(_))
    }
}

/// The unified pipeline. Both the upload-triggered single-file path and the
/// drive sync call through here; there is exactly one implementation of the
/// extract/chunk/embed sequence.
pub struct Ingestor {
    blobs: Arc<dyn BlobStore>,
    store: Arc<dyn DocumentStore>,
    extractor: Extractor,
    ocr: Option<Arc<dyn OcrEngine>>,
    ocr_config: OcrConfig,
    embedder: EmbeddingGenerator,
    analyzer: DocumentAnalyzer,
    chunk_params: ChunkParams,
}

impl Ingestor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        store: Arc<dyn DocumentStore>,
        extractor: Extractor,
        ocr: Option<Arc<dyn OcrEngine>>,
        ocr_config: OcrConfig,
        embedder: EmbeddingGenerator,
        analyzer: DocumentAnalyzer,
        chunk_params: ChunkParams,
    ) -> Self {
        Ingestor {
            blobs,
            store,
            extractor,
            ocr,
            ocr_config,
            embedder,
            analyzer,
            chunk_params,
        }
    }

    /// Run the full pipeline for one document.
    ///
    /// The document row moves `queued → processing → {done | failed |
    /// skipped}`; at most one ingestion is in flight per document id
    /// (a concurrent request is refused as `Failed`).
    pub async fn ingest(&self, request: IngestRequest, options: IngestOptions) -> IngestOutcome {
        let started = Instant::now();

        // Upsert the catalog row, preserving derived state of a prior one.
        let mut doc = match self
            .store
            .find_by_path(&request.scope, &request.source_path)
            .await
        {
            Ok(Some(existing)) => {
                let mut doc = existing;
                doc.filename = request.filename.clone();
                doc.mime = resolve_mime(&request.filename, request.mime.as_deref());
                doc.size_bytes = request.size_bytes;
                doc.modified_at = request.modified_at;
                doc
            }
            Ok(None) => {
                let mime = resolve_mime(&request.filename, request.mime.as_deref());
                let mut doc = Document::new(
                    &request.scope,
                    &request.source_path,
                    &request.filename,
                    &mime,
                    request.size_bytes,
                    request.modified_at,
                );
                doc.status = IngestStatus::Queued;
                doc
            }
            Err(e) => {
                // No row exists yet, so the path is the only handle batch
                // callers have on this failure.
                return IngestOutcome::Failed {
                    document_id: String::new(),
                    error: format!(
                        "store lookup failed for {}: {e}",
                        request.source_path
                    ),
                }
            }
        };
        let prior_hash = doc.content_hash.clone();
        let prior_status = doc.status;

        match self.store.upsert_document(&doc).await {
            Ok(id) => doc.id = id,
            Err(e) => {
                return IngestOutcome::Failed {
                    document_id: doc.id,
                    error: format!("store upsert failed: {e}"),
                }
            }
        }

        match self.store.begin_processing(&doc.id).await {
            Ok(true) => {}
            Ok(false) => {
                return IngestOutcome::Failed {
                    document_id: doc.id,
                    error: "ingestion already in progress".to_string(),
                }
            }
            Err(e) => {
                return IngestOutcome::Failed {
                    document_id: doc.id,
                    error: format!("store claim failed: {e}"),
                }
            }
        }
        doc.status = IngestStatus::Processing;
        doc.error = None;

        match self
            .run_pipeline(&mut doc, prior_hash, prior_status, options, started)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => self.fail(doc, e.to_string()).await,
        }
    }

    /// Everything after the processing claim. Errors bubble to `ingest`,
    /// which records them on the row.
    async fn run_pipeline(
        &self,
        doc: &mut Document,
        prior_hash: Option<String>,
        prior_status: IngestStatus,
        options: IngestOptions,
        started: Instant,
    ) -> Result<IngestOutcome, PipelineError> {
        let bytes = self.blobs.download(&doc.source_path).await?;

        let mut extracted = self
            .extractor
            .extract(&bytes, &doc.mime, &doc.filename)
            .await?;

        ocr::apply_fallback(
            self.ocr.as_deref(),
            &mut extracted,
            &bytes,
            &doc.mime,
            &self.ocr_config,
            options.force_ocr,
        )
        .await;

        let text = normalize(&extracted.text);
        if text.chars().count() < MIN_VIABLE_CHARS {
            return Ok(self
                .skip(doc, "no extractable text", extracted.used_ocr)
                .await);
        }

        let hash = content_hash(&text);
        if !options.force_reindex
            && prior_status == IngestStatus::Done
            && prior_hash.as_deref() == Some(hash.as_str())
        {
            doc.status = IngestStatus::Done;
            self.persist(doc).await;
            tracing::debug!(
                document_id = %doc.id,
                path = %doc.source_path,
                "content unchanged, skipping re-embed"
            );
            return Ok(IngestOutcome::Skipped {
                document_id: doc.id.clone(),
                reason: "content unchanged".to_string(),
            });
        }

        let analysis = if options.skip_analysis {
            None
        } else {
            match self.analyzer.analyze(&text, &doc.filename).await {
                AnalysisOutcome::Analyzed(a) => Some(a),
                AnalysisOutcome::Disabled => None,
                AnalysisOutcome::Failed(reason) => {
                    tracing::warn!(
                        document_id = %doc.id,
                        reason = %reason,
                        "analysis failed, continuing unenriched"
                    );
                    None
                }
            }
        };

        let spans = chunk_text(&text, &self.chunk_params);
        if spans.is_empty() {
            return Err(PipelineError::NoChunks);
        }

        let texts: Vec<String> = spans.iter().map(|s| s.text.clone()).collect();
        let vectors = self.embedder.embed_texts(&texts).await?;

        let language = analysis
            .as_ref()
            .and_then(|a| a.language.clone())
            .or_else(|| detect_language(&text));

        let chunks: Vec<Chunk> = spans
            .iter()
            .zip(vectors.into_iter())
            .enumerate()
            .map(|(i, (span, embedding))| Chunk {
                id: uuid::Uuid::new_v4().to_string(),
                document_id: doc.id.clone(),
                chunk_index: i as i64,
                page: extracted
                    .page_count
                    .and_then(|pages| page_for_offset(span.offset, text.len(), pages)),
                content_hash: content_hash(&span.text),
                embedding,
                metadata: ChunkMetadata {
                    filename: doc.filename.clone(),
                    mime: doc.mime.clone(),
                    language: language.clone(),
                    char_count: span.text.chars().count() as i64,
                },
                text: span.text.clone(),
            })
            .collect();

        self.store
            .replace_chunks(&doc.id, &chunks)
            .await
            .map_err(|e| PipelineError::Store(format!("chunk replacement failed: {e}")))?;

        doc.status = IngestStatus::Done;
        doc.error = None;
        doc.content_hash = Some(hash);
        doc.last_reindexed_at = Some(Utc::now());
        doc.file_version += 1;
        doc.chunk_count = chunks.len() as i64;
        doc.char_count = text.chars().count() as i64;
        doc.word_count = word_count(&text);
        doc.page_count = extracted.page_count;
        doc.ocr_applied = extracted.used_ocr;
        doc.language = language;
        doc.analysis = analysis.clone();
        self.store
            .upsert_document(doc)
            .await
            .map_err(|e| PipelineError::Store(format!("document update failed: {e}")))?;

        let duration_ms = started.elapsed().as_millis();
        tracing::info!(
            document_id = %doc.id,
            path = %doc.source_path,
            chunks = doc.chunk_count,
            chars = doc.char_count,
            ocr = doc.ocr_applied,
            version = doc.file_version,
            duration_ms,
            "document ingested"
        );

        Ok(IngestOutcome::Done(IngestReport {
            document_id: doc.id.clone(),
            chunk_count: doc.chunk_count as usize,
            char_count: doc.char_count as usize,
            page_count: doc.page_count,
            source_meta: extracted.meta,
            ocr_applied: doc.ocr_applied,
            analysis,
            duration_ms,
        }))
    }

    /// Terminal skip: the file has no usable text. Prior chunks are removed
    /// so a document whose content disappeared stops serving stale ones.
    async fn skip(&self, doc: &mut Document, reason: &str, used_ocr: bool) -> IngestOutcome {
        if let Err(e) = self.store.delete_chunks(&doc.id).await {
            tracing::warn!(document_id = %doc.id, error = %e, "chunk cleanup on skip failed");
        }
        doc.status = IngestStatus::Skipped;
        doc.error = Some(reason.to_string());
        doc.chunk_count = 0;
        doc.char_count = 0;
        doc.word_count = 0;
        doc.page_count = None;
        doc.language = None;
        doc.analysis = None;
        doc.content_hash = None;
        doc.ocr_applied = used_ocr;
        self.persist(doc).await;
        tracing::info!(document_id = %doc.id, path = %doc.source_path, reason, "document skipped");
        IngestOutcome::Skipped {
            document_id: doc.id.clone(),
            reason: reason.to_string(),
        }
    }

    async fn fail(&self, mut doc: Document, error: String) -> IngestOutcome {
        doc.status = IngestStatus::Failed;
        doc.error = Some(error.clone());
        self.persist(&doc).await;
        tracing::warn!(document_id = %doc.id, path = %doc.source_path, error = %error, "ingestion failed");
        IngestOutcome::Failed {
            document_id: doc.id,
            error,
        }
    }

    /// Best-effort row write for terminal states. The outcome already
    /// carries the classification, so a store failure here only logs.
    async fn persist(&self, doc: &Document) {
        if let Err(e) = self.store.upsert_document(doc).await {
            tracing::error!(document_id = %doc.id, error = %e, "failed to persist document status");
        }
    }
}
