//! End-to-end pipeline scenarios through the public API.
//!
//! Runs the real orchestrators over a tempdir blob tree with the in-memory
//! catalog and scripted embedding/OCR/chat collaborators, so every assertion
//! exercises the same code paths the binary does, minus the network.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use ragmill::analyze::{ChatApi, DocumentAnalyzer};
use ragmill::chunk::ChunkParams;
use ragmill::config::{AnalysisConfig, EmbeddingConfig, ExtractionConfig, OcrConfig, SyncConfig};
use ragmill::embed::{ApiFailure, EmbeddingApi, EmbeddingGenerator};
use ragmill::error::{PipelineError, Result};
use ragmill::extract::Extractor;
use ragmill::ingest::{IngestOptions, IngestOutcome, IngestRequest, Ingestor};
use ragmill::models::{Chunk, Document, IngestStatus, ScopeSummary};
use ragmill::ocr::OcrEngine;
use ragmill::store::fs::FsBlobStore;
use ragmill::store::memory::MemoryStore;
use ragmill::store::DocumentStore;
use ragmill::sync::Syncer;

const DIMS: usize = 8;

/// Deterministic embedding backend: the vector is a pure function of the
/// text, so repeat runs must produce bit-identical vectors.
struct CountingApi {
    calls: AtomicUsize,
}

impl CountingApi {
    fn new() -> Self {
        CountingApi {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingApi for CountingApi {
    async fn embed(
        &self,
        texts: &[String],
        _model: &str,
        dimensions: usize,
    ) -> std::result::Result<Vec<Vec<f32>>, ApiFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![t.len() as f32; dimensions];
                v[0] = t.bytes().next().unwrap_or(0) as f32;
                v
            })
            .collect())
    }
}

struct FixedOcr(String);

#[async_trait]
impl OcrEngine for FixedOcr {
    async fn recognize(&self, _bytes: &[u8], _languages: &[String]) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct ScriptedChat(std::result::Result<String, String>);

#[async_trait]
impl ChatApi for ScriptedChat {
    async fn complete_json(&self, _system: &str, _user: &str, _model: &str) -> Result<String> {
        match &self.0 {
            Ok(s) => Ok(s.clone()),
            Err(e) => Err(PipelineError::Analysis(e.clone())),
        }
    }
}

/// Catalog whose path lookup always fails, for the error path that runs
/// before any row exists.
struct OfflineCatalog;

#[async_trait]
impl DocumentStore for OfflineCatalog {
    async fn get_document(&self, _id: &str) -> Result<Option<Document>> {
        Ok(None)
    }
    async fn find_by_path(&self, _scope: &str, _source_path: &str) -> Result<Option<Document>> {
        Err(PipelineError::Store("catalog offline".to_string()))
    }
    async fn list_documents(&self, _scope: &str) -> Result<Vec<Document>> {
        Ok(Vec::new())
    }
    async fn upsert_document(&self, doc: &Document) -> Result<String> {
        Ok(doc.id.clone())
    }
    async fn begin_processing(&self, _id: &str) -> Result<bool> {
        Ok(true)
    }
    async fn replace_chunks(&self, _document_id: &str, _chunks: &[Chunk]) -> Result<()> {
        Ok(())
    }
    async fn delete_chunks(&self, _document_id: &str) -> Result<()> {
        Ok(())
    }
    async fn get_chunks(&self, _document_id: &str) -> Result<Vec<Chunk>> {
        Ok(Vec::new())
    }
    async fn count_documents(&self, _scope: &str) -> Result<u64> {
        Ok(0)
    }
    async fn count_chunks(&self, _scope: &str) -> Result<u64> {
        Ok(0)
    }
    async fn get_scope_summary(&self, _scope: &str) -> Result<Option<ScopeSummary>> {
        Ok(None)
    }
    async fn put_scope_summary(&self, _summary: &ScopeSummary) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    root: std::path::PathBuf,
    store: Arc<MemoryStore>,
    api: Arc<CountingApi>,
    ingestor: Arc<Ingestor>,
}

impl Harness {
    fn new() -> Self {
        Self::build(None, None)
    }

    fn with_ocr(ocr_text: &str) -> Self {
        Self::build(Some(Arc::new(FixedOcr(ocr_text.to_string()))), None)
    }

    fn with_chat(reply: std::result::Result<&str, &str>) -> Self {
        let chat = ScriptedChat(reply.map(str::to_string).map_err(str::to_string));
        Self::build(None, Some(Arc::new(chat)))
    }

    fn build(ocr: Option<Arc<dyn OcrEngine>>, chat: Option<Arc<dyn ChatApi>>) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(CountingApi::new());

        let embedding_config = EmbeddingConfig {
            dimensions: DIMS,
            ..EmbeddingConfig::default()
        };
        let embedder =
            EmbeddingGenerator::new(api.clone(), store.clone(), embedding_config);

        let analysis_config = AnalysisConfig {
            enabled: chat.is_some(),
            ..AnalysisConfig::default()
        };
        let analyzer = DocumentAnalyzer::new(chat, analysis_config);

        let ingestor = Arc::new(Ingestor::new(
            Arc::new(FsBlobStore::new(&root)),
            store.clone(),
            Extractor::new(ExtractionConfig::default(), None),
            ocr,
            OcrConfig::default(),
            embedder,
            analyzer,
            ChunkParams::default(),
        ));

        Harness {
            _dir: dir,
            root,
            store,
            api,
            ingestor,
        }
    }

    fn write(&self, rel: &str, bytes: &[u8]) {
        let full = self.root.join(rel);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, bytes).unwrap();
    }

    fn request(&self, rel: &str) -> IngestRequest {
        let full = self.root.join(rel);
        let metadata = fs::metadata(&full).unwrap();
        IngestRequest {
            scope: rel.split('/').next().unwrap().to_string(),
            source_path: rel.to_string(),
            filename: Path::new(rel)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string(),
            mime: None,
            size_bytes: metadata.len() as i64,
            modified_at: metadata.modified().unwrap().into(),
        }
    }

    async fn ingest(&self, rel: &str) -> IngestOutcome {
        self.ingestor
            .ingest(self.request(rel), IngestOptions::default())
            .await
    }

    fn syncer(&self) -> Syncer {
        Syncer::new(
            &self.root,
            self.store.clone(),
            self.ingestor.clone(),
            SyncConfig::default(),
            IngestOptions::default(),
        )
    }
}

/// Minimal valid single-page PDF carrying `phrase` as its only text, with a
/// correct xref table so the local parser accepts it.
fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let stream = format!("BT /F1 12 Tf 100 700 Td ({phrase}) Tj ET\n");
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}endstream endobj\n",
            stream.len(),
            stream
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    for offset in [0usize, o1, o2, o3, o4, o5] {
        let kind = if offset == 0 { 'f' } else { 'n' };
        out.extend_from_slice(format!("{:010} {:05} {} \n", offset, if offset == 0 { 65535 } else { 0 }, kind).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{xref_start}\n").as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

#[tokio::test]
async fn test_plain_text_three_chunks() {
    let h = Harness::new();
    h.write("alpha/long.txt", "word ".repeat(600).as_bytes());

    let outcome = h.ingest("alpha/long.txt").await;
    let report = match outcome {
        IngestOutcome::Done(r) => r,
        other => panic!("expected Done, got {other:?}"),
    };
    assert_eq!(report.chunk_count, 3);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/long.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Done);
    assert_eq!(doc.chunk_count, 3);
    assert_eq!(doc.file_version, 1);
    assert!(doc.content_hash.is_some());

    let chunks = h.store.get_chunks(&doc.id).await.unwrap();
    assert_eq!(chunks.len(), 3);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.chunk_index, i as i64);
        assert_eq!(c.embedding.len(), DIMS);
        assert!(c.text.chars().count() <= 1500);
    }
}

#[tokio::test]
async fn test_scanned_pdf_recovered_by_ocr() {
    let ocr_text = "Recovered scanned paragraph with real words in it. ".repeat(10);
    let h = Harness::with_ocr(&ocr_text);
    // Extraction yields ~40 chars, under the 100-char OCR floor.
    h.write(
        "alpha/scan.pdf",
        &minimal_pdf("faint scanned contract page text here"),
    );

    let outcome = h.ingest("alpha/scan.pdf").await;
    let report = match outcome {
        IngestOutcome::Done(r) => r,
        other => panic!("expected Done, got {other:?}"),
    };
    assert!(report.ocr_applied);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/scan.pdf")
        .await
        .unwrap()
        .unwrap();
    assert!(doc.ocr_applied);
    let chunks = h.store.get_chunks(&doc.id).await.unwrap();
    assert!(
        chunks[0].text.starts_with("Recovered scanned paragraph"),
        "stored text must be the OCR output"
    );
}

#[tokio::test]
async fn test_tiny_file_skipped_without_embedding() {
    let h = Harness::new();
    h.write("alpha/tiny.txt", b"hi ok");

    let outcome = h.ingest("alpha/tiny.txt").await;
    match outcome {
        IngestOutcome::Skipped { reason, .. } => {
            assert_eq!(reason, "no extractable text");
        }
        other => panic!("expected Skipped, got {other:?}"),
    }

    let doc = h
        .store
        .find_by_path("alpha", "alpha/tiny.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Skipped);
    assert_eq!(doc.chunk_count, 0);
    assert!(h.store.get_chunks(&doc.id).await.unwrap().is_empty());
    assert_eq!(h.api.calls(), 0, "no embedding calls for a skipped file");
}

#[tokio::test]
async fn test_unsupported_format_fails() {
    let h = Harness::new();
    h.write("alpha/blob.bin", &[0u8, 1, 2, 3]);

    match h.ingest("alpha/blob.bin").await {
        IngestOutcome::Failed { error, .. } => {
            assert!(error.contains("unsupported format"), "got: {error}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    let doc = h
        .store
        .find_by_path("alpha", "alpha/blob.bin")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Failed);
    assert!(doc.error.is_some());
}

#[tokio::test]
async fn test_store_lookup_failure_names_the_path() {
    let dir = TempDir::new().unwrap();
    let embedder = EmbeddingGenerator::new(
        Arc::new(CountingApi::new()),
        Arc::new(MemoryStore::new()),
        EmbeddingConfig {
            dimensions: DIMS,
            ..EmbeddingConfig::default()
        },
    );
    let ingestor = Ingestor::new(
        Arc::new(FsBlobStore::new(dir.path())),
        Arc::new(OfflineCatalog),
        Extractor::new(ExtractionConfig::default(), None),
        None,
        OcrConfig::default(),
        embedder,
        DocumentAnalyzer::new(None, AnalysisConfig::default()),
        ChunkParams::default(),
    );

    let request = IngestRequest {
        scope: "alpha".to_string(),
        source_path: "alpha/missing.txt".to_string(),
        filename: "missing.txt".to_string(),
        mime: None,
        size_bytes: 1,
        modified_at: std::time::SystemTime::now().into(),
    };
    match ingestor.ingest(request, IngestOptions::default()).await {
        IngestOutcome::Failed { document_id, error } => {
            assert!(document_id.is_empty());
            assert!(error.contains("alpha/missing.txt"), "got: {error}");
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_reindex_hits_cache_with_identical_vectors() {
    let h = Harness::new();
    h.write("alpha/doc.txt", "stable interesting content. ".repeat(20).as_bytes());

    assert!(h.ingest("alpha/doc.txt").await.is_done());
    let calls_after_first = h.api.calls();
    assert_eq!(calls_after_first, 1);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/doc.txt")
        .await
        .unwrap()
        .unwrap();
    let first: Vec<Vec<f32>> = h
        .store
        .get_chunks(&doc.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.embedding)
        .collect();

    let outcome = h
        .ingestor
        .ingest(
            h.request("alpha/doc.txt"),
            IngestOptions {
                force_reindex: true,
                ..IngestOptions::default()
            },
        )
        .await;
    assert!(outcome.is_done());
    assert_eq!(
        h.api.calls(),
        calls_after_first,
        "second pass must be served from the cache"
    );

    let second: Vec<Vec<f32>> = h
        .store
        .get_chunks(&doc.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.embedding)
        .collect();
    assert_eq!(first, second);

    let doc = h.store.get_document(&doc.id).await.unwrap().unwrap();
    assert_eq!(doc.file_version, 2, "forced reindex still bumps the version");
}

#[tokio::test]
async fn test_unchanged_content_short_circuits() {
    let h = Harness::new();
    h.write("alpha/doc.txt", "stable interesting content. ".repeat(20).as_bytes());

    assert!(h.ingest("alpha/doc.txt").await.is_done());
    match h.ingest("alpha/doc.txt").await {
        IngestOutcome::Skipped { reason, .. } => assert_eq!(reason, "content unchanged"),
        other => panic!("expected Skipped, got {other:?}"),
    }

    let doc = h
        .store
        .find_by_path("alpha", "alpha/doc.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Done);
    assert_eq!(doc.file_version, 1, "no version bump without re-embed");
}

#[tokio::test]
async fn test_analysis_failure_is_nonfatal() {
    let h = Harness::with_chat(Err("model unreachable"));
    h.write("alpha/doc.txt", "perfectly normal document content. ".repeat(10).as_bytes());

    let outcome = h.ingest("alpha/doc.txt").await;
    let report = match outcome {
        IngestOutcome::Done(r) => r,
        other => panic!("expected Done, got {other:?}"),
    };
    assert!(report.analysis.is_none());
}

#[tokio::test]
async fn test_analysis_enriches_document() {
    let reply = r#"{
        "doc_type": "contract",
        "summary": "A services agreement between two parties. It runs for one year.",
        "key_entities": ["Acme GmbH"],
        "key_dates": ["2025-01-01"],
        "department": "legal",
        "language": "en",
        "importance": "critical"
    }"#;
    let h = Harness::with_chat(Ok(reply));
    h.write("alpha/msa.txt", "master services agreement body text. ".repeat(10).as_bytes());

    assert!(h.ingest("alpha/msa.txt").await.is_done());
    let doc = h
        .store
        .find_by_path("alpha", "alpha/msa.txt")
        .await
        .unwrap()
        .unwrap();
    let analysis = doc.analysis.expect("analysis should be stored");
    assert_eq!(analysis.doc_type.as_deref(), Some("contract"));
    assert_eq!(analysis.importance.as_deref(), Some("critical"));
    assert_eq!(doc.language.as_deref(), Some("en"), "analyzer language wins");
}

#[tokio::test]
async fn test_emptied_document_loses_derived_fields() {
    let reply = r#"{
        "doc_type": "report",
        "summary": "A quarterly report.",
        "key_entities": [],
        "key_dates": [],
        "department": "finance",
        "language": "en",
        "importance": "normal"
    }"#;
    let h = Harness::with_chat(Ok(reply));
    h.write("alpha/q3.txt", "quarterly report body text with numbers. ".repeat(10).as_bytes());
    assert!(h.ingest("alpha/q3.txt").await.is_done());

    // The file shrinks below the viability floor; the row must not keep
    // describing text that no longer exists.
    h.write("alpha/q3.txt", b"n/a");
    match h.ingest("alpha/q3.txt").await {
        IngestOutcome::Skipped { reason, .. } => assert_eq!(reason, "no extractable text"),
        other => panic!("expected Skipped, got {other:?}"),
    }

    let doc = h
        .store
        .find_by_path("alpha", "alpha/q3.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Skipped);
    assert_eq!(doc.chunk_count, 0);
    assert!(doc.analysis.is_none());
    assert!(doc.language.is_none());
    assert!(doc.page_count.is_none());
    assert!(doc.content_hash.is_none());
}

#[tokio::test]
async fn test_docx_ingests() {
    use std::io::Write;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let body: String = (0..30)
            .map(|i| format!("<w:p><w:r><w:t>Paragraph number {i} with some words.</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{body}</w:body></w:document>"
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    let h = Harness::new();
    h.write("alpha/report.docx", &buf);

    let outcome = h.ingest("alpha/report.docx").await;
    let report = match outcome {
        IngestOutcome::Done(r) => r,
        other => panic!("expected Done, got {other:?}"),
    };
    assert!(report.chunk_count >= 1);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/report.docx")
        .await
        .unwrap()
        .unwrap();
    let chunks = h.store.get_chunks(&doc.id).await.unwrap();
    assert!(chunks[0].text.contains("Paragraph number 0"));
}

#[tokio::test]
async fn test_sync_twice_is_idempotent() {
    let h = Harness::new();
    h.write("alpha/a.txt", "first document body with plenty of words. ".repeat(5).as_bytes());
    h.write("alpha/sub/b.txt", "second document body with plenty of words. ".repeat(5).as_bytes());

    let first = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.new, 2);
    assert_eq!(first.errored, 0);
    assert_eq!(first.total_files, 2);
    assert!(first.total_chunks >= 2);

    let second = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.deleted, 0);
    assert_eq!(second.skipped, 2);

    let summary = h.store.get_scope_summary("alpha").await.unwrap().unwrap();
    assert_eq!(summary.status, ragmill::models::SyncStatus::Done);
    assert_eq!(summary.report, second);
}

#[tokio::test]
async fn test_sync_releases_stale_processing_claim() {
    let h = Harness::new();
    h.write("alpha/report.txt", "orphaned document body with plenty of words. ".repeat(15).as_bytes());

    // A claim left behind by a run that died mid-pipeline.
    let req = h.request("alpha/report.txt");
    let mut doc = Document::new(
        &req.scope,
        &req.source_path,
        &req.filename,
        "text/plain",
        req.size_bytes,
        req.modified_at,
    );
    doc.status = IngestStatus::Processing;
    let id = h.store.upsert_document(&doc).await.unwrap();

    // Direct re-ingest is refused while the claim is held.
    let refused = h.ingest("alpha/report.txt").await;
    assert!(matches!(refused, IngestOutcome::Failed { .. }));

    // A sync run releases the claim and ingests the document.
    let report = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(report.errored, 0);
    assert_eq!(report.updated, 1);

    let doc = h.store.get_document(&id).await.unwrap().unwrap();
    assert_eq!(doc.status, IngestStatus::Done);
    assert!(doc.chunk_count > 0);
}

#[tokio::test]
async fn test_sync_detects_deletion() {
    let h = Harness::new();
    h.write("alpha/keep.txt", "kept document body with plenty of words. ".repeat(5).as_bytes());
    h.write("alpha/gone.txt", "doomed document body with plenty of words. ".repeat(5).as_bytes());

    h.syncer().sync("alpha", false).await.unwrap();
    fs::remove_file(h.root.join("alpha/gone.txt")).unwrap();

    let report = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(report.deleted, 1);
    assert_eq!(report.skipped, 1);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/gone.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, IngestStatus::Deleted);
    assert_eq!(doc.chunk_count, 0);
    assert!(h.store.get_chunks(&doc.id).await.unwrap().is_empty());
    // Soft delete: the row remains visible.
    assert!(doc.error.is_some());
}

#[tokio::test]
async fn test_sync_continues_past_failing_document() {
    let h = Harness::new();
    h.write("alpha/good.txt", "ingestable document body with plenty of words. ".repeat(5).as_bytes());
    h.write("alpha/bad.bin", &[0u8, 159, 146, 150]);

    let report = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(report.scanned, 2);
    assert_eq!(report.new, 1);
    assert_eq!(report.errored, 1);

    let good = h
        .store
        .find_by_path("alpha", "alpha/good.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(good.status, IngestStatus::Done);
    let bad = h
        .store
        .find_by_path("alpha", "alpha/bad.bin")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bad.status, IngestStatus::Failed);
}

#[tokio::test]
async fn test_sync_excludes_temp_and_hidden_files() {
    let h = Harness::new();
    h.write("alpha/real.txt", "actual document body with plenty of words. ".repeat(5).as_bytes());
    h.write("alpha/~$real.txt", b"lock file");
    h.write("alpha/.hidden.txt", b"hidden file content here");
    h.write("alpha/.git/config", b"[core]");
    h.write("alpha/scratch.tmp", b"temporary scratch content");

    let report = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.new, 1);
}

#[tokio::test]
async fn test_sync_dry_run_writes_nothing() {
    let h = Harness::new();
    h.write("alpha/a.txt", "dry run candidate body with plenty of words. ".repeat(5).as_bytes());

    let report = h.syncer().sync("alpha", true).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.new, 1);

    assert_eq!(h.store.count_documents("alpha").await.unwrap(), 0);
    assert_eq!(h.api.calls(), 0);
    assert!(h.store.get_scope_summary("alpha").await.unwrap().is_none());
}

#[tokio::test]
async fn test_sync_missing_scope_aborts_with_error_summary() {
    let h = Harness::new();
    let err = h.syncer().sync("nonexistent", false).await.unwrap_err();
    assert!(err.to_string().contains("scope root"));

    let summary = h
        .store
        .get_scope_summary("nonexistent")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.status, ragmill::models::SyncStatus::Error);
    assert!(summary.error.is_some());
}

#[tokio::test]
async fn test_modified_file_is_reingested_as_updated() {
    let h = Harness::new();
    h.write("alpha/doc.txt", "original version of the document body. ".repeat(5).as_bytes());
    h.syncer().sync("alpha", false).await.unwrap();

    // Rewrite with new content and a clearly newer mtime.
    h.write("alpha/doc.txt", "revised version of the document body text. ".repeat(5).as_bytes());
    let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
    let file = fs::File::options()
        .write(true)
        .open(h.root.join("alpha/doc.txt"))
        .unwrap();
    file.set_modified(future).unwrap();

    let report = h.syncer().sync("alpha", false).await.unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.new, 0);

    let doc = h
        .store
        .find_by_path("alpha", "alpha/doc.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.file_version, 2);
}
