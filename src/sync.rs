//! Incremental sync of a scope against its source directory.
//!
//! One run enumerates the files under the scope's root, marks rows whose
//! file vanished as deleted, skips files whose modification time is
//! untouched, and pushes everything else through the [`Ingestor`]. A single
//! document's failure is counted and the run continues; only enumeration or
//! store-listing failures abort the whole run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::SyncConfig;
use crate::error::{PipelineError, Result};
use crate::ingest::{IngestOptions, IngestOutcome, IngestRequest, Ingestor};
use crate::models::{IngestStatus, ScopeSummary, SyncReport, SyncStatus};
use crate::store::DocumentStore;

/// Editor lock files and OS metadata that never carry content.
const TEMP_FILE_PATTERNS: &[&str] = &[
    "~$*",
    "*.tmp",
    "*.swp",
    ".~lock*",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
];

/// One file observed during enumeration.
#[derive(Debug, Clone)]
struct SourceFile {
    /// Relative to the blob root, scope segment included.
    source_path: String,
    filename: String,
    size_bytes: i64,
    modified_at: DateTime<Utc>,
}

/// Drives [`Ingestor`] over a whole scope.
pub struct Syncer {
    root: PathBuf,
    store: Arc<dyn DocumentStore>,
    ingestor: Arc<Ingestor>,
    config: SyncConfig,
    options: IngestOptions,
}

impl Syncer {
    pub fn new(
        root: impl Into<PathBuf>,
        store: Arc<dyn DocumentStore>,
        ingestor: Arc<Ingestor>,
        config: SyncConfig,
        options: IngestOptions,
    ) -> Self {
        Syncer {
            root: root.into(),
            store,
            ingestor,
            config,
            options,
        }
    }

    /// Reconcile `scope` with the directory `<root>/<scope>`.
    ///
    /// Returns the aggregate report; the same counts plus the final status
    /// are persisted on the scope's summary row. With `dry_run` nothing is
    /// written: files are only enumerated and classified against the
    /// existing rows by timestamp.
    pub async fn sync(&self, scope: &str, dry_run: bool) -> Result<SyncReport> {
        let started_at = Utc::now();
        if !dry_run {
            self.store
                .put_scope_summary(&ScopeSummary {
                    scope: scope.to_string(),
                    status: SyncStatus::Syncing,
                    error: None,
                    started_at,
                    finished_at: None,
                    report: SyncReport::default(),
                })
                .await?;
        }

        match self.run(scope, dry_run).await {
            Ok(report) => {
                if !dry_run {
                    self.store
                        .put_scope_summary(&ScopeSummary {
                            scope: scope.to_string(),
                            status: SyncStatus::Done,
                            error: None,
                            started_at,
                            finished_at: Some(Utc::now()),
                            report,
                        })
                        .await?;
                }
                tracing::info!(
                    scope,
                    scanned = report.scanned,
                    new = report.new,
                    updated = report.updated,
                    skipped = report.skipped,
                    deleted = report.deleted,
                    errored = report.errored,
                    "sync finished"
                );
                Ok(report)
            }
            Err(e) => {
                if !dry_run {
                    // Best effort: the Err itself is the outcome.
                    let _ = self
                        .store
                        .put_scope_summary(&ScopeSummary {
                            scope: scope.to_string(),
                            status: SyncStatus::Error,
                            error: Some(e.to_string()),
                            started_at,
                            finished_at: Some(Utc::now()),
                            report: SyncReport::default(),
                        })
                        .await;
                }
                tracing::error!(scope, error = %e, "sync aborted");
                Err(e)
            }
        }
    }

    async fn run(&self, scope: &str, dry_run: bool) -> Result<SyncReport> {
        let observed = self.enumerate(scope)?;
        let existing = self.store.list_documents(scope).await?;

        let mut report = SyncReport {
            scanned: observed.len() as u64,
            ..SyncReport::default()
        };

        // A claim left behind by an interrupted run would be refused by the
        // ingestor forever; release it so this run retries the document.
        if !dry_run {
            for doc in &existing {
                if doc.status == IngestStatus::Processing {
                    let mut stale = doc.clone();
                    stale.status = IngestStatus::Failed;
                    stale.error = Some("processing interrupted".to_string());
                    self.store.upsert_document(&stale).await?;
                    tracing::warn!(scope, path = %doc.source_path, "released stale processing claim");
                }
            }
        }

        // Rows whose file is gone become soft-deleted, chunks removed.
        let observed_paths: HashSet<&str> =
            observed.iter().map(|f| f.source_path.as_str()).collect();
        for doc in &existing {
            if doc.status == IngestStatus::Deleted || observed_paths.contains(doc.source_path.as_str())
            {
                continue;
            }
            report.deleted += 1;
            if dry_run {
                continue;
            }
            self.store.delete_chunks(&doc.id).await?;
            let mut gone = doc.clone();
            gone.status = IngestStatus::Deleted;
            gone.error = Some("source file no longer present".to_string());
            gone.chunk_count = 0;
            self.store.upsert_document(&gone).await?;
            tracing::info!(scope, path = %doc.source_path, "document deleted from source");
        }

        // Classify observed files. An untouched mtime on a settled row
        // short-circuits without reading the file; everything else goes
        // through the ingestor, whose own hash check may still skip.
        let mut to_ingest: Vec<(IngestRequest, bool)> = Vec::new();
        for file in observed {
            let prior = existing
                .iter()
                .find(|d| d.source_path == file.source_path);
            if let Some(doc) = prior {
                let settled =
                    matches!(doc.status, IngestStatus::Done | IngestStatus::Skipped);
                if settled && doc.modified_at.timestamp() == file.modified_at.timestamp() {
                    report.skipped += 1;
                    continue;
                }
            }
            let is_new = prior.is_none();
            if dry_run {
                if is_new {
                    report.new += 1;
                } else {
                    report.updated += 1;
                }
                continue;
            }
            to_ingest.push((
                IngestRequest {
                    scope: scope.to_string(),
                    source_path: file.source_path,
                    filename: file.filename,
                    mime: None,
                    size_bytes: file.size_bytes,
                    modified_at: file.modified_at,
                },
                is_new,
            ));
        }

        for batch in to_ingest.chunks(self.config.concurrency.max(1)) {
            let mut handles = Vec::with_capacity(batch.len());
            for (request, is_new) in batch {
                let ingestor = Arc::clone(&self.ingestor);
                let request = request.clone();
                let options = self.options;
                let is_new = *is_new;
                handles.push(tokio::spawn(async move {
                    (ingestor.ingest(request, options).await, is_new)
                }));
            }
            for handle in handles {
                let (outcome, is_new) = handle
                    .await
                    .map_err(|e| PipelineError::Store(format!("sync task panicked: {e}")))?;
                match outcome {
                    IngestOutcome::Done(_) if is_new => report.new += 1,
                    IngestOutcome::Done(_) => report.updated += 1,
                    IngestOutcome::Skipped { .. } => report.skipped += 1,
                    IngestOutcome::Failed { .. } => report.errored += 1,
                }
            }
        }

        if !dry_run {
            report.total_files = self.store.count_documents(scope).await?;
            report.total_chunks = self.store.count_chunks(scope).await?;
        }
        Ok(report)
    }

    /// Walk `<root>/<scope>`, applying hidden/temp-file and directory
    /// excludes plus the size ceiling. Deterministic order.
    fn enumerate(&self, scope: &str) -> Result<Vec<SourceFile>> {
        let scope_dir = self.root.join(scope);
        if !scope_dir.is_dir() {
            return Err(PipelineError::Download(format!(
                "scope root does not exist: {}",
                scope_dir.display()
            )));
        }
        let temp_set = build_globset(TEMP_FILE_PATTERNS.iter().copied())?;
        let extra_set = build_globset(self.config.exclude_globs.iter().map(String::as_str))?;

        let ignored_dirs = &self.config.ignored_dirs;
        let walker = WalkDir::new(&scope_dir).into_iter().filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            if e.file_type().is_dir() {
                !ignored_dirs.iter().any(|d| d == name.as_ref())
            } else {
                true
            }
        });

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| PipelineError::Download(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || temp_set.is_match(&name) {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let rel_str = rel.to_string_lossy().to_string();
            if extra_set.is_match(&rel_str) {
                continue;
            }

            let metadata = entry
                .metadata()
                .map_err(|e| PipelineError::Download(e.to_string()))?;
            if metadata.len() > self.config.max_file_size_bytes {
                tracing::debug!(path = %rel_str, size = metadata.len(), "file over size limit, ignored");
                continue;
            }

            files.push(SourceFile {
                source_path: rel_str,
                filename: name,
                size_bytes: metadata.len() as i64,
                modified_at: system_time_to_utc(metadata.modified().ok()),
            });
        }

        files.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        Ok(files)
    }
}

fn system_time_to_utc(time: Option<std::time::SystemTime>) -> DateTime<Utc> {
    let secs = time
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Utc.timestamp_opt(secs, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn build_globset<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            Glob::new(pattern)
                .map_err(|e| PipelineError::Config(format!("bad exclude glob '{pattern}': {e}")))?,
        );
    }
    builder
        .build()
        .map_err(|e| PipelineError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_patterns_match_known_offenders() {
        let set = build_globset(TEMP_FILE_PATTERNS.iter().copied()).unwrap();
        for name in [
            "~$budget.xlsx",
            "notes.tmp",
            ".report.docx.swp",
            ".~lock.report.odt#",
            ".DS_Store",
            "Thumbs.db",
            "desktop.ini",
        ] {
            assert!(set.is_match(name), "expected {name} to be excluded");
        }
        assert!(!set.is_match("report.pdf"));
        assert!(!set.is_match("notes.txt"));
    }
}
