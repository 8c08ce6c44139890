//! # ragmill CLI
//!
//! The `ragmill` binary drives the ingestion pipeline from the command line.
//!
//! ## Usage
//!
//! ```bash
//! ragmill --config ./config/ragmill.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ragmill init` | Create the SQLite database and run schema migrations |
//! | `ragmill ingest <path>` | Ingest one file (path relative to the blob root) |
//! | `ragmill sync <scope>` | Reconcile a scope directory with the index |
//! | `ragmill status <scope>` | Show the last sync summary and current counts |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragmill::analyze::{DocumentAnalyzer, HttpChatApi};
use ragmill::config::{self, Config};
use ragmill::embed::{EmbeddingGenerator, HttpEmbeddingApi};
use ragmill::extract::{Extractor, HttpExtractionService, RemoteExtractionService};
use ragmill::ingest::{IngestOptions, IngestOutcome, IngestRequest, Ingestor};
use ragmill::ocr::{HttpOcrEngine, OcrEngine};
use ragmill::store::fs::FsBlobStore;
use ragmill::store::sqlite::SqliteStore;
use ragmill::sync::Syncer;

/// ragmill — document ingestion and embedding pipeline for
/// retrieval-augmented search.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/ragmill.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "ragmill",
    about = "ragmill — document ingestion and embedding pipeline for retrieval-augmented search",
    version,
    long_about = "ragmill extracts text from uploaded or scanned files (PDF, Office, \
    spreadsheets, plain text), recovers scanned documents via OCR, chunks and embeds the text \
    with content-addressed caching, and keeps the index in sync with a changing file tree."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ragmill.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables (documents,
    /// chunks, embedding_cache, scope_summaries). Idempotent.
    Init,

    /// Ingest a single file.
    ///
    /// The path is relative to the blob root; its first segment is the
    /// owning scope. Runs the full extract → chunk → embed pipeline and
    /// prints the outcome.
    Ingest {
        /// File path relative to the blob root, e.g. `contracts/msa.pdf`.
        path: String,

        /// Run OCR even when extraction produced enough text.
        #[arg(long)]
        force_ocr: bool,

        /// Re-embed even when the content hash is unchanged.
        #[arg(long)]
        force_reindex: bool,

        /// Skip LLM enrichment for this document.
        #[arg(long)]
        skip_analysis: bool,
    },

    /// Reconcile a scope directory with the index.
    ///
    /// Enumerates `<blob root>/<scope>`, marks vanished files deleted,
    /// skips unchanged ones, and ingests the rest. Individual document
    /// failures are counted; the run continues.
    Sync {
        /// Scope name (a directory directly under the blob root).
        scope: String,

        /// Enumerate and classify without writing anything.
        #[arg(long)]
        dry_run: bool,

        /// Re-embed every file regardless of timestamps and hashes.
        #[arg(long)]
        full: bool,
    },

    /// Show the last sync summary and current counts for a scope.
    Status {
        /// Scope name.
        scope: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = SqliteStore::connect(&cfg.db.path).await?;
            store.migrate().await?;
            store.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            path,
            force_ocr,
            force_reindex,
            skip_analysis,
        } => {
            let options = IngestOptions {
                force_ocr,
                force_reindex,
                skip_analysis,
            };
            run_ingest(&cfg, &path, options).await?;
        }
        Commands::Sync {
            scope,
            dry_run,
            full,
        } => {
            run_sync(&cfg, &scope, dry_run, full).await?;
        }
        Commands::Status { scope } => {
            run_status(&cfg, &scope).await?;
        }
    }

    Ok(())
}

/// Wire every collaborator from config. The SQLite store backs both the
/// catalog and the embedding cache.
fn build_ingestor(cfg: &Config, store: Arc<SqliteStore>) -> Result<Ingestor> {
    let blobs = Arc::new(FsBlobStore::new(&cfg.blobs.root));

    let remote: Option<Arc<dyn RemoteExtractionService>> = match &cfg.extraction.remote_url {
        Some(url) => Some(Arc::new(HttpExtractionService::new(
            url,
            cfg.extraction.remote_timeout_secs,
        )?)),
        None => None,
    };
    let extractor = Extractor::new(cfg.extraction.clone(), remote);

    let ocr: Option<Arc<dyn OcrEngine>> = HttpOcrEngine::from_config(&cfg.ocr)?
        .map(|engine| Arc::new(engine) as Arc<dyn OcrEngine>);

    let api = Arc::new(HttpEmbeddingApi::from_config(&cfg.embedding)?);
    let embedder = EmbeddingGenerator::new(api, store.clone(), cfg.embedding.clone());

    let analyzer = if cfg.analysis.enabled {
        let chat = Arc::new(HttpChatApi::from_config(&cfg.analysis)?);
        DocumentAnalyzer::new(Some(chat), cfg.analysis.clone())
    } else {
        DocumentAnalyzer::disabled(cfg.analysis.clone())
    };

    Ok(Ingestor::new(
        blobs,
        store,
        extractor,
        ocr,
        cfg.ocr.clone(),
        embedder,
        analyzer,
        cfg.chunking.params(),
    ))
}

async fn run_ingest(cfg: &Config, path: &str, options: IngestOptions) -> Result<()> {
    let scope = match path.split('/').next() {
        Some(s) if !s.is_empty() && s != path => s.to_string(),
        _ => bail!("path must be <scope>/<file...>, e.g. contracts/msa.pdf"),
    };
    let full_path = cfg.blobs.root.join(path);
    let metadata = std::fs::metadata(&full_path)
        .with_context(|| format!("cannot stat {}", full_path.display()))?;
    let filename = full_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let modified_at = metadata
        .modified()
        .map(chrono::DateTime::<chrono::Utc>::from)
        .unwrap_or_else(|_| chrono::Utc::now());

    let store = Arc::new(SqliteStore::connect(&cfg.db.path).await?);
    store.migrate().await?;
    let ingestor = build_ingestor(cfg, store.clone())?;

    let outcome = ingestor
        .ingest(
            IngestRequest {
                scope,
                source_path: path.to_string(),
                filename,
                mime: None,
                size_bytes: metadata.len() as i64,
                modified_at,
            },
            options,
        )
        .await;

    match outcome {
        IngestOutcome::Done(report) => {
            println!("ingest {path}");
            println!("  chunks: {}", report.chunk_count);
            println!("  chars: {}", report.char_count);
            if let Some(pages) = report.page_count {
                println!("  pages: {}", pages);
            }
            println!("  ocr applied: {}", report.ocr_applied);
            if let Some(analysis) = &report.analysis {
                if let Some(doc_type) = &analysis.doc_type {
                    println!("  type: {}", doc_type);
                }
                if let Some(summary) = &analysis.summary {
                    println!("  summary: {}", summary);
                }
            }
            println!("  took: {}ms", report.duration_ms);
            println!("ok");
        }
        IngestOutcome::Skipped { reason, .. } => {
            println!("ingest {path}");
            println!("  skipped: {reason}");
        }
        IngestOutcome::Failed { error, .. } => {
            store.close().await;
            bail!("ingest {path} failed: {error}");
        }
    }

    store.close().await;
    Ok(())
}

async fn run_sync(cfg: &Config, scope: &str, dry_run: bool, full: bool) -> Result<()> {
    let store = Arc::new(SqliteStore::connect(&cfg.db.path).await?);
    store.migrate().await?;
    let ingestor = Arc::new(build_ingestor(cfg, store.clone())?);

    let options = IngestOptions {
        force_reindex: full,
        ..IngestOptions::default()
    };
    let syncer = Syncer::new(
        &cfg.blobs.root,
        store.clone(),
        ingestor,
        cfg.sync.clone(),
        options,
    );

    let report = syncer.sync(scope, dry_run).await?;

    if dry_run {
        println!("sync {scope} (dry-run)");
    } else {
        println!("sync {scope}");
    }
    println!("  scanned: {}", report.scanned);
    println!("  new: {}", report.new);
    println!("  updated: {}", report.updated);
    println!("  skipped: {}", report.skipped);
    println!("  deleted: {}", report.deleted);
    println!("  errored: {}", report.errored);
    if !dry_run {
        println!("  total files: {}", report.total_files);
        println!("  total chunks: {}", report.total_chunks);
    }
    println!("ok");

    store.close().await;
    Ok(())
}

async fn run_status(cfg: &Config, scope: &str) -> Result<()> {
    use ragmill::store::DocumentStore;

    let store = SqliteStore::connect(&cfg.db.path).await?;
    store.migrate().await?;

    match store.get_scope_summary(scope).await? {
        Some(summary) => {
            println!("scope {scope}");
            println!("  status: {}", summary.status.as_str());
            if let Some(error) = &summary.error {
                println!("  error: {}", error);
            }
            println!("  started: {}", summary.started_at.to_rfc3339());
            if let Some(finished) = summary.finished_at {
                println!("  finished: {}", finished.to_rfc3339());
            }
            let r = summary.report;
            println!(
                "  last run: scanned={} new={} updated={} skipped={} deleted={} errored={}",
                r.scanned, r.new, r.updated, r.skipped, r.deleted, r.errored
            );
        }
        None => println!("scope {scope}: never synced"),
    }
    println!("  files: {}", store.count_documents(scope).await?);
    println!("  chunks: {}", store.count_chunks(scope).await?);

    store.close().await;
    Ok(())
}
