//! # ragmill
//!
//! A document ingestion and embedding pipeline for retrieval-augmented
//! search. ragmill takes uploaded or directory-scanned files, extracts their
//! text (with engine fallback and optional OCR), chunks it, embeds the
//! chunks with content-addressed caching, optionally enriches documents via
//! an LLM, and keeps the resulting index in sync with a changing file tree.
//!
//! ## Pipeline
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌─────────┐   ┌──────────┐
//! │   Sync    │──▶│  Extract   │──▶│Normalize │──▶│  Chunk   │──▶│  Embed    │
//! │ (per file)│   │ [+ OCR]   │   │[+Analyze]│   │          │   │ (cached) │
//! └──────────┘   └───────────┘   └─────────┘   └─────────┘   └────┬─────┘
//!                                                                  ▼
//!                                                            ┌──────────┐
//!                                                            │  SQLite   │
//!                                                            │ docs+vecs │
//!                                                            └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragmill init                  # create database
//! ragmill sync contracts        # reconcile the contracts/ scope
//! ragmill ingest hr/handbook.pdf --force-ocr
//! ragmill status contracts      # last sync summary
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`ocr`] | OCR fallback for scanned documents |
//! | [`normalize`] | Text normalization and hashing |
//! | [`chunk`] | Boundary-aware chunking |
//! | [`embed`] | Embedding generation and cache policy |
//! | [`analyze`] | Optional LLM document classification |
//! | [`ingest`] | Per-document orchestration |
//! | [`sync`] | Incremental scope reconciliation |
//! | [`store`] | Blob, catalog, and cache backends |

pub mod analyze;
pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod ocr;
pub mod store;
pub mod sync;
