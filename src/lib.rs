//! # semdex — incremental semantic document indexer
//!
//! Crawls a directory of heterogeneous documents (PDF, Office, text,
//! Markdown notes), chunks and embeds them into a vector store, keeps
//! the store in sync with the filesystem, and serves ranked semantic
//! search results.
//!
//! ## Architecture
//!
//! - **[`config`]** — JSON configuration, defaults, validation
//! - **[`ignore`]** — `.semdexignore` exclusion rules
//! - **[`crawler`]** — change-aware filesystem discovery (one-shot and polling)
//! - **[`queue`]** — FIFO hand-off between crawler and indexer
//! - **[`loader`]** — per-format document loaders behind one trait
//! - **[`chunking`]** — character-window and header-aware chunkers
//! - **[`metadata`]** — tag/date normalization to canonical metadata
//! - **[`identity`]** — content-derived record ids (SHA-256 → UUID)
//! - **[`indexer`]** — consumer loop: reindex decisions, purge, cleanup
//! - **[`search`]** — overfetch, rerank, dedup, recency/tag scoring
//! - **[`embedder`]** / **[`reranker`]** / **[`store`]** — model and
//!   store seams with deterministic in-process implementations

pub mod chunking;
pub mod config;
pub mod crawler;
pub mod embedder;
pub mod error;
pub mod identity;
pub mod ignore;
pub mod indexer;
pub mod loader;
pub mod metadata;
pub mod queue;
pub mod reranker;
pub mod search;
pub mod store;
