/// Error taxonomy for the indexing pipeline and the search path.
///
/// Configuration problems are fatal at startup and surface through
/// `Config::validate()` as `anyhow` errors; everything here is a
/// per-item failure that the pipeline logs and survives.
use std::path::PathBuf;

use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::store::StoreError;

/// Failures while processing a single discovered file.
///
/// None of these stop the consumer loop: `Ignored` is informational,
/// the rest are logged and the file is skipped (store failures leave
/// the file for retry on the next crawl pass).
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("file excluded by ignore rules: {0}")]
    Ignored(PathBuf),

    #[error("no loader registered for extension: {0}")]
    UnsupportedFormat(String),

    #[error("failed to load {path}: {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("processing timed out after {seconds}s: {path}")]
    Timeout { path: PathBuf, seconds: u64 },

    #[error(transparent)]
    Embedder(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures on the query path.
///
/// Search returns either a complete ranked result list or exactly one
/// of these — never a partial set presented as complete.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error(transparent)]
    Embedder(#[from] EmbedderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("reranker failed: {0}")]
    Rerank(String),
}
