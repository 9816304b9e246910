/// Vector store seam.
///
/// The pipeline treats the store as an external collaborator behind
/// this trait: upsert-by-id, similarity search with a score
/// threshold, metadata scroll, and two delete shapes. The in-memory
/// implementation in [`memory`] backs tests and the default binary
/// wiring.
pub mod memory;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::CanonicalMetadata;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("dimension mismatch: store holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// One indexed chunk as the store holds it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: CanonicalMetadata,
}

/// A search hit with its similarity score in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: Record,
    pub similarity: f32,
}

/// Metadata filter for search, scroll and delete.
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub path: Option<String>,
}

impl StoreFilter {
    #[must_use]
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub(crate) fn matches(&self, record: &Record) -> bool {
        match &self.path {
            Some(path) => record.metadata.file_path == *path,
            None => true,
        }
    }
}

/// Trait for vector store implementations.
///
/// All implementations must be `Send + Sync`; the pipeline shares
/// them behind `Arc<dyn VectorStore>`.
pub trait VectorStore: Send + Sync {
    /// Insert or replace records by id.
    fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError>;

    /// Similarity search. Returns at most `limit` records whose score
    /// meets `threshold`, best first.
    fn search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
        filter: &StoreFilter,
    ) -> Result<Vec<ScoredRecord>, StoreError>;

    /// Walk stored records by metadata, no vector math involved.
    fn scroll(&self, filter: &StoreFilter, limit: usize) -> Result<Vec<Record>, StoreError>;

    /// Delete everything matching the filter. Returns the count removed.
    fn delete_by_filter(&self, filter: &StoreFilter) -> Result<usize, StoreError>;

    /// Delete specific records by id. Returns the count removed.
    fn delete_by_ids(&self, ids: &[String]) -> Result<usize, StoreError>;
}
