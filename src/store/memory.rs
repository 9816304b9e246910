/// In-memory reference implementation of [`VectorStore`].
///
/// Keeps records in insertion order behind an `RwLock` and scores
/// with cosine similarity. Not meant to hold large corpora; it exists
/// so the pipeline and its tests run without an external service.
use std::sync::RwLock;

use super::{Record, ScoredRecord, StoreError, StoreFilter, VectorStore};

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

impl VectorStore for MemoryStore {
    fn upsert(&self, records: Vec<Record>) -> Result<(), StoreError> {
        let mut held = self
            .records
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if let (Some(first), Some(existing)) = (records.first(), held.first()) {
            if first.embedding.len() != existing.embedding.len() {
                return Err(StoreError::DimensionMismatch {
                    expected: existing.embedding.len(),
                    actual: first.embedding.len(),
                });
            }
        }

        for record in records {
            match held.iter_mut().find(|r| r.id == record.id) {
                Some(slot) => *slot = record,
                None => held.push(record),
            }
        }
        Ok(())
    }

    fn search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
        filter: &StoreFilter,
    ) -> Result<Vec<ScoredRecord>, StoreError> {
        let held = self
            .records
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let mut hits: Vec<ScoredRecord> = held
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| ScoredRecord {
                similarity: cosine_similarity(vector, &r.embedding),
                record: r.clone(),
            })
            .filter(|s| s.similarity >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    fn scroll(&self, filter: &StoreFilter, limit: usize) -> Result<Vec<Record>, StoreError> {
        let held = self
            .records
            .read()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(held
            .iter()
            .filter(|r| filter.matches(r))
            .take(limit)
            .cloned()
            .collect())
    }

    fn delete_by_filter(&self, filter: &StoreFilter) -> Result<usize, StoreError> {
        let mut held = self
            .records
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let before = held.len();
        held.retain(|r| !filter.matches(r));
        Ok(before - held.len())
    }

    fn delete_by_ids(&self, ids: &[String]) -> Result<usize, StoreError> {
        let mut held = self
            .records
            .write()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let before = held.len();
        held.retain(|r| !ids.contains(&r.id));
        Ok(before - held.len())
    }
}
