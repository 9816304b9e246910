/// Optional cross-encoder seam for second-stage ranking.
///
/// A reranker scores each candidate text against the query; the
/// ranker uses those scores in place of raw similarity when one is
/// configured. The mock scores by token overlap so tests can assert
/// reordering without a model.
use std::collections::HashSet;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RerankerError {
    #[error("scoring failed: {0}")]
    ScoringFailed(String),
}

/// Trait for cross-encoder reranking implementations.
pub trait Reranker: Send + Sync {
    /// Score each text against the query. Returns one score per text,
    /// in input order. Scores are relative: only their ordering and
    /// spread matter, the ranker rescales them.
    fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankerError>;
}

/// Deterministic reranker that scores by word overlap with the query.
pub struct MockReranker;

impl Reranker for MockReranker {
    fn score(&self, query: &str, texts: &[&str]) -> Result<Vec<f32>, RerankerError> {
        let query_words: HashSet<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();
        let scores = texts
            .iter()
            .map(|text| {
                text.split_whitespace()
                    .map(|w| w.to_lowercase())
                    .filter(|w| query_words.contains(w))
                    .count() as f32
            })
            .collect();
        Ok(scores)
    }
}
