/// Query-side ranking over the vector store.
///
/// One search is: embed the query, overfetch candidates above the
/// similarity threshold, optionally rerank with a cross-encoder,
/// drop exact-content duplicates, then add recency and tag bonuses
/// to a 0-100 base score and return the top results. Any collaborator
/// failure surfaces as one `SearchError` — never a partial list.
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::config::SearchConfig;
use crate::embedder::Embedder;
use crate::error::SearchError;
use crate::reranker::Reranker;
use crate::store::{ScoredRecord, StoreFilter, VectorStore};

/// One ranked hit as callers see it.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    /// Display-translated path (see `display_path` in the config).
    pub file_path: String,
    pub file_name: String,
    pub url: String,
    pub tags: BTreeSet<String>,
    pub modified_at: Option<String>,
    /// Raw cosine similarity from the store.
    pub similarity: f32,
    /// Composite score: base + recency bonus + tag bonus.
    pub relevance: f64,
}

pub struct RetrievalRanker {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    reranker: Option<Arc<dyn Reranker>>,
    config: SearchConfig,
    root_path: String,
    display_path: Option<String>,
}

impl RetrievalRanker {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        reranker: Option<Arc<dyn Reranker>>,
        config: SearchConfig,
        root_path: String,
        display_path: Option<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            reranker,
            config,
            root_path,
            display_path,
        }
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        self.search_with_limit(query, self.config.limit)
    }

    pub fn search_with_limit(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let vector = self.embedder.embed(query)?;
        let overfetch = limit.saturating_mul(self.config.overfetch_factor).max(limit);
        let hits = self.store.search(
            &vector,
            self.config.threshold,
            overfetch,
            &StoreFilter::default(),
        )?;
        debug!(query, candidates = hits.len(), "similarity search done");
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let bases = self.base_scores(query, &hits)?;
        let mut candidates: Vec<(ScoredRecord, f64)> = hits.into_iter().zip(bases).collect();

        // rerank order, with the record id as a stable tie-break
        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.record.id.cmp(&b.0.record.id))
        });

        // exact-content dedup, first occurrence wins
        let mut seen = HashSet::new();
        candidates.retain(|(hit, _)| seen.insert(hit.record.content.clone()));

        let now_epoch = Utc::now().timestamp();
        let mut results: Vec<SearchResult> = candidates
            .into_iter()
            .map(|(hit, base)| {
                let meta = &hit.record.metadata;
                let relevance = base
                    + self.recency_bonus(meta.modified_at_epoch, now_epoch)
                    + self.tag_bonus(&meta.tags);
                let file_path = self.translate_path(&meta.file_path);
                let file_name = file_path
                    .rsplit('/')
                    .next()
                    .unwrap_or(&file_path)
                    .to_string();
                SearchResult {
                    content: hit.record.content,
                    url: format!("file://{file_path}"),
                    file_path,
                    file_name,
                    tags: hit.record.metadata.tags,
                    modified_at: hit.record.metadata.modified_at,
                    similarity: hit.similarity,
                    relevance,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.file_path.cmp(&b.file_path))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Base scores on a 0-100 scale: cross-encoder scores min-max
    /// scaled across the candidate set when a reranker is configured,
    /// otherwise similarity × 100.
    fn base_scores(&self, query: &str, hits: &[ScoredRecord]) -> Result<Vec<f64>, SearchError> {
        let Some(reranker) = &self.reranker else {
            return Ok(hits.iter().map(|h| h.similarity as f64 * 100.0).collect());
        };

        let texts: Vec<&str> = hits.iter().map(|h| h.record.content.as_str()).collect();
        let scores = reranker
            .score(query, &texts)
            .map_err(|e| SearchError::Rerank(e.to_string()))?;
        if scores.len() != texts.len() {
            return Err(SearchError::Rerank(format!(
                "expected {} scores, got {}",
                texts.len(),
                scores.len()
            )));
        }

        let min = scores.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        if (max - min).abs() < f32::EPSILON {
            return Ok(vec![50.0; scores.len()]);
        }
        Ok(scores
            .iter()
            .map(|s| ((s - min) / (max - min)) as f64 * 100.0)
            .collect())
    }

    /// Linear decay over the recency window; documents with no
    /// modification date get no bonus and no penalty, future dates
    /// count as brand new.
    fn recency_bonus(&self, modified_at_epoch: Option<i64>, now_epoch: i64) -> f64 {
        let Some(epoch) = modified_at_epoch else {
            return 0.0;
        };
        let age_days = (now_epoch - epoch) as f64 / 86_400.0;
        let window = self.config.recency_window_days;
        ((window - age_days) / window).clamp(0.0, 1.0) * self.config.recency_weight
    }

    /// Fixed bonus for any tagged document; the tag count does not
    /// scale it.
    fn tag_bonus(&self, tags: &BTreeSet<String>) -> f64 {
        if tags.is_empty() {
            0.0
        } else {
            self.config.tag_bonus
        }
    }

    fn translate_path(&self, stored: &str) -> String {
        match &self.display_path {
            Some(display) => match stored.strip_prefix(&self.root_path) {
                Some(rest) => format!("{}{}", display.trim_end_matches('/'), rest),
                None => stored.to_string(),
            },
            None => stored.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::MockEmbedder;
    use crate::metadata::CanonicalMetadata;
    use crate::reranker::MockReranker;
    use crate::store::Record;
    use crate::store::memory::MemoryStore;

    fn seed_record(
        embedder: &MockEmbedder,
        store: &MemoryStore,
        id: &str,
        content: &str,
        path: &str,
        tags: &[&str],
        modified_at_epoch: Option<i64>,
    ) {
        store
            .upsert(vec![Record {
                id: id.to_string(),
                content: content.to_string(),
                embedding: embedder.embed(content).unwrap(),
                metadata: CanonicalMetadata {
                    file_path: path.to_string(),
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    modified_at_epoch,
                    ..Default::default()
                },
            }])
            .unwrap();
    }

    fn ranker(
        store: Arc<MemoryStore>,
        reranker: Option<Arc<dyn Reranker>>,
        config: SearchConfig,
    ) -> RetrievalRanker {
        RetrievalRanker::new(
            Arc::new(MockEmbedder::default()),
            store,
            reranker,
            config,
            "/data".to_string(),
            None,
        )
    }

    fn open_config() -> SearchConfig {
        // mock embeddings of unrelated texts can land anywhere on the
        // sphere, so tests open the similarity floor completely
        SearchConfig {
            threshold: -1.0,
            ..SearchConfig::default()
        }
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(&embedder, &store, "a", "the exact query text", "/data/a.txt", &[], None);
        seed_record(&embedder, &store, "b", "something unrelated", "/data/b.txt", &[], None);

        let ranker = ranker(store, None, open_config());
        let results = ranker.search("the exact query text").unwrap();
        assert_eq!(results[0].content, "the exact query text");
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic_ordering() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        for i in 0..8 {
            seed_record(
                &embedder,
                &store,
                &format!("id-{i}"),
                &format!("candidate number {i}"),
                &format!("/data/{i}.txt"),
                &[],
                Some(1_700_000_000),
            );
        }

        let ranker = ranker(store, None, open_config());
        let first: Vec<String> = ranker
            .search("candidate")
            .unwrap()
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        let second: Vec<String> = ranker
            .search("candidate")
            .unwrap()
            .into_iter()
            .map(|r| r.file_path)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_threshold_excludes_weak_hits() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(&embedder, &store, "a", "target content", "/data/a.txt", &[], None);
        seed_record(&embedder, &store, "b", "noise noise noise", "/data/b.txt", &[], None);

        let config = SearchConfig {
            threshold: 0.95,
            ..SearchConfig::default()
        };
        let ranker = ranker(store, None, config);
        let results = ranker.search("target content").unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].file_path, "/data/a.txt");
    }

    #[test]
    fn test_content_dedup_first_wins() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(&embedder, &store, "a", "duplicated text", "/data/a.txt", &[], None);
        seed_record(&embedder, &store, "b", "duplicated text", "/data/b.txt", &[], None);

        let ranker = ranker(store, None, open_config());
        let results = ranker.search("duplicated text").unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_tag_bonus_fixed_regardless_of_count() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(&embedder, &store, "one", "shared body", "/data/one.txt", &["a"], None);
        seed_record(
            &embedder,
            &store,
            "many",
            "shared body ",
            "/data/many.txt",
            &["a", "b", "c", "d"],
            None,
        );

        let ranker = ranker(store, None, open_config());
        let results = ranker.search("shared body").unwrap();
        let one = results.iter().find(|r| r.file_path.ends_with("one.txt")).unwrap();
        let many = results.iter().find(|r| r.file_path.ends_with("many.txt")).unwrap();
        // same fixed bonus, so the gap is similarity only
        let gap = (one.relevance - one.similarity as f64 * 100.0)
            - (many.relevance - many.similarity as f64 * 100.0);
        assert!(gap.abs() < 1e-9);
    }

    #[test]
    fn test_recency_boosts_fresh_documents() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now().timestamp();
        seed_record(&embedder, &store, "fresh", "same text", "/data/f.txt", &[], Some(now));
        seed_record(
            &embedder,
            &store,
            "stale",
            "same text ",
            "/data/s.txt",
            &[],
            Some(now - 90 * 86_400),
        );

        let ranker = ranker(store, None, open_config());
        let results = ranker.search("same text").unwrap();
        let fresh = results.iter().find(|r| r.file_path.ends_with("f.txt")).unwrap();
        let stale = results.iter().find(|r| r.file_path.ends_with("s.txt")).unwrap();
        assert!(fresh.relevance > stale.relevance + 15.0);
    }

    #[test]
    fn test_future_date_counts_as_new() {
        let store = Arc::new(MemoryStore::new());
        let ranker = ranker(store, None, open_config());
        let now = Utc::now().timestamp();
        let future = ranker.recency_bonus(Some(now + 86_400), now);
        assert!((future - ranker.config.recency_weight).abs() < 1e-9);
        assert_eq!(ranker.recency_bonus(None, now), 0.0);
    }

    #[test]
    fn test_rerank_reorders() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(
            &embedder,
            &store,
            "overlap",
            "rust memory safety explained",
            "/data/a.txt",
            &[],
            None,
        );
        seed_record(&embedder, &store, "none", "pasta recipes", "/data/b.txt", &[], None);

        let ranker = ranker(store, Some(Arc::new(MockReranker)), open_config());
        let results = ranker.search("rust memory safety").unwrap();
        assert_eq!(results[0].file_path, "/data/a.txt");
        // min-max scaled base: top candidate gets the full 100
        assert!(results[0].relevance >= 100.0);
    }

    #[test]
    fn test_limit_and_overfetch() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        for i in 0..30 {
            seed_record(
                &embedder,
                &store,
                &format!("id-{i}"),
                &format!("entry {i}"),
                &format!("/data/{i}.txt"),
                &[],
                None,
            );
        }
        let ranker = ranker(store, None, open_config());
        let results = ranker.search_with_limit("entry", 5).unwrap();
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_display_path_translation() {
        let embedder = MockEmbedder::default();
        let store = Arc::new(MemoryStore::new());
        seed_record(&embedder, &store, "a", "hello", "/data/notes/a.md", &[], None);

        let ranker = RetrievalRanker::new(
            Arc::new(MockEmbedder::default()),
            store,
            None,
            open_config(),
            "/data".to_string(),
            Some("/home/user/files".to_string()),
        );
        let results = ranker.search("hello").unwrap();
        assert_eq!(results[0].file_path, "/home/user/files/notes/a.md");
        assert_eq!(results[0].url, "file:///home/user/files/notes/a.md");
        assert_eq!(results[0].file_name, "a.md");
    }

    #[test]
    fn test_empty_store_empty_results() {
        let store = Arc::new(MemoryStore::new());
        let ranker = ranker(store, None, open_config());
        assert!(ranker.search("anything").unwrap().is_empty());
    }
}
