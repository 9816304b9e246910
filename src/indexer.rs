/// The consumer side of the pipeline.
///
/// Applies queue messages strictly in order: `File` events index one
/// file end to end (load, chunk, normalize, embed, upsert), a
/// `Snapshot` purges store entries whose files are gone, `Stop` ends
/// the loop. A single bad document never stops the run; failures are
/// logged and the file is left for the next pass.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chunking::{CharacterChunker, ChunkingError, ChunkingStrategy, HeaderChunker};
use crate::config::Config;
use crate::embedder::Embedder;
use crate::error::IndexError;
use crate::identity::derive_id;
use crate::ignore::IgnoreRuleSet;
use crate::loader::LoaderRegistry;
use crate::metadata;
use crate::queue::{DiscoveryMessage, WorkReceiver};
use crate::store::{Record, StoreFilter, VectorStore};

/// What the mtime comparison decided for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexingStatus {
    /// Stored epoch is at least as new as the discovered one; skip
    /// all work. This is an optimization only — ids are
    /// content-derived, so even a redundant pass would upsert
    /// idempotently.
    NoReindexNeeded,
    /// The file is known but its timestamp moved; stale records are
    /// dropped before the fresh ones land.
    NeedsReindex,
    /// Never seen this path.
    NeedsFreshIndex,
}

/// Counters for one consumer run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct IndexSummary {
    pub indexed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub purged: usize,
}

pub struct Indexer {
    rules: Arc<IgnoreRuleSet>,
    registry: LoaderRegistry,
    char_chunker: CharacterChunker,
    header_chunker: HeaderChunker,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    root: PathBuf,
    file_timeout: Duration,
}

/// Store keys are forward-slash paths regardless of platform.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl Indexer {
    pub fn new(
        config: &Config,
        rules: Arc<IgnoreRuleSet>,
        registry: LoaderRegistry,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self, ChunkingError> {
        let chunking = &config.chunking;
        Ok(Self {
            rules,
            registry,
            char_chunker: CharacterChunker::new(chunking.chunk_size, chunking.chunk_overlap)?,
            header_chunker: HeaderChunker::new(
                chunking.chunk_size,
                chunking.chunk_overlap,
                chunking.min_section_size,
            )?,
            embedder,
            store,
            root: PathBuf::from(&config.root_path),
            file_timeout: Duration::from_secs(config.indexer.file_timeout_secs),
        })
    }

    /// Consume messages until `Stop`, channel close, or cancellation.
    /// Cancellation is graceful: the message in flight completes.
    pub async fn run(
        self: Arc<Self>,
        mut receiver: WorkReceiver,
        cancel: CancellationToken,
    ) -> IndexSummary {
        let mut summary = IndexSummary::default();
        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("indexer cancelled");
                    break;
                }
                msg = receiver.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            match message {
                DiscoveryMessage::File {
                    path,
                    last_modified_epoch,
                    ..
                } => {
                    Self::handle_file(&self, &path, last_modified_epoch, &mut summary).await;
                }
                DiscoveryMessage::Snapshot { existing_paths } => {
                    match self.purge(&existing_paths) {
                        Ok(purged) => summary.purged += purged,
                        Err(e) => error!(error = %e, "purge failed"),
                    }
                }
                DiscoveryMessage::Stop => break,
            }
        }
        info!(
            indexed = summary.indexed,
            skipped = summary.skipped,
            failed = summary.failed,
            purged = summary.purged,
            "indexer run finished"
        );
        summary
    }

    async fn handle_file(
        this: &Arc<Self>,
        path: &Path,
        last_modified_epoch: i64,
        summary: &mut IndexSummary,
    ) {
        let abort = CancellationToken::new();
        let worker = Arc::clone(this);
        let worker_abort = abort.clone();
        let owned = path.to_path_buf();
        let task = tokio::task::spawn_blocking(move || {
            worker.process_file_guarded(&owned, last_modified_epoch, &worker_abort)
        });
        let result = tokio::time::timeout(this.file_timeout, task).await;

        match result {
            Err(_) => {
                // the blocking task cannot be killed, but tripping the
                // token stops its store writes from landing after the
                // consumer has moved on to later messages
                abort.cancel();
                summary.failed += 1;
                error!(
                    "{}",
                    IndexError::Timeout {
                        path: path.to_path_buf(),
                        seconds: this.file_timeout.as_secs(),
                    }
                );
            }
            Ok(Err(join_err)) => {
                summary.failed += 1;
                error!(path = %path.display(), error = %join_err, "indexing task panicked");
            }
            Ok(Ok(Err(IndexError::Ignored(ignored)))) => {
                summary.skipped += 1;
                debug!(path = %ignored.display(), "ignored");
            }
            Ok(Ok(Err(e))) => {
                summary.failed += 1;
                error!(path = %path.display(), error = %e, "failed to index file");
            }
            Ok(Ok(Ok(0))) => summary.skipped += 1,
            Ok(Ok(Ok(records))) => {
                summary.indexed += 1;
                info!(path = %path.display(), records, "indexed");
            }
        }
    }

    /// Decide what to do with a discovered file by comparing its
    /// mtime against the stored one.
    pub fn evaluate_status(
        &self,
        key: &str,
        last_modified_epoch: i64,
    ) -> Result<IndexingStatus, IndexError> {
        let existing = self.store.scroll(&StoreFilter::for_path(key), 1)?;
        Ok(match existing.first() {
            None => IndexingStatus::NeedsFreshIndex,
            Some(record)
                if record
                    .metadata
                    .modified_at_epoch
                    .is_some_and(|stored| stored >= last_modified_epoch) =>
            {
                IndexingStatus::NoReindexNeeded
            }
            Some(_) => IndexingStatus::NeedsReindex,
        })
    }

    /// Index one file. Returns the number of records written; zero
    /// means the store already matched the filesystem.
    pub fn process_file(
        &self,
        path: &Path,
        last_modified_epoch: i64,
    ) -> Result<usize, IndexError> {
        self.process_file_guarded(path, last_modified_epoch, &CancellationToken::new())
    }

    /// Like [`Self::process_file`], but refuses to touch the store
    /// once `abort` has been tripped. The consumer trips it on
    /// timeout, so abandoned work cannot overtake a later purge.
    fn process_file_guarded(
        &self,
        path: &Path,
        last_modified_epoch: i64,
        abort: &CancellationToken,
    ) -> Result<usize, IndexError> {
        if self.rules.should_ignore(path, &self.root) {
            return Err(IndexError::Ignored(path.to_path_buf()));
        }

        let key = path_key(path);
        if self.evaluate_status(&key, last_modified_epoch)? == IndexingStatus::NoReindexNeeded {
            debug!(path = %path.display(), "up to date");
            return Ok(0);
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        let loader = self
            .registry
            .get(&ext)
            .ok_or_else(|| IndexError::UnsupportedFormat(ext.clone()))?;

        let raw_docs = loader.load(path).map_err(|e| IndexError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let chunker: &dyn ChunkingStrategy = if ext == "md" {
            &self.header_chunker
        } else {
            &self.char_chunker
        };

        let mut records = Vec::new();
        for mut raw in raw_docs {
            // the crawler's mtime drives the next reindex decision;
            // loader-provided dates only shape the display string
            raw.metadata.insert(
                "last_modified_epoch".into(),
                serde_json::Value::from(last_modified_epoch),
            );
            raw.metadata
                .entry("last_modified")
                .or_insert_with(|| serde_json::Value::from(last_modified_epoch));
            let meta = metadata::normalize(&raw.metadata, &raw.text, &key);

            for chunk in chunker.split(&raw.text) {
                let id = derive_id(&chunk.text, &key, meta.modified_at.as_deref(), &meta.tags);
                records.push(Record {
                    id,
                    content: chunk.text,
                    embedding: Vec::new(),
                    metadata: meta.clone(),
                });
            }
        }
        if !records.is_empty() {
            let texts: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
            let embeddings = self.embedder.embed_batch(&texts)?;
            for (record, embedding) in records.iter_mut().zip(embeddings) {
                record.embedding = embedding;
            }
        }

        // replacements are fully built before the old records go, so a
        // load or embed failure leaves the path untouched; an emptied
        // file legitimately ends up with zero records
        if abort.is_cancelled() {
            return Err(self.abandoned(path));
        }
        self.store.delete_by_filter(&StoreFilter::for_path(&key))?;
        if records.is_empty() {
            return Ok(0);
        }
        if abort.is_cancelled() {
            return Err(self.abandoned(path));
        }
        let written = records.len();
        self.store.upsert(records)?;
        Ok(written)
    }

    fn abandoned(&self, path: &Path) -> IndexError {
        IndexError::Timeout {
            path: path.to_path_buf(),
            seconds: self.file_timeout.as_secs(),
        }
    }

    /// Remove store entries for files no longer on disk. The snapshot
    /// is the complete set of live paths from the pass that produced
    /// it, so anything stored outside it is stale.
    pub fn purge(&self, existing_paths: &HashSet<PathBuf>) -> Result<usize, IndexError> {
        let live: HashSet<String> = existing_paths.iter().map(|p| path_key(p)).collect();

        let stored = self.store.scroll(&StoreFilter::default(), usize::MAX)?;
        let stored_paths: HashSet<String> = stored
            .into_iter()
            .map(|r| r.metadata.file_path)
            .collect();

        let mut purged = 0;
        for path in stored_paths.difference(&live) {
            purged += self.store.delete_by_filter(&StoreFilter::for_path(path))?;
            info!(path, "purged deleted file");
        }
        Ok(purged)
    }

    /// Maintenance pass: drop records that share a path and content
    /// with an earlier record but carry a different id. These appear
    /// when a file is re-indexed under a new mtime without its text
    /// changing everywhere.
    pub fn cleanup_duplicates(&self) -> Result<usize, IndexError> {
        let stored = self.store.scroll(&StoreFilter::default(), usize::MAX)?;
        let mut seen: HashMap<(String, String), String> = HashMap::new();
        let mut stale_ids = Vec::new();

        for record in stored {
            let key = (record.metadata.file_path.clone(), record.content.clone());
            match seen.get(&key) {
                Some(first_id) if *first_id != record.id => stale_ids.push(record.id),
                Some(_) => {}
                None => {
                    seen.insert(key, record.id);
                }
            }
        }

        if stale_ids.is_empty() {
            return Ok(0);
        }
        let removed = self.store.delete_by_ids(&stale_ids)?;
        if removed > 0 {
            warn!(removed, "removed duplicate records");
        }
        Ok(removed)
    }
}
