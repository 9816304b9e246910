/// Filesystem discovery: one-shot crawl passes and the polling
/// producer built on them.
///
/// A pass walks the tree depth-first, pruning ignored directories
/// before descending, and emits one `File` event per accepted file
/// followed by a `Snapshot` of every live path. The `Poller` repeats
/// passes on an interval and caches last-seen mtimes so unchanged
/// files produce no events; `Stop` is sent only when it is cancelled.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ignore::{IgnoreRuleSet, RULES_FILE_NAME};
use crate::queue::{DiscoveryMessage, QueueClosed, WorkSender};

pub struct Crawler {
    root: PathBuf,
    rules: Arc<IgnoreRuleSet>,
    allowed_extensions: HashSet<String>,
}

impl Crawler {
    pub fn new(root: PathBuf, rules: Arc<IgnoreRuleSet>, allowed_extensions: &[String]) -> Self {
        Self {
            root,
            rules,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.to_lowercase())
                .collect(),
        }
    }

    /// One complete pass: `File` events, then the `Snapshot`, then
    /// `Stop`. Used by one-shot indexing; the consumer loop exits
    /// after the purge.
    pub fn run_once(&self, sender: &WorkSender) -> Result<usize, QueueClosed> {
        let files = self.collect_files();
        let count = files.len();
        let mut existing_paths = HashSet::with_capacity(count);

        for (path, mtime) in files {
            existing_paths.insert(path.clone());
            sender.send(DiscoveryMessage::File {
                path,
                file_id: Uuid::new_v4(),
                last_modified_epoch: mtime,
            })?;
        }
        sender.send(DiscoveryMessage::Snapshot { existing_paths })?;
        sender.send(DiscoveryMessage::Stop)?;
        info!(count, root = %self.root.display(), "crawl pass complete");
        Ok(count)
    }

    /// Walk the tree and return accepted files with mtimes rounded to
    /// seconds. Entries are visited in name order so passes are
    /// deterministic.
    fn collect_files(&self) -> Vec<(PathBuf, i64)> {
        let mut files = Vec::new();
        self.walk(&self.root, &mut files);
        files
    }

    fn walk(&self, dir: &Path, out: &mut Vec<(PathBuf, i64)>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot read directory");
                return;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            if self.rules.should_ignore(&path, &self.root) {
                debug!(path = %path.display(), "excluded by ignore rules");
                continue;
            }
            if path.is_dir() {
                self.walk(&path, out);
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(RULES_FILE_NAME) {
                continue;
            }
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if !self.allowed_extensions.contains(&ext) {
                continue;
            }
            match file_mtime_epoch(&path) {
                Some(mtime) => out.push((path, mtime)),
                None => warn!(path = %path.display(), "cannot stat file, skipping"),
            }
        }
    }
}

fn file_mtime_epoch(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    // nearest second, not truncation: a 10.7s mtime is 11
    Some(since_epoch.as_secs_f64().round() as i64)
}

/// Repeats crawl passes on an interval.
///
/// The mtime cache means a file only produces a `File` event when its
/// timestamp actually moved, so steady state costs the consumer
/// nothing but a purge check per pass.
pub struct Poller {
    crawler: Crawler,
    interval: Duration,
    seen_mtimes: HashMap<PathBuf, i64>,
}

impl Poller {
    pub fn new(crawler: Crawler, interval: Duration) -> Self {
        Self {
            crawler,
            interval,
            seen_mtimes: HashMap::new(),
        }
    }

    /// Run until cancelled. The in-flight pass finishes, then `Stop`
    /// is sent so the consumer drains and exits.
    pub async fn run(
        mut self,
        sender: WorkSender,
        cancel: CancellationToken,
    ) -> Result<(), QueueClosed> {
        loop {
            let changed = self.pass(&sender)?;
            debug!(changed, "poll pass complete");

            tokio::select! {
                _ = cancel.cancelled() => {
                    sender.send(DiscoveryMessage::Stop)?;
                    info!("poller stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// One pass: `File` events for new or touched paths, then the
    /// `Snapshot` of everything alive. Returns the changed count.
    fn pass(&mut self, sender: &WorkSender) -> Result<usize, QueueClosed> {
        let files = self.crawler.collect_files();
        let mut existing_paths = HashSet::with_capacity(files.len());
        let mut changed = 0;

        for (path, mtime) in files {
            existing_paths.insert(path.clone());
            if self.seen_mtimes.get(&path) == Some(&mtime) {
                continue;
            }
            sender.send(DiscoveryMessage::File {
                path: path.clone(),
                file_id: Uuid::new_v4(),
                last_modified_epoch: mtime,
            })?;
            self.seen_mtimes.insert(path, mtime);
            changed += 1;
        }

        self.seen_mtimes.retain(|path, _| existing_paths.contains(path));
        sender.send(DiscoveryMessage::Snapshot { existing_paths })?;
        Ok(changed)
    }
}
