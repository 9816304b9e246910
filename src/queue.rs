/// FIFO hand-off between the crawler and the indexer.
///
/// A thin wrapper over an unbounded tokio channel: `send` never
/// blocks, `recv` awaits, and a shared counter exposes an advisory
/// queue depth. Ordering is part of the contract — a `Snapshot` must
/// never be applied before the `File` events of its pass, and the
/// channel guarantees exactly that.
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One crawl-side event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMessage {
    /// A file that passed the ignore rules and the extension
    /// allow-list. `last_modified_epoch` is mtime rounded to seconds.
    File {
        path: PathBuf,
        file_id: Uuid,
        last_modified_epoch: i64,
    },
    /// The complete set of live paths seen by one crawl pass. The
    /// consumer purges everything the store holds outside this set.
    Snapshot { existing_paths: HashSet<PathBuf> },
    /// End of stream; the consumer loop exits after processing it.
    Stop,
}

#[derive(Error, Debug)]
#[error("work queue closed: receiver dropped")]
pub struct QueueClosed;

pub struct WorkSender {
    tx: mpsc::UnboundedSender<DiscoveryMessage>,
    depth: Arc<AtomicUsize>,
}

pub struct WorkReceiver {
    rx: mpsc::UnboundedReceiver<DiscoveryMessage>,
    depth: Arc<AtomicUsize>,
}

/// Create a connected sender/receiver pair.
pub fn work_queue() -> (WorkSender, WorkReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        WorkSender {
            tx,
            depth: depth.clone(),
        },
        WorkReceiver { rx, depth },
    )
}

impl Clone for WorkSender {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            depth: self.depth.clone(),
        }
    }
}

impl WorkSender {
    /// Enqueue without blocking. Fails only when the consumer is gone.
    pub fn send(&self, message: DiscoveryMessage) -> Result<(), QueueClosed> {
        self.tx.send(message).map_err(|_| QueueClosed)?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Advisory queue depth; exact ordering is the channel's job.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkReceiver {
    /// Await the next message, `None` once all senders are dropped.
    pub async fn recv(&mut self) -> Option<DiscoveryMessage> {
        let message = self.rx.recv().await;
        if message.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        message
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
