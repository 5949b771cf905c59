//! File-backed FIFO of pending commit identifiers.
//!
//! # Record format
//!
//! One entry per line, oldest first:
//!
//! ```text
//! 3f2a9c1d0e...
//! 77b04e52aa...
//! ```
//!
//! # Mutations
//!
//! - `enqueue` appends `<id>\n` and fsyncs the file.
//! - `dequeue` reads the whole record, takes the first line, and atomically
//!   rewrites the record with the remaining lines (temp file + rename).
//!
//! The head entry is removed *before* it is handed to the caller. If the
//! process dies while that entry is being deployed, it is gone from the
//! record: delivery out of this queue is at-most-once.
//!
//! # Ownership
//!
//! The service is the only writer. The HTTP receiver appends and the worker
//! removes; an in-process mutex serialises the two so that an append can
//! never land between the worker's read and its rewrite.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::sync::futures::Notified;
use tracing::{debug, trace, warn};

use super::fsync::{fsync_file, write_atomic};
use crate::types::CommitId;

/// Errors from queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue record does not exist. It must be provisioned at startup;
    /// its disappearance afterwards is a configuration error, not an empty
    /// queue.
    #[error("queue file does not exist: {}", .0.display())]
    Missing(PathBuf),

    /// The identifier cannot be stored as a single line.
    #[error("invalid queue entry {0:?}: must be non-empty and contain no line breaks")]
    InvalidEntry(String),

    /// IO error reading or writing the record.
    #[error("IO error on queue file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;

/// Handle to the durable queue. Cheap to clone; clones share the same record,
/// lock and wake-up signal.
#[derive(Debug, Clone)]
pub struct DurableQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug)]
struct QueueInner {
    path: PathBuf,
    lock: Mutex<()>,
    enqueued: Notify,
}

impl DurableQueue {
    /// Opens an existing queue record.
    ///
    /// A trailing line without a terminator can only come from an append
    /// interrupted by a crash; it is discarded so the next append starts on a
    /// fresh line.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let queue = DurableQueue {
            inner: Arc::new(QueueInner {
                path: path.into(),
                lock: Mutex::new(()),
                enqueued: Notify::new(),
            }),
        };
        queue.recover_torn_tail()?;
        Ok(queue)
    }

    /// Creates an empty record (and its parent directory) if none exists,
    /// then opens it.
    pub fn provision(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let io_err = |source| QueueError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                fsync_file(&file).map_err(io_err)?;
                debug!(path = %path.display(), "Created empty queue file");
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(io_err(e)),
        }

        Self::open(path)
    }

    /// Returns the path of the queue record.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Appends an identifier to the tail of the queue.
    ///
    /// Fails with [`QueueError::InvalidEntry`] for an empty identifier or one
    /// containing `\n` or `\r`, and with [`QueueError::Missing`] if the
    /// record has been removed. The append is fsynced before returning.
    pub fn enqueue(&self, id: &CommitId) -> Result<()> {
        validate_entry(id)?;

        {
            let _guard = self.lock();
            let mut file = OpenOptions::new()
                .append(true)
                .open(&self.inner.path)
                .map_err(|e| self.map_io(e))?;

            let mut line = String::with_capacity(id.as_str().len() + 1);
            line.push_str(id.as_str());
            line.push('\n');

            file.write_all(line.as_bytes())
                .map_err(|e| self.map_io(e))?;
            fsync_file(&file).map_err(|e| self.map_io(e))?;
        }

        trace!(commit = %id, "Appended queue entry");
        self.inner.enqueued.notify_one();
        Ok(())
    }

    /// Removes and returns the head of the queue.
    ///
    /// Returns `Ok(None)` when the record exists but holds no entries. The
    /// record is rewritten before the entry is returned.
    pub fn dequeue(&self) -> Result<Option<CommitId>> {
        let _guard = self.lock();

        let contents = self.read_record()?;
        let mut entries = complete_lines(&contents);

        let Some(head) = entries.next() else {
            return Ok(None);
        };

        let rest = render(entries);
        write_atomic(&self.inner.path, rest.as_bytes()).map_err(|e| self.map_io(e))?;

        trace!(commit = head, "Removed queue head");
        Ok(Some(CommitId::new(head)))
    }

    /// Returns all pending entries, oldest first, without removing them.
    pub fn pending(&self) -> Result<Vec<CommitId>> {
        let _guard = self.lock();
        let contents = self.read_record()?;
        Ok(complete_lines(&contents).map(CommitId::new).collect())
    }

    /// Completes after the next successful [`enqueue`](Self::enqueue).
    ///
    /// If an enqueue happened while nobody was waiting, the next call
    /// completes immediately.
    pub fn notified(&self) -> Notified<'_> {
        self.inner.enqueued.notified()
    }

    fn recover_torn_tail(&self) -> Result<()> {
        let _guard = self.lock();
        let contents = self.read_record()?;

        if contents.is_empty() || contents.ends_with('\n') {
            return Ok(());
        }

        let keep = contents.rfind('\n').map_or(0, |i| i + 1);
        warn!(
            path = %self.inner.path.display(),
            fragment = &contents[keep..],
            "Discarding incomplete trailing queue entry"
        );
        write_atomic(&self.inner.path, contents[..keep].as_bytes()).map_err(|e| self.map_io(e))
    }

    fn read_record(&self) -> Result<String> {
        std::fs::read_to_string(&self.inner.path).map_err(|e| self.map_io(e))
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guard protects no data, so a poisoned lock is still usable.
        self.inner
            .lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn map_io(&self, source: io::Error) -> QueueError {
        if source.kind() == io::ErrorKind::NotFound {
            QueueError::Missing(self.inner.path.clone())
        } else {
            QueueError::Io {
                path: self.inner.path.clone(),
                source,
            }
        }
    }
}

fn validate_entry(id: &CommitId) -> Result<()> {
    let s = id.as_str();
    if s.is_empty() || s.contains(['\n', '\r']) {
        return Err(QueueError::InvalidEntry(s.to_string()));
    }
    Ok(())
}

/// Non-empty, newline-terminated lines of the record. An unterminated final
/// fragment is ignored.
fn complete_lines(contents: &str) -> impl Iterator<Item = &str> {
    let end = contents.rfind('\n').map_or(0, |i| i + 1);
    contents[..end].lines().filter(|line| !line.is_empty())
}

fn render<'a>(entries: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry);
        out.push('\n');
    }
    out
}
