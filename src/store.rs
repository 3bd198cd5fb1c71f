//! Load-once, in-memory embedding store backed by a snapshot file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::info;

use crate::embeddings::Snapshot;
use crate::error::{Result, RetrievalError};

/// Read-only view over an embeddings snapshot.
///
/// The snapshot is read and validated on the first [`EmbeddingStore::load`]
/// and cached for the lifetime of the store. Concurrent first callers wait on
/// a single read. A failed load is not cached.
#[derive(Debug)]
pub struct EmbeddingStore {
    path: PathBuf,
    snapshot: OnceCell<Arc<Snapshot>>,
    reads: AtomicUsize,
}

impl EmbeddingStore {
    /// Creates a store that will read `path` on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: OnceCell::new(),
            reads: AtomicUsize::new(0),
        }
    }

    /// Creates a store that is already loaded; no file is ever read.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            path: PathBuf::new(),
            snapshot: OnceCell::new_with(Some(Arc::new(snapshot))),
            reads: AtomicUsize::new(0),
        }
    }

    /// True once a snapshot has been loaded successfully.
    pub fn is_loaded(&self) -> bool {
        self.snapshot.initialized()
    }

    /// Returns the cached snapshot, reading it from disk on first use.
    pub async fn load(&self) -> Result<Arc<Snapshot>> {
        self.snapshot
            .get_or_try_init(|| self.read_counted())
            .await
            .cloned()
    }

    async fn read_counted(&self) -> Result<Arc<Snapshot>> {
        let attempt = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        read_snapshot(&self.path, attempt).await
    }

    #[cfg(test)]
    fn disk_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

async fn read_snapshot(path: &Path, attempt: usize) -> Result<Arc<Snapshot>> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|err| RetrievalError::store_unavailable(path, err))?;
    let snapshot = Snapshot::from_json(&bytes)
        .map_err(|err| RetrievalError::store_unavailable(path, format!("{err:#}")))?;
    info!(
        path = %path.display(),
        records = snapshot.records.len(),
        dimensions = snapshot.dimensions,
        model = snapshot.model.as_deref().unwrap_or("unknown"),
        attempt,
        "embedding store loaded"
    );
    Ok(Arc::new(snapshot))
}
