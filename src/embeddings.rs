//! Embedding snapshot schema shared by the build job and the store.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One embedded chunk as persisted in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingRecord {
    /// Provenance label, e.g. `lag.txt (del 2)`.
    pub source: String,
    /// Chunk text submitted to the embedding model.
    pub text: String,
    /// Model embedding vector.
    pub embedding: Vec<f32>,
}

/// Full set of embedded chunks, written and read in one shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version.
    pub version: u32,
    /// Embedding model that produced the vectors, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Length shared by every embedding.
    pub dimensions: usize,
    /// Embedded chunks in corpus order.
    pub records: Vec<EmbeddingRecord>,
}

/// On-disk shapes accepted by readers.
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Versioned(Snapshot),
    /// Bare record array written before the format carried a version.
    Legacy(Vec<EmbeddingRecord>),
}

impl Snapshot {
    /// Builds a current-version snapshot, inferring dimensions from the first
    /// record.
    pub fn new(model: Option<String>, records: Vec<EmbeddingRecord>) -> Self {
        let dimensions = records.first().map(|r| r.embedding.len()).unwrap_or(0);
        Self {
            version: SNAPSHOT_VERSION,
            model,
            dimensions,
            records,
        }
    }

    /// Parses and validates a snapshot from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let parsed: SnapshotFile =
            serde_json::from_slice(bytes).context("snapshot is not valid snapshot JSON")?;
        let snapshot = match parsed {
            SnapshotFile::Versioned(snapshot) => snapshot,
            SnapshotFile::Legacy(records) => Self::new(None, records),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Checks version support and vector shape consistency.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.version == SNAPSHOT_VERSION,
            "unsupported snapshot version {} (expected {})",
            self.version,
            SNAPSHOT_VERSION
        );
        if self.records.is_empty() {
            return Ok(());
        }
        anyhow::ensure!(self.dimensions > 0, "snapshot declares zero dimensions");
        for (idx, record) in self.records.iter().enumerate() {
            anyhow::ensure!(
                record.embedding.len() == self.dimensions,
                "record {} ({}) has {} dimensions, expected {}",
                idx,
                record.source,
                record.embedding.len(),
                self.dimensions
            );
        }
        Ok(())
    }

    /// Writes the snapshot next to `path` and renames it into place, so a
    /// failed write never leaves a partial file behind.
    pub fn write_atomic(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let tmp_path = path.with_extension("json.tmp");
        let file = File::create(&tmp_path)
            .with_context(|| format!("failed to create {:?}", tmp_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).context("failed to serialize snapshot")?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|err| err.into_error())?
            .sync_all()
            .with_context(|| format!("failed to sync {:?}", tmp_path))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to move snapshot into {:?}", path))?;
        Ok(())
    }
}
