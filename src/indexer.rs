//! Offline snapshot build: corpus directories in, embedded chunks out.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::chunker::{read_corpus_dir, Chunk, ChunkerConfig};
use crate::embedder::Embedder;
use crate::embeddings::{EmbeddingRecord, Snapshot};

/// Default pause between embedding calls.
pub const DEFAULT_EMBED_DELAY: Duration = Duration::from_millis(100);

/// Build job settings.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Flat directories of text files, processed in the given order.
    pub corpus_dirs: Vec<PathBuf>,
    /// Chunk sizing.
    pub chunker: ChunkerConfig,
    /// Pause after each embedding call, to stay under provider rate limits.
    pub delay: Duration,
}

/// Reads and chunks every document of every corpus directory.
pub fn collect_chunks(config: &IndexerConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for dir in &config.corpus_dirs {
        let documents = read_corpus_dir(dir)?;
        info!(dir = %dir.display(), documents = documents.len(), "read corpus directory");
        for document in &documents {
            chunks.extend(document.chunks(&config.chunker));
        }
    }
    Ok(chunks)
}

/// Embeds every chunk sequentially and returns the full snapshot.
///
/// The first failure aborts the whole build; nothing partial is returned.
pub async fn build_snapshot(embedder: &dyn Embedder, config: &IndexerConfig) -> Result<Snapshot> {
    let chunks = collect_chunks(config)?;
    let total = chunks.len();
    info!(chunks = total, model = embedder.model(), "embedding corpus");

    let mut records = Vec::with_capacity(total);
    let mut dimensions: Option<usize> = None;
    for (idx, chunk) in chunks.into_iter().enumerate() {
        info!("embedding {}/{}: {}", idx + 1, total, chunk.source);
        let embedding = embedder
            .embed(&chunk.text)
            .await
            .with_context(|| format!("failed to embed {}", chunk.source))?;
        let expected = *dimensions.get_or_insert(embedding.len());
        anyhow::ensure!(
            !embedding.is_empty() && embedding.len() == expected,
            "embedding for {} has {} dimensions, expected {}",
            chunk.source,
            embedding.len(),
            expected
        );
        records.push(EmbeddingRecord {
            source: chunk.source,
            text: chunk.text,
            embedding,
        });
        if !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }
    }

    Ok(Snapshot::new(Some(embedder.model().to_string()), records))
}
