use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use kunskapsbas::config::{init_tracing, OpenAiArgs, DEFAULT_SNAPSHOT_PATH};
use kunskapsbas::{build_snapshot, ChunkerConfig, IndexerConfig};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "kunskapsbas-embedder",
    about = "Chunk and embed the knowledge corpus into a retrieval snapshot"
)]
struct EmbedCli {
    /// Corpus directories of text files (repeat the flag or comma separate)
    #[arg(
        long = "corpus-dir",
        env = "KUNSKAPSBAS_CORPUS_DIRS",
        value_delimiter = ',',
        default_value = "data/lagtexter,data/hemsideinnehall"
    )]
    corpus_dirs: Vec<PathBuf>,

    /// Snapshot file to (re)generate
    #[arg(long, env = "KUNSKAPSBAS_SNAPSHOT", default_value = DEFAULT_SNAPSHOT_PATH)]
    output: PathBuf,

    /// Nominal chunk size cap, in characters
    #[arg(long, env = "KUNSKAPSBAS_MAX_CHUNK_CHARS", default_value_t = 1000)]
    max_chunk_chars: usize,

    /// Milliseconds to pause between embedding calls
    #[arg(long, env = "KUNSKAPSBAS_EMBED_DELAY_MS", default_value_t = 100)]
    delay_ms: u64,

    #[command(flatten)]
    openai: OpenAiArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = EmbedCli::parse();

    let embedder = cli.openai.build_embedder()?;
    let config = IndexerConfig {
        corpus_dirs: cli.corpus_dirs,
        chunker: ChunkerConfig {
            max_chunk_chars: cli.max_chunk_chars.max(1),
        },
        delay: Duration::from_millis(cli.delay_ms),
    };
    let snapshot = build_snapshot(&embedder, &config).await?;

    if let Some(parent) = cli.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {:?}", parent))?;
    }
    snapshot.write_atomic(&cli.output)?;
    info!(
        output = %cli.output.display(),
        records = snapshot.records.len(),
        dimensions = snapshot.dimensions,
        "snapshot written"
    );
    Ok(())
}
