//! Command-line and environment configuration shared by the binaries.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tracing_subscriber::EnvFilter;

use crate::embedder::{OpenAiEmbedder, DEFAULT_EMBEDDING_MODEL};
use crate::retrieval::RetrievalConfig;

/// Default snapshot location, relative to the working directory.
pub const DEFAULT_SNAPSHOT_PATH: &str = "embeddings/embeddings.json";

/// OpenAI embedding client settings.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key used for embedding calls
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    /// Embedding model identifier
    #[arg(long, env = "KUNSKAPSBAS_OPENAI_MODEL", default_value = DEFAULT_EMBEDDING_MODEL)]
    pub openai_model: String,

    /// Optional dimension override when supported by the model
    #[arg(long, env = "KUNSKAPSBAS_OPENAI_DIMENSIONS")]
    pub openai_dimensions: Option<usize>,

    /// Base URL for the OpenAI-compatible API
    #[arg(
        long,
        env = "KUNSKAPSBAS_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Max seconds to wait for each embedding request
    #[arg(long, env = "KUNSKAPSBAS_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Number of attempts for rate limits or transient errors
    #[arg(long, env = "KUNSKAPSBAS_OPENAI_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,
}

impl OpenAiArgs {
    /// Builds the embedding client described by these settings.
    pub fn build_embedder(&self) -> Result<OpenAiEmbedder> {
        OpenAiEmbedder::new(
            self.openai_api_key.clone(),
            self.openai_base_url.clone(),
            self.openai_model.clone(),
            self.openai_dimensions,
            Duration::from_secs(self.openai_timeout_secs.max(1)),
            self.max_retries,
        )
    }
}

/// Query-time retrieval settings.
#[derive(Args, Debug, Clone)]
pub struct RetrievalArgs {
    /// Embeddings snapshot produced by the `embedder` binary
    #[arg(long, env = "KUNSKAPSBAS_SNAPSHOT", default_value = DEFAULT_SNAPSHOT_PATH)]
    pub snapshot: PathBuf,

    /// Number of chunks included in the context
    #[arg(long, env = "KUNSKAPSBAS_TOP_K", default_value_t = 3)]
    pub top_k: usize,

    /// Seconds before the query embedding call is abandoned
    #[arg(long, env = "KUNSKAPSBAS_EMBED_TIMEOUT_SECS", default_value_t = 15)]
    pub embed_timeout_secs: u64,

    /// Max cached query embeddings kept in memory (0 disables caching)
    #[arg(long, env = "KUNSKAPSBAS_EMBEDDING_CACHE", default_value_t = 256)]
    pub embedding_cache_size: usize,
}

impl RetrievalArgs {
    /// Converts the parsed flags into a [`RetrievalConfig`].
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            top_k: self.top_k,
            embed_timeout: Duration::from_secs(self.embed_timeout_secs.max(1)),
            embedding_cache_size: self.embedding_cache_size,
        }
    }
}

/// Installs the global `tracing` subscriber, honouring `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
