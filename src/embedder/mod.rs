//! Embedding provider seam.

use anyhow::Result;
use async_trait::async_trait;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Turns a text into one fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single input string.
    async fn embed(&self, input: &str) -> Result<Vec<f32>>;

    /// Model identifier recorded alongside produced vectors.
    fn model(&self) -> &str;
}
