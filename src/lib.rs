#![warn(missing_docs)]
//! Semantic retrieval engine for questions about Swedish social-services law.
//!
//! Offline, corpus files are chunked, embedded and written to a snapshot.
//! At query time the [`Retriever`] embeds the question, ranks the stored
//! chunks by cosine similarity and assembles a bounded context string.

pub mod chunker;
pub mod config;
pub mod context;
pub mod embedder;
pub mod embeddings;
pub mod error;
pub mod indexer;
pub mod ranker;
pub mod retrieval;
pub mod store;

pub use chunker::{chunk_text, Chunk, ChunkerConfig, Document};
pub use context::{assemble_budgeted, assemble_ranked, BudgetConfig, ContextAssembly};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use embeddings::{EmbeddingRecord, Snapshot};
pub use error::RetrievalError;
pub use indexer::{build_snapshot, IndexerConfig};
pub use ranker::{cosine_similarity, rank, ScoredChunk};
pub use retrieval::{RetrievalConfig, Retriever};
pub use store::EmbeddingStore;
