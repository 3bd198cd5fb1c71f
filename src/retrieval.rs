//! Retrieval facade: query text in, grounding context out.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::context::{assemble_ranked, ContextAssembly};
use crate::embedder::Embedder;
use crate::embeddings::Snapshot;
use crate::error::{Result, RetrievalError};
use crate::ranker::{rank, DEFAULT_TOP_K};
use crate::store::EmbeddingStore;

/// Query-time tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Chunks kept per query.
    pub top_k: usize,
    /// Upper bound on the query embedding call.
    pub embed_timeout: Duration,
    /// Cached query embeddings (0 disables the cache).
    pub embedding_cache_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            embed_timeout: Duration::from_secs(15),
            embedding_cache_size: 256,
        }
    }
}

/// Single entry point of the retrieval engine.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<EmbeddingStore>,
    config: RetrievalConfig,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
    model_warned: AtomicBool,
}

impl Retriever {
    /// Wires an embedder and a store together.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<EmbeddingStore>,
        config: RetrievalConfig,
    ) -> Self {
        let cache = NonZeroUsize::new(config.embedding_cache_size)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        Self {
            embedder,
            store,
            config,
            cache,
            model_warned: AtomicBool::new(false),
        }
    }

    /// Builds the ranked-chunk context for `query`.
    ///
    /// Returns an empty string on any failure: callers treat that as "no
    /// grounding available" and answer without context.
    pub async fn relevant_context(&self, query: &str) -> String {
        self.relevant_assembly(query).await.text
    }

    /// Like [`Retriever::relevant_context`], keeping the usage counters.
    /// Failures yield an empty [`ContextAssembly`].
    pub async fn relevant_assembly(&self, query: &str) -> ContextAssembly {
        match self.try_context(query).await {
            Ok(assembly) => assembly,
            Err(err @ RetrievalError::DimensionMismatch { .. }) => {
                error!(error = %err, "snapshot and query embedder disagree; rebuild the snapshot");
                ContextAssembly::default()
            }
            Err(err) => {
                warn!(error = %err, "retrieval failed, continuing without context");
                ContextAssembly::default()
            }
        }
    }

    /// Fallible form of [`Retriever::relevant_context`].
    pub async fn try_context(&self, query: &str) -> Result<ContextAssembly> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RetrievalError::InvalidInput(
                "query text must not be empty".into(),
            ));
        }
        let started = Instant::now();
        let embedding = self.embed_query(query).await?;
        let snapshot = self.store.load().await?;
        self.check_model(&snapshot);
        let ranked = rank(&embedding, &snapshot.records, self.config.top_k)?;
        let assembly = assemble_ranked(&ranked);
        info!(
            chars_used = assembly.chars_used,
            sources_used = assembly.sources_used,
            top_score = ranked.first().map(|c| c.score),
            latency_ms = started.elapsed().as_secs_f64() * 1000.0,
            "context assembled"
        );
        Ok(assembly)
    }

    /// Warns once when the snapshot was built by another embedding model.
    fn check_model(&self, snapshot: &Snapshot) {
        let query_model = self.embedder.model();
        if !models_differ(snapshot.model.as_deref(), query_model) {
            return;
        }
        if !self.model_warned.swap(true, Ordering::Relaxed) {
            warn!(
                snapshot_model = snapshot.model.as_deref().unwrap_or_default(),
                query_model,
                "snapshot was embedded with a different model; scores may be meaningless"
            );
        }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(query).cloned() {
                debug!("query embedding cache hit");
                return Ok(hit);
            }
        }

        let embedding = tokio::time::timeout(self.config.embed_timeout, self.embedder.embed(query))
            .await
            .map_err(|_| {
                RetrievalError::EmbeddingUnavailable(format!(
                    "timed out after {:?}",
                    self.config.embed_timeout
                ))
            })?
            .map_err(|err| RetrievalError::EmbeddingUnavailable(format!("{err:#}")))?;
        if embedding.is_empty() {
            return Err(RetrievalError::EmbeddingUnavailable(
                "provider returned an empty vector".into(),
            ));
        }

        if let Some(cache) = &self.cache {
            cache.lock().await.put(query.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}

/// Legacy snapshots carry no model and are never flagged.
fn models_differ(snapshot_model: Option<&str>, query_model: &str) -> bool {
    snapshot_model.is_some_and(|model| model != query_model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingRecord, Snapshot};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedEmbedder {
        vector: Vec<f32>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _input: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector.clone())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    fn store() -> Arc<EmbeddingStore> {
        store_built_with(None)
    }

    fn store_built_with(model: Option<&str>) -> Arc<EmbeddingStore> {
        let records = vec![
            EmbeddingRecord {
                source: "lag.txt (del 1)".into(),
                text: "Bistånd".into(),
                embedding: vec![1.0, 0.0],
            },
            EmbeddingRecord {
                source: "lag.txt (del 2)".into(),
                text: "Tystnadsplikt".into(),
                embedding: vec![0.0, 1.0],
            },
        ];
        Arc::new(EmbeddingStore::from_snapshot(Snapshot::new(
            model.map(str::to_string),
            records,
        )))
    }

    fn retriever(vector: Vec<f32>, config: RetrievalConfig) -> (Retriever, Arc<FixedEmbedder>) {
        let embedder = Arc::new(FixedEmbedder {
            vector,
            calls: AtomicUsize::new(0),
        });
        (Retriever::new(embedder.clone(), store(), config), embedder)
    }

    #[tokio::test]
    async fn best_chunk_comes_first() {
        let (retriever, _) = retriever(vec![0.1, 0.9], RetrievalConfig::default());
        let assembly = retriever.try_context("tystnadsplikt?").await.unwrap();
        assert!(assembly.text.starts_with("[Källa: lag.txt (del 2)]\nTystnadsplikt"));
        assert_eq!(assembly.sources_used, 2);
    }

    #[tokio::test]
    async fn blank_query_is_invalid_input() {
        let (retriever, embedder) = retriever(vec![1.0, 0.0], RetrievalConfig::default());
        let err = retriever.try_context("   ").await.unwrap_err();
        assert!(matches!(err, RetrievalError::InvalidInput(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(retriever.relevant_context("").await, "");
    }

    #[tokio::test]
    async fn dimension_mismatch_fails_open() {
        let (retriever, _) = retriever(vec![1.0, 0.0, 0.0], RetrievalConfig::default());
        let err = retriever.try_context("fråga").await.unwrap_err();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
        assert_eq!(retriever.relevant_context("fråga").await, "");
    }

    #[tokio::test]
    async fn repeated_queries_hit_the_cache() {
        let (retriever, embedder) = retriever(vec![1.0, 0.0], RetrievalConfig::default());
        retriever.try_context("bistånd").await.unwrap();
        retriever.try_context("  bistånd ").await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_embeds_every_time() {
        let config = RetrievalConfig {
            embedding_cache_size: 0,
            ..RetrievalConfig::default()
        };
        let (retriever, embedder) = retriever(vec![1.0, 0.0], config);
        retriever.try_context("bistånd").await.unwrap();
        retriever.try_context("bistånd").await.unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn only_known_differing_models_are_flagged() {
        assert!(models_differ(Some("text-embedding-3-large"), "text-embedding-3-small"));
        assert!(!models_differ(Some("fixed"), "fixed"));
        assert!(!models_differ(None, "fixed"));
    }

    #[tokio::test]
    async fn model_drift_is_flagged_but_still_answers() {
        let embedder = Arc::new(FixedEmbedder {
            vector: vec![1.0, 0.0],
            calls: AtomicUsize::new(0),
        });
        let store = store_built_with(Some("text-embedding-ada-002"));
        let retriever = Retriever::new(embedder, store, RetrievalConfig::default());
        assert!(!retriever.model_warned.load(Ordering::Relaxed));

        let assembly = retriever.try_context("bistånd").await.unwrap();
        assert!(assembly.text.starts_with("[Källa: lag.txt (del 1)]"));
        assert!(retriever.model_warned.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn matching_or_unknown_model_is_not_flagged() {
        for model in [None, Some("fixed")] {
            let embedder = Arc::new(FixedEmbedder {
                vector: vec![1.0, 0.0],
                calls: AtomicUsize::new(0),
            });
            let retriever =
                Retriever::new(embedder, store_built_with(model), RetrievalConfig::default());
            retriever.try_context("bistånd").await.unwrap();
            assert!(!retriever.model_warned.load(Ordering::Relaxed));
        }
    }
}
