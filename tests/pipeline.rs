use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kunskapsbas::{
    build_snapshot, ChunkerConfig, Embedder, EmbeddingStore, IndexerConfig, RetrievalConfig,
    Retriever,
};
use pretty_assertions::assert_eq;

const KEYWORDS: [&str; 3] = ["bistånd", "tystnadsplikt", "barn"];

/// Bag-of-keywords embedder: one dimension per keyword.
struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, input: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = input.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|kw| lower.matches(kw).count() as f32)
            .collect())
    }

    fn model(&self) -> &str {
        "keyword-test"
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _input: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("OpenAI embeddings request failed (500 Internal Server Error)")
    }

    fn model(&self) -> &str {
        "failing"
    }
}

struct SlowEmbedder;

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _input: &str) -> anyhow::Result<Vec<f32>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![1.0, 0.0, 0.0])
    }

    fn model(&self) -> &str {
        "slow"
    }
}

fn write_corpus(root: &Path) -> IndexerConfig {
    let lagtexter = root.join("lagtexter");
    let hemsida = root.join("hemsideinnehall");
    fs::create_dir_all(&lagtexter).unwrap();
    fs::create_dir_all(&hemsida).unwrap();
    fs::write(
        lagtexter.join("sol.txt"),
        "4 kap. Rätten till bistånd\n\nDen som inte själv kan tillgodose sina behov har rätt till bistånd.\n\n\
         12 kap. Tystnadsplikt\n\nTystnadsplikt gäller inom socialtjänsten.",
    )
    .unwrap();
    fs::write(
        hemsida.join("faq.txt"),
        "Vad gäller för barn?\n\nBarnets bästa ska beaktas när åtgärder rör barn.",
    )
    .unwrap();
    IndexerConfig {
        corpus_dirs: vec![lagtexter, hemsida],
        chunker: ChunkerConfig {
            max_chunk_chars: 100,
        },
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn builds_snapshot_and_retrieves_the_matching_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_corpus(dir.path());
    let embedder = KeywordEmbedder::new();

    let snapshot = build_snapshot(embedder.as_ref(), &config).await.unwrap();
    let sources: Vec<&str> = snapshot.records.iter().map(|r| r.source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["sol.txt (del 1)", "sol.txt (del 2)", "faq.txt (del 1)"]
    );
    assert_eq!(snapshot.dimensions, KEYWORDS.len());
    assert_eq!(snapshot.model.as_deref(), Some("keyword-test"));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);

    let path = dir.path().join("embeddings.json");
    snapshot.write_atomic(&path).unwrap();

    let store = Arc::new(EmbeddingStore::new(&path));
    let config = RetrievalConfig {
        top_k: 1,
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(embedder.clone(), store, config);
    let context = retriever
        .relevant_context("Vad säger lagen om tystnadsplikt?")
        .await;
    assert!(context.starts_with("[Källa: sol.txt (del 2)]\n12 kap. Tystnadsplikt"));
    assert!(!context.contains("---"));
}

#[tokio::test]
async fn embedding_failure_yields_empty_context() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = build_snapshot(KeywordEmbedder::new().as_ref(), &write_corpus(dir.path()))
        .await
        .unwrap();
    let store = Arc::new(EmbeddingStore::from_snapshot(snapshot));
    let retriever = Retriever::new(Arc::new(FailingEmbedder), store, RetrievalConfig::default());

    assert_eq!(retriever.relevant_context("some query").await, "");
    assert!(retriever.try_context("some query").await.is_err());
}

#[tokio::test]
async fn embedding_timeout_yields_empty_context() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = build_snapshot(KeywordEmbedder::new().as_ref(), &write_corpus(dir.path()))
        .await
        .unwrap();
    let store = Arc::new(EmbeddingStore::from_snapshot(snapshot));
    let config = RetrievalConfig {
        embed_timeout: Duration::from_millis(50),
        ..RetrievalConfig::default()
    };
    let retriever = Retriever::new(Arc::new(SlowEmbedder), store, config);

    assert_eq!(retriever.relevant_context("some query").await, "");
}

#[tokio::test]
async fn missing_snapshot_yields_empty_context() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(EmbeddingStore::new(dir.path().join("missing.json")));
    let retriever = Retriever::new(KeywordEmbedder::new(), store, RetrievalConfig::default());

    let assembly = retriever.relevant_assembly("bistånd").await;
    assert!(assembly.is_empty());
    assert_eq!(assembly.sources_used, 0);
}

#[tokio::test]
async fn build_aborts_on_first_embedding_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_corpus(dir.path());
    let err = build_snapshot(&FailingEmbedder, &config).await.unwrap_err();
    assert!(format!("{err:#}").contains("sol.txt (del 1)"));
}

#[tokio::test]
async fn build_fails_on_missing_corpus_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = IndexerConfig {
        corpus_dirs: vec![dir.path().join("nope")],
        chunker: ChunkerConfig::default(),
        delay: Duration::ZERO,
    };
    assert!(build_snapshot(KeywordEmbedder::new().as_ref(), &config)
        .await
        .is_err());
}
