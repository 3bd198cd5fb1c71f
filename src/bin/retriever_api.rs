use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use kunskapsbas::config::{init_tracing, OpenAiArgs, RetrievalArgs};
use kunskapsbas::context::{DEFAULT_MAX_TOTAL_CHARS, DEFAULT_RESERVE_CHARS};
use kunskapsbas::{assemble_budgeted, BudgetConfig, ContextAssembly, EmbeddingStore, Retriever};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "kunskapsbas-retriever",
    about = "HTTP API that returns grounding context for law questions"
)]
struct ApiCli {
    /// Address to bind the HTTP server to (host:port).
    #[arg(long, env = "KUNSKAPSBAS_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Load the snapshot at startup instead of on the first query.
    #[arg(long, env = "KUNSKAPSBAS_WARM_STORE", default_value_t = false)]
    warm_store: bool,

    #[command(flatten)]
    retrieval: RetrievalArgs,

    #[command(flatten)]
    openai: OpenAiArgs,
}

#[derive(Clone)]
struct AppState {
    retriever: Arc<Retriever>,
}

#[derive(Debug, Deserialize)]
struct ContextRequest {
    query: String,
}

#[derive(Debug, Deserialize)]
struct SourcesRequest {
    sources: BTreeMap<String, String>,
    #[serde(default)]
    max_total_chars: Option<usize>,
    #[serde(default)]
    reserve_chars: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ContextResponse {
    context: String,
    meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
struct ResponseMeta {
    chars_used: usize,
    sources_used: usize,
    latency_ms: f64,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = ApiCli::parse();

    let embedder = Arc::new(cli.openai.build_embedder()?);
    let store = Arc::new(EmbeddingStore::new(cli.retrieval.snapshot.clone()));
    if cli.warm_store {
        if let Err(err) = store.load().await {
            warn!(error = %err, "snapshot not loaded at startup; queries will run without context");
        }
    }
    let retriever = Retriever::new(embedder, store, cli.retrieval.retrieval_config());
    let router = app(AppState {
        retriever: Arc::new(retriever),
    });

    let addr: SocketAddr = cli
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", cli.bind))?;
    info!("kunskapsbas-retriever listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, router)
        .await
        .context("server shutdown")?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/context", post(context_handler))
        .route("/v1/context/sources", post(sources_handler))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn context_handler(
    State(state): State<AppState>,
    Json(request): Json<ContextRequest>,
) -> Result<Json<ContextResponse>, (StatusCode, Json<ErrorBody>)> {
    if request.query.trim().is_empty() {
        return Err(bad_request("query text must not be empty"));
    }
    let start = Instant::now();
    let assembly = state.retriever.relevant_assembly(&request.query).await;
    Ok(Json(respond(assembly, start)))
}

async fn sources_handler(Json(request): Json<SourcesRequest>) -> Json<ContextResponse> {
    let start = Instant::now();
    let budget = BudgetConfig {
        max_total_chars: request.max_total_chars.unwrap_or(DEFAULT_MAX_TOTAL_CHARS),
        reserve_chars: request.reserve_chars.unwrap_or(DEFAULT_RESERVE_CHARS),
    };
    let sources: Vec<(String, String)> = request.sources.into_iter().collect();
    let assembly = assemble_budgeted(&sources, budget);
    info!(
        chars_used = assembly.chars_used,
        sources_used = assembly.sources_used,
        sources_offered = sources.len(),
        "source context assembled"
    );
    Json(respond(assembly, start))
}

fn respond(assembly: ContextAssembly, start: Instant) -> ContextResponse {
    ContextResponse {
        meta: ResponseMeta {
            chars_used: assembly.chars_used,
            sources_used: assembly.sources_used,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
        },
        context: assembly.text,
    }
}

fn bad_request(message: impl Into<String>) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}
