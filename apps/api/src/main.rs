mod collaborators;
mod config;
mod dialogue;
mod errors;
mod llm_client;
mod pipeline;
mod profile;
mod routes;
mod sessions;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::collaborators::LlmProfileServices;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::{DraftStore, MemoryDraftStore, RedisDraftStore};
use crate::routes::build_router;
use crate::sessions::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cvflow v{}", env!("CARGO_PKG_VERSION"));

    // Draft store: Redis when configured, in-memory otherwise
    let drafts: Arc<dyn DraftStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis draft store initialized (ttl {}s)", config.draft_ttl_secs);
            Arc::new(RedisDraftStore::new(client, config.draft_ttl_secs))
        }
        None => {
            info!("REDIS_URL not set, drafts are kept in memory");
            Arc::new(MemoryDraftStore::new())
        }
    };

    // Initialize LLM client and the collaborators built on it
    let llm = LlmClient::new(
        config.anthropic_api_key.clone(),
        config.pipeline.collaborator_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let services = Arc::new(LlmProfileServices::new(llm));

    info!(
        ai_question_cap = config.pipeline.ai_question_cap,
        improve_score_threshold = config.pipeline.improve_score_threshold,
        max_improve_loops = config.pipeline.max_improve_loops,
        "Pipeline settings loaded"
    );

    // Build app state
    let state = AppState {
        sessions: Arc::new(SessionRegistry::new()),
        drafts,
        services,
        settings: config.pipeline.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
