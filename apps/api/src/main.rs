mod assessment;
mod catalog;
mod config;
mod conversation;
mod db;
mod encryption;
mod errors;
mod evaluation;
mod llm_client;
mod models;
mod review;
mod routes;
mod speech;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::conversation::locale::LocalePack;
use crate::conversation::orchestrator::{ChatConfig, Orchestrator};
use crate::db::create_pool;
use crate::encryption::TranscriptCipher;
use crate::evaluation::pipeline::{Evaluator, EvaluatorConfig};
use crate::llm_client::{GeminiClient, GenerationParams, ModelClient};
use crate::routes::build_router;
use crate::speech::{GoogleTts, SpeechClient};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting NurseMind Assessment API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Model client shared by the scoring pipeline and the interview loop
    let llm: Arc<dyn ModelClient> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.llm_call_timeout,
    ));
    info!(
        "LLM client initialized (fallback chain: {})",
        config.gemini_models.join(" → ")
    );

    let evaluator = Arc::new(Evaluator::new(
        llm.clone(),
        EvaluatorConfig {
            models: config.gemini_models.clone(),
            params: GenerationParams::evaluation(),
        },
    ));

    let orchestrator = Arc::new(Orchestrator::new(
        llm.clone(),
        ChatConfig {
            models: config.gemini_models.clone(),
            params: GenerationParams::conversation(),
        },
        LocalePack::thai(),
    ));

    let speech: Arc<dyn SpeechClient> = Arc::new(GoogleTts::new(config.google_cloud_api_key.clone()));
    if config.google_cloud_api_key.is_none() {
        info!("GOOGLE_CLOUD_API_KEY not set — speech synthesis disabled");
    }

    let cipher = Arc::new(TranscriptCipher::new(&config.encryption_key));

    let state = AppState {
        db,
        speech,
        cipher,
        evaluator,
        orchestrator,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
