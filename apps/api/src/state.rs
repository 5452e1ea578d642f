use std::sync::Arc;

use sqlx::PgPool;

use crate::conversation::orchestrator::Orchestrator;
use crate::encryption::TranscriptCipher;
use crate::evaluation::pipeline::Evaluator;
use crate::speech::SpeechClient;

/// Shared application state injected into all route handlers via Axum
/// extractors. The evaluator and orchestrator own the model client; their
/// configs (model chain, sampling, timeouts) were fixed at startup — nothing
/// here reads the environment.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub speech: Arc<dyn SpeechClient>,
    pub cipher: Arc<TranscriptCipher>,
    pub evaluator: Arc<Evaluator>,
    pub orchestrator: Arc<Orchestrator>,
}
