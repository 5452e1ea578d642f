pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::assessment::handlers as assessments;
use crate::catalog::handlers as catalog;
use crate::review::handlers as reviews;
use crate::speech::handlers as speech;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Reference data
        .route(
            "/api/v1/competencies",
            get(catalog::handle_list_competencies),
        )
        .route(
            "/api/v1/competencies/standards",
            get(catalog::handle_standards),
        )
        .route(
            "/api/v1/cases",
            get(catalog::handle_list_cases).post(catalog::handle_create_case),
        )
        .route("/api/v1/cases/:id", get(catalog::handle_get_case))
        .route(
            "/api/v1/cases/:id/active",
            patch(catalog::handle_set_case_active),
        )
        // Assessment flow
        .route("/api/v1/assessments/start", post(assessments::handle_start))
        .route("/api/v1/assessments/my", get(assessments::handle_my_assessments))
        .route("/api/v1/assessments/:id", get(assessments::handle_get_assessment))
        .route(
            "/api/v1/assessments/:id/self-score",
            post(assessments::handle_self_score),
        )
        .route(
            "/api/v1/assessments/:id/submit",
            post(assessments::handle_submit),
        )
        .route("/api/v1/assessments/:id/chat", post(assessments::handle_chat))
        .route(
            "/api/v1/assessments/:id/submit-conversation",
            post(assessments::handle_submit_conversation),
        )
        // Review flow
        .route("/api/v1/reviews/pending", get(reviews::handle_pending))
        .route(
            "/api/v1/reviews/:session_id/score",
            post(reviews::handle_review_score),
        )
        .route(
            "/api/v1/reviews/:session_id/approve",
            post(reviews::handle_approve),
        )
        .route(
            "/api/v1/reviews/:session_id/history",
            get(reviews::handle_history),
        )
        // Speech
        .route("/api/v1/audio/tts", post(speech::handle_synthesize))
        .with_state(state)
}
