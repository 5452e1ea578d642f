//! Assessment endpoints. Auth middleware is out of scope, so the acting
//! user id travels explicitly in each request, query-param style.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::assessment::submit::{load_ai_criteria, run_submission, SubmissionResponse};
use crate::conversation::{render_history, ChatTurn, ConversationMessage};
use crate::errors::AppError;
use crate::evaluation::scoring::{experience_level_label, LevelLabel};
use crate::models::assessment::{
    AiScoreRow, AssessmentSessionRow, FinalScoreRow, ReviewerScoreRow, ScoreVersionHistoryRow,
    SelfScoreRow, TranscriptRow,
};
use crate::models::case::CaseScenarioRow;
use crate::models::competency::StandardLevelRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// {criteriaId, score} pair submitted by a nurse or reviewer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub criteria_id: Uuid,
    pub score: i32,
}

pub fn validate_score_range(scores: &[ScoreEntry]) -> Result<(), AppError> {
    for entry in scores {
        if !(1..=5).contains(&entry.score) {
            return Err(AppError::Validation(format!(
                "Score for {} must be between 1 and 5, got {}",
                entry.criteria_id, entry.score
            )));
        }
    }
    Ok(())
}

/// Loads a session and enforces respondent ownership. Non-owned sessions are
/// indistinguishable from missing ones.
async fn load_owned_session(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<AssessmentSessionRow, AppError> {
    let session: Option<AssessmentSessionRow> =
        sqlx::query_as("SELECT * FROM assessment_sessions WHERE id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;

    match session {
        Some(s) if s.nurse_id == user_id => Ok(s),
        _ => Err(AppError::NotFound("ไม่พบการประเมิน".to_string())),
    }
}

async fn load_case(pool: &PgPool, case_id: Uuid) -> Result<CaseScenarioRow, AppError> {
    sqlx::query_as("SELECT * FROM case_scenarios WHERE id = $1")
        .bind(case_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("ไม่พบกรณีศึกษา".to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Start / read
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub user_id: Uuid,
    pub case_id: Uuid,
}

/// POST /api/v1/assessments/start
/// Creates a session, freezing the respondent's experience level for its
/// whole lifetime.
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<AssessmentSessionRow>, AppError> {
    let case = load_case(&state.db, req.case_id).await?;
    if !case.active {
        return Err(AppError::Validation("กรณีศึกษานี้ปิดใช้งานแล้ว".to_string()));
    }

    let experience_level: Option<String> =
        sqlx::query_scalar("SELECT experience_level FROM users WHERE id = $1")
            .bind(req.user_id)
            .fetch_optional(&state.db)
            .await?;
    let experience_level =
        experience_level.ok_or_else(|| AppError::NotFound("ไม่พบผู้ใช้".to_string()))?;

    let session: AssessmentSessionRow = sqlx::query_as(
        r#"
        INSERT INTO assessment_sessions (id, nurse_id, case_id, experience_level, status)
        VALUES ($1, $2, $3, $4, 'IN_PROGRESS')
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(req.case_id)
    .bind(&experience_level)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(session))
}

/// GET /api/v1/assessments/my
pub async fn handle_my_assessments(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<AssessmentSessionRow>>, AppError> {
    let sessions: Vec<AssessmentSessionRow> = sqlx::query_as(
        "SELECT * FROM assessment_sessions WHERE nurse_id = $1 ORDER BY created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(sessions))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    pub session: AssessmentSessionRow,
    pub experience_level_label: LevelLabel,
    pub transcript: Option<TranscriptRow>,
    pub self_scores: Vec<SelfScoreRow>,
    pub ai_score: Option<AiScoreRow>,
    pub reviewer_score: Option<ReviewerScoreRow>,
    pub final_scores: Vec<FinalScoreRow>,
    pub standard_levels: Vec<StandardLevelRow>,
    pub version_history: Vec<ScoreVersionHistoryRow>,
}

/// GET /api/v1/assessments/:id
/// Full session detail with scores, the session-level standards, and the
/// audit trail.
pub async fn handle_get_assessment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionDetail>, AppError> {
    let session: AssessmentSessionRow =
        sqlx::query_as("SELECT * FROM assessment_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound("ไม่พบการประเมิน".to_string()))?;

    let transcript: Option<TranscriptRow> =
        sqlx::query_as("SELECT * FROM transcripts WHERE session_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let self_scores: Vec<SelfScoreRow> =
        sqlx::query_as("SELECT * FROM self_scores WHERE session_id = $1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;

    let ai_score: Option<AiScoreRow> =
        sqlx::query_as("SELECT * FROM ai_scores WHERE session_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let reviewer_score: Option<ReviewerScoreRow> =
        sqlx::query_as("SELECT * FROM reviewer_scores WHERE session_id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;

    let final_scores: Vec<FinalScoreRow> =
        sqlx::query_as("SELECT * FROM final_scores WHERE session_id = $1")
            .bind(id)
            .fetch_all(&state.db)
            .await?;

    let standard_levels: Vec<StandardLevelRow> =
        sqlx::query_as("SELECT * FROM standard_levels WHERE experience_level = $1")
            .bind(&session.experience_level)
            .fetch_all(&state.db)
            .await?;

    let version_history: Vec<ScoreVersionHistoryRow> = sqlx::query_as(
        "SELECT * FROM score_version_history WHERE session_id = $1 ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(SessionDetail {
        experience_level_label: experience_level_label(&session.experience_level),
        session,
        transcript,
        self_scores,
        ai_score,
        reviewer_score,
        final_scores,
        standard_levels,
        version_history,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Self-assessment
// ────────────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelfScoreRequest {
    pub user_id: Uuid,
    pub scores: Vec<ScoreEntry>,
}

/// POST /api/v1/assessments/:id/self-score
/// Idempotent: resubmitting the same scores upserts in place and leaves the
/// session SELF_ASSESSED.
pub async fn handle_self_score(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelfScoreRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let session = load_owned_session(&state.db, id, req.user_id).await?;
    let status = session.session_status()?;
    status.guard(status.can_self_score(), "submit self-assessment scores")?;

    if req.scores.is_empty() {
        return Err(AppError::Validation("กรุณาให้คะแนนอย่างน้อยหนึ่งเกณฑ์".to_string()));
    }
    validate_score_range(&req.scores)?;

    let mut tx = state.db.begin().await?;
    for entry in &req.scores {
        sqlx::query(
            r#"
            INSERT INTO self_scores (id, session_id, criteria_id, score)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (session_id, criteria_id) DO UPDATE SET score = EXCLUDED.score
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(entry.criteria_id)
        .bind(entry.score)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE assessment_sessions SET status = 'SELF_ASSESSED', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Json(MessageResponse {
        message: "บันทึกการประเมินตนเองเรียบร้อย".to_string(),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Submission (single response + conversational)
// ────────────────────────────────────────────────────────────────────────────

fn default_input_type() -> String {
    "TEXT".to_string()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: Uuid,
    pub text: String,
    #[serde(default = "default_input_type")]
    pub input_type: String,
}

/// POST /api/v1/assessments/:id/submit
/// Single free-text response → full evaluation pipeline run.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let session = load_owned_session(&state.db, id, req.user_id).await?;

    if req.text.trim().is_empty() {
        return Err(AppError::Validation("กรุณาตอบคำถาม".to_string()));
    }

    let case = load_case(&state.db, session.case_id).await?;
    let response = run_submission(
        &state.db,
        &state.evaluator,
        &state.cipher,
        &session,
        &case.to_case_info(),
        req.user_id,
        &req.text,
        &req.input_type,
    )
    .await?;

    Ok(Json(response))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub history: Vec<ConversationMessage>,
}

/// POST /api/v1/assessments/:id/chat
/// One turn of the avatar interview. The orchestrator holds no state — the
/// client supplies the full history and appends the returned message.
pub async fn handle_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatTurn>, AppError> {
    let session = load_owned_session(&state.db, id, req.user_id).await?;
    let status = session.session_status()?;
    status.guard(status.can_chat(), "continue the interview")?;

    let case = load_case(&state.db, session.case_id).await?;
    let criteria = load_ai_criteria(&state.db).await?;

    let turn = state
        .orchestrator
        .next_turn(
            &case.to_case_info(),
            &criteria,
            &req.history,
            &session.experience_level,
        )
        .await;

    Ok(Json(turn))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitConversationRequest {
    pub user_id: Uuid,
    pub history: Vec<ConversationMessage>,
}

/// POST /api/v1/assessments/:id/submit-conversation
/// Flattens the finished interview into a transcript and runs the same
/// pipeline as a plain submission.
pub async fn handle_submit_conversation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitConversationRequest>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let session = load_owned_session(&state.db, id, req.user_id).await?;

    if req.history.is_empty() {
        return Err(AppError::Validation("ยังไม่มีบทสนทนาให้ประเมิน".to_string()));
    }
    let transcript_text = render_history(&req.history);

    let case = load_case(&state.db, session.case_id).await?;
    let response = run_submission(
        &state.db,
        &state.evaluator,
        &state.cipher,
        &session,
        &case.to_case_info(),
        req.user_id,
        &transcript_text,
        "VOICE",
    )
    .await?;

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_range_validation() {
        let ok = vec![ScoreEntry {
            criteria_id: Uuid::new_v4(),
            score: 5,
        }];
        assert!(validate_score_range(&ok).is_ok());

        let low = vec![ScoreEntry {
            criteria_id: Uuid::new_v4(),
            score: 0,
        }];
        assert!(validate_score_range(&low).is_err());

        let high = vec![ScoreEntry {
            criteria_id: Uuid::new_v4(),
            score: 6,
        }];
        assert!(validate_score_range(&high).is_err());
    }

    #[test]
    fn test_submit_request_defaults_to_text_input() {
        let req: SubmitRequest = serde_json::from_value(serde_json::json!({
            "userId": Uuid::new_v4(),
            "text": "คำตอบของพยาบาล"
        }))
        .unwrap();
        assert_eq!(req.input_type, "TEXT");
    }

    #[test]
    fn test_chat_request_tolerates_missing_history() {
        let req: ChatRequest = serde_json::from_value(serde_json::json!({
            "userId": Uuid::new_v4()
        }))
        .unwrap();
        assert!(req.history.is_empty());
    }
}
