//! Reviewer endpoints — the human override layer on top of AI scoring.
//!
//! A reviewer may score a session whose AI pass failed, substituting human
//! judgment entirely. Every edit overwrites FinalScore rows (gap recomputed,
//! source flipped to REVIEWER) and appends an immutable version-history
//! entry capturing previous → new values.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::assessment::handlers::{validate_score_range, MessageResponse, ScoreEntry};
use crate::assessment::session::SessionStatus;
use crate::errors::AppError;
use crate::evaluation::output::AiCriteriaScore;
use crate::evaluation::scoring::gap;
use crate::models::assessment::{
    AssessmentSessionRow, ReviewerScoreRow, ScoreVersionHistoryRow,
};
use crate::state::AppState;

async fn load_session(
    state: &AppState,
    session_id: Uuid,
) -> Result<AssessmentSessionRow, AppError> {
    sqlx::query_as("SELECT * FROM assessment_sessions WHERE id = $1")
        .bind(session_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("ไม่พบการประเมิน".to_string()))
}

/// GET /api/v1/reviews/pending
/// Sessions awaiting (or amenable to) review — including AI_FAILED, which a
/// reviewer may rescue by scoring manually.
pub async fn handle_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<AssessmentSessionRow>>, AppError> {
    let sessions: Vec<AssessmentSessionRow> = sqlx::query_as(
        r#"
        SELECT * FROM assessment_sessions
        WHERE status IN ('AI_SCORED', 'AI_FAILED', 'REVIEWED')
        ORDER BY updated_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(sessions))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewScoreRequest {
    pub reviewer_id: Uuid,
    pub criteria_scores: Vec<ScoreEntry>,
    pub feedback_text: Option<String>,
}

/// POST /api/v1/reviews/:session_id/score
pub async fn handle_review_score(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ReviewScoreRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let session = load_session(&state, session_id).await?;
    let status = session.session_status()?;
    status.guard(status.can_review(), "submit reviewer scores")?;

    if req.criteria_scores.is_empty() {
        return Err(AppError::Validation("กรุณาให้คะแนนอย่างน้อยหนึ่งเกณฑ์".to_string()));
    }
    validate_score_range(&req.criteria_scores)?;

    // Previous values go into the audit trail before they are overwritten.
    let previous: Option<ReviewerScoreRow> =
        sqlx::query_as("SELECT * FROM reviewer_scores WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&state.db)
            .await?;

    let standards: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT criteria_id, standard_score FROM standard_levels WHERE experience_level = $1",
    )
    .bind(&session.experience_level)
    .fetch_all(&state.db)
    .await?;
    let standard_map: std::collections::HashMap<Uuid, i32> = standards.into_iter().collect();

    let criteria_scores: Vec<AiCriteriaScore> = req
        .criteria_scores
        .iter()
        .map(|entry| AiCriteriaScore {
            criteria_id: entry.criteria_id.to_string(),
            score: entry.score,
            reasoning: None,
        })
        .collect();

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO reviewer_scores
            (id, session_id, reviewer_id, criteria_scores, feedback_text, approved)
        VALUES ($1, $2, $3, $4, $5, FALSE)
        ON CONFLICT (session_id) DO UPDATE
        SET reviewer_id = EXCLUDED.reviewer_id,
            criteria_scores = EXCLUDED.criteria_scores,
            feedback_text = EXCLUDED.feedback_text,
            updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(req.reviewer_id)
    .bind(SqlJson(&criteria_scores))
    .bind(&req.feedback_text)
    .execute(&mut *tx)
    .await?;

    for entry in &req.criteria_scores {
        let standard = standard_map.get(&entry.criteria_id).copied().unwrap_or(1);
        sqlx::query(
            r#"
            INSERT INTO final_scores (id, session_id, criteria_id, score, gap, source)
            VALUES ($1, $2, $3, $4, $5, 'REVIEWER')
            ON CONFLICT (session_id, criteria_id) DO UPDATE
            SET score = EXCLUDED.score, gap = EXCLUDED.gap, source = 'REVIEWER'
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(entry.criteria_id)
        .bind(entry.score)
        .bind(gap(entry.score, standard))
        .execute(&mut *tx)
        .await?;
    }

    let previous_values = previous
        .as_ref()
        .map(|p| serde_json::to_value(&p.criteria_scores.0))
        .transpose()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize history: {e}")))?;
    let new_values = json!({
        "criteriaScores": criteria_scores,
        "feedbackText": req.feedback_text,
    });

    sqlx::query(
        r#"
        INSERT INTO score_version_history
            (id, session_id, changed_by, change_type, previous_values, new_values)
        VALUES ($1, $2, $3, 'REVIEWER_EDIT', $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(req.reviewer_id)
    .bind(previous_values.map(SqlJson))
    .bind(SqlJson(new_values))
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE assessment_sessions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(SessionStatus::Reviewed.as_str())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(Json(MessageResponse {
        message: "บันทึกการตรวจสอบเรียบร้อย".to_string(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    pub reviewer_id: Uuid,
}

/// POST /api/v1/reviews/:session_id/approve
/// Terminal transition: FinalScore rows are treated as immutable for
/// reporting from here on.
pub async fn handle_approve(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ApproveRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let session = load_session(&state, session_id).await?;
    let status = session.session_status()?;
    status.guard(status.can_approve(), "approve the assessment")?;

    let mut tx = state.db.begin().await?;

    sqlx::query("UPDATE assessment_sessions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(SessionStatus::Approved.as_str())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE reviewer_scores SET approved = TRUE, updated_at = NOW() WHERE session_id = $1")
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO score_version_history
            (id, session_id, changed_by, change_type, new_values)
        VALUES ($1, $2, $3, 'REVIEWER_APPROVE', $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(req.reviewer_id)
    .bind(SqlJson(json!({ "approved": true })))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(MessageResponse {
        message: "อนุมัติผลประเมินเรียบร้อย".to_string(),
    }))
}

/// GET /api/v1/reviews/:session_id/history
pub async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<ScoreVersionHistoryRow>>, AppError> {
    let history: Vec<ScoreVersionHistoryRow> = sqlx::query_as(
        "SELECT * FROM score_version_history WHERE session_id = $1 ORDER BY created_at DESC",
    )
    .bind(session_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(history))
}
