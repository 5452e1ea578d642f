//! Submission orchestration — the one place a transcript becomes scores.
//!
//! Flow: status guard → encrypt + upsert transcript → load AI-assessed
//! criteria → run the Evaluator → persist the outcome. Scored and Failed are
//! both terminal, visible states: the session always ends up AI_SCORED or
//! AI_FAILED, never stuck. All score rows for a run are written in one
//! transaction — a persisted AIScoreRecord without its FinalScore rows would
//! be a bug, not a tolerated intermediate.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::assessment::session::SessionStatus;
use crate::encryption::TranscriptCipher;
use crate::errors::AppError;
use crate::evaluation::output::AiEvaluationOutput;
use crate::evaluation::pipeline::{EvaluationOutcome, Evaluator, MAX_CORRECTIVE_ROUNDS};
use crate::evaluation::scoring::{category_average, gap, weighted_total};
use crate::models::assessment::AssessmentSessionRow;
use crate::models::case::CaseInfo;
use crate::models::competency::CriterionInfo;

/// What the respondent gets back from a submission. The `Failed` branch
/// carries only the generic message — raw model errors stay server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub status: SessionStatus,
    pub message: String,
}

#[derive(sqlx::FromRow)]
struct AiCriterionJoinRow {
    id: Uuid,
    name_th: String,
    name_en: String,
    group_id: Uuid,
    group_name_en: String,
}

/// Active criteria of active AI-assessed groups, in taxonomy order. Only
/// these are ever sent to the pipeline.
pub async fn load_ai_criteria(pool: &PgPool) -> Result<Vec<CriterionInfo>, AppError> {
    let rows: Vec<AiCriterionJoinRow> = sqlx::query_as(
        r#"
        SELECT c.id, c.name_th, c.name_en, c.group_id, g.name_en AS group_name_en
        FROM competency_criteria c
        JOIN competency_groups g ON g.id = c.group_id
        WHERE g.assessed_by_ai = TRUE AND g.active = TRUE AND c.active = TRUE
        ORDER BY g.sort_order ASC, c.sort_order ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| CriterionInfo {
            id: r.id.to_string(),
            name_th: r.name_th,
            name_en: r.name_en,
            group_name_en: r.group_name_en,
            group_id: r.group_id.to_string(),
        })
        .collect())
}

async fn store_transcript(
    pool: &PgPool,
    cipher: &TranscriptCipher,
    session_id: Uuid,
    input_type: &str,
    text: &str,
) -> Result<(), AppError> {
    let encrypted = cipher.encrypt(text)?;

    sqlx::query(
        r#"
        INSERT INTO transcripts (id, session_id, input_type, raw_text, encrypted_text)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (session_id) DO UPDATE
        SET input_type = EXCLUDED.input_type,
            raw_text = EXCLUDED.raw_text,
            encrypted_text = EXCLUDED.encrypted_text,
            updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(input_type)
    .bind(text)
    .bind(&encrypted)
    .execute(pool)
    .await?;

    Ok(())
}

/// Runs one full submission for a session. A pipeline failure is returned as
/// a normal response (status AI_FAILED), not an error — the respondent may
/// resubmit a fresh transcript, which runs the whole pipeline again.
#[allow(clippy::too_many_arguments)]
pub async fn run_submission(
    pool: &PgPool,
    evaluator: &Evaluator,
    cipher: &TranscriptCipher,
    session: &AssessmentSessionRow,
    case_info: &CaseInfo,
    actor_id: Uuid,
    transcript_text: &str,
    input_type: &str,
) -> Result<SubmissionResponse, AppError> {
    let status = session.session_status()?;
    status.guard(status.can_submit(), "submit a transcript")?;

    store_transcript(pool, cipher, session.id, input_type, transcript_text).await?;

    let criteria = load_ai_criteria(pool).await?;
    if criteria.is_empty() {
        return Err(AppError::Validation(
            "ไม่พบเกณฑ์การประเมิน กรุณาติดต่อผู้ดูแลระบบ".to_string(),
        ));
    }
    let criteria_to_group: HashMap<String, String> = criteria
        .iter()
        .map(|c| (c.id.clone(), c.group_id.clone()))
        .collect();

    match evaluator.evaluate(&criteria, case_info, transcript_text).await {
        EvaluationOutcome::Scored {
            output,
            raw_response,
            retries_used,
        } => {
            persist_scored(
                pool,
                session,
                actor_id,
                &criteria_to_group,
                &output,
                &raw_response,
                retries_used,
            )
            .await?;

            info!(session = %session.id, "AI evaluation stored, session AI_SCORED");
            Ok(SubmissionResponse {
                status: SessionStatus::AiScored,
                message: "ส่งคำตอบและประเมินโดย AI เสร็จสิ้น".to_string(),
            })
        }
        EvaluationOutcome::Failed { reason } => {
            persist_failed(pool, session.id, &reason).await?;

            warn!(session = %session.id, %reason, "AI evaluation failed, session AI_FAILED");
            Ok(SubmissionResponse {
                status: SessionStatus::AiFailed,
                message: "บันทึกคำตอบเรียบร้อย แต่ AI ไม่สามารถประเมินได้ กรุณาติดต่อผู้ดูแลระบบ"
                    .to_string(),
            })
        }
    }
}

async fn persist_scored(
    pool: &PgPool,
    session: &AssessmentSessionRow,
    actor_id: Uuid,
    criteria_to_group: &HashMap<String, String>,
    output: &AiEvaluationOutput,
    raw_response: &str,
    retries_used: u32,
) -> Result<(), AppError> {
    let category_scores = category_average(&output.criteria_scores, criteria_to_group);
    let total = weighted_total(&output.criteria_scores);

    // Standards are read against the experience level frozen at session
    // start, not the user's current level.
    let standards: Vec<(Uuid, i32)> = sqlx::query_as(
        "SELECT criteria_id, standard_score FROM standard_levels WHERE experience_level = $1",
    )
    .bind(&session.experience_level)
    .fetch_all(pool)
    .await?;
    let standard_map: HashMap<String, i32> = standards
        .into_iter()
        .map(|(criteria_id, score)| (criteria_id.to_string(), score))
        .collect();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO ai_scores
            (id, session_id, criteria_scores, category_scores, weighted_total,
             strengths, weaknesses, recommendations, confidence_score,
             valid, retry_count, raw_response)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10, $11)
        ON CONFLICT (session_id) DO UPDATE
        SET criteria_scores = EXCLUDED.criteria_scores,
            category_scores = EXCLUDED.category_scores,
            weighted_total = EXCLUDED.weighted_total,
            strengths = EXCLUDED.strengths,
            weaknesses = EXCLUDED.weaknesses,
            recommendations = EXCLUDED.recommendations,
            confidence_score = EXCLUDED.confidence_score,
            valid = TRUE,
            retry_count = EXCLUDED.retry_count,
            raw_response = EXCLUDED.raw_response
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session.id)
    .bind(Json(&output.criteria_scores))
    .bind(Json(&category_scores))
    .bind(total)
    .bind(&output.strengths)
    .bind(&output.weaknesses)
    .bind(&output.recommendations)
    .bind(output.confidence_score)
    .bind(retries_used as i32)
    .bind(raw_response)
    .execute(&mut *tx)
    .await?;

    for cs in &output.criteria_scores {
        let criteria_id = Uuid::parse_str(&cs.criteria_id).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Validated criteria id '{}' is not a UUID: {e}",
                cs.criteria_id
            ))
        })?;
        let standard = standard_map.get(&cs.criteria_id).copied().unwrap_or(1);

        sqlx::query(
            r#"
            INSERT INTO final_scores (id, session_id, criteria_id, score, gap, source)
            VALUES ($1, $2, $3, $4, $5, 'AI')
            ON CONFLICT (session_id, criteria_id) DO UPDATE
            SET score = EXCLUDED.score, gap = EXCLUDED.gap, source = 'AI'
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(session.id)
        .bind(criteria_id)
        .bind(cs.score)
        .bind(gap(cs.score, standard))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE assessment_sessions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(SessionStatus::AiScored.as_str())
        .bind(session.id)
        .execute(&mut *tx)
        .await?;

    let new_values = serde_json::to_value(output)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize AI output: {e}")))?;
    sqlx::query(
        r#"
        INSERT INTO score_version_history (id, session_id, changed_by, change_type, new_values)
        VALUES ($1, $2, $3, 'AI_SCORE', $4)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session.id)
    .bind(actor_id)
    .bind(Json(new_values))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

async fn persist_failed(pool: &PgPool, session_id: Uuid, reason: &str) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    // Diagnostic record: no scores, failure reason in raw_response.
    sqlx::query(
        r#"
        INSERT INTO ai_scores (id, session_id, criteria_scores, valid, retry_count, raw_response)
        VALUES ($1, $2, $3, FALSE, $4, $5)
        ON CONFLICT (session_id) DO UPDATE
        SET criteria_scores = EXCLUDED.criteria_scores,
            category_scores = NULL,
            weighted_total = NULL,
            strengths = NULL,
            weaknesses = NULL,
            recommendations = NULL,
            confidence_score = NULL,
            valid = FALSE,
            retry_count = EXCLUDED.retry_count,
            raw_response = EXCLUDED.raw_response
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(Json(json!([])))
    .bind(MAX_CORRECTIVE_ROUNDS as i32)
    .bind(reason)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE assessment_sessions SET status = $1, updated_at = NOW() WHERE id = $2")
        .bind(SessionStatus::AiFailed.as_str())
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Everything below `run_submission`'s status guard needs a database; the
    // guard itself is covered through the pure state machine.
    #[test]
    fn test_submission_response_wire_shape() {
        let response = SubmissionResponse {
            status: SessionStatus::AiFailed,
            message: "บันทึกคำตอบเรียบร้อย".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["status"], "AI_FAILED");
        assert!(json["message"].as_str().unwrap().contains("บันทึก"));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failed_record_retry_count_matches_corrective_cap() {
        assert_eq!(MAX_CORRECTIVE_ROUNDS, 1);
    }
}
