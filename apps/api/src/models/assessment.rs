//! Assessment session rows and everything the session exclusively owns:
//! transcript, AI score record, self/reviewer/final scores, version history.
//!
//! JSON-valued columns are read and written through `sqlx::types::Json<T>` so
//! handlers and the pipeline only ever see typed structures; a row that fails
//! to deserialize is data corruption and surfaces as a database error, not an
//! empty value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::evaluation::output::AiCriteriaScore;
use crate::evaluation::scoring::CategoryScore;
use crate::assessment::session::SessionStatus;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AssessmentSessionRow {
    pub id: Uuid,
    pub nurse_id: Uuid,
    pub case_id: Uuid,
    /// Captured from the respondent at start and frozen for the session —
    /// standards lookups always use this, never the user's current level.
    pub experience_level: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentSessionRow {
    /// Parses the stored status string into the typed state machine.
    pub fn session_status(&self) -> Result<SessionStatus, AppError> {
        SessionStatus::parse(&self.status).ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!(
                "Session {} has unknown status '{}'",
                self.id,
                self.status
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TranscriptRow {
    pub id: Uuid,
    pub session_id: Uuid,
    /// TEXT | VOICE — the orchestrator never cares which.
    pub input_type: String,
    pub raw_text: String,
    pub encrypted_text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted outcome of one pipeline run. `valid=false` rows carry the
/// failure diagnostic in `raw_response` and no scores.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AiScoreRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub criteria_scores: Json<Vec<AiCriteriaScore>>,
    pub category_scores: Option<Json<Vec<CategoryScore>>>,
    pub weighted_total: Option<f64>,
    pub strengths: Option<String>,
    pub weaknesses: Option<String>,
    pub recommendations: Option<String>,
    pub confidence_score: Option<f64>,
    pub valid: bool,
    pub retry_count: i32,
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SelfScoreRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub criteria_id: Uuid,
    pub score: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReviewerScoreRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub reviewer_id: Uuid,
    pub criteria_scores: Json<Vec<AiCriteriaScore>>,
    pub feedback_text: Option<String>,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-criterion outcome of a session. `source` records who last wrote it
/// (AI or REVIEWER); the gap is recomputed on every write, never carried
/// stale.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FinalScoreRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub criteria_id: Uuid,
    pub score: i32,
    pub gap: i32,
    pub source: String,
}

/// Immutable audit entry: every score mutation after initial AI scoring
/// appends one of these.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoreVersionHistoryRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub changed_by: Uuid,
    /// AI_SCORE | REVIEWER_EDIT | REVIEWER_APPROVE
    pub change_type: String,
    pub previous_values: Option<Json<Value>>,
    pub new_values: Json<Value>,
    pub created_at: DateTime<Utc>,
}
