//! Reference-data endpoints: the competency taxonomy, the standards matrix,
//! and case scenarios. All of it is read-only shared data from the
//! pipeline's perspective; cases additionally support creation and
//! soft-retirement.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::case::CaseScenarioRow;
use crate::models::competency::{CompetencyCriteriaRow, CompetencyGroupRow, StandardLevelRow};
use crate::state::AppState;

#[derive(Serialize)]
pub struct GroupWithCriteria {
    #[serde(flatten)]
    pub group: CompetencyGroupRow,
    pub criteria: Vec<CompetencyCriteriaRow>,
}

/// GET /api/v1/competencies
/// Active groups with their active criteria, in taxonomy order.
pub async fn handle_list_competencies(
    State(state): State<AppState>,
) -> Result<Json<Vec<GroupWithCriteria>>, AppError> {
    let groups: Vec<CompetencyGroupRow> =
        sqlx::query_as("SELECT * FROM competency_groups WHERE active = TRUE ORDER BY sort_order ASC")
            .fetch_all(&state.db)
            .await?;

    let criteria: Vec<CompetencyCriteriaRow> = sqlx::query_as(
        "SELECT * FROM competency_criteria WHERE active = TRUE ORDER BY sort_order ASC",
    )
    .fetch_all(&state.db)
    .await?;

    let result = groups
        .into_iter()
        .map(|group| {
            let group_criteria = criteria
                .iter()
                .filter(|c| c.group_id == group.id)
                .cloned()
                .collect();
            GroupWithCriteria {
                group,
                criteria: group_criteria,
            }
        })
        .collect();

    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardsQuery {
    pub experience_level: String,
}

/// GET /api/v1/competencies/standards?experienceLevel=LEVEL_3
pub async fn handle_standards(
    State(state): State<AppState>,
    Query(params): Query<StandardsQuery>,
) -> Result<Json<Vec<StandardLevelRow>>, AppError> {
    let standards: Vec<StandardLevelRow> =
        sqlx::query_as("SELECT * FROM standard_levels WHERE experience_level = $1")
            .bind(&params.experience_level)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(standards))
}

/// GET /api/v1/cases
pub async fn handle_list_cases(
    State(state): State<AppState>,
) -> Result<Json<Vec<CaseScenarioRow>>, AppError> {
    let cases: Vec<CaseScenarioRow> =
        sqlx::query_as("SELECT * FROM case_scenarios WHERE active = TRUE ORDER BY created_at DESC")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(cases))
}

/// GET /api/v1/cases/:id
pub async fn handle_get_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CaseScenarioRow>, AppError> {
    let case: Option<CaseScenarioRow> = sqlx::query_as("SELECT * FROM case_scenarios WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    case.map(Json)
        .ok_or_else(|| AppError::NotFound("ไม่พบกรณีศึกษา".to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCaseRequest {
    pub title: String,
    pub description_th: String,
    #[serde(default)]
    pub description_en: String,
    #[serde(default)]
    pub reasoning_indicators: Vec<String>,
    pub department_id: Option<Uuid>,
}

/// POST /api/v1/cases
pub async fn handle_create_case(
    State(state): State<AppState>,
    Json(req): Json<CreateCaseRequest>,
) -> Result<Json<CaseScenarioRow>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("กรุณาระบุชื่อกรณีศึกษา".to_string()));
    }

    let case: CaseScenarioRow = sqlx::query_as(
        r#"
        INSERT INTO case_scenarios
            (id, title, description_th, description_en, reasoning_indicators, department_id, active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&req.title)
    .bind(&req.description_th)
    .bind(&req.description_en)
    .bind(SqlJson(&req.reasoning_indicators))
    .bind(req.department_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(case))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseActiveRequest {
    pub active: bool,
}

/// PATCH /api/v1/cases/:id/active
/// Soft-retirement: inactive cases stop being offered but stay referenced by
/// historical sessions.
pub async fn handle_set_case_active(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CaseActiveRequest>,
) -> Result<Json<CaseScenarioRow>, AppError> {
    let case: Option<CaseScenarioRow> =
        sqlx::query_as("UPDATE case_scenarios SET active = $1 WHERE id = $2 RETURNING *")
            .bind(req.active)
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    case.map(Json)
        .ok_or_else(|| AppError::NotFound("ไม่พบกรณีศึกษา".to_string()))
}
