//! Case scenarios — the clinical situations an assessment is run against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CaseScenarioRow {
    pub id: Uuid,
    pub title: String,
    pub description_th: String,
    pub description_en: String,
    /// Free-text grading hints, not a closed set.
    pub reasoning_indicators: Json<Vec<String>>,
    pub department_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Prompt-facing projection of a case scenario.
#[derive(Debug, Clone)]
pub struct CaseInfo {
    pub title: String,
    pub description_th: String,
    pub description_en: String,
    pub reasoning_indicators: Vec<String>,
}

impl CaseScenarioRow {
    pub fn to_case_info(&self) -> CaseInfo {
        CaseInfo {
            title: self.title.clone(),
            description_th: self.description_th.clone(),
            // Older rows may lack an English description; the title is the
            // closest stand-in for prompt context.
            description_en: if self.description_en.trim().is_empty() {
                self.title.clone()
            } else {
                self.description_en.clone()
            },
            reasoning_indicators: self.reasoning_indicators.0.clone(),
        }
    }
}
