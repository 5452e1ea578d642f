#![allow(dead_code)]

//! Competency taxonomy — shared reference data, read-only from the scoring
//! pipeline's perspective.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bucket type of a competency group. Only some buckets are AI-scored
/// (`assessed_by_ai` on the group row is the authority, not the type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupType {
    Core,
    Functional,
    Specific,
    Managerial,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Core => "CORE",
            GroupType::Functional => "FUNCTIONAL",
            GroupType::Specific => "SPECIFIC",
            GroupType::Managerial => "MANAGERIAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CORE" => Some(GroupType::Core),
            "FUNCTIONAL" => Some(GroupType::Functional),
            "SPECIFIC" => Some(GroupType::Specific),
            "MANAGERIAL" => Some(GroupType::Managerial),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompetencyGroupRow {
    pub id: Uuid,
    pub name_th: String,
    pub name_en: String,
    pub group_type: String,
    pub assessed_by_ai: bool,
    pub sort_order: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompetencyCriteriaRow {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name_th: String,
    pub name_en: String,
    pub sort_order: i32,
    pub active: bool,
}

/// One row of the standards matrix: the expected score for a criterion at a
/// given experience level.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StandardLevelRow {
    pub id: Uuid,
    pub experience_level: String,
    pub criteria_id: Uuid,
    pub standard_score: i32,
}

/// Prompt-facing projection of a criterion: what the model needs to score it,
/// nothing more. Ids are strings because that is what travels through the
/// model's JSON.
#[derive(Debug, Clone)]
pub struct CriterionInfo {
    pub id: String,
    pub name_th: String,
    pub name_en: String,
    pub group_name_en: String,
    pub group_id: String,
}
