//! Rubric validation — checks a candidate score set against the expected
//! criteria-id set.
//!
//! All rules are checked and all violations collected (never short-circuited)
//! so a corrective retry can hand the model the complete error list at once.
//! Pure and total: any `scores`/`expected_ids` combination returns in bounded
//! time and never panics.

use serde::Serialize;

use crate::evaluation::output::AiCriteriaScore;

#[derive(Debug, Clone, Serialize)]
pub struct RubricCheck {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Validates that `scores` covers `expected_ids` exactly once each, invents
/// nothing, and stays within the 1–5 range.
pub fn validate_output(scores: &[AiCriteriaScore], expected_ids: &[String]) -> RubricCheck {
    let mut errors = Vec::new();

    let returned_ids: Vec<&str> = scores.iter().map(|s| s.criteria_id.as_str()).collect();

    let missing: Vec<&str> = expected_ids
        .iter()
        .map(String::as_str)
        .filter(|id| !returned_ids.contains(id))
        .collect();
    if !missing.is_empty() {
        errors.push(format!("Missing criteria: {}", missing.join(", ")));
    }

    let invented: Vec<&str> = returned_ids
        .iter()
        .copied()
        .filter(|id| !expected_ids.iter().any(|e| e == id))
        .collect();
    if !invented.is_empty() {
        errors.push(format!("Unknown criteria: {}", invented.join(", ")));
    }

    let duplicated: Vec<&str> = expected_ids
        .iter()
        .map(String::as_str)
        .filter(|id| returned_ids.iter().filter(|r| r == &id).count() > 1)
        .collect();
    if !duplicated.is_empty() {
        errors.push(format!("Duplicate criteria: {}", duplicated.join(", ")));
    }

    for cs in scores {
        if !(1..=5).contains(&cs.score) {
            errors.push(format!(
                "Score out of range for {}: {}",
                cs.criteria_id, cs.score
            ));
        }
    }

    RubricCheck {
        valid: errors.is_empty(),
        errors,
    }
}
