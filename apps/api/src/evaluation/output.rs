//! Typed shape of the evaluation model's JSON output.

use serde::{Deserialize, Serialize};

/// One scored criterion as returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCriteriaScore {
    pub criteria_id: String,
    pub score: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Full evaluation result: per-criterion scores plus narrative fields and the
/// model's own confidence in the assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEvaluationOutput {
    pub criteria_scores: Vec<AiCriteriaScore>,
    pub strengths: String,
    pub weaknesses: String,
    pub recommendations: String,
    pub confidence_score: f64,
}

impl AiEvaluationOutput {
    /// Numeric-range checks that serde's type checking cannot express.
    /// A non-empty result counts as a validation failure (drives the
    /// corrective retry), not a parse failure.
    pub fn schema_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(0.0..=1.0).contains(&self.confidence_score) {
            errors.push(format!(
                "confidenceScore out of range: {}",
                self.confidence_score
            ));
        }

        for cs in &self.criteria_scores {
            if !(1..=5).contains(&cs.score) {
                errors.push(format!(
                    "Score out of range for {}: {}",
                    cs.criteria_id, cs.score
                ));
            }
        }

        errors
    }
}
