//! The evaluation pipeline — one transcript in, one outcome out.
//!
//! Walks an ordered model fallback chain. Per model: round 0 sends the base
//! prompt; a validation failure (schema or rubric) earns exactly one
//! corrective round with the full error list appended; anything else —
//! unreachable model, timeout, unparseable output — advances straight to the
//! next model, because corrective feedback quotes output errors and there is
//! no output to quote. First valid result wins and the chain stops.
//!
//! Failure is a value (`EvaluationOutcome::Failed`), never an `Err`: the
//! caller records it as AI_FAILED and the respondent may resubmit.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::extract::{extract, ExtractionError};
use crate::llm_client::{GenerationParams, LlmError, ModelClient};
use crate::evaluation::output::AiEvaluationOutput;
use crate::evaluation::prompts::{build_evaluation_prompt, corrective_prompt};
use crate::evaluation::rubric::validate_output;
use crate::models::case::CaseInfo;
use crate::models::competency::CriterionInfo;

/// Corrective rounds per model after round 0.
pub const MAX_CORRECTIVE_ROUNDS: u32 = 1;

/// Everything the pipeline is allowed to know about its environment.
/// Constructed once at startup from `Config` — the pipeline itself never
/// touches the environment.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Ordered fallback chain; tried strictly in order, never concurrently.
    pub models: Vec<String>,
    pub params: GenerationParams,
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum EvaluationOutcome {
    Scored {
        output: AiEvaluationOutput,
        raw_response: String,
        /// Intra-model corrective rounds used by the winning model only;
        /// attempts burned on earlier fallback models do not count.
        retries_used: u32,
    },
    Failed {
        reason: String,
    },
}

/// Why a single (model, round) attempt failed. The variant decides what
/// happens next: `Validation` earns the corrective round, the others skip to
/// the next model.
#[derive(Debug, Error)]
enum AttemptError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("{0}")]
    Extraction(ExtractionError),

    #[error("output validation failed: {0}")]
    Validation(String),
}

impl AttemptError {
    /// The error list to append as corrective feedback, when this failure
    /// kind warrants a retry at all.
    fn corrective_feedback(&self) -> Option<&str> {
        match self {
            AttemptError::Validation(errors) => Some(errors),
            AttemptError::Extraction(ExtractionError::Schema(errors)) => Some(errors),
            _ => None,
        }
    }
}

pub struct Evaluator {
    llm: Arc<dyn ModelClient>,
    config: EvaluatorConfig,
}

impl Evaluator {
    pub fn new(llm: Arc<dyn ModelClient>, config: EvaluatorConfig) -> Self {
        Self { llm, config }
    }

    /// Runs the full scoring pass for one transcript.
    pub async fn evaluate(
        &self,
        criteria: &[CriterionInfo],
        case_info: &CaseInfo,
        transcript: &str,
    ) -> EvaluationOutcome {
        if criteria.is_empty() {
            return EvaluationOutcome::Failed {
                reason: "No AI-assessed criteria configured".to_string(),
            };
        }

        let expected_ids: Vec<String> = criteria.iter().map(|c| c.id.clone()).collect();
        let base_prompt = build_evaluation_prompt(criteria, case_info, transcript);

        info!(
            criteria = criteria.len(),
            case = %case_info.title,
            "Starting AI evaluation"
        );

        let mut last_failure = "no models configured".to_string();

        for model in &self.config.models {
            let mut feedback: Option<String> = None;

            for round in 0..=MAX_CORRECTIVE_ROUNDS {
                let prompt = match &feedback {
                    None => base_prompt.clone(),
                    Some(errors) => corrective_prompt(&base_prompt, errors),
                };

                match self.attempt(model, &prompt, &expected_ids).await {
                    Ok((output, raw_response)) => {
                        info!(model, retries_used = round, "Evaluation validated");
                        return EvaluationOutcome::Scored {
                            output,
                            raw_response,
                            retries_used: round,
                        };
                    }
                    Err(failure) => {
                        warn!(model, round, %failure, "Evaluation attempt failed");
                        last_failure = failure.to_string();

                        match failure.corrective_feedback() {
                            Some(errors) if round < MAX_CORRECTIVE_ROUNDS => {
                                feedback = Some(errors.to_string());
                            }
                            _ => break, // next model in the chain
                        }
                    }
                }
            }
        }

        warn!(%last_failure, "AI evaluation failed for all configured models");
        EvaluationOutcome::Failed {
            reason: format!("AI evaluation failed for all configured models: {last_failure}"),
        }
    }

    /// One call → extract → schema check → rubric check.
    async fn attempt(
        &self,
        model: &str,
        prompt: &str,
        expected_ids: &[String],
    ) -> Result<(AiEvaluationOutput, String), AttemptError> {
        let raw = self
            .llm
            .generate(model, prompt, &self.config.params)
            .await?;

        let output: AiEvaluationOutput =
            extract(&raw).map_err(AttemptError::Extraction)?;

        let schema_errors = output.schema_errors();
        if !schema_errors.is_empty() {
            return Err(AttemptError::Validation(schema_errors.join("; ")));
        }

        let rubric = validate_output(&output.criteria_scores, expected_ids);
        if !rubric.valid {
            return Err(AttemptError::Validation(rubric.errors.join("; ")));
        }

        Ok((output, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::scoring::weighted_total;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted model: pops one canned response per call and records every
    /// (model, prompt) pair it saw.
    struct ScriptedModel {
        responses: Mutex<VecDeque<Result<String, LlmError>>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<Result<String, LlmError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelClient for ScriptedModel {
        async fn generate(
            &self,
            model: &str,
            prompt: &str,
            _params: &GenerationParams,
        ) -> Result<String, LlmError> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), prompt.to_string()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(LlmError::EmptyContent))
        }
    }

    fn evaluator(llm: Arc<ScriptedModel>, models: &[&str]) -> Evaluator {
        Evaluator::new(
            llm,
            EvaluatorConfig {
                models: models.iter().map(|m| m.to_string()).collect(),
                params: GenerationParams::evaluation(),
            },
        )
    }

    fn criteria(ids: &[&str]) -> Vec<CriterionInfo> {
        ids.iter()
            .map(|id| CriterionInfo {
                id: id.to_string(),
                name_th: "เกณฑ์".to_string(),
                name_en: "Criterion".to_string(),
                group_name_en: "Functional Competency".to_string(),
                group_id: "g1".to_string(),
            })
            .collect()
    }

    fn case() -> CaseInfo {
        CaseInfo {
            title: "Sepsis watch".to_string(),
            description_th: "ผู้ป่วยเสี่ยงติดเชื้อ".to_string(),
            description_en: "Patient at risk of sepsis".to_string(),
            reasoning_indicators: vec![],
        }
    }

    const VALID_OUTPUT: &str = r#"{"criteriaScores":[{"criteriaId":"c1","score":3},{"criteriaId":"c2","score":5}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#;

    #[tokio::test]
    async fn test_fenced_output_with_trailing_comma_scores_first_try() {
        // End-to-end scenario: fenced block, trailing comma before the close.
        let fenced = "```json\n{\"criteriaScores\":[{\"criteriaId\":\"c1\",\"score\":3},{\"criteriaId\":\"c2\",\"score\":5}],\"strengths\":\"x\",\"weaknesses\":\"y\",\"recommendations\":\"z\",\"confidenceScore\":0.8,}\n```";
        let llm = ScriptedModel::new(vec![Ok(fenced.to_string())]);
        let outcome = evaluator(llm.clone(), &["m1"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        match outcome {
            EvaluationOutcome::Scored {
                output,
                retries_used,
                ..
            } => {
                assert_eq!(retries_used, 0);
                assert_eq!(weighted_total(&output.criteria_scores), 4.0);
            }
            other => panic!("expected Scored, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_criterion_retries_once_with_error_feedback() {
        let missing_c2 = r#"{"criteriaScores":[{"criteriaId":"c1","score":3}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#;
        let llm = ScriptedModel::new(vec![
            Ok(missing_c2.to_string()),
            Ok(missing_c2.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        assert!(matches!(outcome, EvaluationOutcome::Failed { ref reason }
            if reason.contains("Missing criteria: c2")));

        let calls = llm.calls();
        assert_eq!(calls.len(), 2);
        assert!(!calls[0].1.contains("PREVIOUS ATTEMPT FAILED"));
        assert!(calls[1].1.contains("PREVIOUS ATTEMPT FAILED"));
        assert!(calls[1].1.contains("Missing criteria: c2"));
    }

    #[tokio::test]
    async fn test_corrective_round_can_succeed() {
        let missing_c2 = r#"{"criteriaScores":[{"criteriaId":"c1","score":3}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#;
        let llm = ScriptedModel::new(vec![
            Ok(missing_c2.to_string()),
            Ok(VALID_OUTPUT.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        match outcome {
            EvaluationOutcome::Scored { retries_used, .. } => assert_eq!(retries_used, 1),
            other => panic!("expected Scored, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_error_skips_corrective_round_and_falls_back() {
        let llm = ScriptedModel::new(vec![
            Err(LlmError::Api {
                status: 503,
                message: "overloaded".to_string(),
            }),
            Ok(VALID_OUTPUT.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1", "m2"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));
        let calls = llm.calls();
        // m1 exactly once (no corrective round on a model error), then m2.
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "m1");
        assert_eq!(calls[1].0, "m2");
    }

    #[tokio::test]
    async fn test_unparseable_output_skips_corrective_round() {
        let llm = ScriptedModel::new(vec![
            Ok("I'm sorry, I cannot help with that.".to_string()),
            Ok(VALID_OUTPUT.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1", "m2"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        assert!(matches!(outcome, EvaluationOutcome::Scored { .. }));
        assert_eq!(llm.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_counter_resets_across_model_fallback() {
        // m1 burns its corrective round; m2 succeeds on round 0. The counter
        // reports only the winning model's intra-model retries — zero here —
        // which keeps the two counting interpretations distinguishable.
        let missing_c2 = r#"{"criteriaScores":[{"criteriaId":"c1","score":3}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#;
        let llm = ScriptedModel::new(vec![
            Ok(missing_c2.to_string()),
            Ok(missing_c2.to_string()),
            Ok(VALID_OUTPUT.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1", "m2"])
            .evaluate(&criteria(&["c1", "c2"]), &case(), "transcript")
            .await;

        match outcome {
            EvaluationOutcome::Scored { retries_used, .. } => assert_eq!(retries_used, 0),
            other => panic!("expected Scored, got {other:?}"),
        }
        assert_eq!(llm.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_all_models_exhausted_reports_last_error() {
        let llm = ScriptedModel::new(vec![
            Err(LlmError::Timeout(std::time::Duration::from_secs(60))),
            Err(LlmError::Api {
                status: 500,
                message: "boom".to_string(),
            }),
        ]);
        let outcome = evaluator(llm.clone(), &["m1", "m2"])
            .evaluate(&criteria(&["c1"]), &case(), "transcript")
            .await;

        match outcome {
            EvaluationOutcome::Failed { reason } => {
                assert!(reason.contains("all configured models"));
                assert!(reason.contains("boom"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_a_validation_failure() {
        let out_of_range = r#"{"criteriaScores":[{"criteriaId":"c1","score":9}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#;
        let llm = ScriptedModel::new(vec![
            Ok(out_of_range.to_string()),
            Ok(r#"{"criteriaScores":[{"criteriaId":"c1","score":4}],"strengths":"x","weaknesses":"y","recommendations":"z","confidenceScore":0.8}"#.to_string()),
        ]);
        let outcome = evaluator(llm.clone(), &["m1"])
            .evaluate(&criteria(&["c1"]), &case(), "transcript")
            .await;

        // The out-of-range score earned a corrective round, which succeeded.
        assert!(matches!(
            outcome,
            EvaluationOutcome::Scored { retries_used: 1, .. }
        ));
        assert!(llm.calls()[1].1.contains("Score out of range for c1: 9"));
    }

    #[tokio::test]
    async fn test_empty_criteria_fails_without_calling_models() {
        let llm = ScriptedModel::new(vec![Ok(VALID_OUTPUT.to_string())]);
        let outcome = evaluator(llm.clone(), &["m1"])
            .evaluate(&[], &case(), "transcript")
            .await;

        assert!(matches!(outcome, EvaluationOutcome::Failed { .. }));
        assert!(llm.calls().is_empty());
    }
}
