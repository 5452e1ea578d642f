//! The per-turn conversation loop.
//!
//! `next_turn` never fails: every model in the chain may be down, reply in
//! the wrong language, or emit garbage, and the respondent still gets a
//! valid next message — worst case from the locale pack's fixed script. This
//! is what makes the interview demoable and testable with zero model
//! availability.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::extract::{extract, ExtractionError};
use crate::llm_client::{GenerationParams, LlmError, ModelClient};
use crate::conversation::locale::LocalePack;
use crate::conversation::policy::{ai_turns, nurse_turns, should_finish};
use crate::conversation::prompts::build_chat_prompt;
use crate::conversation::validate::{normalize_turn, RawChatPayload, TurnRejection};
use crate::conversation::{ChatTurn, ConversationMessage};
use crate::models::case::CaseInfo;
use crate::models::competency::CriterionInfo;

/// Explicit configuration, mirroring `EvaluatorConfig`.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub models: Vec<String>,
    pub params: GenerationParams,
}

#[derive(Debug, Error)]
enum TurnFailure {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),

    #[error("{0}")]
    Extraction(#[from] ExtractionError),

    #[error("{0}")]
    Rejected(#[from] TurnRejection),
}

pub struct Orchestrator {
    llm: Arc<dyn ModelClient>,
    config: ChatConfig,
    locale: LocalePack,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn ModelClient>, config: ChatConfig, locale: LocalePack) -> Self {
        Self {
            llm,
            config,
            locale,
        }
    }

    /// Produces the next system turn for the supplied history. Pure over
    /// (case, criteria, history, level) apart from the model calls; persists
    /// nothing — the caller appends the returned message itself.
    pub async fn next_turn(
        &self,
        case_info: &CaseInfo,
        criteria: &[CriterionInfo],
        history: &[ConversationMessage],
        experience_level: &str,
    ) -> ChatTurn {
        let ai = ai_turns(history);
        let nurse = nurse_turns(history);
        let force_complete = should_finish(history, &self.locale);

        let prompt = build_chat_prompt(
            &self.locale,
            case_info,
            criteria,
            history,
            experience_level,
            ai,
            nurse,
            force_complete,
        );

        for model in &self.config.models {
            match self.try_model(model, &prompt, ai).await {
                Ok(mut turn) => {
                    // Forced completion is never left to the model.
                    if force_complete {
                        turn.is_complete = true;
                    }
                    info!(
                        model,
                        turn = turn.turn_number,
                        complete = turn.is_complete,
                        "Chat turn generated"
                    );
                    return turn;
                }
                Err(failure) => {
                    warn!(model, %failure, "Chat turn rejected, trying next model");
                }
            }
        }

        warn!("All models failed to produce a valid turn, using fixed script");
        self.locale.fallback_turn(ai, force_complete, case_info)
    }

    async fn try_model(
        &self,
        model: &str,
        prompt: &str,
        ai: usize,
    ) -> Result<ChatTurn, TurnFailure> {
        let raw = self
            .llm
            .generate(model, prompt, &self.config.params)
            .await?;
        let payload: RawChatPayload = extract(&raw)?;
        Ok(normalize_turn(payload, ai, &self.locale)?)
    }
}
