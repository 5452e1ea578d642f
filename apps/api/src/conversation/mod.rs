//! Multi-turn interview with the AI avatar.
//!
//! The orchestrator is stateless: the caller supplies the full message
//! history on every call and persists the returned turn itself. Termination
//! is decided here (turn caps + completion-intent phrases), never left to
//! the model once a trigger fires.

pub mod locale;
pub mod orchestrator;
pub mod policy;
pub mod prompts;
pub mod validate;

use serde::{Deserialize, Serialize};

/// Who produced a message. Wire values match the client contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The system interviewer.
    Ai,
    /// The human respondent.
    Nurse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Speaker,
    pub text: String,
}

/// One system turn handed back to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub message: String,
    pub is_complete: bool,
    pub turn_number: u32,
}

/// Renders a conversation as the flat transcript text the scoring pass
/// consumes.
pub fn render_history(history: &[ConversationMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = match m.role {
                Speaker::Ai => "AI Avatar",
                Speaker::Nurse => "พยาบาล",
            };
            format!("{speaker}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
