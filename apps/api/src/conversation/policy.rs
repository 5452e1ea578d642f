//! Termination policy — decided before any model call, and binding on the
//! model's output once triggered.

use crate::conversation::locale::LocalePack;
use crate::conversation::{ConversationMessage, Speaker};

/// System questions asked before the interview wraps up.
pub const MAX_TURNS: usize = 4;

/// Respondent turns required before a closing phrase is honored — prevents an
/// early "that's all" from ending a barely-started interview.
pub const MIN_NURSE_TURNS_FOR_COMPLETION: usize = 3;

pub fn ai_turns(history: &[ConversationMessage]) -> usize {
    history.iter().filter(|m| m.role == Speaker::Ai).count()
}

pub fn nurse_turns(history: &[ConversationMessage]) -> usize {
    history.iter().filter(|m| m.role == Speaker::Nurse).count()
}

fn latest_nurse_message(history: &[ConversationMessage]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.role == Speaker::Nurse)
        .map(|m| m.text.as_str())
}

/// Whitespace-insensitive, case-insensitive substring match against the
/// locale's closing phrases.
pub fn detect_completion_intent(text: &str, locale: &LocalePack) -> bool {
    let normalized = text.split_whitespace().collect::<String>().to_lowercase();
    locale.completion_phrases.iter().any(|phrase| {
        let phrase_normalized = phrase.split_whitespace().collect::<String>().to_lowercase();
        normalized.contains(&phrase_normalized)
    })
}

/// True when this conversation must close on the next system turn.
pub fn should_finish(history: &[ConversationMessage], locale: &LocalePack) -> bool {
    let ai = ai_turns(history);
    let nurse = nurse_turns(history);

    if ai >= MAX_TURNS {
        return true;
    }
    // Covers a trailing respondent message with no following system turn yet.
    if nurse >= MAX_TURNS + 1 {
        return true;
    }

    if nurse >= MIN_NURSE_TURNS_FOR_COMPLETION {
        if let Some(latest) = latest_nurse_message(history) {
            if detect_completion_intent(latest, locale) {
                return true;
            }
        }
    }

    false
}
