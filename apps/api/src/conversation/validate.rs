//! Per-turn output validation — every model-generated turn passes through
//! here before the respondent sees it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::conversation::locale::LocalePack;
use crate::conversation::policy::MAX_TURNS;
use crate::conversation::ChatTurn;

/// Minimum target-script characters for a turn to count as target-language
/// dominant, regardless of how little Latin text it carries.
const MIN_TARGET_CHARS: usize = 12;

static MARKDOWN_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*#_`~]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Why a model turn was rejected. Any rejection falls through to the next
/// model in the chain, and ultimately to the fixed script — never to the
/// respondent.
#[derive(Debug, Error)]
pub enum TurnRejection {
    #[error("model turn has no message text")]
    EmptyMessage,

    #[error("model turn contains no target-script text")]
    MissingTargetScript,

    #[error("model turn is foreign-language dominant")]
    ForeignDominant,
}

/// The model's chat JSON, before normalization. Both fields are optional on
/// the wire; absence is handled here, not by serde errors.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChatPayload {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub is_complete: Option<bool>,
}

/// Strips markdown emphasis characters and collapses whitespace — the turn
/// is spoken aloud by TTS, so formatting artifacts must not survive.
pub fn sanitize_message(text: &str) -> String {
    let stripped = MARKDOWN_CHARS.replace_all(text, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Target-language dominance: target-script characters must reach
/// max(12, 2 × Latin characters). Allow-listed clinical terms are substituted
/// out before counting so "ให้ Furosemide IV" is not penalized for its Latin
/// letters; the message itself is left untouched.
pub fn is_target_dominant(text: &str, locale: &LocalePack) -> bool {
    let masked = locale.strip_clinical_terms(text);
    let target = masked
        .chars()
        .filter(|c| locale.is_target_script(*c))
        .count();
    let latin = masked.chars().filter(|c| c.is_ascii_alphabetic()).count();

    target > 0 && target >= MIN_TARGET_CHARS.max(latin * 2)
}

/// Normalizes a raw model payload into a `ChatTurn`, enforcing the language
/// rules. The hard turn cap overrides whatever the model claimed about
/// completion.
pub fn normalize_turn(
    payload: RawChatPayload,
    ai_turns: usize,
    locale: &LocalePack,
) -> Result<ChatTurn, TurnRejection> {
    let message = payload.message.as_deref().unwrap_or("").trim().to_string();
    if message.is_empty() {
        return Err(TurnRejection::EmptyMessage);
    }

    if !locale.has_target_script(&message) {
        return Err(TurnRejection::MissingTargetScript);
    }

    let cleaned = sanitize_message(&message);
    if !is_target_dominant(&cleaned, locale) {
        return Err(TurnRejection::ForeignDominant);
    }

    let at_cap = ai_turns >= MAX_TURNS;
    let is_complete = if at_cap {
        true
    } else {
        payload.is_complete.unwrap_or(false)
    };

    Ok(ChatTurn {
        message: cleaned,
        is_complete,
        turn_number: (ai_turns + 1) as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(message: &str, is_complete: Option<bool>) -> RawChatPayload {
        RawChatPayload {
            message: Some(message.to_string()),
            is_complete,
        }
    }

    #[test]
    fn test_empty_message_rejected() {
        let locale = LocalePack::thai();
        let err = normalize_turn(payload("   ", None), 1, &locale).unwrap_err();
        assert!(matches!(err, TurnRejection::EmptyMessage));

        let err = normalize_turn(
            RawChatPayload {
                message: None,
                is_complete: None,
            },
            1,
            &locale,
        )
        .unwrap_err();
        assert!(matches!(err, TurnRejection::EmptyMessage));
    }

    #[test]
    fn test_pure_english_rejected() {
        let locale = LocalePack::thai();
        let err =
            normalize_turn(payload("Please describe your nursing plan.", None), 1, &locale)
                .unwrap_err();
        assert!(matches!(err, TurnRejection::MissingTargetScript));
    }

    #[test]
    fn test_english_heavy_rejected() {
        let locale = LocalePack::thai();
        // Some Thai, but drowned in unlisted English.
        let err = normalize_turn(
            payload(
                "ค่ะ please explain your complete nursing management strategy for this complex patient case",
                None,
            ),
            1,
            &locale,
        )
        .unwrap_err();
        assert!(matches!(err, TurnRejection::ForeignDominant));
    }

    #[test]
    fn test_clinical_terms_exempt_from_dominance_count() {
        let locale = LocalePack::thai();
        let text = "ถ้าค่า SpO2 ลดลงและ BP ต่ำ คุณจะให้ O2 และรายงานแพทย์อย่างไรคะ";
        assert!(is_target_dominant(text, &locale));

        let turn = normalize_turn(payload(text, Some(false)), 1, &locale).unwrap();
        // Terms survive normalization intact.
        assert!(turn.message.contains("SpO2"));
        assert!(turn.message.contains("BP"));
    }

    #[test]
    fn test_short_thai_rejected_below_floor() {
        let locale = LocalePack::thai();
        // Fewer than 12 target-script characters.
        assert!(!is_target_dominant("ค่ะ", &locale));
    }

    #[test]
    fn test_markdown_stripped_and_whitespace_collapsed() {
        let locale = LocalePack::thai();
        let turn = normalize_turn(
            payload("**ขอบคุณค่ะ**   กรุณาอธิบาย  `แผนการพยาบาล` เพิ่มเติมค่ะ", None),
            1,
            &locale,
        )
        .unwrap();
        assert_eq!(turn.message, "ขอบคุณค่ะ กรุณาอธิบาย แผนการพยาบาล เพิ่มเติมค่ะ");
    }

    #[test]
    fn test_turn_cap_forces_completion_over_model_claim() {
        let locale = LocalePack::thai();
        let turn = normalize_turn(
            payload("ขอบคุณสำหรับคำตอบทั้งหมดค่ะ", Some(false)),
            MAX_TURNS,
            &locale,
        )
        .unwrap();
        assert!(turn.is_complete);
        assert_eq!(turn.turn_number, (MAX_TURNS + 1) as u32);
    }

    #[test]
    fn test_model_completion_claim_respected_below_cap() {
        let locale = LocalePack::thai();
        let complete = normalize_turn(
            payload("ขอบคุณสำหรับคำตอบทั้งหมดค่ะ", Some(true)),
            2,
            &locale,
        )
        .unwrap();
        assert!(complete.is_complete);

        let continuing = normalize_turn(
            payload("ขอบคุณค่ะ คำถามถัดไปนะคะ", None),
            2,
            &locale,
        )
        .unwrap();
        assert!(!continuing.is_complete);
    }

    #[test]
    fn test_raw_payload_tolerates_extra_fields() {
        let parsed: RawChatPayload = serde_json::from_str(
            r#"{"message": "สวัสดีค่ะ", "isComplete": false, "turnNumber": 2}"#,
        )
        .unwrap();
        assert_eq!(parsed.message.as_deref(), Some("สวัสดีค่ะ"));
        assert_eq!(parsed.is_complete, Some(false));
    }
}
