//! Assessment session lifecycle.
//!
//! IN_PROGRESS → SELF_ASSESSED → (AI_SCORED | AI_FAILED) → REVIEWED → APPROVED
//!
//! The stored status is the optimistic precondition for every mutation: a
//! request arriving in the wrong state is rejected before any side effect
//! (`AppError::InvalidState`), which is also what guards two concurrent
//! submissions against the same session from double-processing.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    SelfAssessed,
    AiScored,
    AiFailed,
    Reviewed,
    Approved,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::SelfAssessed => "SELF_ASSESSED",
            SessionStatus::AiScored => "AI_SCORED",
            SessionStatus::AiFailed => "AI_FAILED",
            SessionStatus::Reviewed => "REVIEWED",
            SessionStatus::Approved => "APPROVED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(SessionStatus::InProgress),
            "SELF_ASSESSED" => Some(SessionStatus::SelfAssessed),
            "AI_SCORED" => Some(SessionStatus::AiScored),
            "AI_FAILED" => Some(SessionStatus::AiFailed),
            "REVIEWED" => Some(SessionStatus::Reviewed),
            "APPROVED" => Some(SessionStatus::Approved),
            _ => None,
        }
    }

    /// Self-scoring is an idempotent upsert: repeating it while already
    /// SELF_ASSESSED changes nothing downstream.
    pub fn can_self_score(&self) -> bool {
        matches!(self, SessionStatus::InProgress | SessionStatus::SelfAssessed)
    }

    /// Transcript submission requires completed self-scoring. AI_FAILED
    /// re-admits submission: the respondent may resubmit a fresh transcript,
    /// which runs the full pipeline again (no partial resume).
    pub fn can_submit(&self) -> bool {
        matches!(self, SessionStatus::SelfAssessed | SessionStatus::AiFailed)
    }

    /// The conversation runs before submission; a failed scoring pass may
    /// also be redone conversationally.
    pub fn can_chat(&self) -> bool {
        matches!(
            self,
            SessionStatus::InProgress | SessionStatus::SelfAssessed | SessionStatus::AiFailed
        )
    }

    /// Reviewers may score over AI_FAILED, substituting human judgment for
    /// the AI pass entirely, and may re-edit while REVIEWED.
    pub fn can_review(&self) -> bool {
        matches!(
            self,
            SessionStatus::AiScored | SessionStatus::AiFailed | SessionStatus::Reviewed
        )
    }

    /// Approval is terminal.
    pub fn can_approve(&self) -> bool {
        matches!(self, SessionStatus::Reviewed)
    }

    /// Rejects the request with a user-actionable error unless `allowed`.
    pub fn guard(&self, allowed: bool, action: &str) -> Result<(), AppError> {
        if allowed {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "Cannot {action} while the session is {}",
                self.as_str()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionStatus; 6] = [
        SessionStatus::InProgress,
        SessionStatus::SelfAssessed,
        SessionStatus::AiScored,
        SessionStatus::AiFailed,
        SessionStatus::Reviewed,
        SessionStatus::Approved,
    ];

    #[test]
    fn test_round_trips_through_storage_strings() {
        for status in ALL {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("BOGUS"), None);
    }

    #[test]
    fn test_submission_requires_self_assessment_first() {
        assert!(!SessionStatus::InProgress.can_submit());
        assert!(SessionStatus::SelfAssessed.can_submit());
    }

    #[test]
    fn test_submission_rejected_once_scored() {
        // Past SELF_ASSESSED (except AI_FAILED), resubmission must be refused
        // rather than silently double-processed.
        assert!(!SessionStatus::AiScored.can_submit());
        assert!(!SessionStatus::Reviewed.can_submit());
        assert!(!SessionStatus::Approved.can_submit());
    }

    #[test]
    fn test_ai_failed_admits_resubmission() {
        assert!(SessionStatus::AiFailed.can_submit());
        assert!(SessionStatus::AiFailed.can_chat());
    }

    #[test]
    fn test_reviewer_may_override_a_failed_ai_pass() {
        assert!(SessionStatus::AiFailed.can_review());
        assert!(SessionStatus::AiScored.can_review());
        assert!(SessionStatus::Reviewed.can_review());
        assert!(!SessionStatus::SelfAssessed.can_review());
    }

    #[test]
    fn test_approved_is_terminal() {
        let approved = SessionStatus::Approved;
        assert!(!approved.can_self_score());
        assert!(!approved.can_submit());
        assert!(!approved.can_chat());
        assert!(!approved.can_review());
        assert!(!approved.can_approve());
    }

    #[test]
    fn test_only_reviewed_can_be_approved() {
        for status in ALL {
            assert_eq!(status.can_approve(), status == SessionStatus::Reviewed);
        }
    }

    #[test]
    fn test_guard_formats_actionable_error() {
        let err = SessionStatus::Approved
            .guard(false, "submit a transcript")
            .unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("submit a transcript"));
        assert!(msg.contains("APPROVED"));
    }

    #[test]
    fn test_self_score_idempotent_window() {
        assert!(SessionStatus::InProgress.can_self_score());
        assert!(SessionStatus::SelfAssessed.can_self_score());
        assert!(!SessionStatus::AiScored.can_self_score());
    }
}
