//! Evaluation prompt construction.
//!
//! The prompt is deterministic for a given (criteria, case, transcript)
//! triple: criteria arrive pre-sorted from the taxonomy query and are
//! embedded in order, and the exact criteria-id set the model must return is
//! enumerated twice — once per criterion and once as the closing CRITICAL
//! list — because models invent ids when the list is merely implied.

use crate::models::case::CaseInfo;
use crate::models::competency::CriterionInfo;

/// Builds the full scoring prompt for one transcript.
pub fn build_evaluation_prompt(
    criteria: &[CriterionInfo],
    case_info: &CaseInfo,
    transcript: &str,
) -> String {
    let criteria_list = criteria
        .iter()
        .map(|c| {
            format!(
                "- ID: \"{}\" | Group: {} | Name: {} ({})",
                c.id, c.group_name_en, c.name_en, c.name_th
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let criteria_ids = criteria
        .iter()
        .map(|c| format!("\"{}\"", c.id))
        .collect::<Vec<_>>()
        .join(", ");

    let reasoning_list = if case_info.reasoning_indicators.is_empty() {
        "No specific reasoning indicators provided.".to_string()
    } else {
        case_info
            .reasoning_indicators
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are an expert nursing competency evaluator at a university medical center hospital.

Your task is to evaluate a nurse's response to a clinical case scenario. Score the nurse on each competency criterion using a 1-5 scale:
  1 = Novice (ระดับเริ่มต้น) - Minimal understanding, requires constant guidance
  2 = Beginner (ระดับเริ่มเรียนรู้) - Basic understanding, requires frequent guidance
  3 = Competent (ระดับมีความสามารถ) - Adequate understanding, works independently in routine situations
  4 = Proficient (ระดับชำนาญ) - Deep understanding, handles complex situations well
  5 = Expert (ระดับเชี่ยวชาญ) - Exceptional mastery, can teach and lead others

CASE SCENARIO:
Title: {title}
Description (Thai): {description_th}
Description (English): {description_en}

EXPECTED REASONING INDICATORS:
{reasoning_list}

COMPETENCY CRITERIA TO EVALUATE:
{criteria_list}

NURSE'S RESPONSE:
"""
{transcript}
"""

INSTRUCTIONS:
1. Evaluate the nurse's response against EACH criterion listed above.
2. Consider the depth and quality of clinical reasoning demonstrated.
3. The response may be in Thai - evaluate the content regardless of language.
4. Score ONLY the criteria provided. Do NOT invent new criteria.
5. Provide clear reasoning for each score.
6. Write strengths, weaknesses, and recommendations in Thai language.

Return ONLY valid JSON in this exact format (no markdown, no explanation outside JSON):
{{
  "criteriaScores": [
    {{ "criteriaId": "<exact ID from above>", "score": <1-5>, "reasoning": "<brief explanation in Thai>" }}
  ],
  "strengths": "<overall strengths in Thai>",
  "weaknesses": "<overall weaknesses in Thai>",
  "recommendations": "<specific improvement recommendations in Thai>",
  "confidenceScore": <0.0-1.0>
}}

CRITICAL: You MUST include scores for ALL these criteria IDs: [{criteria_ids}]
Do NOT include any criteria ID not in the list above.
Each score MUST be an integer between 1 and 5."#,
        title = case_info.title,
        description_th = case_info.description_th,
        description_en = case_info.description_en,
        reasoning_list = reasoning_list,
        criteria_list = criteria_list,
        transcript = transcript,
        criteria_ids = criteria_ids,
    )
}

/// Appends the exact error list from a failed round as corrective feedback.
pub fn corrective_prompt(base_prompt: &str, errors: &str) -> String {
    format!(
        "{base_prompt}\n\nPREVIOUS ATTEMPT FAILED WITH ERROR: {errors}\n\
         Please fix the output and try again. Return ONLY the JSON, no other text."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(id: &str) -> CriterionInfo {
        CriterionInfo {
            id: id.to_string(),
            name_th: "การแก้ไขปัญหา".to_string(),
            name_en: "Problem solving".to_string(),
            group_name_en: "Functional Competency".to_string(),
            group_id: "g1".to_string(),
        }
    }

    fn case() -> CaseInfo {
        CaseInfo {
            title: "Fall risk".to_string(),
            description_th: "ผู้ป่วยเสี่ยงพลัดตกหกล้ม".to_string(),
            description_en: "Elderly patient at risk of falling".to_string(),
            reasoning_indicators: vec!["Assess fall risk factors".to_string()],
        }
    }

    #[test]
    fn test_prompt_enumerates_exact_id_set() {
        let prompt = build_evaluation_prompt(&[criterion("c1"), criterion("c2")], &case(), "t");
        assert!(prompt.contains(r#"["c1", "c2"]"#));
        assert!(prompt.contains("Do NOT invent new criteria"));
    }

    #[test]
    fn test_prompt_embeds_transcript_verbatim() {
        let transcript = "ประเมินสัญญาณชีพก่อน แล้วรายงานแพทย์";
        let prompt = build_evaluation_prompt(&[criterion("c1")], &case(), transcript);
        assert!(prompt.contains(transcript));
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let criteria = [criterion("c1"), criterion("c2")];
        let a = build_evaluation_prompt(&criteria, &case(), "same");
        let b = build_evaluation_prompt(&criteria, &case(), "same");
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_indicators_get_placeholder() {
        let mut c = case();
        c.reasoning_indicators.clear();
        let prompt = build_evaluation_prompt(&[criterion("c1")], &c, "t");
        assert!(prompt.contains("No specific reasoning indicators provided."));
    }

    #[test]
    fn test_corrective_prompt_carries_error_list() {
        let prompt = corrective_prompt("BASE", "Missing criteria: c2");
        assert!(prompt.starts_with("BASE"));
        assert!(prompt.contains("PREVIOUS ATTEMPT FAILED WITH ERROR: Missing criteria: c2"));
    }
}
