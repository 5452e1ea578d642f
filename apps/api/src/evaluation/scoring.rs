//! Score aggregation — pure, deterministic math over validated criteria
//! scores. Same input always yields the same output.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::evaluation::output::AiCriteriaScore;

/// Mean score of one competency group, rounded to 2 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub group_id: String,
    pub average_score: f64,
}

/// Two-locale display label for an experience level.
#[derive(Debug, Clone, Serialize)]
pub struct LevelLabel {
    pub en: String,
    pub th: String,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Groups scores by owning competency group and averages each group.
/// Groups with no scores are omitted entirely, so no group ever divides by
/// zero. Output is ordered by group id for reproducibility.
pub fn category_average(
    scores: &[AiCriteriaScore],
    criteria_to_group: &HashMap<String, String>,
) -> Vec<CategoryScore> {
    let mut grouped: BTreeMap<&str, Vec<i32>> = BTreeMap::new();

    for cs in scores {
        if let Some(group_id) = criteria_to_group.get(&cs.criteria_id) {
            grouped.entry(group_id.as_str()).or_default().push(cs.score);
        }
    }

    grouped
        .into_iter()
        .map(|(group_id, group_scores)| CategoryScore {
            group_id: group_id.to_string(),
            average_score: round2(
                group_scores.iter().sum::<i32>() as f64 / group_scores.len() as f64,
            ),
        })
        .collect()
}

/// Arithmetic mean of all scores, 2-decimal rounding. 0 for an empty set.
pub fn weighted_total(scores: &[AiCriteriaScore]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let total: i32 = scores.iter().map(|cs| cs.score).sum();
    round2(total as f64 / scores.len() as f64)
}

/// Signed distance from the standard: positive = above, zero = meets,
/// negative = below.
pub fn gap(score: i32, standard: i32) -> i32 {
    score - standard
}

/// Display labels for the five nursing experience levels. Unknown levels
/// echo the raw value.
pub fn experience_level_label(level: &str) -> LevelLabel {
    let (en, th) = match level {
        "LEVEL_1" => ("0-1 year (Novice)", "0-1 ปี (มือใหม่)"),
        "LEVEL_2" => ("1-2 years (Beginner)", "1-2 ปี (เริ่มต้น)"),
        "LEVEL_3" => ("2-3 years (Competent)", "2-3 ปี (มีความสามารถ)"),
        "LEVEL_4" => (">3 years (Charge Nurse)", "มากกว่า 3 ปี (หัวหน้า)"),
        "LEVEL_5" => (">5 years (Expert)", "มากกว่า 5 ปี (เชี่ยวชาญ)"),
        other => (other, other),
    };
    LevelLabel {
        en: en.to_string(),
        th: th.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(id: &str, value: i32) -> AiCriteriaScore {
        AiCriteriaScore {
            criteria_id: id.to_string(),
            score: value,
            reasoning: None,
        }
    }

    fn group_map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(c, g)| (c.to_string(), g.to_string()))
            .collect()
    }

    #[test]
    fn test_gap_above_meets_below() {
        assert_eq!(gap(4, 2), 2);
        assert_eq!(gap(2, 4), -2);
        assert_eq!(gap(3, 3), 0);
    }

    #[test]
    fn test_weighted_total_empty_is_zero() {
        assert_eq!(weighted_total(&[]), 0.0);
    }

    #[test]
    fn test_weighted_total_is_mean_rounded() {
        let scores = vec![score("c1", 3), score("c2", 5)];
        assert_eq!(weighted_total(&scores), 4.0);

        let uneven = vec![score("c1", 3), score("c2", 4), score("c3", 5)];
        assert_eq!(weighted_total(&uneven), 4.0);

        let thirds = vec![score("c1", 2), score("c2", 3), score("c3", 3)];
        assert_eq!(weighted_total(&thirds), 2.67);
    }

    #[test]
    fn test_category_average_groups_and_rounds() {
        let scores = vec![score("c1", 3), score("c2", 4), score("c3", 5)];
        let map = group_map(&[("c1", "g1"), ("c2", "g1"), ("c3", "g2")]);

        let averages = category_average(&scores, &map);
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0].group_id, "g1");
        assert_eq!(averages[0].average_score, 3.5);
        assert_eq!(averages[1].group_id, "g2");
        assert_eq!(averages[1].average_score, 5.0);
    }

    #[test]
    fn test_category_average_omits_unmapped_and_empty_groups() {
        // "c9" belongs to no known group; "g2" receives no scores.
        let scores = vec![score("c1", 4), score("c9", 2)];
        let map = group_map(&[("c1", "g1"), ("c2", "g2")]);

        let averages = category_average(&scores, &map);
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].group_id, "g1");
    }

    #[test]
    fn test_category_average_empty_input() {
        let averages = category_average(&[], &group_map(&[("c1", "g1")]));
        assert!(averages.is_empty());
    }

    #[test]
    fn test_category_average_deterministic_order() {
        let scores = vec![score("c1", 1), score("c2", 2), score("c3", 3)];
        let map = group_map(&[("c1", "gb"), ("c2", "ga"), ("c3", "gc")]);

        let first = category_average(&scores, &map);
        let second = category_average(&scores, &map);
        let order: Vec<&str> = first.iter().map(|c| c.group_id.as_str()).collect();
        assert_eq!(order, vec!["ga", "gb", "gc"]);
        assert_eq!(
            order,
            second.iter().map(|c| c.group_id.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_level_labels_known_and_unknown() {
        assert_eq!(experience_level_label("LEVEL_1").en, "0-1 year (Novice)");
        assert_eq!(experience_level_label("LEVEL_5").th, "มากกว่า 5 ปี (เชี่ยวชาญ)");
        assert_eq!(experience_level_label("LEVEL_9").en, "LEVEL_9");
    }
}
