//! Scoring engine.
//!
//! `score` is a pure function of `(answers, instrument definition)`:
//! re-scoring a completed assignment with unchanged answers always yields
//! the same per-category scores and dominant category. `SCORING_VERSION`
//! is recorded on every result so the algorithm can be revised later
//! without mutating historical answers.

use std::collections::BTreeMap;

use chrono::Utc;

use crate::model::{Assignment, InstrumentDefinition, Polarity, ScoreResult};

/// Version of the scoring algorithm below.
pub const SCORING_VERSION: u32 = 1;

/// Scale midpoint of the normalized 0–100 range.
pub const SCALE_MIDPOINT: f64 = 50.0;

/// Compute per-category normalized scores for a completed assignment.
///
/// 1. Negative-polarity answers are inverted on the ordinal scale:
///    `inverted = (min + max) - value`.
/// 2. Each category's score is the weighted mean over its answered
///    questions.
/// 3. The mean is normalized onto 0–100 using the scale bounds.
/// 4. The dominant category deviates farthest from the midpoint (50);
///    ties break by category declaration order.
pub fn score(assignment: &Assignment, instrument: &InstrumentDefinition) -> ScoreResult {
    let min = instrument.config.scale_min as f64;
    let max = instrument.config.scale_max as f64;

    // (weighted value sum, weight sum) per category
    let mut sums: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

    for (position, slot) in assignment.answers.iter().enumerate() {
        let Some(answer) = slot else { continue };
        let Some(&question_idx) = assignment.question_order.get(position) else {
            continue;
        };
        let Some(question) = instrument.questions.get(question_idx) else {
            continue;
        };

        let raw = answer.value as f64;
        let effective = match question.polarity {
            Polarity::Positive => raw,
            Polarity::Negative => (min + max) - raw,
        };

        let entry = sums.entry(question.category.as_str()).or_insert((0.0, 0.0));
        entry.0 += question.weight * effective;
        entry.1 += question.weight;
    }

    let mut per_category = BTreeMap::new();
    for (category, (weighted_sum, weight_total)) in &sums {
        if *weight_total <= 0.0 {
            continue;
        }
        let mean = weighted_sum / weight_total;
        let normalized = ((mean - min) / (max - min)) * 100.0;
        per_category.insert((*category).to_string(), normalized);
    }

    let dominant_category = dominant(&per_category, instrument);

    ScoreResult {
        assignment_id: assignment.id,
        student_id: assignment.student_id,
        per_category,
        dominant_category,
        suspicious: assignment.suspicious_pattern,
        computed_at: Utc::now(),
        scoring_version: SCORING_VERSION,
    }
}

/// Category farthest from the midpoint. Iterates declaration order and only
/// replaces on a strictly larger deviation, so ties keep the earlier category.
fn dominant(per_category: &BTreeMap<String, f64>, instrument: &InstrumentDefinition) -> String {
    let mut best: Option<(&str, f64)> = None;
    for category in &instrument.categories {
        let Some(&score) = per_category.get(category) else {
            continue;
        };
        let deviation = (score - SCALE_MIDPOINT).abs();
        if best.map_or(true, |(_, d)| deviation > d) {
            best = Some((category, deviation));
        }
    }
    best.map(|(c, _)| c.to_string())
        .unwrap_or_else(|| instrument.categories.first().cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Answer, AssignmentStatus, InstrumentConfig, Question,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn two_category_instrument() -> InstrumentDefinition {
        InstrumentDefinition {
            id: "csi".into(),
            version: 1,
            name: "CSI".into(),
            categories: vec!["analytic".into(), "intuitive".into()],
            questions: vec![
                Question {
                    id: "q1".into(),
                    text: "one".into(),
                    category: "analytic".into(),
                    weight: 1.0,
                    polarity: Polarity::Positive,
                },
                Question {
                    id: "q2".into(),
                    text: "two".into(),
                    category: "intuitive".into(),
                    weight: 1.0,
                    polarity: Polarity::Positive,
                },
            ],
            config: InstrumentConfig::default(),
        }
    }

    fn assignment_with_answers(values: &[(usize, u8)]) -> Assignment {
        let mut answers = vec![None, None];
        for &(index, value) in values {
            answers[index] = Some(Answer {
                question_index: index,
                value,
                submitted_at: Utc::now(),
                time_spent_ms: 5_000,
                flagged_fast: false,
                revision: 0,
            });
        }
        Assignment {
            id: Uuid::new_v4(),
            student_id: Uuid::new_v4(),
            instrument_type: "csi".into(),
            instrument_version: 1,
            status: AssignmentStatus::Completed,
            assigned_at: Utc::now(),
            assigned_by: "test".into(),
            started_at: Some(Utc::now()),
            completed_at: Some(Utc::now()),
            question_order: vec![0, 1],
            answers,
            attempt_number: 1,
            quick_answer_count: 0,
            suspicious_pattern: false,
            score: None,
            version: 0,
        }
    }

    #[test]
    fn extreme_answers_hit_scale_bounds() {
        // Scenario: value 5 on a 1-5 scale normalizes to 100, value 1 to 0.
        let instrument = two_category_instrument();
        let assignment = assignment_with_answers(&[(0, 5), (1, 1)]);

        let result = score(&assignment, &instrument);
        assert_eq!(result.per_category["analytic"], 100.0);
        assert_eq!(result.per_category["intuitive"], 0.0);
        // Both deviate 50 from the midpoint; declaration order breaks the tie.
        assert_eq!(result.dominant_category, "analytic");
        assert_eq!(result.scoring_version, SCORING_VERSION);
    }

    #[test]
    fn negative_polarity_inverts_value() {
        let mut instrument = two_category_instrument();
        instrument.questions[0].polarity = Polarity::Negative;
        let assignment = assignment_with_answers(&[(0, 5), (1, 3)]);

        let result = score(&assignment, &instrument);
        // 5 inverted on 1-5 is 1, which normalizes to 0.
        assert_eq!(result.per_category["analytic"], 0.0);
        assert_eq!(result.per_category["intuitive"], 50.0);
        assert_eq!(result.dominant_category, "analytic");
    }

    #[test]
    fn weighted_mean_per_category() {
        let mut instrument = two_category_instrument();
        instrument.questions.push(Question {
            id: "q3".into(),
            text: "three".into(),
            category: "analytic".into(),
            weight: 3.0,
            polarity: Polarity::Positive,
        });
        let mut assignment = assignment_with_answers(&[(0, 1), (1, 3)]);
        assignment.question_order = vec![0, 1, 2];
        assignment.answers.push(Some(Answer {
            question_index: 2,
            value: 5,
            submitted_at: Utc::now(),
            time_spent_ms: 5_000,
            flagged_fast: false,
            revision: 0,
        }));

        let result = score(&assignment, &instrument);
        // analytic mean = (1*1 + 3*5) / 4 = 4.0 -> (4-1)/4 * 100 = 75
        assert_eq!(result.per_category["analytic"], 75.0);
    }

    #[test]
    fn scoring_is_idempotent() {
        let instrument = two_category_instrument();
        let assignment = assignment_with_answers(&[(0, 4), (1, 2)]);

        let first = score(&assignment, &instrument);
        let second = score(&assignment, &instrument);
        assert_eq!(first.per_category, second.per_category);
        assert_eq!(first.dominant_category, second.dominant_category);
        assert_eq!(first.scoring_version, second.scoring_version);
    }

    #[test]
    fn answer_order_does_not_change_scores() {
        let instrument = two_category_instrument();
        // Same values recorded against a shuffled question order.
        let mut shuffled = assignment_with_answers(&[(0, 5), (1, 1)]);
        shuffled.question_order = vec![1, 0];
        shuffled.answers = vec![
            Some(Answer {
                question_index: 0,
                value: 1,
                submitted_at: Utc::now(),
                time_spent_ms: 5_000,
                flagged_fast: false,
                revision: 0,
            }),
            Some(Answer {
                question_index: 1,
                value: 5,
                submitted_at: Utc::now(),
                time_spent_ms: 5_000,
                flagged_fast: false,
                revision: 0,
            }),
        ];
        let plain = assignment_with_answers(&[(0, 5), (1, 1)]);

        let a = score(&shuffled, &instrument);
        let b = score(&plain, &instrument);
        assert_eq!(a.per_category, b.per_category);
        assert_eq!(a.dominant_category, b.dominant_category);
    }

    #[test]
    fn unanswered_category_is_omitted() {
        let instrument = two_category_instrument();
        let assignment = assignment_with_answers(&[(0, 4)]);

        let result = score(&assignment, &instrument);
        assert!(result.per_category.contains_key("analytic"));
        assert!(!result.per_category.contains_key("intuitive"));
        assert_eq!(result.dominant_category, "analytic");
    }

    #[test]
    fn suspicious_flag_carries_over() {
        let instrument = two_category_instrument();
        let mut assignment = assignment_with_answers(&[(0, 3), (1, 3)]);
        assignment.suspicious_pattern = true;

        let result = score(&assignment, &instrument);
        assert!(result.suspicious);
    }
}
