use eco_types::Question;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("points delta went negative ({old_points} -> {new_points}), rounding policy regressed")]
    NegativeDelta { old_points: i32, new_points: i32 },
}

pub struct ScoringEngine;

impl ScoringEngine {
    /// Count questions whose selected option matches the correct one.
    /// Unanswered questions count as incorrect.
    pub fn correct_count(questions: &[Question], answers: &BTreeMap<usize, usize>) -> u32 {
        questions
            .iter()
            .enumerate()
            .filter(|(index, question)| answers.get(index) == Some(&question.correct_index))
            .count() as u32
    }

    /// `round(100 * correct / total)`, clamped to 0 for an empty quiz
    pub fn score_percent(correct_count: u32, total_questions: u32) -> u8 {
        if total_questions == 0 {
            return 0;
        }

        let correct = correct_count.min(total_questions) as f64;
        (100.0 * correct / total_questions as f64).round() as u8
    }

    /// Points a given score is worth on a quiz worth `points_max` at 100%
    pub fn points_for_score(points_max: i32, score_percent: u8) -> i32 {
        (points_max as f64 * score_percent as f64 / 100.0).round() as i32
    }

    /// Marginal points owed when `new_best` replaces `previous_best`.
    /// A negative result is reported, never clamped.
    pub fn points_delta(
        points_max: i32,
        previous_best: u8,
        new_best: u8,
    ) -> Result<i32, ScoringError> {
        let old_points = Self::points_for_score(points_max, previous_best);
        let new_points = Self::points_for_score(points_max, new_best);

        let delta = new_points - old_points;
        if delta < 0 {
            return Err(ScoringError::NegativeDelta {
                old_points,
                new_points,
            });
        }

        Ok(delta)
    }
}
