use eco_types::{QuizDefinition, QuizError, QuizResult, ReconciliationOutcome, UserId};
use std::collections::BTreeMap;
use tracing::{debug, error, info};

use crate::{RecordStore, ScoringEngine};

/// Turn a finished attempt into a persisted best score and a points award.
///
/// Store failures never escape; they end up in `QuizResult::outcome`:
/// * nothing written: `ScoreSaveFailed`
/// * best score written, points not credited: `PointsAwardFailed`
///
/// `points_delta` is the marginal award computed for an improved score, whether
/// or not the increment went through. It is 0 when the score did not improve.
pub async fn reconcile<S>(
    store: &S,
    user_id: UserId,
    quiz: &QuizDefinition,
    answers: &BTreeMap<usize, usize>,
) -> QuizResult
where
    S: RecordStore + ?Sized,
{
    let total_questions = quiz.questions.len() as u32;
    let correct_count = ScoringEngine::correct_count(&quiz.questions, answers);
    let score_percent = ScoringEngine::score_percent(correct_count, total_questions);

    let result = |points_delta: i32, outcome: ReconciliationOutcome| QuizResult {
        score_percent,
        correct_count,
        total_questions,
        points_delta,
        outcome,
    };

    let previous_best = match store.fetch_best_score(user_id, quiz.id).await {
        Ok(record) => record.map(|r| r.score_percent).unwrap_or(0),
        Err(err) => {
            error!(
                "Failed to load previous best for user {} on quiz {}: {}",
                user_id, quiz.id, err
            );
            return result(0, ReconciliationOutcome::ScoreSaveFailed);
        }
    };

    if score_percent <= previous_best {
        debug!(
            "User {} scored {}% on quiz {}, previous best {}%",
            user_id, score_percent, quiz.id, previous_best
        );
        return result(0, ReconciliationOutcome::NotImproved);
    }

    let delta = ScoringEngine::points_delta(quiz.points_max, previous_best, score_percent);
    debug_assert!(delta.is_ok(), "{:?}", delta);
    let delta = match delta {
        Ok(delta) => delta,
        Err(err) => {
            error!("Refusing to reconcile quiz {} for user {}: {}", quiz.id, user_id, err);
            return result(0, ReconciliationOutcome::ScoreSaveFailed);
        }
    };

    if let Err(err) = store
        .upsert_best_score(user_id, quiz.id, score_percent)
        .await
    {
        error!(
            "Failed to save score {}% for user {} on quiz {}: {}",
            score_percent, user_id, quiz.id, err
        );
        return result(0, ReconciliationOutcome::ScoreSaveFailed);
    }

    if delta > 0 {
        if let Err(err) = store.increment_user_points(user_id, delta).await {
            // Best score is now ahead of the points total; left for an operator to settle
            error!(
                "Failed to update total points for user {} on quiz {}: {} points owed ({})",
                user_id, quiz.id, delta, err
            );
            return result(delta, ReconciliationOutcome::PointsAwardFailed);
        }
    }

    info!(
        "User {} set a new best of {}% on quiz {} (was {}%), awarded {} points",
        user_id, score_percent, quiz.id, previous_best, delta
    );
    result(delta, ReconciliationOutcome::NewBest)
}

/// Client-facing error for a failed reconciliation, if any
pub fn outcome_error(quiz: &QuizDefinition, result: &QuizResult) -> Option<QuizError> {
    match result.outcome {
        ReconciliationOutcome::ScoreSaveFailed => {
            Some(QuizError::ScoreSaveFailed { quiz_id: quiz.id })
        }
        ReconciliationOutcome::PointsAwardFailed => Some(QuizError::PointsAwardFailed {
            quiz_id: quiz.id,
            points_owed: result.points_delta,
        }),
        ReconciliationOutcome::NewBest | ReconciliationOutcome::NotImproved => None,
    }
}
