use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{AttemptId, QuizId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum QuizError {
    DefinitionUnavailable { quiz_id: QuizId },
    ScoreSaveFailed { quiz_id: QuizId },
    PointsAwardFailed { quiz_id: QuizId, points_owed: i32 },
    AttemptNotFound { attempt_id: AttemptId },
    AttemptNotInProgress { attempt_id: AttemptId },
    InvalidAnswer { option_index: usize },
    StoreUnavailable { message: String },
}

impl std::fmt::Display for QuizError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuizError::DefinitionUnavailable { quiz_id } => {
                write!(f, "Quiz {} could not be loaded", quiz_id)
            }
            QuizError::ScoreSaveFailed { quiz_id } => {
                write!(f, "Failed to save score for quiz {}", quiz_id)
            }
            QuizError::PointsAwardFailed {
                quiz_id,
                points_owed,
            } => write!(
                f,
                "Score saved for quiz {} but failed to update total points ({} owed)",
                quiz_id, points_owed
            ),
            QuizError::AttemptNotFound { attempt_id } => {
                write!(f, "Attempt {} not found", attempt_id)
            }
            QuizError::AttemptNotInProgress { attempt_id } => {
                write!(f, "Attempt {} is no longer in progress", attempt_id)
            }
            QuizError::InvalidAnswer { option_index } => {
                write!(f, "Option {} does not exist", option_index)
            }
            QuizError::StoreUnavailable { message } => write!(f, "Store unavailable: {}", message),
        }
    }
}

impl std::error::Error for QuizError {}
