use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::{QuestionId, QuizId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Question {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub explanation: String,
}

/// Question as sent to the client while an attempt is running.
/// The correct option and explanation stay on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PublicQuestion {
    pub id: QuestionId,
    pub prompt: String,
    pub options: Vec<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(question: &Question) -> Self {
        PublicQuestion {
            id: question.id,
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuizDefinition {
    pub id: QuizId,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub points_max: i32,    // Points awarded at 100%
    pub time_limit_seconds: u32,
}

impl QuizDefinition {
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            points_max: self.points_max,
            time_limit_seconds: self.time_limit_seconds,
            question_count: self.questions.len() as u32,
        }
    }
}

/// Listing row for the quiz picker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuizSummary {
    pub id: QuizId,
    pub title: String,
    pub description: String,
    pub points_max: i32,
    pub time_limit_seconds: u32,
    pub question_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BestScoreRecord {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub score_percent: u8,
    pub updated_at: String, // ISO 8601 string
}
