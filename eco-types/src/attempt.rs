use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::{AttemptId, PublicQuestion, QuizError, QuizId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum AttemptPhase {
    NotStarted, // Quiz picked but not yet running
    InProgress, // Answering questions, timer running
    Submitting, // Submission lock held, reconciliation running
    Settled,    // Result available, attempt is finished
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ReconciliationOutcome {
    NewBest,           // Best score saved and points awarded
    NotImproved,       // Did not beat the previous best, nothing written
    ScoreSaveFailed,   // Best score could not be saved, nothing written
    PointsAwardFailed, // Best score saved but the points total was not credited
}

impl ReconciliationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ReconciliationOutcome::ScoreSaveFailed | ReconciliationOutcome::PointsAwardFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuizResult {
    pub score_percent: u8,
    pub correct_count: u32,
    pub total_questions: u32,
    pub points_delta: i32,
    pub outcome: ReconciliationOutcome,
}

/// Client-facing snapshot of a running or settled attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttemptView {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub phase: AttemptPhase,
    pub current_question: usize,
    pub question: Option<PublicQuestion>,
    pub total_questions: usize,
    pub answers: BTreeMap<usize, usize>,
    pub remaining_seconds: u32,
    pub result: Option<QuizResult>,
}

/// Reply to an attempt action. `error` is set when the attempt settled but
/// reconciliation reported a failure the user should see.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AttemptResponse {
    pub attempt: AttemptView,
    pub error: Option<QuizError>,
}
