use async_trait::async_trait;
use eco_types::{BestScoreRecord, QuizDefinition, QuizId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("record store failure: {0}")]
    Backend(String),
}

/// Durable storage the quiz routines run against.
///
/// `upsert_best_score` must keep at most one record per (user, quiz) and be safe
/// to retry. `increment_user_points` must be a single atomic add on the store
/// side; callers never read-modify-write the total.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, StoreError>;

    async fn fetch_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<BestScoreRecord>, StoreError>;

    async fn upsert_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score_percent: u8,
    ) -> Result<(), StoreError>;

    async fn increment_user_points(&self, user_id: UserId, delta: i32) -> Result<(), StoreError>;
}
