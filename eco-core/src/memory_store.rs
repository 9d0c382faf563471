use async_trait::async_trait;
use eco_types::{BestScoreRecord, QuizDefinition, QuizId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::{RecordStore, StoreError};

/// Process-local `RecordStore`, used for development mode and tests.
/// Failures can be injected per operation to exercise partial reconciliation.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    quizzes: RwLock<HashMap<QuizId, QuizDefinition>>,
    best_scores: RwLock<HashMap<(UserId, QuizId), BestScoreRecord>>,
    user_points: RwLock<HashMap<UserId, i32>>,
    fail_fetch_best: AtomicBool,
    fail_upsert: AtomicBool,
    fail_increment: AtomicBool,
    upsert_calls: AtomicUsize,
    increment_calls: AtomicUsize,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_quiz(&self, quiz: QuizDefinition) {
        self.quizzes.write().await.insert(quiz.id, quiz);
    }

    pub async fn list_quizzes(&self) -> Vec<QuizDefinition> {
        self.quizzes.read().await.values().cloned().collect()
    }

    pub async fn set_user_points(&self, user_id: UserId, points: i32) {
        self.user_points.write().await.insert(user_id, points);
    }

    pub async fn user_points(&self, user_id: UserId) -> Option<i32> {
        self.user_points.read().await.get(&user_id).copied()
    }

    pub async fn best_score(&self, user_id: UserId, quiz_id: QuizId) -> Option<BestScoreRecord> {
        self.best_scores
            .read()
            .await
            .get(&(user_id, quiz_id))
            .cloned()
    }

    pub async fn best_score_count(&self) -> usize {
        self.best_scores.read().await.len()
    }

    pub fn fail_fetch_best(&self, fail: bool) {
        self.fail_fetch_best.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upsert(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }

    pub fn fail_increment(&self, fail: bool) {
        self.fail_increment.store(fail, Ordering::SeqCst);
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn increment_calls(&self) -> usize {
        self.increment_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, StoreError> {
        self.quizzes
            .read()
            .await
            .get(&quiz_id)
            .filter(|quiz| !quiz.questions.is_empty())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn fetch_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<BestScoreRecord>, StoreError> {
        if self.fail_fetch_best.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("fetch best score unavailable".to_string()));
        }

        Ok(self.best_score(user_id, quiz_id).await)
    }

    async fn upsert_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score_percent: u8,
    ) -> Result<(), StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("upsert rejected".to_string()));
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut best_scores = self.best_scores.write().await;
        let record = best_scores
            .entry((user_id, quiz_id))
            .or_insert_with(|| BestScoreRecord {
                user_id,
                quiz_id,
                score_percent,
                updated_at: now.clone(),
            });

        // Stored best never goes down, even for out-of-order retries
        record.score_percent = record.score_percent.max(score_percent);
        record.updated_at = now;
        Ok(())
    }

    async fn increment_user_points(&self, user_id: UserId, delta: i32) -> Result<(), StoreError> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_increment.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("increment rejected".to_string()));
        }

        let mut user_points = self.user_points.write().await;
        let total = user_points.get_mut(&user_id).ok_or(StoreError::NotFound)?;
        *total += delta;
        Ok(())
    }
}
