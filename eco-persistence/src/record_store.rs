use async_trait::async_trait;
use eco_core::{RecordStore, StoreError};
use eco_types::{BestScoreRecord, QuizDefinition, QuizId, UserId};
use sea_orm::DatabaseConnection;

use crate::repositories::{QuizRepository, UserRepository};

fn backend(err: anyhow::Error) -> StoreError {
    StoreError::Backend(format!("{:#}", err))
}

/// `RecordStore` backed by the SQL schema in `migration`
#[derive(Clone)]
pub struct SeaOrmRecordStore {
    quizzes: QuizRepository,
    users: UserRepository,
}

impl SeaOrmRecordStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            quizzes: QuizRepository::new(db.clone()),
            users: UserRepository::new(db),
        }
    }
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn fetch_quiz_definition(&self, quiz_id: QuizId) -> Result<QuizDefinition, StoreError> {
        match self.quizzes.find_definition(quiz_id).await.map_err(backend)? {
            Some(quiz) if !quiz.questions.is_empty() => Ok(quiz),
            _ => Err(StoreError::NotFound),
        }
    }

    async fn fetch_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
    ) -> Result<Option<BestScoreRecord>, StoreError> {
        self.quizzes
            .find_best_score(user_id, quiz_id)
            .await
            .map_err(backend)
    }

    async fn upsert_best_score(
        &self,
        user_id: UserId,
        quiz_id: QuizId,
        score_percent: u8,
    ) -> Result<(), StoreError> {
        self.quizzes
            .upsert_best_score(user_id, quiz_id, score_percent)
            .await
            .map_err(backend)
    }

    async fn increment_user_points(&self, user_id: UserId, delta: i32) -> Result<(), StoreError> {
        if self.users.add_points(user_id, delta).await.map_err(backend)? {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }
}
