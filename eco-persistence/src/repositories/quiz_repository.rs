use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

use crate::entities::{prelude::*, quiz_best_scores, quiz_questions, quizzes};
use eco_types::{BestScoreRecord, Question, QuizDefinition, QuizSummary};

// Keep the stored best monotonic even if an older, lower write is retried late
const KEEP_HIGHER_SCORE: &str = "CASE WHEN excluded.score_percent > quiz_best_scores.score_percent \
     THEN excluded.score_percent ELSE quiz_best_scores.score_percent END";

#[derive(Clone)]
pub struct QuizRepository {
    db: DatabaseConnection,
}

impl QuizRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_question(model: quiz_questions::Model) -> Result<Question> {
        let options: Vec<String> = serde_json::from_value(model.options)
            .with_context(|| format!("Question {} has malformed options", model.id))?;
        let correct_index = usize::try_from(model.correct_index)
            .with_context(|| format!("Question {} has a negative answer index", model.id))?;

        Ok(Question {
            id: model.id,
            prompt: model.prompt,
            options,
            correct_index,
            explanation: model.explanation,
        })
    }

    fn model_to_best_score(model: quiz_best_scores::Model) -> Result<BestScoreRecord> {
        let score_percent = u8::try_from(model.score_percent)
            .with_context(|| format!("Score {} out of range", model.score_percent))?;

        Ok(BestScoreRecord {
            user_id: model.user_id,
            quiz_id: model.quiz_id,
            score_percent,
            updated_at: model.updated_at.to_rfc3339(),
        })
    }

    /// Store a quiz and its questions in one transaction
    pub async fn create_quiz(&self, quiz: &QuizDefinition) -> Result<()> {
        let txn = self.db.begin().await?;

        let quiz_model = quizzes::ActiveModel {
            id: Set(quiz.id),
            title: Set(quiz.title.clone()),
            description: Set(quiz.description.clone()),
            points_max: Set(quiz.points_max),
            time_limit_seconds: Set(quiz.time_limit_seconds as i32),
            created_at: Set(chrono::Utc::now().into()),
        };
        Quizzes::insert(quiz_model)
            .exec_without_returning(&txn)
            .await?;

        let question_models = quiz
            .questions
            .iter()
            .enumerate()
            .map(|(position, question)| quiz_questions::ActiveModel {
                id: Set(question.id),
                quiz_id: Set(quiz.id),
                position: Set(position as i32),
                prompt: Set(question.prompt.clone()),
                options: Set(serde_json::json!(question.options)),
                correct_index: Set(question.correct_index as i32),
                explanation: Set(question.explanation.clone()),
            })
            .collect::<Vec<_>>();

        if !question_models.is_empty() {
            QuizQuestions::insert_many(question_models)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Quiz with its questions in order, or `None` if it does not exist
    pub async fn find_definition(&self, quiz_id: Uuid) -> Result<Option<QuizDefinition>> {
        let Some(quiz) = Quizzes::find_by_id(quiz_id).one(&self.db).await? else {
            return Ok(None);
        };

        let questions = QuizQuestions::find()
            .filter(quiz_questions::Column::QuizId.eq(quiz_id))
            .order_by_asc(quiz_questions::Column::Position)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Self::model_to_question)
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(QuizDefinition {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            questions,
            points_max: quiz.points_max,
            time_limit_seconds: u32::try_from(quiz.time_limit_seconds).unwrap_or(0),
        }))
    }

    pub async fn list_quizzes(&self) -> Result<Vec<QuizSummary>> {
        let quizzes = Quizzes::find()
            .order_by_asc(quizzes::Column::Title)
            .all(&self.db)
            .await?;

        let counts: HashMap<Uuid, i64> = QuizQuestions::find()
            .select_only()
            .column(quiz_questions::Column::QuizId)
            .column_as(Expr::col(quiz_questions::Column::Id).count(), "question_count")
            .group_by(quiz_questions::Column::QuizId)
            .into_tuple::<(Uuid, i64)>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        let summaries = quizzes
            .into_iter()
            .map(|quiz| QuizSummary {
                question_count: counts.get(&quiz.id).copied().unwrap_or(0) as u32,
                id: quiz.id,
                title: quiz.title,
                description: quiz.description,
                points_max: quiz.points_max,
                time_limit_seconds: u32::try_from(quiz.time_limit_seconds).unwrap_or(0),
            })
            .collect();

        Ok(summaries)
    }

    pub async fn find_best_score(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
    ) -> Result<Option<BestScoreRecord>> {
        QuizBestScores::find_by_id((user_id, quiz_id))
            .one(&self.db)
            .await?
            .map(Self::model_to_best_score)
            .transpose()
    }

    pub async fn best_scores_for_user(&self, user_id: Uuid) -> Result<Vec<BestScoreRecord>> {
        QuizBestScores::find()
            .filter(quiz_best_scores::Column::UserId.eq(user_id))
            .order_by_desc(quiz_best_scores::Column::UpdatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(Self::model_to_best_score)
            .collect()
    }

    /// Insert or raise the best score for (user, quiz). Retrying the same write is a no-op.
    pub async fn upsert_best_score(
        &self,
        user_id: Uuid,
        quiz_id: Uuid,
        score_percent: u8,
    ) -> Result<()> {
        let record = quiz_best_scores::ActiveModel {
            user_id: Set(user_id),
            quiz_id: Set(quiz_id),
            score_percent: Set(score_percent as i32),
            updated_at: Set(chrono::Utc::now().into()),
        };

        let on_conflict = OnConflict::columns([
            quiz_best_scores::Column::UserId,
            quiz_best_scores::Column::QuizId,
        ])
        .value(
            quiz_best_scores::Column::ScorePercent,
            Expr::cust(KEEP_HIGHER_SCORE),
        )
        .update_column(quiz_best_scores::Column::UpdatedAt)
        .to_owned();

        QuizBestScores::insert(record)
            .on_conflict(on_conflict)
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}
