use sea_orm_migration::prelude::*;

use crate::m20250901_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Quizzes::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Quizzes::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Quizzes::Title).string().not_null())
                    .col(
                        ColumnDef::new(Quizzes::Description)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .col(ColumnDef::new(Quizzes::PointsMax).integer().not_null())
                    .col(
                        ColumnDef::new(Quizzes::TimeLimitSeconds)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Quizzes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuizQuestions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuizQuestions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(QuizQuestions::QuizId).uuid().not_null())
                    .col(ColumnDef::new(QuizQuestions::Position).integer().not_null())
                    .col(ColumnDef::new(QuizQuestions::Prompt).text().not_null())
                    .col(ColumnDef::new(QuizQuestions::Options).json().not_null())
                    .col(
                        ColumnDef::new(QuizQuestions::CorrectIndex)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuizQuestions::Explanation)
                            .text()
                            .not_null()
                            .default(""),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quiz_questions_quiz")
                            .from(QuizQuestions::Table, QuizQuestions::QuizId)
                            .to(Quizzes::Table, Quizzes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_quiz_questions_position")
                    .table(QuizQuestions::Table)
                    .col(QuizQuestions::QuizId)
                    .col(QuizQuestions::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One best score per (user, quiz); the composite key is what makes upserts idempotent
        manager
            .create_table(
                Table::create()
                    .table(QuizBestScores::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(QuizBestScores::UserId).uuid().not_null())
                    .col(ColumnDef::new(QuizBestScores::QuizId).uuid().not_null())
                    .col(
                        ColumnDef::new(QuizBestScores::ScorePercent)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuizBestScores::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(QuizBestScores::UserId)
                            .col(QuizBestScores::QuizId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quiz_best_scores_user")
                            .from(QuizBestScores::Table, QuizBestScores::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_quiz_best_scores_quiz")
                            .from(QuizBestScores::Table, QuizBestScores::QuizId)
                            .to(Quizzes::Table, Quizzes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(QuizBestScores::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QuizQuestions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Quizzes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Quizzes {
    Table,
    Id,
    Title,
    Description,
    PointsMax,
    TimeLimitSeconds,
    CreatedAt,
}

#[derive(DeriveIden)]
enum QuizQuestions {
    Table,
    Id,
    QuizId,
    Position,
    Prompt,
    Options,
    CorrectIndex,
    Explanation,
}

#[derive(DeriveIden)]
enum QuizBestScores {
    Table,
    UserId,
    QuizId,
    ScorePercent,
    UpdatedAt,
}
