use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn timestamp_now(column: Users) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

/// Accounts come from the identity provider, so the id is its UUID `sub`
fn users_table() -> TableCreateStatement {
    Table::create()
        .table(Users::Table)
        .if_not_exists()
        .col(ColumnDef::new(Users::Id).uuid().not_null().primary_key())
        .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
        .col(ColumnDef::new(Users::DisplayName).string().not_null())
        .col(
            ColumnDef::new(Users::TotalPoints)
                .integer()
                .not_null()
                .default(0),
        )
        .col(timestamp_now(Users::CreatedAt))
        .col(timestamp_now(Users::UpdatedAt))
        .to_owned()
}

// Leaderboard reads users by total, highest first
fn leaderboard_index() -> IndexCreateStatement {
    Index::create()
        .name("idx_users_leaderboard")
        .table(Users::Table)
        .col((Users::TotalPoints, IndexOrder::Desc))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(users_table()).await?;
        manager.create_index(leaderboard_index()).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Users {
    Table,
    Id,
    Email,
    DisplayName,
    TotalPoints,
    CreatedAt,
    UpdatedAt,
}
