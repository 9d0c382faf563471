use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

pub async fn connect_to_database() -> Result<DatabaseConnection, DbErr> {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://eco_quiz.db?mode=rwc".to_string());

    Database::connect(&database_url).await
}

/// Each SQLite memory connection is its own database, so the pool holds exactly one
pub async fn connect_to_memory_database() -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);

    Database::connect(options).await
}

/// Connect using `DATABASE_URL` and bring the schema up to date
pub async fn connect_and_migrate() -> Result<DatabaseConnection, DbErr> {
    let db = connect_to_database().await?;
    info!("Connected to database, applying pending migrations");
    Migrator::up(&db, None).await?;
    Ok(db)
}
