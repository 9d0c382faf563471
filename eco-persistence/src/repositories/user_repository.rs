use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;

use crate::entities::{prelude::*, users};
use eco_types::{LeaderboardEntry, User};

#[derive(Clone)]
pub struct UserRepository {
    db: DatabaseConnection,
}

impl UserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn model_to_user(model: users::Model) -> User {
        User {
            id: model.id,
            email: model.email,
            display_name: model.display_name,
            total_points: model.total_points,
            created_at: model.created_at.to_rfc3339(),
        }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(Users::find_by_id(id)
            .one(&self.db)
            .await?
            .map(Self::model_to_user))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(Users::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(Self::model_to_user))
    }

    /// Register an account under the identity provider's id
    pub async fn create_user(&self, user: User) -> Result<User> {
        let created_at = chrono::DateTime::parse_from_rfc3339(&user.created_at)
            .unwrap_or_else(|_| chrono::Utc::now().into());

        Users::insert(users::ActiveModel {
            id: Set(user.id),
            email: Set(user.email),
            display_name: Set(user.display_name),
            total_points: Set(user.total_points),
            created_at: Set(created_at),
            updated_at: Set(chrono::Utc::now().into()),
        })
        .exec_without_returning(&self.db)
        .await?;

        self.find_by_id(user.id)
            .await?
            .with_context(|| format!("User {} missing right after insert", user.id))
    }

    /// Create a zero-point profile for an identity seen for the first time.
    /// Existing users are left untouched. An email already held by another
    /// account is not stored; the profile gets a placeholder address instead.
    pub async fn ensure_user(&self, user_id: Uuid, email: Option<&str>) -> Result<()> {
        if self.find_by_id(user_id).await?.is_some() {
            return Ok(());
        }

        let placeholder = format!("{}@users.invalid", user_id);
        let display_name = email
            .unwrap_or(&placeholder)
            .split('@')
            .next()
            .unwrap_or_default()
            .to_string();
        let email = match email {
            Some(email) => match self.find_by_email(email).await? {
                Some(owner) => {
                    tracing::warn!(
                        "Email of user {} already belongs to user {}, using a placeholder",
                        user_id,
                        owner.id
                    );
                    placeholder
                }
                None => email.to_string(),
            },
            None => placeholder,
        };
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let inserted = Users::insert(users::ActiveModel {
            id: Set(user_id),
            email: Set(email),
            display_name: Set(display_name),
            total_points: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::column(users::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&self.db)
        .await
        .with_context(|| format!("Failed to provision user {}", user_id))?;

        if inserted > 0 {
            tracing::info!("Provisioned user {}", user_id);
        }
        Ok(())
    }

    /// Adds `delta` to the user's total in a single UPDATE so concurrent awards
    /// from other features are never lost. Returns false for an unknown user.
    pub async fn add_points(&self, user_id: Uuid, delta: i32) -> Result<bool> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = chrono::Utc::now().into();

        let result = Users::update_many()
            .col_expr(
                users::Column::TotalPoints,
                Expr::col(users::Column::TotalPoints).add(delta),
            )
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    /// Top `limit` users by total points. Equal totals share a rank (1, 2, 2, 4).
    pub async fn get_leaderboard(&self, limit: u64) -> Result<Vec<LeaderboardEntry>> {
        let models = Users::find()
            .order_by_desc(users::Column::TotalPoints)
            .order_by_asc(users::Column::DisplayName)
            .limit(limit)
            .all(&self.db)
            .await?;

        let mut leaderboard: Vec<LeaderboardEntry> = Vec::with_capacity(models.len());
        for (index, model) in models.into_iter().enumerate() {
            let rank = match leaderboard.last() {
                Some(prev) if prev.user.total_points == model.total_points => prev.rank,
                _ => index as u32 + 1,
            };
            leaderboard.push(LeaderboardEntry {
                user: Self::model_to_user(model),
                rank,
            });
        }

        Ok(leaderboard)
    }

    /// Rank as shown on the leaderboard: one more than the number of users strictly ahead
    pub async fn get_user_rank(&self, user_id: Uuid) -> Result<Option<u32>> {
        let Some(user) = Users::find_by_id(user_id).one(&self.db).await? else {
            return Ok(None);
        };

        let users_ahead = Users::find()
            .filter(users::Column::TotalPoints.gt(user.total_points))
            .count(&self.db)
            .await?;

        Ok(Some(users_ahead as u32 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect_to_memory_database;
    use migration::{Migrator, MigratorTrait};
    use uuid::Uuid;

    async fn setup_test_db() -> UserRepository {
        let db = connect_to_memory_database().await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        UserRepository::new(db)
    }

    fn create_test_user(name: &str, total_points: i32) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{}@campus.example", name.to_lowercase()),
            display_name: name.to_string(),
            total_points,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = setup_test_db().await;
        let user = create_test_user("Robin", 0);
        let user_id = user.id;

        let created_user = repo.create_user(user.clone()).await.unwrap();
        assert_eq!(created_user.email, user.email);
        assert_eq!(created_user.display_name, user.display_name);

        let found_user = repo.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(found_user.email, user.email);

        let found_by_email = repo.find_by_email(&user.email).await.unwrap().unwrap();
        assert_eq!(found_by_email.id, user_id);
    }

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let repo = setup_test_db().await;
        let user_id = Uuid::new_v4();

        repo.ensure_user(user_id, Some("mira@campus.example")).await.unwrap();
        assert!(repo.add_points(user_id, 7).await.unwrap());
        repo.ensure_user(user_id, Some("mira@campus.example")).await.unwrap();

        let user = repo.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.display_name, "mira");
        assert_eq!(user.total_points, 7);

        let anonymous = Uuid::new_v4();
        repo.ensure_user(anonymous, None).await.unwrap();
        let user = repo.find_by_id(anonymous).await.unwrap().unwrap();
        assert_eq!(user.email, format!("{}@users.invalid", anonymous));
    }

    #[tokio::test]
    async fn test_ensure_user_with_taken_email() {
        let repo = setup_test_db().await;
        let existing = repo.create_user(create_test_user("Sam", 40)).await.unwrap();

        let newcomer = Uuid::new_v4();
        repo.ensure_user(newcomer, Some("sam@campus.example"))
            .await
            .unwrap();

        let user = repo.find_by_id(newcomer).await.unwrap().unwrap();
        assert_eq!(user.email, format!("{}@users.invalid", newcomer));
        assert_eq!(user.display_name, "sam");
        assert_eq!(user.total_points, 0);
        assert!(repo.add_points(newcomer, 5).await.unwrap());

        // The original owner keeps the address and the points
        let owner = repo.find_by_email("sam@campus.example").await.unwrap().unwrap();
        assert_eq!(owner.id, existing.id);
        assert_eq!(owner.total_points, 40);
    }

    #[tokio::test]
    async fn test_add_points() {
        let repo = setup_test_db().await;
        let user = create_test_user("Sam", 10);
        let user_id = user.id;
        repo.create_user(user).await.unwrap();

        assert!(repo.add_points(user_id, 5).await.unwrap());
        assert!(repo.add_points(user_id, 9).await.unwrap());

        let updated_user = repo.find_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(updated_user.total_points, 24);
    }

    #[tokio::test]
    async fn test_add_points_unknown_user() {
        let repo = setup_test_db().await;
        assert!(!repo.add_points(Uuid::new_v4(), 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_leaderboard_shares_rank_on_ties() {
        let repo = setup_test_db().await;

        for (name, points) in [("Ada", 100), ("Bea", 200), ("Cal", 50), ("Dev", 100)] {
            repo.create_user(create_test_user(name, points)).await.unwrap();
        }

        let leaderboard = repo.get_leaderboard(10).await.unwrap();
        let rows: Vec<_> = leaderboard
            .iter()
            .map(|entry| (entry.user.display_name.as_str(), entry.user.total_points, entry.rank))
            .collect();
        assert_eq!(
            rows,
            vec![("Bea", 200, 1), ("Ada", 100, 2), ("Dev", 100, 2), ("Cal", 50, 4)]
        );

        let limited = repo.get_leaderboard(2).await.unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[tokio::test]
    async fn test_user_rank_matches_leaderboard() {
        let repo = setup_test_db().await;
        let high = create_test_user("High", 200);
        let tied_a = create_test_user("TiedA", 100);
        let tied_b = create_test_user("TiedB", 100);
        for user in [&high, &tied_a, &tied_b] {
            repo.create_user(user.clone()).await.unwrap();
        }

        assert_eq!(repo.get_user_rank(high.id).await.unwrap(), Some(1));
        assert_eq!(repo.get_user_rank(tied_a.id).await.unwrap(), Some(2));
        assert_eq!(repo.get_user_rank(tied_b.id).await.unwrap(), Some(2));
        assert_eq!(repo.get_user_rank(Uuid::new_v4()).await.unwrap(), None);
    }
}
