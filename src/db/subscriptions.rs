use sqlx::{Pool, Sqlite};

use crate::db::models::User;
use crate::db::users::UserRepository;
use crate::error::AppError;

/// Directed `subscriber -> channel` edges.
pub struct SubscriptionRepository;

impl SubscriptionRepository {
    pub async fn add(pool: &Pool<Sqlite>, subscriber_id: i64, channel_id: i64) -> Result<(), AppError> {
        sqlx::query("INSERT OR IGNORE INTO subscriptions (subscriber_id, channel_id) VALUES (?, ?)")
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn remove(pool: &Pool<Sqlite>, subscriber_id: i64, channel_id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?")
            .bind(subscriber_id)
            .bind(channel_id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn exists(pool: &Pool<Sqlite>, subscriber_id: i64, channel_id: i64) -> Result<bool, AppError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE subscriber_id = ? AND channel_id = ?)",
        )
        .bind(subscriber_id)
        .bind(channel_id)
        .fetch_one(pool)
        .await?;

        Ok(found)
    }

    pub async fn count_subscribers(pool: &Pool<Sqlite>, channel_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE channel_id = ?")
            .bind(channel_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    pub async fn count_subscriptions(pool: &Pool<Sqlite>, subscriber_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE subscriber_id = ?")
            .bind(subscriber_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Users following `channel_id`.
    pub async fn subscribers_of(pool: &Pool<Sqlite>, channel_id: i64) -> Result<Vec<User>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT subscriber_id FROM subscriptions WHERE channel_id = ? ORDER BY subscriber_id",
        )
        .bind(channel_id)
        .fetch_all(pool)
        .await?;

        Self::load_users(pool, ids).await
    }

    /// Channels `subscriber_id` follows.
    pub async fn subscriptions_of(pool: &Pool<Sqlite>, subscriber_id: i64) -> Result<Vec<User>, AppError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT channel_id FROM subscriptions WHERE subscriber_id = ? ORDER BY channel_id",
        )
        .bind(subscriber_id)
        .fetch_all(pool)
        .await?;

        Self::load_users(pool, ids).await
    }

    async fn load_users(pool: &Pool<Sqlite>, ids: Vec<i64>) -> Result<Vec<User>, AppError> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = UserRepository::get_by_id(pool, id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }
}
