use chrono::{Duration, Utc};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::crypto::generate_token;
use crate::db::models::Session;
use crate::error::AppError;

/// Bearer sessions. Timestamps are unix seconds; a session is live while
/// `expires_at` is in the future.
pub struct SessionRepository;

impl SessionRepository {
    pub async fn open(pool: &Pool<Sqlite>, user_id: i64, ttl: Duration) -> Result<Session, AppError> {
        let created_at = Utc::now().timestamp();

        let session = sqlx::query_as::<_, Session>(
            r#"
INSERT INTO sessions (id, user_id, token, expires_at, created_at)
VALUES (?, ?, ?, ?, ?)
RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(generate_token())
        .bind(created_at + ttl.num_seconds())
        .bind(created_at)
        .fetch_one(pool)
        .await?;

        Ok(session)
    }

    pub async fn find_live(pool: &Pool<Sqlite>, token: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(Utc::now().timestamp())
        .fetch_optional(pool)
        .await?;

        Ok(session)
    }

    /// Returns whether a session was closed.
    pub async fn close(pool: &Pool<Sqlite>, token: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Drop sessions that expired before now; returns how many went.
    pub async fn purge_expired(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
