use std::collections::BTreeSet;

use sqlx::{Pool, Sqlite, SqliteConnection};

use crate::db::models::{Credentials, Role, User};
use crate::error::AppError;

pub struct UserRepository;

/// Fields of a user that does not exist yet.
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub email: &'a str,
    pub activation_code: Option<&'a str>,
    pub roles: &'a BTreeSet<Role>,
}

fn map_unique(err: sqlx::Error) -> AppError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => AppError::DuplicateUsername,
        _ => AppError::StorageUnavailable(err),
    }
}

impl UserRepository {
    pub async fn create(pool: &Pool<Sqlite>, new: NewUser<'_>) -> Result<User, AppError> {
        let created_at = chrono::Utc::now().timestamp();
        let mut tx = pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r#"
INSERT INTO users (username, password_hash, email, active, activation_code, created_at)
VALUES (?, ?, ?, 0, ?, ?)
RETURNING id
            "#,
        )
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.email)
        .bind(new.activation_code)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique)?;

        Self::replace_roles(&mut *tx, id, new.roles).await?;
        tx.commit().await?;

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| AppError::Internal("Failed to fetch created user".to_string()))
    }

    /// Persist every mutable column and the role set of `user`.
    pub async fn update(pool: &Pool<Sqlite>, user: &User) -> Result<(), AppError> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
UPDATE users
SET username = ?, password_hash = ?, email = ?, active = ?, activation_code = ?
WHERE id = ?
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .bind(user.active)
        .bind(&user.activation_code)
        .bind(user.id)
        .execute(&mut *tx)
        .await
        .map_err(map_unique)?;

        Self::replace_roles(&mut *tx, user.id, &user.roles).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn replace_roles(
        conn: &mut SqliteConnection,
        user_id: i64,
        roles: &BTreeSet<Role>,
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        for role in roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES (?, ?)")
                .bind(user_id)
                .bind(role.as_str())
                .execute(&mut *conn)
                .await?;
        }

        Ok(())
    }

    async fn with_roles(pool: &Pool<Sqlite>, user: Option<User>) -> Result<Option<User>, AppError> {
        match user {
            Some(mut user) => {
                user.roles = Self::roles_of(pool, user.id).await?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    pub async fn roles_of(pool: &Pool<Sqlite>, user_id: i64) -> Result<BTreeSet<Role>, AppError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT role FROM user_roles WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await?;

        Ok(names.iter().filter_map(|name| Role::parse(name)).collect())
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Self::with_roles(pool, user).await
    }

    pub async fn get_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Self::with_roles(pool, user).await
    }

    pub async fn get_by_activation_code(
        pool: &Pool<Sqlite>,
        code: &str,
    ) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE activation_code = ?")
            .bind(code)
            .fetch_optional(pool)
            .await?;

        Self::with_roles(pool, user).await
    }

    pub async fn list_all(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(pool)
            .await?;

        let mut loaded = Vec::with_capacity(users.len());
        for mut user in users {
            user.roles = Self::roles_of(pool, user.id).await?;
            loaded.push(user);
        }

        Ok(loaded)
    }

    /// Username-keyed credential lookup: `(username, password_hash, active)`.
    pub async fn credentials_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<Option<Credentials>, AppError> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, username, password_hash, active FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(pool)
        .await?;

        Ok(credentials)
    }

    /// Username-keyed authority lookup over the role-membership table.
    pub async fn authorities_by_username(
        pool: &Pool<Sqlite>,
        username: &str,
    ) -> Result<BTreeSet<Role>, AppError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
SELECT u.username, r.role
FROM users u
INNER JOIN user_roles r ON u.id = r.user_id
WHERE u.username = ?
            "#,
        )
        .bind(username)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().filter_map(|(_, role)| Role::parse(role)).collect())
    }
}
