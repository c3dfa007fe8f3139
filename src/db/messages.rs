use sqlx::{Pool, Sqlite};

use crate::db::models::{Message, MessageView};
use crate::db::page::{Page, PageRequest};
use crate::error::AppError;

/// Narrows a listing. Empty tag and `None` author mean "everything".
#[derive(Debug, Clone, Default)]
pub struct MessageFilter<'a> {
    pub tag: &'a str,
    pub author_id: Option<i64>,
}

pub struct MessageRepository;

impl MessageRepository {
    /// Insert when `message.id` is `None`, otherwise upsert by primary key.
    /// Returns the id and writes it back into `message`.
    pub async fn save(pool: &Pool<Sqlite>, message: &mut Message) -> Result<i64, AppError> {
        let id: i64 = match message.id {
            None => {
                sqlx::query_scalar(
                    r#"
INSERT INTO messages (text, tag, filename, author_id)
VALUES (?, ?, ?, ?)
RETURNING id
                    "#,
                )
                .bind(&message.text)
                .bind(&message.tag)
                .bind(&message.filename)
                .bind(message.author_id)
                .fetch_one(pool)
                .await?
            }
            Some(id) => {
                sqlx::query_scalar(
                    r#"
INSERT INTO messages (id, text, tag, filename, author_id)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
    text = excluded.text,
    tag = excluded.tag,
    filename = excluded.filename,
    author_id = excluded.author_id
RETURNING id
                    "#,
                )
                .bind(id)
                .bind(&message.text)
                .bind(&message.tag)
                .bind(&message.filename)
                .bind(message.author_id)
                .fetch_one(pool)
                .await?
            }
        };

        message.id = Some(id);
        Ok(id)
    }

    pub async fn get_by_id(pool: &Pool<Sqlite>, id: i64) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            "SELECT id, text, tag, filename, author_id FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(message)
    }

    pub async fn get_view(
        pool: &Pool<Sqlite>,
        id: i64,
        viewer_id: i64,
    ) -> Result<Option<MessageView>, AppError> {
        let view = sqlx::query_as::<_, MessageView>(
            r#"
SELECT m.id, m.text, m.tag, m.filename, m.author_id, u.username AS author_name,
       (SELECT COUNT(*) FROM message_likes l WHERE l.message_id = m.id) AS likes,
       EXISTS(SELECT 1 FROM message_likes l WHERE l.message_id = m.id AND l.user_id = ?) AS me_liked
FROM messages m
JOIN users u ON m.author_id = u.id
WHERE m.id = ?
            "#,
        )
        .bind(viewer_id)
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(view)
    }

    pub async fn page(
        pool: &Pool<Sqlite>,
        request: &PageRequest,
        filter: &MessageFilter<'_>,
        viewer_id: i64,
    ) -> Result<Page<MessageView>, AppError> {
        let total: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(*)
FROM messages m
WHERE (? = '' OR m.tag = ?)
  AND (? IS NULL OR m.author_id = ?)
            "#,
        )
        .bind(filter.tag)
        .bind(filter.tag)
        .bind(filter.author_id)
        .bind(filter.author_id)
        .fetch_one(pool)
        .await?;

        let sql = format!(
            r#"
SELECT m.id, m.text, m.tag, m.filename, m.author_id, u.username AS author_name,
       (SELECT COUNT(*) FROM message_likes l WHERE l.message_id = m.id) AS likes,
       EXISTS(SELECT 1 FROM message_likes l WHERE l.message_id = m.id AND l.user_id = ?) AS me_liked
FROM messages m
JOIN users u ON m.author_id = u.id
WHERE (? = '' OR m.tag = ?)
  AND (? IS NULL OR m.author_id = ?)
{}
LIMIT ? OFFSET ?
            "#,
            request.order_clause()
        );

        let content = sqlx::query_as::<_, MessageView>(&sql)
            .bind(viewer_id)
            .bind(filter.tag)
            .bind(filter.tag)
            .bind(filter.author_id)
            .bind(filter.author_id)
            .bind(request.size)
            .bind(request.offset())
            .fetch_all(pool)
            .await?;

        Ok(Page::new(content, request, total))
    }

    /// Flip the viewer's like on a message; returns whether it is now liked.
    pub async fn toggle_like(
        pool: &Pool<Sqlite>,
        message_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let removed = sqlx::query("DELETE FROM message_likes WHERE message_id = ? AND user_id = ?")
            .bind(message_id)
            .bind(user_id)
            .execute(pool)
            .await?
            .rows_affected();

        if removed > 0 {
            return Ok(false);
        }

        sqlx::query("INSERT OR IGNORE INTO message_likes (message_id, user_id) VALUES (?, ?)")
            .bind(message_id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(true)
    }
}
