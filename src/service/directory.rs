use sqlx::{Pool, Sqlite};

use crate::db::{Message, MessageFilter, MessageRepository, MessageView, Page, PageRequest};
use crate::error::{AppError, ValidationErrors};
use crate::service::gateway::Identity;
use crate::service::validate;

/// Partial edit of a message. Empty or missing fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct MessageUpdate<'a> {
    pub text: Option<&'a str>,
    pub tag: Option<&'a str>,
    pub filename: Option<&'a str>,
}

/// Message storage and feed queries.
///
/// Listings are ordered by an explicit key; SQLite gives no order
/// otherwise, so `id` (creation order) is the default.
#[derive(Clone)]
pub struct MessageDirectory {
    db: Pool<Sqlite>,
}

impl MessageDirectory {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    pub fn validate(text: &str, tag: &str) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validate::message_text(&mut errors, text);
        validate::tag(&mut errors, tag);
        errors
    }

    /// Checks for the fields of `changes` that an update would apply.
    /// Blank fields are skipped since they leave the message unchanged.
    pub fn validate_update(changes: &MessageUpdate<'_>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if let Some(text) = changes.text.filter(|t| !t.trim().is_empty()) {
            validate::message_text(&mut errors, text);
        }
        if let Some(tag) = changes.tag.filter(|t| !t.trim().is_empty()) {
            validate::tag(&mut errors, tag);
        }
        errors
    }

    /// Validate and store a new message by `author`.
    pub async fn create(
        &self,
        author: &Identity,
        text: &str,
        tag: &str,
        filename: Option<String>,
    ) -> Result<Message, AppError> {
        Self::validate(text, tag).into_result()?;

        let mut message = Message::new(author.user_id, text, tag.trim());
        message.filename = filename;
        self.save(&mut message).await?;

        tracing::info!(message_id = ?message.id, author = author.user_id, "Message posted");
        Ok(message)
    }

    /// Insert or update by id. Inserts assign `message.id`.
    pub async fn save(&self, message: &mut Message) -> Result<i64, AppError> {
        MessageRepository::save(&self.db, message).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Message>, AppError> {
        MessageRepository::get_by_id(&self.db, id).await
    }

    pub async fn view(&self, id: i64, viewer: &Identity) -> Result<MessageView, AppError> {
        MessageRepository::get_view(&self.db, id, viewer.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {}", id)))
    }

    /// Global feed, optionally narrowed to an exact tag.
    pub async fn list(
        &self,
        request: &PageRequest,
        filter_tag: &str,
        viewer: &Identity,
    ) -> Result<Page<MessageView>, AppError> {
        let filter = MessageFilter {
            tag: filter_tag.trim(),
            author_id: None,
        };
        MessageRepository::page(&self.db, request, &filter, viewer.user_id).await
    }

    /// Feed of a single author.
    pub async fn list_for_author(
        &self,
        request: &PageRequest,
        author_id: i64,
        viewer: &Identity,
    ) -> Result<Page<MessageView>, AppError> {
        let filter = MessageFilter {
            tag: "",
            author_id: Some(author_id),
        };
        MessageRepository::page(&self.db, request, &filter, viewer.user_id).await
    }

    /// The message, provided `requester` wrote it.
    pub async fn require_author(&self, requester: &Identity, message_id: i64) -> Result<Message, AppError> {
        let message = self
            .get(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {}", message_id)))?;

        if message.author_id != requester.user_id {
            tracing::warn!(message_id, requester = requester.user_id, "Edit by non-author refused");
            return Err(AppError::NotAuthor);
        }

        Ok(message)
    }

    /// Apply `changes` to a message owned by `requester`.
    pub async fn update(
        &self,
        requester: &Identity,
        message_id: i64,
        changes: MessageUpdate<'_>,
    ) -> Result<Message, AppError> {
        let mut message = self.require_author(requester, message_id).await?;

        let text = changes.text.filter(|t| !t.trim().is_empty());
        let tag = changes.tag.filter(|t| !t.trim().is_empty());
        Self::validate_update(&changes).into_result()?;

        if let Some(text) = text {
            message.text = text.to_string();
        }
        if let Some(tag) = tag {
            message.tag = tag.trim().to_string();
        }
        if let Some(filename) = changes.filename.filter(|f| !f.is_empty()) {
            message.filename = Some(filename.to_string());
        }

        self.save(&mut message).await?;
        Ok(message)
    }

    /// Like or unlike; returns whether the viewer now likes the message.
    pub async fn toggle_like(&self, viewer: &Identity, message_id: i64) -> Result<bool, AppError> {
        if self.get(message_id).await?.is_none() {
            return Err(AppError::NotFound(format!("message {}", message_id)));
        }
        MessageRepository::toggle_like(&self.db, message_id, viewer.user_id).await
    }
}
