use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::db::{Message, MessageView, Page, PageRequest, SortDir, SortKey, DEFAULT_PAGE_SIZE};
use crate::error::AppError;
use crate::service::{ChannelStats, Identity, MessageDirectory, MessageUpdate};

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_size")]
    pub size: i64,
    #[serde(default)]
    pub sort: SortKey,
    #[serde(default)]
    pub dir: SortDir,
}

fn default_size() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl FeedQuery {
    fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size).sorted(self.sort, self.dir)
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub filter: String,
    pub page: Page<MessageView>,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub channel_id: i64,
    pub channel_name: String,
    pub stats: ChannelStats,
    pub is_current_user: bool,
    pub page: Page<MessageView>,
}

/// Fields of the multipart message form.
#[derive(Debug, Default)]
struct MessageForm {
    id: Option<String>,
    text: String,
    tag: String,
    file: Option<(String, Vec<u8>)>,
}

async fn read_form(mut multipart: Multipart) -> Result<MessageForm, AppError> {
    let mut form = MessageForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::invalid("form", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::invalid("file", e.body_text()))?;
                // Browsers send an empty part when no file was chosen
                if !filename.trim().is_empty() && !data.is_empty() {
                    form.file = Some((filename, data.to_vec()));
                }
            }
            "id" | "text" | "tag" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::invalid(&name, e.body_text()))?;
                match name.as_str() {
                    "id" => form.id = Some(value),
                    "text" => form.text = value,
                    _ => form.tag = value,
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Store the attachment, if any, and return its stored name.
async fn store_attachment(state: &AppState, form: &MessageForm) -> Result<Option<String>, AppError> {
    match &form.file {
        Some((name, bytes)) => Ok(Some(state.files.store(bytes, name).await?)),
        None => Ok(None),
    }
}

/// GET /main
pub async fn feed(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let page = state
        .directory
        .list(&query.page_request(), &query.filter, &identity)
        .await?;

    Ok(Json(FeedResponse {
        filter: query.filter,
        page,
    }))
}

/// POST /main (multipart: text, tag, file)
pub async fn add_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let form = read_form(multipart).await?;

    // Nothing touches the disk until the form is known to be valid
    MessageDirectory::validate(&form.text, &form.tag).into_result()?;
    let filename = store_attachment(&state, &form).await?;

    let created = state
        .directory
        .create(&identity, &form.text, &form.tag, filename.clone())
        .await;

    let message = match created {
        Ok(message) => message,
        Err(e) => {
            if let Some(name) = &filename {
                state.files.discard(name).await;
            }
            return Err(e);
        }
    };

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /messages/{id}
pub async fn get_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<MessageView>, AppError> {
    Ok(Json(state.directory.view(id, &identity).await?))
}

/// POST /messages/{id}/like
pub async fn like(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let liked = state.directory.toggle_like(&identity, id).await?;
    Ok(Json(serde_json::json!({ "liked": liked })))
}

/// GET /user-messages/{author}
pub async fn user_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(author_id): Path<i64>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<ChannelResponse>, AppError> {
    let author = state.registry.require(author_id).await?;
    let viewer = state.registry.require(identity.user_id).await?;

    let page = state
        .directory
        .list_for_author(&query.page_request(), author.id, &identity)
        .await?;
    let stats = state.registry.channel_stats(&author, &viewer).await?;

    Ok(Json(ChannelResponse {
        channel_id: author.id,
        is_current_user: author.id == viewer.id,
        channel_name: author.username,
        stats,
        page,
    }))
}

/// POST /user-messages/{author} (multipart: id, text, tag, file)
pub async fn update_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(_author_id): Path<i64>,
    multipart: Multipart,
) -> Result<Json<Message>, AppError> {
    let form = read_form(multipart).await?;
    let message_id: i64 = form
        .id
        .as_deref()
        .and_then(|id| id.trim().parse().ok())
        .ok_or_else(|| AppError::invalid("id", "Message id is missing"))?;

    // Refuse before storing anything on disk
    state.directory.require_author(&identity, message_id).await?;
    let changes = MessageUpdate {
        text: Some(&form.text),
        tag: Some(&form.tag),
        filename: None,
    };
    MessageDirectory::validate_update(&changes).into_result()?;

    let filename = store_attachment(&state, &form).await?;
    let updated = state
        .directory
        .update(
            &identity,
            message_id,
            MessageUpdate {
                filename: filename.as_deref(),
                ..changes
            },
        )
        .await;

    let message = match updated {
        Ok(message) => message,
        Err(e) => {
            if let Some(name) = &filename {
                state.files.discard(name).await;
            }
            return Err(e);
        }
    };

    Ok(Json(message))
}
