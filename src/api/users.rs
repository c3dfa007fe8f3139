use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::db::{Role, User};
use crate::error::AppError;
use crate::service::{ChannelStats, Identity};

/// Public view of a user for follower lists.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEditResponse {
    pub user: User,
    pub all_roles: Vec<Role>,
}

#[derive(Debug, Deserialize)]
pub struct UserSaveRequest {
    pub user_id: i64,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    pub password: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FollowListResponse {
    pub channel: UserSummary,
    pub kind: &'static str,
    pub users: Vec<UserSummary>,
}

/// GET /user (admin)
pub async fn user_list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<User>>, AppError> {
    identity.require_admin()?;
    Ok(Json(state.registry.list_users().await?))
}

/// GET /user/{id} (admin)
pub async fn user_edit_form(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<i64>,
) -> Result<Json<UserEditResponse>, AppError> {
    identity.require_admin()?;
    let user = state.registry.require(id).await?;

    Ok(Json(UserEditResponse {
        user,
        all_roles: Role::ALL.to_vec(),
    }))
}

/// POST /user (admin)
pub async fn user_save(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UserSaveRequest>,
) -> Result<Json<User>, AppError> {
    identity.require_admin()?;
    let user = state.registry.require(req.user_id).await?;

    let updated = state
        .registry
        .set_roles_and_username(&user, &req.username, req.roles.iter().map(String::as_str))
        .await?;

    Ok(Json(updated))
}

/// GET /user/profile
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.registry.require(identity.user_id).await?;

    Ok(Json(ProfileResponse {
        username: user.username,
        email: user.email,
        active: user.active,
    }))
}

/// POST /user/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<ProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user = state.registry.require(identity.user_id).await?;

    let updated = state
        .registry
        .update_profile(&user, req.password.as_deref(), req.email.as_deref())
        .await?;

    Ok(Json(ProfileResponse {
        username: updated.username,
        email: updated.email,
        active: updated.active,
    }))
}

/// POST /user/subscribe/{id}
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(channel_id): Path<i64>,
) -> Result<Json<ChannelStats>, AppError> {
    let subscriber = state.registry.require(identity.user_id).await?;
    let channel = state.registry.require(channel_id).await?;

    state.registry.subscribe(&subscriber, &channel).await?;
    Ok(Json(state.registry.channel_stats(&channel, &subscriber).await?))
}

/// POST /user/unsubscribe/{id}
pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(channel_id): Path<i64>,
) -> Result<Json<ChannelStats>, AppError> {
    let subscriber = state.registry.require(identity.user_id).await?;
    let channel = state.registry.require(channel_id).await?;

    state.registry.unsubscribe(&subscriber, &channel).await?;
    Ok(Json(state.registry.channel_stats(&channel, &subscriber).await?))
}

/// GET /user/subscriptions/{id}/list
pub async fn subscriptions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<FollowListResponse>, AppError> {
    let user = state.registry.require(user_id).await?;
    let users = state.registry.subscriptions(&user).await?;

    Ok(Json(FollowListResponse {
        channel: user.into(),
        kind: "subscriptions",
        users: users.into_iter().map(UserSummary::from).collect(),
    }))
}

/// GET /user/subscribers/{id}/list
pub async fn subscribers(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<FollowListResponse>, AppError> {
    let user = state.registry.require(user_id).await?;
    let users = state.registry.subscribers(&user).await?;

    Ok(Json(FollowListResponse {
        channel: user.into(),
        kind: "subscribers",
        users: users.into_iter().map(UserSummary::from).collect(),
    }))
}

