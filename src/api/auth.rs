use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::bearer_token;
use crate::api::state::AppState;
use crate::db::Role;
use crate::error::AppError;
use crate::service::AccountRegistry;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    /// Password confirmation
    pub password2: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: i64,
    pub username: String,
    pub roles: Vec<Role>,
}

/// GET /
pub async fn greeting() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Hello, this is Sweeter" }))
}

/// POST /registration
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let mut errors = AccountRegistry::validate_registration(&req.username, &req.password, &req.email);
    if req.password2.trim().is_empty() {
        errors.add("password2", "Password confirmation can't be empty");
    } else if req.password != req.password2 {
        errors.add("password2", "Passwords are different");
    }
    errors.into_result()?;

    let user = state
        .registry
        .register(&req.username, &req.password, &req.email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            username: user.username,
            active: user.active,
        }),
    ))
}

/// GET /activate/{code}
pub async fn activate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.registry.activate(&code).await? {
        return Err(AppError::InvalidActivationCode);
    }

    Ok(Json(serde_json::json!({ "message": "User successfully activated" })))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let (identity, session) = state.gateway.login(&req.username, &req.password).await?;

    Ok(Json(LoginResponse {
        session_token: session.token,
        expires_at: session.expires_at,
        username: identity.username,
        roles: identity.authorities.into_iter().collect(),
    }))
}

/// POST /logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(token) = bearer_token(&headers) {
        state.gateway.logout(token).await?;
    }

    Ok(Json(serde_json::json!({ "success": true })))
}
