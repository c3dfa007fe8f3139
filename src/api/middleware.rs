use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::api::state::AppState;

/// Bearer token from the `Authorization` header, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware - resolves the session behind the bearer token
/// and applies the route access policy before any handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, crate::error::AppError> {
    let identity = match bearer_token(request.headers()) {
        Some(token) => state.gateway.resolve(token).await?,
        None => None,
    };

    let path = request.uri().path().to_string();
    if let Err(e) = state.gateway.authorize(&path, identity.as_ref()) {
        tracing::debug!(path = %path, error = %e, "Request rejected");
        return Err(e);
    }

    // Handlers read the acting identity from extensions
    if let Some(identity) = identity {
        request.extensions_mut().insert(identity);
    }

    Ok(next.run(request).await)
}
