use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Field-to-message map of input problems.
///
/// Validation runs over every field before failing so the caller gets the
/// whole picture in one response.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem for `field`. The first message per field wins.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(())` when nothing was recorded, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("User with this name already exists")]
    DuplicateUsername,

    #[error("User not found")]
    UnknownUser,

    #[error("Bad credentials")]
    BadCredentials,

    #[error("Account is not activated")]
    InactiveAccount,

    #[error("Only the author can change this message")]
    NotAuthor,

    #[error("Activation code is not found")]
    InvalidActivationCode,

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Access denied")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    #[error("Cryptography error: {0}")]
    Crypto(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, message);
        AppError::Validation(errors)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration failed: {}", err))
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AppError::DuplicateUsername => StatusCode::CONFLICT,
            // Same status for both so usernames cannot be probed.
            AppError::UnknownUser | AppError::BadCredentials => StatusCode::UNAUTHORIZED,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::InactiveAccount | AppError::NotAuthor | AppError::Forbidden => {
                StatusCode::FORBIDDEN
            }
            AppError::InvalidActivationCode | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Crypto(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = match self {
            AppError::Validation(errors) => serde_json::json!({ "errors": errors }),
            AppError::UnknownUser | AppError::BadCredentials => {
                tracing::warn!("Rejected login attempt");
                serde_json::json!({ "error": "Invalid credentials" })
            }
            AppError::StorageUnavailable(err) => {
                tracing::error!(error = %err, "Database error");
                serde_json::json!({ "error": "Storage unavailable" })
            }
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "Request failed");
                }
                serde_json::json!({ "error": other.to_string() })
            }
        };

        (status, axum::Json(body)).into_response()
    }
}
