use std::path::PathBuf;

use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub session_expiry_hours: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    /// Directory uploaded images are written to.
    pub upload_path: PathBuf,
    /// Scheme and host used when building activation links.
    pub activation_base_url: String,
    /// Mail relay endpoint; mail is only logged when unset.
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub password_pepper: Option<String>,
}

/// Read `key`, falling back to `default` when unset, and parse it.
fn parsed<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}

fn text(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and empty both mean "not configured".
fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: text("SERVER_HOST", "127.0.0.1"),
            server_port: parsed("SERVER_PORT", "8090")?,
            database_url: text("DATABASE_URL", "sqlite://sweeter.db?mode=rwc"),
            session_expiry_hours: parsed("SESSION_EXPIRY_HOURS", "24")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parsed("DB_MIN_CONNECTIONS", "5")?,
            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", "30")?,
            upload_path: text("UPLOAD_PATH", "./uploads").into(),
            activation_base_url: text("ACTIVATION_BASE_URL", "http://localhost:8090")
                .trim_end_matches('/')
                .to_string(),
            mail_relay_url: optional("MAIL_RELAY_URL"),
            mail_from: text("MAIL_FROM", "noreply@sweeter.local"),
            password_pepper: optional("PASSWORD_PEPPER"),
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 8090,
            database_url: "sqlite::memory:".to_string(),
            session_expiry_hours: 24,
            db_max_connections: 1,
            db_min_connections: 1,
            request_timeout_secs: 30,
            upload_path: PathBuf::from("./uploads"),
            activation_base_url: "http://localhost:8090".to_string(),
            mail_relay_url: None,
            mail_from: "noreply@sweeter.local".to_string(),
            password_pepper: None,
        }
    }
}
