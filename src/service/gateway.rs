use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::crypto::PasswordHasher;
use crate::db::{Role, Session, SessionRepository, User, UserRepository};
use crate::error::AppError;

/// Paths reachable without a session.
const PUBLIC_PATHS: &[&str] = &["/", "/registration", "/login", "/logout", "/api/health"];
const PUBLIC_PREFIXES: &[&str] = &["/activate/"];

pub fn is_public(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Who is acting, and with which authorities. Passed explicitly into every
/// operation that depends on the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub authorities: BTreeSet<Role>,
    pub enabled: bool,
}

impl Identity {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            authorities: user.roles.clone(),
            enabled: user.active,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.authorities.contains(&Role::Admin)
    }

    pub fn require_enabled(&self) -> Result<(), AppError> {
        if self.enabled {
            Ok(())
        } else {
            Err(AppError::InactiveAccount)
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Verifies credentials, issues and resolves sessions, and decides whether
/// a request may reach its handler.
#[derive(Clone)]
pub struct AuthenticationGateway {
    db: Pool<Sqlite>,
    hasher: Arc<dyn PasswordHasher>,
    session_expiry_hours: i64,
}

impl AuthenticationGateway {
    pub fn new(db: Pool<Sqlite>, hasher: Arc<dyn PasswordHasher>, session_expiry_hours: i64) -> Self {
        Self {
            db,
            hasher,
            session_expiry_hours,
        }
    }

    /// Check a username/password pair. An inactive account still
    /// authenticates; see [`Identity::require_enabled`].
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AppError> {
        let credentials = UserRepository::credentials_by_username(&self.db, username.trim())
            .await?
            .ok_or(AppError::UnknownUser)?;

        if !self.hasher.verify(password, &credentials.password_hash) {
            return Err(AppError::BadCredentials);
        }

        let authorities = UserRepository::authorities_by_username(&self.db, &credentials.username).await?;

        Ok(Identity {
            user_id: credentials.id,
            username: credentials.username,
            authorities,
            enabled: credentials.active,
        })
    }

    /// Authenticate, apply the enabled gate and open a session.
    pub async fn login(&self, username: &str, password: &str) -> Result<(Identity, Session), AppError> {
        let identity = match self.authenticate(username, password).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "Login rejected");
                return Err(e);
            }
        };
        identity.require_enabled()?;

        let ttl = Duration::hours(self.session_expiry_hours);
        let session = SessionRepository::open(&self.db, identity.user_id, ttl).await?;
        tracing::info!(user_id = identity.user_id, "Session opened");

        Ok((identity, session))
    }

    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        SessionRepository::close(&self.db, token).await?;
        Ok(())
    }

    /// Identity behind a bearer token, with authorities read fresh from the
    /// store. `None` for unknown or expired tokens.
    pub async fn resolve(&self, token: &str) -> Result<Option<Identity>, AppError> {
        let session = match SessionRepository::find_live(&self.db, token).await? {
            Some(session) => session,
            None => return Ok(None),
        };

        let user = UserRepository::get_by_id(&self.db, session.user_id).await?;
        Ok(user.as_ref().map(Identity::from_user))
    }

    /// Route access decision for `path` given the resolved identity, if any.
    pub fn authorize(&self, path: &str, identity: Option<&Identity>) -> Result<(), AppError> {
        if is_public(path) {
            return Ok(());
        }
        match identity {
            Some(identity) => identity.require_enabled(),
            None => Err(AppError::Unauthenticated("Login required".to_string())),
        }
    }
}
