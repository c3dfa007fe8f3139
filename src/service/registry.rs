use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use sqlx::{Pool, Sqlite};

use crate::crypto::{generate_token, PasswordHasher};
use crate::db::{NewUser, Role, SubscriptionRepository, User, UserRepository};
use crate::error::{AppError, ValidationErrors};
use crate::service::notify::NotificationDispatcher;
use crate::service::validate;

/// Follower counters for a user's channel page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub subscribers_count: i64,
    pub subscriptions_count: i64,
    pub is_subscriber: bool,
}

/// Owns users, their roles, activation codes and subscription edges.
#[derive(Clone)]
pub struct AccountRegistry {
    db: Pool<Sqlite>,
    hasher: Arc<dyn PasswordHasher>,
    notifier: NotificationDispatcher,
}

impl AccountRegistry {
    pub fn new(
        db: Pool<Sqlite>,
        hasher: Arc<dyn PasswordHasher>,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self { db, hasher, notifier }
    }

    /// Field checks applied by [`register`](Self::register).
    pub fn validate_registration(username: &str, password: &str, email: &str) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        validate::username(&mut errors, username);
        validate::password(&mut errors, password);
        validate::optional_email(&mut errors, email);
        errors
    }

    /// Create an inactive `USER` with a fresh activation code and mail the
    /// activation link when an email was given. Mail failures do not fail
    /// registration.
    pub async fn register(
        &self,
        username: &str,
        raw_password: &str,
        email: &str,
    ) -> Result<User, AppError> {
        Self::validate_registration(username, raw_password, email).into_result()?;

        let username = username.trim();
        let email = email.trim();

        if UserRepository::get_by_username(&self.db, username).await?.is_some() {
            return Err(AppError::DuplicateUsername);
        }

        let password_hash = self.hasher.hash(raw_password)?;
        let activation_code = generate_token();
        let roles = BTreeSet::from([Role::User]);

        let user = UserRepository::create(
            &self.db,
            NewUser {
                username,
                password_hash: &password_hash,
                email,
                activation_code: Some(&activation_code),
                roles: &roles,
            },
        )
        .await?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");

        self.notifier.send_activation(&user).await;

        Ok(user)
    }

    /// Redeem an activation code. Codes are single use.
    pub async fn activate(&self, code: &str) -> Result<bool, AppError> {
        if code.trim().is_empty() {
            return Ok(false);
        }

        let mut user = match UserRepository::get_by_activation_code(&self.db, code).await? {
            Some(user) => user,
            None => return Ok(false),
        };

        user.activation_code = None;
        user.active = true;
        UserRepository::update(&self.db, &user).await?;

        tracing::info!(user_id = user.id, "User activated");
        Ok(true)
    }

    /// Change password and/or email of `user`.
    ///
    /// A changed, non-blank email gets a new activation code and mail while
    /// `active` is left untouched. A non-blank password is always hashed.
    pub async fn update_profile(
        &self,
        user: &User,
        new_password: Option<&str>,
        new_email: Option<&str>,
    ) -> Result<User, AppError> {
        let mut errors = ValidationErrors::new();
        if let Some(email) = new_email {
            validate::optional_email(&mut errors, email);
        }
        errors.into_result()?;

        let mut updated = user.clone();

        let email_changed = match new_email.map(str::trim) {
            Some(email) if email != updated.email => {
                updated.email = email.to_string();
                if !email.is_empty() {
                    updated.activation_code = Some(generate_token());
                }
                true
            }
            _ => false,
        };

        if let Some(password) = new_password.filter(|p| !p.trim().is_empty()) {
            updated.password_hash = self.hasher.hash(password)?;
        }

        UserRepository::update(&self.db, &updated).await?;

        tracing::info!(user_id = updated.id, email_changed, "Profile updated");

        if email_changed {
            self.notifier.send_activation(&updated).await;
        }

        Ok(updated)
    }

    /// Admin edit: rename `user` and replace its roles with the known role
    /// names found in `selected_role_names`.
    pub async fn set_roles_and_username<'a, I>(
        &self,
        user: &User,
        new_username: &str,
        selected_role_names: I,
    ) -> Result<User, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let roles: BTreeSet<Role> = selected_role_names.into_iter().filter_map(Role::parse).collect();

        let mut errors = ValidationErrors::new();
        validate::username(&mut errors, new_username);
        if roles.is_empty() {
            errors.add("roles", "At least one role must be selected");
        }
        errors.into_result()?;

        let new_username = new_username.trim();
        if let Some(owner) = UserRepository::get_by_username(&self.db, new_username).await? {
            if owner.id != user.id {
                return Err(AppError::DuplicateUsername);
            }
        }

        let mut updated = user.clone();
        updated.username = new_username.to_string();
        updated.roles = roles;
        UserRepository::update(&self.db, &updated).await?;

        tracing::info!(user_id = updated.id, roles = ?updated.roles, "User roles updated");
        Ok(updated)
    }

    pub async fn subscribe(&self, subscriber: &User, channel: &User) -> Result<(), AppError> {
        SubscriptionRepository::add(&self.db, subscriber.id, channel.id).await?;
        tracing::debug!(subscriber = subscriber.id, channel = channel.id, "Subscribed");
        Ok(())
    }

    pub async fn unsubscribe(&self, subscriber: &User, channel: &User) -> Result<(), AppError> {
        SubscriptionRepository::remove(&self.db, subscriber.id, channel.id).await?;
        tracing::debug!(subscriber = subscriber.id, channel = channel.id, "Unsubscribed");
        Ok(())
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        UserRepository::get_by_id(&self.db, id).await
    }

    /// Like [`find_by_id`](Self::find_by_id) but a missing user is `NotFound`.
    pub async fn require(&self, id: i64) -> Result<User, AppError> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", id)))
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        UserRepository::get_by_username(&self.db, username).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        UserRepository::list_all(&self.db).await
    }

    pub async fn subscribers(&self, channel: &User) -> Result<Vec<User>, AppError> {
        SubscriptionRepository::subscribers_of(&self.db, channel.id).await
    }

    pub async fn subscriptions(&self, subscriber: &User) -> Result<Vec<User>, AppError> {
        SubscriptionRepository::subscriptions_of(&self.db, subscriber.id).await
    }

    pub async fn channel_stats(&self, channel: &User, viewer: &User) -> Result<ChannelStats, AppError> {
        Ok(ChannelStats {
            subscribers_count: SubscriptionRepository::count_subscribers(&self.db, channel.id).await?,
            subscriptions_count: SubscriptionRepository::count_subscriptions(&self.db, channel.id).await?,
            is_subscriber: SubscriptionRepository::exists(&self.db, viewer.id, channel.id).await?,
        })
    }
}
