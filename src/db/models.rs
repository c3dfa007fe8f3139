use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::User, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Exact, case-sensitive match on the stored role name.
    pub fn parse(s: &str) -> Option<Self> {
        Role::ALL.into_iter().find(|role| role.as_str() == s)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email: String,
    pub active: bool,
    #[serde(skip_serializing)]
    pub activation_code: Option<String>,
    pub created_at: i64,
    /// Loaded from `user_roles`.
    #[sqlx(skip)]
    pub roles: BTreeSet<Role>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

/// Row returned by the username-keyed credential lookup.
#[derive(Debug, Clone, FromRow)]
pub struct Credentials {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub active: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub token: String,
    pub expires_at: i64,
    pub created_at: i64,
}

/// A stored message. `id` is `None` until the first save.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<i64>,
    pub text: String,
    /// Empty when the message is untagged.
    pub tag: String,
    pub filename: Option<String>,
    pub author_id: i64,
}

impl Message {
    pub fn new(author_id: i64, text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: None,
            text: text.into(),
            tag: tag.into(),
            filename: None,
            author_id,
        }
    }
}

/// Listing row: a message joined with its author and like counters for the viewer.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessageView {
    pub id: i64,
    pub text: String,
    pub tag: String,
    pub filename: Option<String>,
    pub author_id: i64,
    pub author_name: String,
    pub likes: i64,
    pub me_liked: bool,
}
