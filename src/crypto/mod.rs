pub mod password;

pub use password::{generate_salt, Argon2Hasher, PasswordHasher};

/// Opaque single-use token for activation codes and session tokens.
pub fn generate_token() -> String {
    uuid::Uuid::new_v4().to_string()
}
