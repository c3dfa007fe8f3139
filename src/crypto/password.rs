use argon2::password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::Rng;

use crate::error::AppError;

/// One-way credential transform used for every password-setting path.
pub trait PasswordHasher: Send + Sync {
    /// Produce the storable form of `raw`. Never returns `raw` itself.
    fn hash(&self, raw: &str) -> Result<String, AppError>;

    /// True exactly when `raw` is the password `stored` was produced from.
    fn verify(&self, raw: &str, stored: &str) -> bool;
}

/// Generate a cryptographically secure random salt
pub fn generate_salt() -> [u8; 16] {
    rand::thread_rng().gen()
}

/// Argon2id with a per-hash random salt, stored as a PHC string.
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    pepper: Option<Vec<u8>>,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Application-wide secret appended to every password before hashing.
    pub fn with_pepper(pepper: impl Into<Vec<u8>>) -> Self {
        Self {
            pepper: Some(pepper.into()),
        }
    }

    fn peppered(&self, raw: &str) -> Vec<u8> {
        let mut bytes = raw.as_bytes().to_vec();
        if let Some(pepper) = &self.pepper {
            bytes.extend_from_slice(pepper);
        }
        bytes
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, raw: &str) -> Result<String, AppError> {
        let salt = SaltString::encode_b64(&generate_salt())
            .map_err(|e| AppError::Crypto(format!("Salt encoding failed: {}", e)))?;

        let hash = Argon2::default()
            .hash_password(&self.peppered(raw), &salt)
            .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))?;

        Ok(hash.to_string())
    }

    fn verify(&self, raw: &str, stored: &str) -> bool {
        let parsed = match PasswordHash::new(stored) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        // argon2 compares digests in constant time
        Argon2::default()
            .verify_password(&self.peppered(raw), &parsed)
            .is_ok()
    }
}
