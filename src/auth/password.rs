//! Argon2id password hashes in PHC string format, and opaque random tokens.

use crate::error::AppError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use sha2::{Digest, Sha256};

const PHC_PREFIX: &str = "$argon2";

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// `$argon2id$v=19$m=...,t=...,p=...$<salt>$<hash>` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))
}

/// Whether `stored` is already a PHC-encoded Argon2 hash.
pub fn is_password_hash(stored: &str) -> bool {
    stored.starts_with(PHC_PREFIX) && PasswordHash::new(stored).is_ok()
}

/// Parameters come from the stored string; anything unparsable never verifies.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// 64 hex characters from two v4 UUIDs.
pub fn random_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Unsalted digest for single-use tokens stored server side (password reset).
pub fn hash_token(token: &str) -> String {
    hex(&Sha256::digest(token.as_bytes()))
}
