use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("argon2 hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
    #[error("password worker panicked: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Rules shared by signup and password change.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password != confirmation {
        return Err(AppError::Validation(
            "Password and confirmation password do not match".into(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// PHC-encoded argon2id hash with a fresh salt.
pub fn hash(plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            error!(error = %e, "argon2 hash error");
            PasswordError::Hash(e.to_string())
        })
}

pub fn matches(plain: &str, stored: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored hash did not parse");
        PasswordError::MalformedHash(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// [`hash`] on the blocking pool.
pub async fn hash_blocking(plain: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash(&plain)).await?
}

pub async fn matches_blocking(plain: String, stored: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || matches(&plain, &stored)).await?
}
