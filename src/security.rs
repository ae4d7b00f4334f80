//! Password hashing for stored credentials.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::rngs::OsRng;

/// Shortest plaintext password accepted, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(thiserror::Error, Debug)]
pub enum SecurityError {
    #[error("password must have at least {0} characters")]
    PasswordTooShort(usize),
    #[error("argon2 error: {0}")]
    Argon2(String),
}

/// Output of [`hash_password`], ready to store on a user record.
#[derive(Debug, Clone)]
pub struct HashedPassword {
    /// Argon2id hash in PHC string format.
    pub hash: String,
    /// Random salt the hash was derived with.
    pub salt: String,
}

/// Hash a plaintext password with a fresh random salt.
pub fn hash_password(plaintext: &str) -> Result<HashedPassword, SecurityError> {
    if plaintext.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(SecurityError::PasswordTooShort(MIN_PASSWORD_LENGTH));
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| SecurityError::Argon2(e.to_string()))?
        .to_string();

    Ok(HashedPassword {
        hash,
        salt: salt.as_str().to_string(),
    })
}

/// Check a plaintext password against a stored PHC hash.
/// A malformed hash never verifies.
pub fn verify_password(plaintext: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
