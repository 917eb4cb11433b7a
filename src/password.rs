//! Password hashing and verification with Argon2id.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::auth::{AuthError, AuthResult};

/// Hash of a throwaway password, verified against when no account matched.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"no account has this password", &salt)
        .map(|hash| hash.to_string())
        .unwrap_or_default()
});

/// Checks a supplied password against a stored hash.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, stored_hash: &str, supplied_password: &str) -> bool;
}

/// Argon2id with the crate's default parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Argon2Verifier;

impl CredentialVerifier for Argon2Verifier {
    fn verify(&self, stored_hash: &str, supplied_password: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(stored_hash) else {
            tracing::warn!("Stored password hash is not a valid PHC string");
            return false;
        };

        Argon2::default()
            .verify_password(supplied_password.as_bytes(), &parsed_hash)
            .is_ok()
    }
}

/// Hash a password into a PHC string suitable for storage.
pub fn hash_password(password: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|_| AuthError::HashingFailed)?
        .to_string())
}

/// A valid hash with the same parameters as stored hashes. Verifying
/// against it costs as much as checking a real account.
pub fn dummy_hash() -> &'static str {
    &DUMMY_HASH
}
