//! Secret generation, hashing and verification.
//!
//! # Security
//!
//! - Client secrets are hashed with Argon2id (PHC string format)
//! - Codes and refresh tokens are 256-bit random values, base64url-encoded
//! - Token lookup rows store the SHA-256 hex digest, never the token

use std::sync::OnceLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::AuthError;

/// Hash a client secret for storage using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::Internal` if hashing fails (rare).
pub fn hash_client_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| AuthError::internal(format!("failed to hash client secret: {e}")))?;
    Ok(hash.to_string())
}

/// Verify a client secret against a stored Argon2 hash.
///
/// A malformed stored hash never verifies.
#[must_use]
pub fn verify_client_secret(secret: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(secret.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored client secret hash is malformed");
            false
        }
    }
}

/// Argon2 hash of a value no client holds, built on first use.
static UNMATCHABLE_SECRET_HASH: OnceLock<Option<String>> = OnceLock::new();

fn unmatchable_secret_hash() -> Option<&'static str> {
    UNMATCHABLE_SECRET_HASH
        .get_or_init(|| hash_client_secret(&generate_opaque_token()).ok())
        .as_deref()
}

/// Spends one Argon2 verification on a presented secret that has no
/// stored hash to check against.
///
/// Rejections for unknown, inactive or secretless clients then take as
/// long as a wrong secret.
pub fn burn_secret_verification(secret: &str) {
    match unmatchable_secret_hash() {
        Some(hash) => {
            let _ = verify_client_secret(secret, hash);
        }
        None => tracing::warn!("Could not build the placeholder secret hash"),
    }
}

/// Hash a token value using SHA-256 (hex encoded).
///
/// Used both when storing new tokens and when looking them up.
#[must_use]
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Generate a random opaque value: 256 bits, base64url (43 characters).
#[must_use]
pub fn generate_opaque_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random secret suitable for HS256 signing.
#[must_use]
pub fn generate_hmac_secret() -> Vec<u8> {
    let mut bytes = vec![0u8; 64];
    rand::thread_rng().fill(&mut bytes[..]);
    bytes
}
