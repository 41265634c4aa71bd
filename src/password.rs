//! Password hashing and verification.
//!
//! Secrets are stored as self-describing Argon2id PHC strings (algorithm,
//! params and per-secret salt embedded), so verification needs nothing
//! beyond the stored string itself.

use anyhow::Result;
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::config::SecurityConfig;

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses the crate defaults.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Verify a candidate password against a stored PHC string.
///
/// A malformed stored hash counts as a verification failure rather than an
/// error, so corrupt rows cannot abort a login flow.
#[must_use]
pub fn verify_password(encoded: &str, candidate: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(encoded) else {
        return false;
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok()
}
