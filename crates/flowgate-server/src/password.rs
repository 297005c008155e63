// crates/flowgate-server/src/password.rs
// ============================================================================
// Module: Password Hashing
// Description: Argon2id hashing and verification for account passwords.
// Purpose: Keep password handling in one place with one parameter set.
// Dependencies: argon2, rand
// ============================================================================

//! ## Overview
//! Passwords hash with Argon2id under the crate defaults and a fresh random
//! salt per hash. Verification is the only way to compare; raw hashes never
//! leave the store layer. Signup-code generation also lives here so the
//! auth flow has a single source of randomness.

// ============================================================================
// SECTION: Imports
// ============================================================================

use argon2::Argon2;
use argon2::PasswordHash;
use argon2::PasswordHasher;
use argon2::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use flowgate_core::ApiError;
use rand::Rng;

// ============================================================================
// SECTION: Hashing
// ============================================================================

/// Hashes a password with Argon2id and a fresh salt.
///
/// # Errors
///
/// Returns [`ApiError::Internal`] when hashing fails.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
}

/// Verifies a password against a stored hash. Malformed hashes verify as
/// false rather than erroring, keeping login responses uniform.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
        })
        .unwrap_or(false)
}

// ============================================================================
// SECTION: Verification Codes
// ============================================================================

/// Generates a six-digit signup verification code.
#[must_use]
pub fn generate_verification_code() -> String {
    let code: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{code:06}")
}
