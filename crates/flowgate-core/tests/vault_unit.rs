// crates/flowgate-core/tests/vault_unit.rs
// ============================================================================
// Module: Secret Vault Unit Tests
// Description: Round-trip, nonce freshness, and fail-closed behavior.
// Purpose: Pin the vault's encrypt/decrypt contract.
// ============================================================================

//! ## Overview
//! Exercises the vault round-trip (`decrypt ∘ encrypt = id`), nonce
//! freshness, and authentication failures on tampered blobs or wrong keys.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use flowgate_core::SecretVault;
use flowgate_core::VaultError;
use proptest::prelude::proptest;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Sample credential struct mirroring a provider config blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SampleCredentials {
    api_key: String,
    api_secret: String,
    subscription_key: Option<String>,
}

/// A fixed 32-byte key for tests.
fn vault() -> SecretVault {
    SecretVault::from_key_bytes(&[7_u8; 32]).unwrap()
}

fn sample() -> SampleCredentials {
    SampleCredentials {
        api_key: "FLWPUBK-0123".to_string(),
        api_secret: "FLWSECK-4567".to_string(),
        subscription_key: Some("ocp-abcdef".to_string()),
    }
}

// ============================================================================
// SECTION: Round-Trip
// ============================================================================

#[test]
fn encrypt_then_decrypt_round_trips() {
    let vault = vault();
    let blob = vault.encrypt_value(&sample()).unwrap();
    let opened: SampleCredentials = vault.decrypt_value(&blob).unwrap();
    assert_eq!(opened, sample());
}

#[test]
fn identical_plaintexts_produce_distinct_blobs() {
    let vault = vault();
    let first = vault.encrypt_value(&sample()).unwrap();
    let second = vault.encrypt_value(&sample()).unwrap();
    assert_ne!(first, second);
}

proptest! {
    #[test]
    fn arbitrary_strings_round_trip(secret in ".{0,256}") {
        let vault = vault();
        let blob = vault.encrypt_value(&secret).unwrap();
        let opened: String = vault.decrypt_value(&blob).unwrap();
        assert_eq!(opened, secret);
    }
}

// ============================================================================
// SECTION: Fail Closed
// ============================================================================

#[test]
fn wrong_key_fails_to_decrypt() {
    let blob = vault().encrypt_value(&sample()).unwrap();
    let other = SecretVault::from_key_bytes(&[8_u8; 32]).unwrap();
    let result: Result<SampleCredentials, VaultError> = other.decrypt_value(&blob);
    assert!(matches!(result, Err(VaultError::Decrypt)));
}

#[test]
fn tampered_blob_fails_to_decrypt() {
    let vault = vault();
    let blob = vault.encrypt_value(&sample()).unwrap();
    // Flip a character somewhere past the nonce prefix.
    let mut tampered: Vec<char> = blob.chars().collect();
    let mid = tampered.len() / 2;
    tampered[mid] = if tampered[mid] == 'A' { 'B' } else { 'A' };
    let tampered: String = tampered.into_iter().collect();
    let result: Result<SampleCredentials, VaultError> = vault.decrypt_value(&tampered);
    assert!(result.is_err());
}

#[test]
fn short_key_is_rejected() {
    assert!(matches!(SecretVault::from_key_bytes(&[1_u8; 16]), Err(VaultError::InvalidKey)));
}

#[test]
fn garbage_blob_is_rejected() {
    let result: Result<SampleCredentials, VaultError> = vault().decrypt_value("not base64!!!");
    assert!(matches!(result, Err(VaultError::Encoding)));
}

#[test]
fn base64_key_loader_round_trips() {
    use base64::Engine as _;
    let encoded = base64::engine::general_purpose::STANDARD.encode([9_u8; 32]);
    let vault = SecretVault::from_base64_key(&encoded).unwrap();
    let blob = vault.encrypt_value(&"s".to_string()).unwrap();
    let opened: String = vault.decrypt_value(&blob).unwrap();
    assert_eq!(opened, "s");
}
