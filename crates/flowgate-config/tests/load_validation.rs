// crates/flowgate-config/tests/load_validation.rs
// ============================================================================
// Module: Config Load Validation Tests
// Description: Baseline file parsing, env overrides, and validation errors.
// Purpose: Pin the layered load order and fail-fast validation.
// ============================================================================

//! ## Overview
//! Covers the TOML baseline, environment overrides winning over the file,
//! defaults for unnamed fields, and the validation failures that must stop
//! startup.

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

use std::collections::HashMap;
use std::io::Write;

use flowgate_config::Config;
use flowgate_config::ConfigError;
use flowgate_config::Environment;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an env lookup over a fixed map.
fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

/// Loads a config with the given simulated environment.
fn load(env: &HashMap<String, String>) -> Result<Config, ConfigError> {
    Config::load_with(&|key| env.get(key).cloned())
}

// ============================================================================
// SECTION: Defaults & Overrides
// ============================================================================

#[test]
fn env_only_load_uses_documented_defaults() {
    let env = env_of(&[("JWT_SECRET", "0123456789abcdef")]);
    let config = load(&env).unwrap();
    assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
    assert_eq!(config.engine.http_timeout_secs, 30);
    assert_eq!(config.verify.defer_millis, 3_000);
    assert_eq!(config.verify.probe_timeout_secs, 6);
    assert_eq!(config.bus.queue_depth, 64);
    assert_eq!(config.mail.send_timeout_secs, 15);
    assert_eq!(config.providers.sandbox_fetch_timeout_secs, 10);
    assert_eq!(config.session.remember_ttl_days, 30);
    assert_eq!(config.session.default_ttl_days, 1);
    assert_eq!(config.session.oauth_ttl_days, 7);
}

#[test]
fn env_overrides_win_over_file_baseline() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        concat!(
            "[session]\njwt_secret = \"file-secret-0123456\"\n",
            "[server]\nbind_addr = \"0.0.0.0:9000\"\n",
            "[store]\npath = \"file.db\"\n",
        )
    )
    .unwrap();
    let path = file.path().display().to_string();
    let env = env_of(&[
        ("FLOWGATE_CONFIG", path.as_str()),
        ("JWT_SECRET", "env-secret-0123456"),
        ("DATABASE_URL", "env.db"),
    ]);
    let config = load(&env).unwrap();
    assert_eq!(config.session.jwt_secret, "env-secret-0123456");
    assert_eq!(config.store.path.display().to_string(), "env.db");
    // Untouched by env: the file baseline holds.
    assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
}

#[test]
fn production_environment_flag_is_recognized() {
    let env = env_of(&[("JWT_SECRET", "0123456789abcdef"), ("ENVIRONMENT", "production")]);
    let config = load(&env).unwrap();
    assert_eq!(config.server.environment, Environment::Production);
    assert!(config.server.environment.is_production());
}

#[test]
fn provider_and_mail_overrides_apply() {
    let env = env_of(&[
        ("JWT_SECRET", "0123456789abcdef"),
        ("FLW_SECRET_KEY", "FLWSECK-x"),
        ("MTN_SUBSCRIPTION_KEY", "ocp-x"),
        ("SMTP_HOST", "smtp.test"),
        ("SMTP_PORT", "2525"),
    ]);
    let config = load(&env).unwrap();
    assert_eq!(config.providers.flw_secret_key.as_deref(), Some("FLWSECK-x"));
    assert_eq!(config.providers.mtn_subscription_key.as_deref(), Some("ocp-x"));
    assert_eq!(config.mail.smtp_host.as_deref(), Some("smtp.test"));
    assert_eq!(config.mail.smtp_port, 2525);
}

// ============================================================================
// SECTION: Validation Failures
// ============================================================================

#[test]
fn missing_jwt_secret_fails_load() {
    let env = env_of(&[]);
    assert!(matches!(load(&env), Err(ConfigError::Validation(_))));
}

#[test]
fn short_jwt_secret_fails_load() {
    let env = env_of(&[("JWT_SECRET", "short")]);
    assert!(matches!(load(&env), Err(ConfigError::Validation(_))));
}

#[test]
fn zero_bus_queue_depth_fails_validation() {
    let mut config = Config::default();
    config.session.jwt_secret = "0123456789abcdef".to_string();
    config.bus.queue_depth = 0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn unreadable_file_is_reported() {
    let env = env_of(&[
        ("FLOWGATE_CONFIG", "/nonexistent/flowgate.toml"),
        ("JWT_SECRET", "0123456789abcdef"),
    ]);
    assert!(matches!(load(&env), Err(ConfigError::Read { .. })));
}

#[test]
fn malformed_file_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "this is not toml [").unwrap();
    let path = file.path().display().to_string();
    let env = env_of(&[("FLOWGATE_CONFIG", path.as_str()), ("JWT_SECRET", "0123456789abcdef")]);
    assert!(matches!(load(&env), Err(ConfigError::Parse(_))));
}
