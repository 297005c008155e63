// crates/flowgate-config/src/lib.rs
// ============================================================================
// Module: Flowgate Configuration
// Description: TOML + environment configuration with load-time validation.
// Purpose: Give the binary one validated configuration tree at startup.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Configuration loads in two layers: an optional TOML file (path taken from
//! `FLOWGATE_CONFIG`) establishes the baseline, then well-known environment
//! variables override individual fields (`JWT_SECRET`, `SECRETS_ENC_KEY`,
//! `DATABASE_URL`, `SMTP_*`, `GOOGLE_CLIENT_ID`/`SECRET`, `FRONTEND_ORIGIN`,
//! `FLW_*`, `MTN_*`). Everything is validated before the tree is handed out;
//! a missing session secret or malformed numeric field fails startup rather
//! than failing the first request.
//!
//! Environment access is injected as a lookup function so tests never touch
//! process-global state.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod sections;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use sections::BusConfig;
pub use sections::Config;
pub use sections::ConfigError;
pub use sections::EngineConfig;
pub use sections::EnvLookup;
pub use sections::Environment;
pub use sections::MailConfig;
pub use sections::OauthConfig;
pub use sections::ProvidersConfig;
pub use sections::ReportsConfig;
pub use sections::ServerConfig;
pub use sections::SessionConfig;
pub use sections::StoreConfig;
pub use sections::VaultConfig;
pub use sections::VerifyConfig;
