// crates/flowgate-config/src/sections.rs
// ============================================================================
// Module: Configuration Sections
// Description: Typed configuration sections, env overrides, and validation.
// Purpose: Define every tunable the platform reads at startup.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Each section mirrors one subsystem: server bind, store path, vault key,
//! session tokens, engine timing, verification worker timing, event bus
//! depth, mail, OAuth, provider credentials, and report output. Defaults
//! follow the platform contract (30 s action HTTP, 6 s probes, 3 s deferral,
//! 64-deep bus queues); the file and environment only need to name what they
//! change.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("config file {path} unreadable: {detail}")]
    Read {
        /// File path attempted.
        path: String,
        /// Underlying I/O detail.
        detail: String,
    },
    /// The configuration file failed to parse.
    #[error("config file parse failure: {0}")]
    Parse(String),
    /// A field value failed validation.
    #[error("config validation failure: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Environment Label
// ============================================================================

/// Deployment environment label controlling cookie hardening.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    /// Local development; the fallback session cookie is issued.
    #[default]
    Development,
    /// Production; only the `Secure` primary cookie is issued.
    Production,
}

impl Environment {
    /// Returns true in production.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// HTTP surface settings.
///
/// # Invariants
/// - `bind_addr` parses as a socket address at serve time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the API listens on.
    pub bind_addr: String,
    /// Browser origin allowed for credentialed requests.
    pub frontend_origin: Option<String>,
    /// Deployment environment label.
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            frontend_origin: None,
            environment: Environment::Development,
        }
    }
}

/// Durable store settings.
///
/// # Invariants
/// - `path` must be non-empty; parent directories are created at open.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file path.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/flowgate.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

/// Secret vault settings.
///
/// # Invariants
/// - `enc_key_base64`, when present, decodes to exactly 32 bytes (checked by
///   the vault at construction).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Base64-encoded 32-byte AES key; absent means secret writes fail
    /// closed.
    pub enc_key_base64: Option<String>,
}

/// Session token settings.
///
/// # Invariants
/// - `jwt_secret` is non-empty and at least 16 bytes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// HMAC secret for session tokens.
    pub jwt_secret: String,
    /// Token lifetime with `remember=true`, in days.
    pub remember_ttl_days: i64,
    /// Default token lifetime, in days.
    pub default_ttl_days: i64,
    /// OAuth-issued token lifetime, in days.
    pub oauth_ttl_days: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            remember_ttl_days: 30,
            default_ttl_days: 1,
            oauth_ttl_days: 7,
        }
    }
}

/// Execution engine timing.
///
/// # Invariants
/// - All values are positive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Action HTTP timeout, in seconds.
    pub http_timeout_secs: u64,
    /// Age beyond which a `running` execution is considered suspect, in
    /// seconds.
    pub stale_running_secs: u64,
    /// Shutdown drain window before survivors are failed, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            stale_running_secs: 15 * 60,
            shutdown_grace_secs: 10,
        }
    }
}

/// Verification worker timing.
///
/// # Invariants
/// - All values are positive.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifyConfig {
    /// Deferral before the probe so subscribers observe `pending`, in
    /// milliseconds.
    pub defer_millis: u64,
    /// Probe timeout, in seconds.
    pub probe_timeout_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            defer_millis: 3_000,
            probe_timeout_secs: 6,
        }
    }
}

/// Event bus settings.
///
/// # Invariants
/// - `queue_depth` is at least 1.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Per-subscriber queue depth before the oldest event is dropped.
    pub queue_depth: usize,
    /// Upper bound for the bridge reconnect backoff, in seconds.
    pub reconnect_max_backoff_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_depth: 64,
            reconnect_max_backoff_secs: 30,
        }
    }
}

/// Mail capability settings.
///
/// # Invariants
/// - When `smtp_host` is absent the mailer runs in record-only mode.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// SMTP relay host.
    pub smtp_host: Option<String>,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// SMTP username.
    pub smtp_user: Option<String>,
    /// SMTP password.
    pub smtp_pass: Option<String>,
    /// From address for platform mail.
    pub from_address: Option<String>,
    /// Send timeout, in seconds.
    pub send_timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: 587,
            smtp_user: None,
            smtp_pass: None,
            from_address: None,
            send_timeout_secs: 15,
        }
    }
}

/// Google OIDC settings.
///
/// # Invariants
/// - The flow is disabled unless both id and secret are present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OauthConfig {
    /// Google OAuth client id.
    pub google_client_id: Option<String>,
    /// Google OAuth client secret.
    pub google_client_secret: Option<String>,
    /// Redirect URL registered with the provider.
    pub redirect_url: Option<String>,
}

impl OauthConfig {
    /// Returns true when the Google flow can run.
    #[must_use]
    pub const fn google_enabled(&self) -> bool {
        self.google_client_id.is_some() && self.google_client_secret.is_some()
    }
}

/// Provider credential and timing settings.
///
/// # Invariants
/// - Absent credentials disable the matching provider; the startup
///   self-check flips its integrations to `error`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Flutterwave secret key (`FLW_SECRET_KEY`).
    pub flw_secret_key: Option<String>,
    /// Flutterwave public key (`FLW_PUBLIC_KEY`).
    pub flw_public_key: Option<String>,
    /// Flutterwave webhook signature secret (`FLW_WEBHOOK_SECRET`).
    pub flw_webhook_secret: Option<String>,
    /// MTN MoMo subscription key (`MTN_SUBSCRIPTION_KEY`).
    pub mtn_subscription_key: Option<String>,
    /// MTN MoMo API user (`MTN_API_USER`).
    pub mtn_api_user: Option<String>,
    /// MTN MoMo API key (`MTN_API_KEY`).
    pub mtn_api_key: Option<String>,
    /// MTN MoMo base URL override (`MTN_BASE_URL`).
    pub mtn_base_url: Option<String>,
    /// Sandbox fetch passthrough timeout, in seconds.
    pub sandbox_fetch_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            flw_secret_key: None,
            flw_public_key: None,
            flw_webhook_secret: None,
            mtn_subscription_key: None,
            mtn_api_user: None,
            mtn_api_key: None,
            mtn_base_url: None,
            sandbox_fetch_timeout_secs: 10,
        }
    }
}

/// Compliance report output settings.
///
/// # Invariants
/// - `dir` is created on first write.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory report files are written into.
    pub dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/compliance_reports"),
        }
    }
}

// ============================================================================
// SECTION: Config Tree
// ============================================================================

/// The validated configuration tree handed to the binary at startup.
///
/// # Invariants
/// - [`Config::validate`] has passed before the tree leaves this crate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP surface settings.
    pub server: ServerConfig,
    /// Durable store settings.
    pub store: StoreConfig,
    /// Secret vault settings.
    pub vault: VaultConfig,
    /// Session token settings.
    pub session: SessionConfig,
    /// Execution engine timing.
    pub engine: EngineConfig,
    /// Verification worker timing.
    pub verify: VerifyConfig,
    /// Event bus settings.
    pub bus: BusConfig,
    /// Mail capability settings.
    pub mail: MailConfig,
    /// Google OIDC settings.
    pub oauth: OauthConfig,
    /// Provider credentials and timing.
    pub providers: ProvidersConfig,
    /// Compliance report output.
    pub reports: ReportsConfig,
}

/// Environment lookup used while loading; injected so tests stay hermetic.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl Config {
    /// Loads configuration from the process environment, honoring
    /// `FLOWGATE_CONFIG` as an optional TOML baseline.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, unparsable, or a
    /// field fails validation.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(&|key| std::env::var(key).ok())
    }

    /// Loads configuration with an injected environment lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable, unparsable, or a
    /// field fails validation.
    pub fn load_with(env: EnvLookup<'_>) -> Result<Self, ConfigError> {
        let mut config = match env("FLOWGATE_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML baseline file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file is unreadable or unparsable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            path: path.display().to_string(),
            detail: err.to_string(),
        })?;
        toml::from_str(&raw).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Applies the well-known environment overrides on top of the baseline.
    fn apply_env(&mut self, env: EnvLookup<'_>) {
        if let Some(value) = env("JWT_SECRET") {
            self.session.jwt_secret = value;
        }
        if let Some(value) = env("SECRETS_ENC_KEY") {
            self.vault.enc_key_base64 = Some(value);
        }
        if let Some(value) = env("DATABASE_URL") {
            self.store.path = PathBuf::from(value);
        }
        if let Some(value) = env("BIND_ADDR") {
            self.server.bind_addr = value;
        }
        if let Some(value) = env("FRONTEND_ORIGIN") {
            self.server.frontend_origin = Some(value);
        }
        if env("ENVIRONMENT").as_deref() == Some("production") {
            self.server.environment = Environment::Production;
        }
        if let Some(value) = env("SMTP_HOST") {
            self.mail.smtp_host = Some(value);
        }
        if let Some(port) = env("SMTP_PORT").and_then(|raw| raw.parse().ok()) {
            self.mail.smtp_port = port;
        }
        if let Some(value) = env("SMTP_USER") {
            self.mail.smtp_user = Some(value);
        }
        if let Some(value) = env("SMTP_PASS") {
            self.mail.smtp_pass = Some(value);
        }
        if let Some(value) = env("SMTP_FROM") {
            self.mail.from_address = Some(value);
        }
        if let Some(value) = env("GOOGLE_CLIENT_ID") {
            self.oauth.google_client_id = Some(value);
        }
        if let Some(value) = env("GOOGLE_CLIENT_SECRET") {
            self.oauth.google_client_secret = Some(value);
        }
        if let Some(value) = env("GOOGLE_REDIRECT_URL") {
            self.oauth.redirect_url = Some(value);
        }
        if let Some(value) = env("FLW_SECRET_KEY") {
            self.providers.flw_secret_key = Some(value);
        }
        if let Some(value) = env("FLW_PUBLIC_KEY") {
            self.providers.flw_public_key = Some(value);
        }
        if let Some(value) = env("FLW_WEBHOOK_SECRET") {
            self.providers.flw_webhook_secret = Some(value);
        }
        if let Some(value) = env("MTN_SUBSCRIPTION_KEY") {
            self.providers.mtn_subscription_key = Some(value);
        }
        if let Some(value) = env("MTN_API_USER") {
            self.providers.mtn_api_user = Some(value);
        }
        if let Some(value) = env("MTN_API_KEY") {
            self.providers.mtn_api_key = Some(value);
        }
        if let Some(value) = env("MTN_BASE_URL") {
            self.providers.mtn_base_url = Some(value);
        }
        if let Some(value) = env("REPORTS_DIR") {
            self.reports.dir = PathBuf::from(value);
        }
    }

    /// Validates the assembled tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first failing field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.jwt_secret.is_empty() {
            return Err(ConfigError::Validation("session.jwt_secret must be set".to_string()));
        }
        if self.session.jwt_secret.len() < 16 {
            return Err(ConfigError::Validation(
                "session.jwt_secret must be at least 16 bytes".to_string(),
            ));
        }
        if self.session.remember_ttl_days <= 0
            || self.session.default_ttl_days <= 0
            || self.session.oauth_ttl_days <= 0
        {
            return Err(ConfigError::Validation(
                "session ttl values must be positive".to_string(),
            ));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("store.path must be set".to_string()));
        }
        if self.bus.queue_depth == 0 {
            return Err(ConfigError::Validation("bus.queue_depth must be at least 1".to_string()));
        }
        if self.engine.http_timeout_secs == 0
            || self.engine.stale_running_secs == 0
            || self.engine.shutdown_grace_secs == 0
        {
            return Err(ConfigError::Validation(
                "engine timing values must be positive".to_string(),
            ));
        }
        if self.verify.probe_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "verify.probe_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
