// crates/flowgate-cli/src/main.rs
// ============================================================================
// Module: Flowgate Binary
// Description: Process entrypoint wiring configuration into a running server.
// Purpose: Construct every capability once, serve, and shut down cleanly.
// Dependencies: all flowgate crates, axum-server, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! Startup order: tracing, configuration, vault, store (with the bus event
//! sink already attached), rooms and bridge task, provider registry, engine,
//! verification worker plus its startup self-check, session signer, and the
//! axum router. Shutdown on SIGINT drains in-flight executions for the
//! configured grace window and fails survivors before the listener closes.
//! A background sweeper removes rate samples older than 24 hours.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use flowgate_bus::ChannelSource;
use flowgate_bus::RoomRegistry;
use flowgate_bus::run_bridge;
use flowgate_bus::store_event_channel;
use flowgate_config::Config;
use flowgate_core::SecretVault;
use flowgate_core::Store;
use flowgate_core::Timestamp;
use flowgate_core::core::policy::RATE_SWEEP_AGE_MILLIS;
use flowgate_engine::EngineSettings;
use flowgate_engine::ExecutionRunner;
use flowgate_providers::OutboundHttp;
use flowgate_providers::ProviderRegistry;
use flowgate_providers::StoreTxRecorder;
use flowgate_providers::UrlPolicy;
use flowgate_server::AppState;
use flowgate_server::SessionSigner;
use flowgate_server::audit::Auditor;
use flowgate_server::build_router;
use flowgate_server::mail::mailer_from_config;
use flowgate_server::oidc::GoogleOidc;
use flowgate_server::oidc::OidcClient;
use flowgate_server::reports::ReportWriter;
use flowgate_store_sqlite::SqliteStore;
use flowgate_store_sqlite::SqliteStoreConfig;
use flowgate_verify::StartupCredentials;
use flowgate_verify::VerificationWorker;
use flowgate_verify::VerifySettings;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Interval between rate-sample sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

// ============================================================================
// SECTION: Entrypoint
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!(error = %message, "startup failed");
            ExitCode::FAILURE
        }
    }
}

/// Builds every capability and serves until shutdown.
async fn run() -> Result<(), String> {
    let config = Config::load().map_err(|err| err.to_string())?;

    // Vault: absent key means secret writes fail closed.
    let vault = match &config.vault.enc_key_base64 {
        Some(encoded) => Some(Arc::new(
            SecretVault::from_base64_key(encoded).map_err(|err| err.to_string())?,
        )),
        None => {
            tracing::warn!("SECRETS_ENC_KEY not set; provider credentials are locked");
            None
        }
    };

    // Store with the bus event sink attached.
    let (event_sink, event_stream) = store_event_channel();
    let store_config = SqliteStoreConfig {
        path: config.store.path.clone(),
        busy_timeout_ms: config.store.busy_timeout_ms,
    };
    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&store_config, event_sink).map_err(|err| err.to_string())?,
    );

    // Bus rooms and the bridge task.
    let rooms = Arc::new(RoomRegistry::new(config.bus.queue_depth));
    tokio::spawn(run_bridge(
        ChannelSource::new(event_stream),
        rooms.clone(),
        Duration::from_secs(config.bus.reconnect_max_backoff_secs),
    ));

    // Outbound HTTP and the provider registry.
    let outbound =
        OutboundHttp::new(UrlPolicy::strict()).map_err(|err| err.to_string())?;
    let registry = Arc::new(ProviderRegistry::new(
        outbound.clone(),
        Arc::new(StoreTxRecorder::new(store.clone())),
        config.providers.mtn_base_url.clone(),
    ));

    // Mail, engine, verifier.
    let mailer = mailer_from_config(&config.mail);
    let runner = Arc::new(ExecutionRunner::new(
        store.clone(),
        registry,
        vault.clone(),
        mailer.clone(),
        EngineSettings {
            http_timeout: Duration::from_secs(config.engine.http_timeout_secs),
            shutdown_grace: Duration::from_secs(config.engine.shutdown_grace_secs),
        },
    ));
    let verifier = Arc::new(VerificationWorker::new(
        store.clone(),
        outbound.clone(),
        VerifySettings {
            defer: Duration::from_millis(config.verify.defer_millis),
            probe_timeout: Duration::from_secs(config.verify.probe_timeout_secs),
        },
    ));
    verifier
        .startup_self_check(&StartupCredentials {
            flutterwave_key: config.providers.flw_secret_key.clone(),
            mtn_subscription_key: config.providers.mtn_subscription_key.clone(),
        })
        .await;

    // Rate-sample sweeper; also flags executions stuck in `running` past the
    // stale threshold (the reaper itself is the operator's).
    let sweeper_store = store.clone();
    let stale_after_millis = i64::try_from(config.engine.stale_running_secs)
        .unwrap_or(i64::MAX)
        .saturating_mul(1_000);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let now = Timestamp::now();
            let cutoff = now.saturating_sub_millis(RATE_SWEEP_AGE_MILLIS);
            match sweeper_store.sweep_rate_samples_before(cutoff) {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "rate samples swept");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "rate sweep failed"),
            }
            if let Ok(running) = sweeper_store.running_executions() {
                for execution_id in running {
                    if let Ok(Some(execution)) = sweeper_store.execution_by_id(execution_id)
                        && now.millis_since(execution.started_at) > stale_after_millis
                    {
                        tracing::warn!(%execution_id, "execution running past stale threshold");
                    }
                }
            }
        }
    });

    // HTTP surface.
    let production = config.server.environment.is_production();
    let sessions = Arc::new(SessionSigner::new(&config.session, production));
    let oidc: Option<Arc<dyn OidcClient>> =
        GoogleOidc::from_config(&config.oauth, outbound.clone())
            .map(|client| Arc::new(client) as Arc<dyn OidcClient>);
    let state = AppState {
        store: store.clone(),
        runner: runner.clone(),
        verifier,
        rooms,
        vault,
        mailer,
        sessions,
        auditor: Arc::new(Auditor::new(store.clone())),
        oidc,
        reports: Arc::new(ReportWriter::new(config.reports.dir.clone())),
        frontend_origin: config.server.frontend_origin.clone(),
        outbound,
        sandbox_fetch_timeout: Duration::from_secs(config.providers.sandbox_fetch_timeout_secs),
    };
    let router = build_router(state);

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .map_err(|err| format!("bind_addr invalid: {err}"))?;
    tracing::info!(%addr, "flowgate listening");

    let handle = axum_server::Handle::new();
    let watcher_handle = handle.clone();
    let grace = Duration::from_secs(config.engine.shutdown_grace_secs);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            tracing::warn!("signal listener failed; serving until killed");
            return;
        }
        tracing::info!("shutdown requested; draining executions");
        runner.shutdown().await;
        watcher_handle.graceful_shutdown(Some(grace));
    });

    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .map_err(|err| err.to_string())
}
