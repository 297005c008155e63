// crates/flowgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store Implementation
// Description: Schema management and trait implementations over rusqlite.
// Purpose: Provide the durable, org-scoped persistence layer.
// Dependencies: flowgate-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! One mutex-guarded connection serves reads and writes; SQLite WAL plus a
//! busy timeout keeps short transactions cheap. Every query is org-scoped
//! exactly as the trait signature demands, so cross-tenant reads cannot be
//! expressed by accident. Schema versioning follows the store_meta pattern:
//! version 1 creates everything, later versions migrate in place, unknown
//! versions fail closed.
//!
//! Invariants:
//! - `create_flow_version` assigns `max(version) + 1` inside one transaction.
//! - `finish_execution` only moves rows out of `running`; terminal states
//!   are sticky.
//! - `delete_execution` removes logs, then steps, then the execution row.
//! - Notification inserts and integration status writes publish a
//!   [`StoreEvent`] after the write commits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use flowgate_core::ApiRateSample;
use flowgate_core::AuditRecord;
use flowgate_core::Connection as ProviderConnection;
use flowgate_core::ConnectionEnv;
use flowgate_core::ConnectionId;
use flowgate_core::ExecutionId;
use flowgate_core::ExecutionLog;
use flowgate_core::ExecutionStatus;
use flowgate_core::ExecutionStep;
use flowgate_core::ExecutionStore;
use flowgate_core::Flow;
use flowgate_core::FlowExecution;
use flowgate_core::FlowGraph;
use flowgate_core::FlowId;
use flowgate_core::FlowStatus;
use flowgate_core::FlowStore;
use flowgate_core::FlowVersion;
use flowgate_core::FlowVersionId;
use flowgate_core::IdentityStore;
use flowgate_core::Integration;
use flowgate_core::IntegrationId;
use flowgate_core::IntegrationStatus;
use flowgate_core::IpAllowlistEntry;
use flowgate_core::LogId;
use flowgate_core::LogLevel;
use flowgate_core::NodeId;
use flowgate_core::Notification;
use flowgate_core::NotificationId;
use flowgate_core::NotificationKind;
use flowgate_core::OrgId;
use flowgate_core::Organization;
use flowgate_core::PendingUser;
use flowgate_core::PolicyStore;
use flowgate_core::StepId;
use flowgate_core::StepStatus;
use flowgate_core::StoreError;
use flowgate_core::StoreEvent;
use flowgate_core::StoreEventKind;
use flowgate_core::StoreEventSink;
use flowgate_core::TenantStore;
use flowgate_core::Timestamp;
use flowgate_core::TriggerType;
use flowgate_core::TxEvent;
use flowgate_core::User;
use flowgate_core::UserId;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// SQLite schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the SQLite store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Creates a config with the default busy timeout.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Durable Flowgate store over one SQLite database file.
///
/// # Invariants
/// - All access serializes through the inner mutex; transactions stay short
///   and no I/O besides SQLite happens under the lock.
pub struct SqliteStore {
    /// Guarded database connection.
    connection: Mutex<Connection>,
    /// Sink receiving org-scoped change events.
    events: Arc<dyn StoreEventSink>,
}

impl SqliteStore {
    /// Opens (creating when absent) the database and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the file is unusable or the stored schema
    /// version is unsupported.
    pub fn open(
        config: &SqliteStoreConfig,
        events: Arc<dyn StoreEventSink>,
    ) -> Result<Self, StoreError> {
        if config.path.as_os_str().is_empty() {
            return Err(StoreError::Backend("store path must not be empty".to_string()));
        }
        ensure_parent_dir(&config.path)?;
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let mut connection =
            Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
        apply_pragmas(&connection, config.busy_timeout_ms)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            events,
        })
    }

    /// Opens an in-memory store; used by tests and tooling.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when schema initialization fails.
    pub fn open_in_memory(events: Arc<dyn StoreEventSink>) -> Result<Self, StoreError> {
        let mut connection = Connection::open_in_memory().map_err(db_error)?;
        connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
            events,
        })
    }

    /// Acquires the connection guard.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    /// Publishes a store event after a successful write.
    fn publish(&self, org_id: OrgId, kind: StoreEventKind) {
        self.events.publish(StoreEvent {
            org_id,
            kind,
        });
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
    }
    Ok(())
}

/// Applies SQLite pragmas required for durability.
fn apply_pragmas(connection: &Connection, busy_timeout_ms: u64) -> Result<(), StoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(db_error)?;
    connection.execute_batch("PRAGMA journal_mode = wal;").map_err(db_error)?;
    connection.execute_batch("PRAGMA synchronous = normal;").map_err(db_error)?;
    connection.busy_timeout(Duration::from_millis(busy_timeout_ms)).map_err(db_error)?;
    Ok(())
}

/// Initializes the SQLite schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(SCHEMA_V1).map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::Backend(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}

/// Version-1 schema: the full §3 data model with cascading ownership.
const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    email TEXT NOT NULL,
    password_hash TEXT,
    first_name TEXT,
    last_name TEXT,
    deactivated_at INTEGER,
    rate_limit INTEGER NOT NULL,
    allow_ip_whitelist INTEGER NOT NULL DEFAULT 0,
    send_error_alerts INTEGER NOT NULL DEFAULT 0,
    profile_picture TEXT
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (lower(email));
CREATE TABLE IF NOT EXISTS pending_users (
    email TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    verification_code TEXT NOT NULL,
    last_sent_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_users_email ON pending_users (lower(email));
CREATE TABLE IF NOT EXISTS flows (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    created_by TEXT NOT NULL REFERENCES users(id),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_flows_org_name
    ON flows (org_id, lower(name)) WHERE is_deleted = 0;
CREATE TABLE IF NOT EXISTS flow_versions (
    id TEXT PRIMARY KEY,
    flow_id TEXT NOT NULL REFERENCES flows(id) ON DELETE CASCADE,
    version INTEGER NOT NULL,
    graph_json BLOB NOT NULL,
    variables_json BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE (flow_id, version)
);
CREATE TABLE IF NOT EXISTS flow_executions (
    id TEXT PRIMARY KEY,
    flow_id TEXT NOT NULL REFERENCES flows(id) ON DELETE CASCADE,
    flow_version INTEGER NOT NULL,
    status TEXT NOT NULL,
    trigger_type TEXT NOT NULL,
    trigger_data BLOB NOT NULL,
    started_at INTEGER NOT NULL,
    completed_at INTEGER,
    error_message TEXT,
    execution_time_ms INTEGER
);
CREATE INDEX IF NOT EXISTS idx_flow_executions_flow
    ON flow_executions (flow_id, started_at DESC);
CREATE TABLE IF NOT EXISTS execution_steps (
    id TEXT PRIMARY KEY,
    execution_id TEXT NOT NULL REFERENCES flow_executions(id) ON DELETE CASCADE,
    node_id TEXT NOT NULL,
    node_type TEXT NOT NULL,
    node_kind TEXT,
    status TEXT NOT NULL,
    started_at INTEGER,
    completed_at INTEGER,
    input_data BLOB,
    output_data BLOB,
    error_message TEXT,
    execution_time_ms INTEGER,
    retry_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (execution_id, node_id)
);
CREATE TABLE IF NOT EXISTS execution_logs (
    id TEXT PRIMARY KEY,
    execution_id TEXT NOT NULL REFERENCES flow_executions(id) ON DELETE CASCADE,
    step_id TEXT REFERENCES execution_steps(id) ON DELETE CASCADE,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    metadata BLOB,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_execution_logs_execution
    ON execution_logs (execution_id, created_at);
CREATE TABLE IF NOT EXISTS integrations (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    test_url TEXT,
    last_checked INTEGER,
    created_at INTEGER NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_integrations_org_name
    ON integrations (org_id, lower(name));
CREATE TABLE IF NOT EXISTS connections (
    id TEXT PRIMARY KEY,
    owner_user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    provider TEXT NOT NULL,
    env TEXT NOT NULL,
    label TEXT NOT NULL,
    config_enc TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_connections_owner
    ON connections (owner_user_id, provider, created_at DESC);
CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    related_id TEXT,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_notifications_org
    ON notifications (org_id, created_at DESC);
CREATE TABLE IF NOT EXISTS tx_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    success INTEGER NOT NULL,
    latency_ms INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tx_events_org ON tx_events (org_id, created_at DESC);
CREATE TABLE IF NOT EXISTS api_rate_samples (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    endpoint TEXT NOT NULL,
    ip_address TEXT,
    timestamp INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_api_rate_samples_user
    ON api_rate_samples (user_id, timestamp);
CREATE TABLE IF NOT EXISTS ip_allowlist (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    ip_address TEXT NOT NULL,
    description TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE (user_id, ip_address)
);
CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT,
    action TEXT NOT NULL,
    target_type TEXT,
    target_id TEXT,
    route TEXT,
    method TEXT,
    ip TEXT,
    user_agent TEXT,
    status_code INTEGER,
    request_id TEXT,
    metadata BLOB,
    created_at INTEGER NOT NULL
);
";

// ============================================================================
// SECTION: Error & Value Helpers
// ============================================================================

/// Maps a rusqlite error to a backend store error.
fn db_error(err: rusqlite::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Maps a rusqlite error, converting constraint violations to conflicts.
fn write_error(err: rusqlite::Error, conflict_label: &str) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(conflict_label.to_string())
        }
        other => StoreError::Backend(other.to_string()),
    }
}

/// Serializes a JSON value into the stored blob form.
fn json_blob(value: &Value) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Parses a stored blob back into a JSON value.
fn json_from_blob(bytes: &[u8]) -> Result<Value, StoreError> {
    serde_json::from_slice(bytes).map_err(|err| StoreError::Serialization(err.to_string()))
}

/// Parses an optional stored blob.
fn optional_json(bytes: Option<Vec<u8>>) -> Result<Option<Value>, StoreError> {
    bytes.as_deref().map(json_from_blob).transpose()
}

/// Parses a stored UUID column.
fn parse_uuid_column<T>(raw: &str, build: fn(uuid::Uuid) -> T) -> Result<T, StoreError> {
    uuid::Uuid::parse_str(raw)
        .map(build)
        .map_err(|_| StoreError::Serialization(format!("malformed uuid column: {raw}")))
}

/// Parses a stored status label, failing closed on unknown values.
fn parse_label<T>(raw: &str, parse: fn(&str) -> Option<T>, what: &str) -> Result<T, StoreError> {
    parse(raw).ok_or_else(|| StoreError::Serialization(format!("unknown {what} label: {raw}")))
}

/// Converts a row-count limit into a SQL parameter.
fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Converts a stored i64 into a u32 field.
fn u32_column(raw: i64, what: &str) -> Result<u32, StoreError> {
    u32::try_from(raw).map_err(|_| StoreError::Serialization(format!("negative {what}: {raw}")))
}

// ============================================================================
// SECTION: Row Mappers
// ============================================================================

/// Maps an organizations row.
fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<(String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Builds an [`Organization`] from mapped columns.
fn build_organization(raw: (String, String, i64)) -> Result<Organization, StoreError> {
    Ok(Organization {
        id: parse_uuid_column(&raw.0, OrgId::from_uuid)?,
        name: raw.1,
        created_at: Timestamp::from_unix_millis(raw.2),
    })
}

/// Raw users row tuple.
type UserRow = (
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    i64,
    bool,
    bool,
    Option<String>,
);

/// Maps a users row.
fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

/// Builds a [`User`] from mapped columns.
fn build_user(raw: UserRow) -> Result<User, StoreError> {
    Ok(User {
        id: parse_uuid_column(&raw.0, UserId::from_uuid)?,
        org_id: parse_uuid_column(&raw.1, OrgId::from_uuid)?,
        email: raw.2,
        password_hash: raw.3,
        first_name: raw.4,
        last_name: raw.5,
        deactivated_at: raw.6.map(Timestamp::from_unix_millis),
        rate_limit: u32_column(raw.7, "rate_limit")?,
        allow_ip_whitelist: raw.8,
        send_error_alerts: raw.9,
        profile_picture: raw.10,
    })
}

/// Shared users column list.
const USER_COLUMNS: &str = "id, org_id, email, password_hash, first_name, last_name, \
                            deactivated_at, rate_limit, allow_ip_whitelist, send_error_alerts, \
                            profile_picture";

/// Raw flows row tuple.
type FlowRow = (String, String, String, String, bool, String, i64, i64);

/// Maps a flows row.
fn flow_from_row(row: &Row<'_>) -> rusqlite::Result<FlowRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Builds a [`Flow`] from mapped columns.
fn build_flow(raw: FlowRow) -> Result<Flow, StoreError> {
    Ok(Flow {
        id: parse_uuid_column(&raw.0, FlowId::from_uuid)?,
        org_id: parse_uuid_column(&raw.1, OrgId::from_uuid)?,
        name: raw.2,
        status: parse_label(&raw.3, FlowStatus::parse, "flow status")?,
        is_deleted: raw.4,
        created_by: parse_uuid_column(&raw.5, UserId::from_uuid)?,
        created_at: Timestamp::from_unix_millis(raw.6),
        updated_at: Timestamp::from_unix_millis(raw.7),
    })
}

/// Shared flows column list.
const FLOW_COLUMNS: &str = "id, org_id, name, status, is_deleted, created_by, created_at, \
                            updated_at";

/// Raw flow_versions row tuple.
type FlowVersionRow = (String, String, i64, Vec<u8>, Vec<u8>, i64);

/// Maps a flow_versions row.
fn flow_version_from_row(row: &Row<'_>) -> rusqlite::Result<FlowVersionRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?, row.get(5)?))
}

/// Builds a [`FlowVersion`] from mapped columns.
fn build_flow_version(raw: FlowVersionRow) -> Result<FlowVersion, StoreError> {
    let graph: FlowGraph = serde_json::from_slice(&raw.3)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    Ok(FlowVersion {
        id: parse_uuid_column(&raw.0, FlowVersionId::from_uuid)?,
        flow_id: parse_uuid_column(&raw.1, FlowId::from_uuid)?,
        version: u32_column(raw.2, "version")?,
        graph,
        variables: json_from_blob(&raw.4)?,
        created_at: Timestamp::from_unix_millis(raw.5),
    })
}

/// Shared flow_versions column list.
const FLOW_VERSION_COLUMNS: &str = "id, flow_id, version, graph_json, variables_json, created_at";

/// Raw flow_executions row tuple.
type ExecutionRow =
    (String, String, i64, String, String, Vec<u8>, i64, Option<i64>, Option<String>, Option<i64>);

/// Maps a flow_executions row.
fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
    ))
}

/// Builds a [`FlowExecution`] from mapped columns.
fn build_execution(raw: ExecutionRow) -> Result<FlowExecution, StoreError> {
    Ok(FlowExecution {
        id: parse_uuid_column(&raw.0, ExecutionId::from_uuid)?,
        flow_id: parse_uuid_column(&raw.1, FlowId::from_uuid)?,
        flow_version: u32_column(raw.2, "flow_version")?,
        status: parse_label(&raw.3, ExecutionStatus::parse, "execution status")?,
        trigger_type: parse_label(&raw.4, TriggerType::parse, "trigger type")?,
        trigger_data: json_from_blob(&raw.5)?,
        started_at: Timestamp::from_unix_millis(raw.6),
        completed_at: raw.7.map(Timestamp::from_unix_millis),
        error_message: raw.8,
        execution_time_ms: raw.9,
    })
}

/// Shared flow_executions column list.
const EXECUTION_COLUMNS: &str = "id, flow_id, flow_version, status, trigger_type, trigger_data, \
                                 started_at, completed_at, error_message, execution_time_ms";

/// Raw execution_steps row tuple.
type StepRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    Option<i64>,
    Option<i64>,
    Option<Vec<u8>>,
    Option<Vec<u8>>,
    Option<String>,
    Option<i64>,
    i64,
);

/// Maps an execution_steps row.
fn step_from_row(row: &Row<'_>) -> rusqlite::Result<StepRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

/// Builds an [`ExecutionStep`] from mapped columns.
fn build_step(raw: StepRow) -> Result<ExecutionStep, StoreError> {
    Ok(ExecutionStep {
        id: parse_uuid_column(&raw.0, StepId::from_uuid)?,
        execution_id: parse_uuid_column(&raw.1, ExecutionId::from_uuid)?,
        node_id: NodeId::new(raw.2),
        node_type: raw.3,
        node_kind: raw.4,
        status: parse_label(&raw.5, StepStatus::parse, "step status")?,
        started_at: raw.6.map(Timestamp::from_unix_millis),
        completed_at: raw.7.map(Timestamp::from_unix_millis),
        input_data: optional_json(raw.8)?,
        output_data: optional_json(raw.9)?,
        error_message: raw.10,
        execution_time_ms: raw.11,
        retry_count: u32_column(raw.12, "retry_count")?,
    })
}

/// Shared execution_steps column list.
const STEP_COLUMNS: &str = "id, execution_id, node_id, node_type, node_kind, status, started_at, \
                            completed_at, input_data, output_data, error_message, \
                            execution_time_ms, retry_count";

/// Raw execution_logs row tuple.
type ExecutionLogRow = (String, String, Option<String>, String, String, Option<Vec<u8>>, i64);

/// Maps an execution_logs row.
fn log_from_row(row: &Row<'_>) -> rusqlite::Result<ExecutionLogRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Builds an [`ExecutionLog`] from mapped columns.
fn build_log(raw: ExecutionLogRow) -> Result<ExecutionLog, StoreError> {
    Ok(ExecutionLog {
        id: parse_uuid_column(&raw.0, LogId::from_uuid)?,
        execution_id: parse_uuid_column(&raw.1, ExecutionId::from_uuid)?,
        step_id: raw.2.as_deref().map(|id| parse_uuid_column(id, StepId::from_uuid)).transpose()?,
        level: parse_label(&raw.3, LogLevel::parse, "log level")?,
        message: raw.4,
        metadata: optional_json(raw.5)?,
        created_at: Timestamp::from_unix_millis(raw.6),
    })
}

/// Raw integrations row tuple.
type IntegrationRow = (String, String, String, String, Option<String>, Option<i64>, i64);

/// Maps an integrations row.
fn integration_from_row(row: &Row<'_>) -> rusqlite::Result<IntegrationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Builds an [`Integration`] from mapped columns.
fn build_integration(raw: IntegrationRow) -> Result<Integration, StoreError> {
    Ok(Integration {
        id: parse_uuid_column(&raw.0, IntegrationId::from_uuid)?,
        org_id: parse_uuid_column(&raw.1, OrgId::from_uuid)?,
        name: raw.2,
        status: parse_label(&raw.3, IntegrationStatus::parse, "integration status")?,
        test_url: raw.4,
        last_checked: raw.5.map(Timestamp::from_unix_millis),
        created_at: Timestamp::from_unix_millis(raw.6),
    })
}

/// Shared integrations column list.
const INTEGRATION_COLUMNS: &str = "id, org_id, name, status, test_url, last_checked, created_at";

// ============================================================================
// SECTION: Identity Store
// ============================================================================

impl IdentityStore for SqliteStore {
    fn create_organization(&self, org: &Organization) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
        )
        .map_err(db_error)?
        .execute(params![
            org.id.to_string(),
            org.name,
            org.created_at.as_unix_millis()
        ])
        .map_err(|err| write_error(err, "organization name already taken"))?;
        Ok(())
    }

    fn organization_by_id(&self, id: OrgId) -> Result<Option<Organization>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached("SELECT id, name, created_at FROM organizations WHERE id = ?1")
            .map_err(db_error)?
            .query_row(params![id.to_string()], organization_from_row)
            .optional()
            .map_err(db_error)?
            .map(build_organization)
            .transpose()
    }

    fn organization_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached("SELECT id, name, created_at FROM organizations WHERE name = ?1")
            .map_err(db_error)?
            .query_row(params![name], organization_from_row)
            .optional()
            .map_err(db_error)?
            .map(build_organization)
            .transpose()
    }

    fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO users (id, org_id, email, password_hash, first_name, last_name, \
             deactivated_at, rate_limit, allow_ip_whitelist, send_error_alerts, profile_picture)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .map_err(db_error)?
        .execute(params![
            user.id.to_string(),
            user.org_id.to_string(),
            user.email,
            user.password_hash,
            user.first_name,
            user.last_name,
            user.deactivated_at.map(Timestamp::as_unix_millis),
            i64::from(user.rate_limit),
            user.allow_ip_whitelist,
            user.send_error_alerts,
            user.profile_picture,
        ])
        .map_err(|err| write_error(err, "email already registered"))?;
        Ok(())
    }

    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
            .map_err(db_error)?
            .query_row(params![id.to_string()], user_from_row)
            .optional()
            .map_err(db_error)?
            .map(build_user)
            .transpose()
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower(?1)"
        ))
        .map_err(db_error)?
        .query_row(params![email], user_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_user)
        .transpose()
    }

    fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE users SET email = ?2, password_hash = ?3, first_name = ?4, \
                 last_name = ?5, deactivated_at = ?6, rate_limit = ?7, \
                 allow_ip_whitelist = ?8, send_error_alerts = ?9, profile_picture = ?10
                 WHERE id = ?1",
            )
            .map_err(db_error)?
            .execute(params![
                user.id.to_string(),
                user.email,
                user.password_hash,
                user.first_name,
                user.last_name,
                user.deactivated_at.map(Timestamp::as_unix_millis),
                i64::from(user.rate_limit),
                user.allow_ip_whitelist,
                user.send_error_alerts,
                user.profile_picture,
            ])
            .map_err(|err| write_error(err, "email already registered"))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    fn upsert_pending_user(&self, pending: &PendingUser) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached("DELETE FROM pending_users WHERE lower(email) = lower(?1)")
            .map_err(db_error)?
            .execute(params![pending.email])
            .map_err(db_error)?;
        conn.prepare_cached(
            "INSERT INTO pending_users (email, password_hash, verification_code, last_sent_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_error)?
        .execute(params![
            pending.email,
            pending.password_hash,
            pending.verification_code,
            pending.last_sent_at.as_unix_millis(),
        ])
        .map_err(db_error)?;
        Ok(())
    }

    fn pending_user_by_email(&self, email: &str) -> Result<Option<PendingUser>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "SELECT email, password_hash, verification_code, last_sent_at
             FROM pending_users WHERE lower(email) = lower(?1)",
        )
        .map_err(db_error)?
        .query_row(params![email], |row| {
            Ok(PendingUser {
                email: row.get(0)?,
                password_hash: row.get(1)?,
                verification_code: row.get(2)?,
                last_sent_at: Timestamp::from_unix_millis(row.get(3)?),
            })
        })
        .optional()
        .map_err(db_error)
    }

    fn delete_pending_user(&self, email: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached("DELETE FROM pending_users WHERE lower(email) = lower(?1)")
            .map_err(db_error)?
            .execute(params![email])
            .map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Flow Store
// ============================================================================

impl FlowStore for SqliteStore {
    fn create_flow(&self, flow: &Flow) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO flows (id, org_id, name, status, is_deleted, created_by, created_at, \
             updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .map_err(db_error)?
        .execute(params![
            flow.id.to_string(),
            flow.org_id.to_string(),
            flow.name,
            flow.status.as_str(),
            flow.is_deleted,
            flow.created_by.to_string(),
            flow.created_at.as_unix_millis(),
            flow.updated_at.as_unix_millis(),
        ])
        .map_err(|err| write_error(err, "flow name already taken in organization"))?;
        Ok(())
    }

    fn flow_by_id(&self, org_id: OrgId, id: FlowId) -> Result<Option<Flow>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {FLOW_COLUMNS} FROM flows WHERE id = ?1 AND org_id = ?2"
        ))
        .map_err(db_error)?
        .query_row(params![id.to_string(), org_id.to_string()], flow_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_flow)
        .transpose()
    }

    fn list_flows(&self, org_id: OrgId) -> Result<Vec<Flow>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {FLOW_COLUMNS} FROM flows
                 WHERE org_id = ?1 AND is_deleted = 0
                 ORDER BY created_at DESC, id DESC"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![org_id.to_string()], flow_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_flow).collect()
    }

    fn set_flow_status(
        &self,
        org_id: OrgId,
        id: FlowId,
        status: FlowStatus,
        updated_at: Timestamp,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE flows SET status = ?3, updated_at = ?4
                 WHERE id = ?1 AND org_id = ?2 AND is_deleted = 0",
            )
            .map_err(db_error)?
            .execute(params![
                id.to_string(),
                org_id.to_string(),
                status.as_str(),
                updated_at.as_unix_millis(),
            ])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("flow {id}")));
        }
        Ok(())
    }

    fn soft_delete_flow(
        &self,
        org_id: OrgId,
        id: FlowId,
        updated_at: Timestamp,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE flows SET is_deleted = 1, updated_at = ?3
                 WHERE id = ?1 AND org_id = ?2 AND is_deleted = 0",
            )
            .map_err(db_error)?
            .execute(params![id.to_string(), org_id.to_string(), updated_at.as_unix_millis()])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("flow {id}")));
        }
        Ok(())
    }

    fn create_flow_version(
        &self,
        flow_id: FlowId,
        graph: &FlowGraph,
        variables: &Value,
        created_at: Timestamp,
    ) -> Result<FlowVersion, StoreError> {
        let graph_json = serde_json::to_vec(graph)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        let variables_json = json_blob(variables)?;
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_error)?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM flows WHERE id = ?1",
                params![flow_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("flow {flow_id}")));
        }
        let next_version: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM flow_versions WHERE flow_id = ?1",
                params![flow_id.to_string()],
                |row| row.get(0),
            )
            .map_err(db_error)?;
        let id = FlowVersionId::generate();
        tx.execute(
            "INSERT INTO flow_versions (id, flow_id, version, graph_json, variables_json, \
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                flow_id.to_string(),
                next_version,
                graph_json,
                variables_json,
                created_at.as_unix_millis(),
            ],
        )
        .map_err(|err| write_error(err, "flow version already exists"))?;
        tx.execute(
            "UPDATE flows SET updated_at = ?2 WHERE id = ?1",
            params![flow_id.to_string(), created_at.as_unix_millis()],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(FlowVersion {
            id,
            flow_id,
            version: u32_column(next_version, "version")?,
            graph: graph.clone(),
            variables: variables.clone(),
            created_at,
        })
    }

    fn latest_flow_version(&self, flow_id: FlowId) -> Result<Option<FlowVersion>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {FLOW_VERSION_COLUMNS} FROM flow_versions
             WHERE flow_id = ?1 ORDER BY version DESC LIMIT 1"
        ))
        .map_err(db_error)?
        .query_row(params![flow_id.to_string()], flow_version_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_flow_version)
        .transpose()
    }

    fn flow_version(
        &self,
        flow_id: FlowId,
        version: u32,
    ) -> Result<Option<FlowVersion>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {FLOW_VERSION_COLUMNS} FROM flow_versions
             WHERE flow_id = ?1 AND version = ?2"
        ))
        .map_err(db_error)?
        .query_row(params![flow_id.to_string(), i64::from(version)], flow_version_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_flow_version)
        .transpose()
    }

    fn list_flow_versions(&self, flow_id: FlowId) -> Result<Vec<FlowVersion>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {FLOW_VERSION_COLUMNS} FROM flow_versions
                 WHERE flow_id = ?1 ORDER BY version DESC"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![flow_id.to_string()], flow_version_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_flow_version).collect()
    }
}

// ============================================================================
// SECTION: Execution Store
// ============================================================================

impl ExecutionStore for SqliteStore {
    fn insert_execution(&self, execution: &FlowExecution) -> Result<(), StoreError> {
        let trigger_data = json_blob(&execution.trigger_data)?;
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO flow_executions (id, flow_id, flow_version, status, trigger_type, \
             trigger_data, started_at, completed_at, error_message, execution_time_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(db_error)?
        .execute(params![
            execution.id.to_string(),
            execution.flow_id.to_string(),
            i64::from(execution.flow_version),
            execution.status.as_str(),
            execution.trigger_type.as_str(),
            trigger_data,
            execution.started_at.as_unix_millis(),
            execution.completed_at.map(Timestamp::as_unix_millis),
            execution.error_message,
            execution.execution_time_ms,
        ])
        .map_err(|err| write_error(err, "execution already exists"))?;
        Ok(())
    }

    fn execution_by_id(&self, id: ExecutionId) -> Result<Option<FlowExecution>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM flow_executions WHERE id = ?1"
        ))
        .map_err(db_error)?
        .query_row(params![id.to_string()], execution_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_execution)
        .transpose()
    }

    fn execution_org(&self, id: ExecutionId) -> Result<Option<OrgId>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .prepare_cached(
                "SELECT flows.org_id FROM flow_executions
                 JOIN flows ON flows.id = flow_executions.flow_id
                 WHERE flow_executions.id = ?1",
            )
            .map_err(db_error)?
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        raw.as_deref().map(|org| parse_uuid_column(org, OrgId::from_uuid)).transpose()
    }

    fn executions_for_flow(
        &self,
        flow_id: FlowId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM flow_executions
                 WHERE flow_id = ?1 ORDER BY started_at DESC, id DESC LIMIT ?2"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![flow_id.to_string(), limit_param(limit)], execution_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_execution).collect()
    }

    fn recent_executions_for_org(
        &self,
        org_id: OrgId,
        limit: usize,
    ) -> Result<Vec<FlowExecution>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {EXECUTION_COLUMNS} FROM flow_executions
                 WHERE flow_id IN (SELECT id FROM flows WHERE org_id = ?1)
                 ORDER BY started_at DESC, id DESC LIMIT ?2"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![org_id.to_string(), limit_param(limit)], execution_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_execution).collect()
    }

    fn finish_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        error_message: Option<&str>,
        completed_at: Timestamp,
    ) -> Result<bool, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Conflict("finish requires a terminal status".to_string()));
        }
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE flow_executions
                 SET status = ?2, error_message = ?3, completed_at = ?4,
                     execution_time_ms = ?4 - started_at
                 WHERE id = ?1 AND status = 'running'",
            )
            .map_err(db_error)?
            .execute(params![
                id.to_string(),
                status.as_str(),
                error_message,
                completed_at.as_unix_millis(),
            ])
            .map_err(db_error)?;
        if changed > 0 {
            return Ok(true);
        }
        let exists: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM flow_executions WHERE id = ?1")
            .map_err(db_error)?
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("execution {id}")));
        }
        Ok(false)
    }

    fn insert_step(&self, step: &ExecutionStep) -> Result<(), StoreError> {
        let input = step.input_data.as_ref().map(json_blob).transpose()?;
        let output = step.output_data.as_ref().map(json_blob).transpose()?;
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO execution_steps (id, execution_id, node_id, node_type, node_kind, \
             status, started_at, completed_at, input_data, output_data, error_message, \
             execution_time_ms, retry_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .map_err(db_error)?
        .execute(params![
            step.id.to_string(),
            step.execution_id.to_string(),
            step.node_id.as_str(),
            step.node_type,
            step.node_kind,
            step.status.as_str(),
            step.started_at.map(Timestamp::as_unix_millis),
            step.completed_at.map(Timestamp::as_unix_millis),
            input,
            output,
            step.error_message,
            step.execution_time_ms,
            i64::from(step.retry_count),
        ])
        .map_err(|err| write_error(err, "step already exists for node"))?;
        Ok(())
    }

    fn update_step(&self, step: &ExecutionStep) -> Result<(), StoreError> {
        let input = step.input_data.as_ref().map(json_blob).transpose()?;
        let output = step.output_data.as_ref().map(json_blob).transpose()?;
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE execution_steps
                 SET status = ?2, started_at = ?3, completed_at = ?4, input_data = ?5,
                     output_data = ?6, error_message = ?7, execution_time_ms = ?8,
                     retry_count = ?9
                 WHERE id = ?1",
            )
            .map_err(db_error)?
            .execute(params![
                step.id.to_string(),
                step.status.as_str(),
                step.started_at.map(Timestamp::as_unix_millis),
                step.completed_at.map(Timestamp::as_unix_millis),
                input,
                output,
                step.error_message,
                step.execution_time_ms,
                i64::from(step.retry_count),
            ])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("step {}", step.id)));
        }
        Ok(())
    }

    fn steps_for_execution(&self, id: ExecutionId) -> Result<Vec<ExecutionStep>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {STEP_COLUMNS} FROM execution_steps
                 WHERE execution_id = ?1 ORDER BY rowid"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![id.to_string()], step_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_step).collect()
    }

    fn insert_log(&self, log: &ExecutionLog) -> Result<(), StoreError> {
        let metadata = log.metadata.as_ref().map(json_blob).transpose()?;
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO execution_logs (id, execution_id, step_id, level, message, metadata, \
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_error)?
        .execute(params![
            log.id.to_string(),
            log.execution_id.to_string(),
            log.step_id.map(|step| step.to_string()),
            log.level.as_str(),
            log.message,
            metadata,
            log.created_at.as_unix_millis(),
        ])
        .map_err(db_error)?;
        Ok(())
    }

    fn logs_for_execution(
        &self,
        id: ExecutionId,
        limit: usize,
    ) -> Result<Vec<ExecutionLog>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, execution_id, step_id, level, message, metadata, created_at
                 FROM execution_logs WHERE execution_id = ?1 ORDER BY rowid LIMIT ?2",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![id.to_string(), limit_param(limit)], log_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_log).collect()
    }

    fn running_executions(&self) -> Result<Vec<ExecutionId>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT id FROM flow_executions WHERE status = 'running'")
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.iter().map(|raw| parse_uuid_column(raw, ExecutionId::from_uuid)).collect()
    }

    fn delete_execution(&self, id: ExecutionId, org_id: OrgId) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_error)?;
        let owned: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM flow_executions
                 JOIN flows ON flows.id = flow_executions.flow_id
                 WHERE flow_executions.id = ?1 AND flows.org_id = ?2",
                params![id.to_string(), org_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if owned.is_none() {
            return Err(StoreError::NotFound(format!("execution {id}")));
        }
        tx.execute(
            "DELETE FROM execution_logs WHERE execution_id = ?1",
            params![id.to_string()],
        )
        .map_err(db_error)?;
        tx.execute(
            "DELETE FROM execution_steps WHERE execution_id = ?1",
            params![id.to_string()],
        )
        .map_err(db_error)?;
        tx.execute("DELETE FROM flow_executions WHERE id = ?1", params![id.to_string()])
            .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tenant Store
// ============================================================================

impl TenantStore for SqliteStore {
    fn create_integration(&self, integration: &Integration) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO integrations (id, org_id, name, status, test_url, last_checked, \
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_error)?
        .execute(params![
            integration.id.to_string(),
            integration.org_id.to_string(),
            integration.name,
            integration.status.as_str(),
            integration.test_url,
            integration.last_checked.map(Timestamp::as_unix_millis),
            integration.created_at.as_unix_millis(),
        ])
        .map_err(|err| write_error(err, "integration name already taken in organization"))?;
        Ok(())
    }

    fn integration_by_id(
        &self,
        org_id: OrgId,
        id: IntegrationId,
    ) -> Result<Option<Integration>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(&format!(
            "SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?1 AND org_id = ?2"
        ))
        .map_err(db_error)?
        .query_row(params![id.to_string(), org_id.to_string()], integration_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_integration)
        .transpose()
    }

    fn list_integrations(&self, org_id: OrgId) -> Result<Vec<Integration>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations
                 WHERE org_id = ?1 ORDER BY created_at DESC, id DESC"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![org_id.to_string()], integration_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_integration).collect()
    }

    fn integrations_matching_name(
        &self,
        fragment: &str,
    ) -> Result<Vec<Integration>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(&format!(
                "SELECT {INTEGRATION_COLUMNS} FROM integrations
                 WHERE instr(lower(name), lower(?1)) > 0 ORDER BY created_at DESC"
            ))
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![fragment], integration_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_integration).collect()
    }

    fn update_integration_settings(
        &self,
        org_id: OrgId,
        id: IntegrationId,
        name: &str,
        test_url: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached(
                "UPDATE integrations SET name = ?3, test_url = ?4
                 WHERE id = ?1 AND org_id = ?2",
            )
            .map_err(db_error)?
            .execute(params![id.to_string(), org_id.to_string(), name, test_url])
            .map_err(|err| write_error(err, "integration name already taken in organization"))?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("integration {id}")));
        }
        Ok(())
    }

    fn set_integration_status(
        &self,
        id: IntegrationId,
        status: IntegrationStatus,
        last_checked: Timestamp,
    ) -> Result<(), StoreError> {
        let org_id = {
            let conn = self.lock()?;
            let raw: Option<String> = conn
                .prepare_cached("SELECT org_id FROM integrations WHERE id = ?1")
                .map_err(db_error)?
                .query_row(params![id.to_string()], |row| row.get(0))
                .optional()
                .map_err(db_error)?;
            let Some(raw) = raw else {
                return Err(StoreError::NotFound(format!("integration {id}")));
            };
            conn.prepare_cached(
                "UPDATE integrations SET status = ?2, last_checked = ?3 WHERE id = ?1",
            )
            .map_err(db_error)?
            .execute(params![
                id.to_string(),
                status.as_str(),
                last_checked.as_unix_millis()
            ])
            .map_err(db_error)?;
            parse_uuid_column(&raw, OrgId::from_uuid)?
        };
        self.publish(org_id, StoreEventKind::IntegrationsUpdate);
        Ok(())
    }

    fn delete_integration(&self, org_id: OrgId, id: IntegrationId) -> Result<(), StoreError> {
        let changed = {
            let conn = self.lock()?;
            conn.prepare_cached("DELETE FROM integrations WHERE id = ?1 AND org_id = ?2")
                .map_err(db_error)?
                .execute(params![id.to_string(), org_id.to_string()])
                .map_err(db_error)?
        };
        if changed == 0 {
            return Err(StoreError::NotFound(format!("integration {id}")));
        }
        self.publish(org_id, StoreEventKind::IntegrationsUpdate);
        Ok(())
    }

    fn create_connection(&self, connection: &ProviderConnection) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO connections (id, owner_user_id, provider, env, label, config_enc, \
             created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(db_error)?
        .execute(params![
            connection.id.to_string(),
            connection.owner_user_id.to_string(),
            connection.provider,
            connection.env.as_str(),
            connection.label,
            connection.config_enc,
            connection.created_at.as_unix_millis(),
        ])
        .map_err(db_error)?;
        Ok(())
    }

    fn connection_for_provider(
        &self,
        owner_user_id: UserId,
        provider: &str,
    ) -> Result<Option<ProviderConnection>, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "SELECT id, owner_user_id, provider, env, label, config_enc, created_at
             FROM connections
             WHERE owner_user_id = ?1 AND lower(provider) = lower(?2)
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .map_err(db_error)?
        .query_row(params![owner_user_id.to_string(), provider], connection_from_row)
        .optional()
        .map_err(db_error)?
        .map(build_connection)
        .transpose()
    }

    fn list_connections(
        &self,
        owner_user_id: UserId,
    ) -> Result<Vec<ProviderConnection>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, owner_user_id, provider, env, label, config_enc, created_at
                 FROM connections WHERE owner_user_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![owner_user_id.to_string()], connection_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_connection).collect()
    }

    fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        {
            let conn = self.lock()?;
            conn.prepare_cached(
                "INSERT INTO notifications (id, org_id, kind, title, message, related_id, \
                 is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .map_err(db_error)?
            .execute(params![
                notification.id.to_string(),
                notification.org_id.to_string(),
                notification.kind.as_str(),
                notification.title,
                notification.message,
                notification.related_id,
                notification.is_read,
                notification.created_at.as_unix_millis(),
            ])
            .map_err(db_error)?;
        }
        self.publish(notification.org_id, StoreEventKind::NotificationsUpdate);
        Ok(())
    }

    fn list_notifications(
        &self,
        org_id: OrgId,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, org_id, kind, title, message, related_id, is_read, created_at
                 FROM notifications WHERE org_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![org_id.to_string(), limit_param(limit)], notification_from_row)
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter().map(build_notification).collect()
    }

    fn mark_notification_read(
        &self,
        org_id: OrgId,
        id: NotificationId,
    ) -> Result<(), StoreError> {
        let changed = {
            let conn = self.lock()?;
            conn.prepare_cached(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND org_id = ?2",
            )
            .map_err(db_error)?
            .execute(params![id.to_string(), org_id.to_string()])
            .map_err(db_error)?
        };
        if changed == 0 {
            return Err(StoreError::NotFound(format!("notification {id}")));
        }
        self.publish(org_id, StoreEventKind::NotificationsUpdate);
        Ok(())
    }

    fn mark_all_notifications_read(&self, org_id: OrgId) -> Result<u64, StoreError> {
        let changed = {
            let conn = self.lock()?;
            conn.prepare_cached(
                "UPDATE notifications SET is_read = 1 WHERE org_id = ?1 AND is_read = 0",
            )
            .map_err(db_error)?
            .execute(params![org_id.to_string()])
            .map_err(db_error)?
        };
        if changed > 0 {
            self.publish(org_id, StoreEventKind::NotificationsUpdate);
        }
        Ok(u64::try_from(changed).unwrap_or(u64::MAX))
    }

    fn record_tx_event(
        &self,
        org_id: OrgId,
        success: bool,
        latency_ms: Option<i64>,
        created_at: Timestamp,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO tx_events (org_id, success, latency_ms, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_error)?
        .execute(params![
            org_id.to_string(),
            success,
            latency_ms,
            created_at.as_unix_millis()
        ])
        .map_err(db_error)?;
        Ok(())
    }

    fn recent_tx_events(&self, org_id: OrgId, limit: usize) -> Result<Vec<TxEvent>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, org_id, success, latency_ms, created_at
                 FROM tx_events WHERE org_id = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![org_id.to_string(), limit_param(limit)], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, bool>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter()
            .map(|raw| {
                Ok(TxEvent {
                    id: raw.0,
                    org_id: parse_uuid_column(&raw.1, OrgId::from_uuid)?,
                    success: raw.2,
                    latency_ms: raw.3,
                    created_at: Timestamp::from_unix_millis(raw.4),
                })
            })
            .collect()
    }
}

/// Raw connections row tuple.
type ConnectionRow = (String, String, String, String, String, String, i64);

/// Maps a connections row.
fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<ConnectionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

/// Builds a [`ProviderConnection`] from mapped columns.
fn build_connection(raw: ConnectionRow) -> Result<ProviderConnection, StoreError> {
    Ok(ProviderConnection {
        id: parse_uuid_column(&raw.0, ConnectionId::from_uuid)?,
        owner_user_id: parse_uuid_column(&raw.1, UserId::from_uuid)?,
        provider: raw.2,
        env: parse_label(&raw.3, ConnectionEnv::parse, "connection env")?,
        label: raw.4,
        config_enc: raw.5,
        created_at: Timestamp::from_unix_millis(raw.6),
    })
}

/// Raw notifications row tuple.
type NotificationRow = (String, String, String, String, String, Option<String>, bool, i64);

/// Maps a notifications row.
fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

/// Builds a [`Notification`] from mapped columns.
fn build_notification(raw: NotificationRow) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: parse_uuid_column(&raw.0, NotificationId::from_uuid)?,
        org_id: parse_uuid_column(&raw.1, OrgId::from_uuid)?,
        kind: parse_label(&raw.2, NotificationKind::parse, "notification kind")?,
        title: raw.3,
        message: raw.4,
        related_id: raw.5,
        is_read: raw.6,
        created_at: Timestamp::from_unix_millis(raw.7),
    })
}

// ============================================================================
// SECTION: Policy Store
// ============================================================================

impl PolicyStore for SqliteStore {
    fn count_rate_samples_since(
        &self,
        user_id: UserId,
        since: Timestamp,
    ) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .prepare_cached(
                "SELECT COUNT(1) FROM api_rate_samples WHERE user_id = ?1 AND timestamp >= ?2",
            )
            .map_err(db_error)?
            .query_row(params![user_id.to_string(), since.as_unix_millis()], |row| row.get(0))
            .map_err(db_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn insert_rate_sample(&self, sample: &ApiRateSample) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO api_rate_samples (user_id, endpoint, ip_address, timestamp)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_error)?
        .execute(params![
            sample.user_id.to_string(),
            sample.endpoint,
            sample.ip_address,
            sample.timestamp.as_unix_millis(),
        ])
        .map_err(db_error)?;
        Ok(())
    }

    fn sweep_rate_samples_before(&self, cutoff: Timestamp) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let removed = conn
            .prepare_cached("DELETE FROM api_rate_samples WHERE timestamp < ?1")
            .map_err(db_error)?
            .execute(params![cutoff.as_unix_millis()])
            .map_err(db_error)?;
        Ok(u64::try_from(removed).unwrap_or_default())
    }

    fn list_ip_allowlist(&self, user_id: UserId) -> Result<Vec<IpAllowlistEntry>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, user_id, ip_address, description, created_at
                 FROM ip_allowlist WHERE user_id = ?1 ORDER BY created_at, id",
            )
            .map_err(db_error)?;
        let rows = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })
            .map_err(db_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_error)?;
        rows.into_iter()
            .map(|raw| {
                Ok(IpAllowlistEntry {
                    id: raw.0,
                    user_id: parse_uuid_column(&raw.1, UserId::from_uuid)?,
                    ip_address: raw.2,
                    description: raw.3,
                    created_at: Timestamp::from_unix_millis(raw.4),
                })
            })
            .collect()
    }

    fn add_ip_allowlist_entry(
        &self,
        user_id: UserId,
        ip_address: &str,
        description: Option<&str>,
        created_at: Timestamp,
    ) -> Result<IpAllowlistEntry, StoreError> {
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO ip_allowlist (user_id, ip_address, description, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .map_err(db_error)?
        .execute(params![
            user_id.to_string(),
            ip_address,
            description,
            created_at.as_unix_millis()
        ])
        .map_err(|err| write_error(err, "ip address already listed"))?;
        let id = conn.last_insert_rowid();
        Ok(IpAllowlistEntry {
            id,
            user_id,
            ip_address: ip_address.to_string(),
            description: description.map(ToString::to_string),
            created_at,
        })
    }

    fn remove_ip_allowlist_entry(
        &self,
        user_id: UserId,
        entry_id: i64,
    ) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let changed = conn
            .prepare_cached("DELETE FROM ip_allowlist WHERE id = ?1 AND user_id = ?2")
            .map_err(db_error)?
            .execute(params![entry_id, user_id.to_string()])
            .map_err(db_error)?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("allowlist entry {entry_id}")));
        }
        Ok(())
    }

    fn ip_allowed(&self, user_id: UserId, ip_address: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let hit: Option<i64> = conn
            .prepare_cached(
                "SELECT 1 FROM ip_allowlist WHERE user_id = ?1 AND ip_address = ?2 LIMIT 1",
            )
            .map_err(db_error)?
            .query_row(params![user_id.to_string(), ip_address], |row| row.get(0))
            .optional()
            .map_err(db_error)?;
        Ok(hit.is_some())
    }

    fn append_audit(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let metadata = record.metadata.as_ref().map(json_blob).transpose()?;
        let conn = self.lock()?;
        conn.prepare_cached(
            "INSERT INTO audit_log (user_id, action, target_type, target_id, route, method, \
             ip, user_agent, status_code, request_id, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .map_err(db_error)?
        .execute(params![
            record.user_id.map(|id| id.to_string()),
            record.action,
            record.target_type,
            record.target_id,
            record.route,
            record.method,
            record.ip,
            record.user_agent,
            record.status_code.map(i64::from),
            record.request_id.map(|id| id.to_string()),
            metadata,
            record.created_at.as_unix_millis(),
        ])
        .map_err(db_error)?;
        Ok(())
    }
}
