// content-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Connection setup, schema management, and row conversion.
// Purpose: Open and validate the Content Gate database.
// Dependencies: content-gate-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The store owns one connection behind a mutex. Opening validates the path,
//! applies durability pragmas, and creates or checks the schema version in
//! `store_meta`. Trait implementations live in sibling modules and share the
//! helpers defined here.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use content_gate_core::StoreError;
use content_gate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current schema version stored in `store_meta`.
pub const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length for a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum length for the full path string.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding tokens or purchaser details.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored row failed validation.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
        }
    }
}

/// Maps an engine error to a store error.
pub(crate) fn db_error(err: &rusqlite::Error) -> StoreError {
    StoreError::Store(err.to_string())
}

/// Returns true when `err` is a constraint violation (unique or primary key).
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation)
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed Content Gate store.
///
/// # Invariants
/// - `SQLite` connection access is serialized through a mutex.
/// - Contended updates are conditional `UPDATE` statements.
#[derive(Clone)]
pub struct SqliteStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Shared connection.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (and if needed creates) the database at `config.path`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or its schema version is unsupported.
    pub fn open(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        debug!(path = %config.path.display(), "sqlite store opened");
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Checks that the connection answers a trivial query.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be queried.
    pub fn readiness(&self) -> Result<(), StoreError> {
        let guard = self.lock()?;
        guard.query_row("SELECT 1", params![], |row| row.get::<_, i64>(0)).map_err(|err| db_error(&err))?;
        Ok(())
    }

    /// Locks the connection, mapping poisoning to a store error.
    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Store("sqlite connection mutex poisoned".to_string()))
    }
}

// ============================================================================
// SECTION: Conversion Helpers
// ============================================================================

/// Converts an optional stored millis column.
pub(crate) fn opt_timestamp(value: Option<i64>) -> Option<Timestamp> {
    value.map(Timestamp::from_unix_millis)
}

/// Converts a stored counter column to `u32`.
pub(crate) fn stored_u32(column: &str, value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} out of range: {value}")))
}

/// Converts a row limit to an `SQLite` integer.
pub(crate) fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid("store path contains an overlong component".to_string()));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid("store path must be a file, not a directory".to_string()));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags =
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(connection: &Connection, config: &SqliteStoreConfig) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS entitlements (
                    purchase_id TEXT PRIMARY KEY,
                    resource_id TEXT NOT NULL,
                    purchaser_email TEXT NOT NULL,
                    purchaser_name TEXT NOT NULL,
                    download_token TEXT UNIQUE,
                    token_expires_at INTEGER,
                    max_downloads INTEGER NOT NULL CHECK (max_downloads >= 0),
                    download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),
                    last_downloaded_at INTEGER,
                    payment_status TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    paid_at INTEGER
                );
                CREATE TABLE IF NOT EXISTS publish_tasks (
                    task_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    content_type TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    retry_count INTEGER NOT NULL DEFAULT 0,
                    error_message TEXT,
                    created_at INTEGER NOT NULL,
                    processed_at INTEGER,
                    next_attempt_at INTEGER NOT NULL,
                    claimed_at INTEGER,
                    delivered_channels TEXT NOT NULL DEFAULT '[]'
                );
                CREATE INDEX IF NOT EXISTS idx_publish_tasks_due
                    ON publish_tasks (status, next_attempt_at, created_at);
                CREATE TABLE IF NOT EXISTS content_items (
                    content_type TEXT NOT NULL,
                    content_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    summary TEXT,
                    url TEXT NOT NULL,
                    media_url TEXT,
                    state TEXT NOT NULL,
                    PRIMARY KEY (content_type, content_id)
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!("unsupported schema version: {value}")));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(())
}
