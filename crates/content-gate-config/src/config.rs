// content-gate-config/src/config.rs
// ============================================================================
// Module: Content Gate Configuration
// Description: Configuration loading and validation for Content Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: content-gate-core, content-gate-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed: a server never starts with
//! a store path, resource declaration, or channel list it cannot honor.
//! Secrets are never read from the file. Channel credentials and admin
//! tokens are referenced by environment variable name and resolved when the
//! server is assembled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use content_gate_core::AggregationRule;
use content_gate_core::ArtifactFormat;
use content_gate_core::ChannelName;
use content_gate_core::EntitlementPolicy;
use content_gate_core::PublishQueueConfig;
use content_gate_core::RetryPolicy;
use content_gate_core::runtime::delivery::DEFAULT_FETCH_TIMEOUT;
use content_gate_core::runtime::ledger::DEFAULT_MAX_DOWNLOADS;
use content_gate_core::runtime::publish_queue::DEFAULT_BACKOFF_BASE_MILLIS;
use content_gate_core::runtime::publish_queue::DEFAULT_BACKOFF_MAX_MILLIS;
use content_gate_core::runtime::publish_queue::DEFAULT_CLAIM_LEASE_MILLIS;
use content_gate_core::runtime::publish_queue::DEFAULT_MAX_RETRIES;
use content_gate_store_sqlite::SqliteStoreConfig;
use content_gate_store_sqlite::SqliteStoreMode;
use content_gate_store_sqlite::SqliteSyncMode;
use content_gate_watermark::DEFAULT_MANIFEST_PATH;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "content-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "CONTENT_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of admin tokens.
pub(crate) const MAX_ADMIN_TOKENS: usize = 64;
/// Maximum length of an admin token.
pub(crate) const MAX_ADMIN_TOKEN_LENGTH: usize = 256;
/// Minimum length of an admin token.
pub(crate) const MIN_ADMIN_TOKEN_LENGTH: usize = 16;
/// Maximum number of declared resources.
pub(crate) const MAX_RESOURCES: usize = 256;
/// Maximum number of publish channels.
pub(crate) const MAX_CHANNELS: usize = 16;
/// Maximum length of a channel name or resource identifier.
pub(crate) const MAX_NAME_LENGTH: usize = 64;
/// Upper bound on a single publish batch.
pub const MAX_BATCH_LIMIT: usize = 500;
/// Upper bound on the per-purchase download limit.
pub const MAX_DOWNLOAD_LIMIT: u32 = 1_000;
/// Default bind address for the HTTP server.
const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Default maximum request body size.
const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024;
/// Default token lifetime in seconds (30 days).
const DEFAULT_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// Default publish batch size.
const DEFAULT_BATCH_LIMIT: usize = 20;
/// Default primary channel for the aggregation rule.
const DEFAULT_PRIMARY_CHANNEL: &str = "broadcast";
/// Default artifacts directory.
const DEFAULT_ARTIFACTS_ROOT: &str = "artifacts";
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Timeout applied to a publish channel that declares none.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);
/// Headroom the claim lease must keep above the slowest channel timeout.
pub const CLAIM_LEASE_MARGIN: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Content Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentGateConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Persistence configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Entitlement defaults.
    #[serde(default)]
    pub entitlements: EntitlementsConfig,
    /// Download pipeline configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Publish queue and channel configuration.
    #[serde(default)]
    pub publish: PublishConfig,
}

impl ContentGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is `path` when given, else `CONTENT_GATE_CONFIG`, else
    /// `content-gate.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.store.validate()?;
        self.entitlements.validate()?;
        self.delivery.validate()?;
        self.publish.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Admin bearer-token configuration.
    #[serde(default)]
    pub auth: AdminAuthConfig,
    /// Audit trail configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
            auth: AdminAuthConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `bind` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind is not a socket address: {}", self.bind)))
    }

    /// Validates server configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than zero".to_string()));
        }
        self.bind_addr()?;
        self.auth.validate()?;
        self.audit.validate()
    }
}

/// Admin bearer-token configuration.
///
/// # Invariants
/// - With no tokens configured, admin endpoints refuse every request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminAuthConfig {
    /// Inline tokens (development only; prefer `token_env`).
    #[serde(default)]
    pub tokens: Vec<String>,
    /// Environment variable holding one token or a comma-separated list.
    #[serde(default)]
    pub token_env: Option<String>,
}

impl AdminAuthConfig {
    /// Validates auth configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.len() > MAX_ADMIN_TOKENS {
            return Err(ConfigError::Invalid("too many admin tokens".to_string()));
        }
        for token in &self.tokens {
            validate_admin_token(token)?;
        }
        if let Some(name) = &self.token_env {
            validate_env_name("server.auth.token_env", name)?;
        }
        Ok(())
    }

    /// Resolves the effective admin token list.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Secret`] when `token_env` is set but the
    /// variable is missing, and [`ConfigError::Invalid`] when a resolved
    /// token fails the length or whitespace rules.
    pub fn resolve_tokens(&self) -> Result<Vec<String>, ConfigError> {
        let mut tokens = self.tokens.clone();
        if let Some(name) = &self.token_env {
            let value = resolve_secret(name)?;
            for token in value.split(',').map(str::trim).filter(|token| !token.is_empty()) {
                validate_admin_token(token)?;
                tokens.push(token.to_string());
            }
        }
        if tokens.len() > MAX_ADMIN_TOKENS {
            return Err(ConfigError::Invalid("too many admin tokens".to_string()));
        }
        Ok(tokens)
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit trail configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink type.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Output path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires server.audit.path".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("server.audit.path", &path.to_string_lossy()),
            (_, Some(_)) => Err(ConfigError::Invalid("server.audit.path is only valid for the file sink".to_string())),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-memory stores (lost on restart).
    #[default]
    Memory,
    /// `SQLite`-backed durable stores.
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms == 0 {
                    return Err(ConfigError::Invalid("store busy_timeout_ms must be greater than zero".to_string()));
                }
                Ok(())
            }
        }
    }

    /// Returns the `SQLite` configuration when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Entitlements
// ============================================================================

/// Entitlement defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementsConfig {
    /// Download limit for purchases that do not set one.
    #[serde(default = "default_max_downloads")]
    pub default_max_downloads: u32,
    /// Token lifetime in seconds, counted from payment confirmation.
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

impl Default for EntitlementsConfig {
    fn default() -> Self {
        Self {
            default_max_downloads: default_max_downloads(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl EntitlementsConfig {
    /// Validates entitlement defaults.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_max_downloads == 0 || self.default_max_downloads > MAX_DOWNLOAD_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "entitlements.default_max_downloads must be between 1 and {MAX_DOWNLOAD_LIMIT}"
            )));
        }
        if self.token_ttl_secs == 0 {
            return Err(ConfigError::Invalid("entitlements.token_ttl_secs must be greater than zero".to_string()));
        }
        ttl_millis(self.token_ttl_secs)?;
        Ok(())
    }

    /// Returns the runtime entitlement policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the token lifetime overflows.
    pub fn policy(&self) -> Result<EntitlementPolicy, ConfigError> {
        Ok(EntitlementPolicy {
            default_max_downloads: self.default_max_downloads,
            token_ttl_millis: ttl_millis(self.token_ttl_secs)?,
        })
    }
}

// ============================================================================
// SECTION: Delivery
// ============================================================================

/// Download pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Directory holding artifact files.
    #[serde(default = "default_artifacts_root")]
    pub artifacts_root: PathBuf,
    /// Artifact fetch timeout in milliseconds.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Personalization settings.
    #[serde(default)]
    pub watermark: WatermarkConfig,
    /// Declared downloadable resources.
    #[serde(default)]
    pub resources: Vec<ResourceConfig>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            artifacts_root: default_artifacts_root(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            watermark: WatermarkConfig::default(),
            resources: Vec::new(),
        }
    }
}

impl DeliveryConfig {
    /// Validates delivery configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("delivery.artifacts_root", &self.artifacts_root.to_string_lossy())?;
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("delivery.fetch_timeout_ms must be greater than zero".to_string()));
        }
        self.watermark.validate()?;
        if self.resources.len() > MAX_RESOURCES {
            return Err(ConfigError::Invalid("too many delivery resources".to_string()));
        }
        let mut seen = BTreeSet::new();
        for resource in &self.resources {
            resource.validate()?;
            if !seen.insert(resource.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate delivery resource: {}", resource.id)));
            }
        }
        Ok(())
    }

    /// Returns the runtime delivery settings.
    #[must_use]
    pub const fn runtime_config(&self) -> content_gate_core::DeliveryConfig {
        content_gate_core::DeliveryConfig {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            watermark_enabled: self.watermark.enabled,
        }
    }
}

/// Personalization settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WatermarkConfig {
    /// Personalize zip-based artifacts.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Archive path of the purchase manifest entry.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            manifest_path: default_manifest_path(),
        }
    }
}

impl WatermarkConfig {
    /// Validates the manifest entry path.
    fn validate(&self) -> Result<(), ConfigError> {
        let path = self.manifest_path.as_str();
        if path.trim().is_empty() || path.trim() != path {
            return Err(ConfigError::Invalid(
                "delivery.watermark.manifest_path must be non-empty without surrounding whitespace".to_string(),
            ));
        }
        if path.starts_with('/') || path.ends_with('/') || path.contains('\\') {
            return Err(ConfigError::Invalid(
                "delivery.watermark.manifest_path must be a relative archive path".to_string(),
            ));
        }
        if path.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(ConfigError::Invalid(
                "delivery.watermark.manifest_path must not contain empty or dot segments".to_string(),
            ));
        }
        if path == "mimetype" {
            return Err(ConfigError::Invalid(
                "delivery.watermark.manifest_path must not replace the mimetype entry".to_string(),
            ));
        }
        Ok(())
    }
}

/// A downloadable resource served from the artifacts directory.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    /// Resource identifier referenced by purchases.
    pub id: String,
    /// File path relative to `artifacts_root`.
    pub path: PathBuf,
    /// File name offered to the purchaser (defaults to the file name of `path`).
    #[serde(default)]
    pub filename: Option<String>,
    /// Container format (inferred from the file name when omitted).
    #[serde(default)]
    pub format: Option<ArtifactFormat>,
}

impl ResourceConfig {
    /// Validates a resource declaration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("delivery.resources.id", &self.id)?;
        validate_relative_path("delivery.resources.path", &self.path)?;
        if let Some(filename) = &self.filename {
            if filename.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "delivery resource {} filename must be non-empty",
                    self.id
                )));
            }
            if filename.contains(['/', '\\']) || filename.chars().any(char::is_control) {
                return Err(ConfigError::Invalid(format!(
                    "delivery resource {} filename must be a bare file name",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// Returns the file name offered to the purchaser.
    #[must_use]
    pub fn download_filename(&self) -> String {
        self.filename.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map_or_else(|| self.id.clone(), |name| name.to_string_lossy().into_owned())
        })
    }

    /// Returns the declared or inferred container format.
    #[must_use]
    pub fn resolved_format(&self) -> ArtifactFormat {
        self.format.unwrap_or_else(|| ArtifactFormat::from_filename(&self.download_filename()))
    }
}

// ============================================================================
// SECTION: Publish
// ============================================================================

/// Aggregation rule selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKind {
    /// The primary channel must deliver.
    #[default]
    Primary,
    /// Any channel delivering is success.
    Any,
    /// Every channel must deliver.
    All,
}

/// Publish queue and channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    /// Attempts before a task fails terminally.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Largest backoff delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Default batch size for queue processing.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Claim lease in milliseconds before a processing task counts as a
    /// failed attempt; must exceed every channel timeout plus a margin.
    #[serde(default = "default_claim_lease_ms")]
    pub claim_lease_ms: u64,
    /// Success rule.
    #[serde(default)]
    pub aggregation: AggregationKind,
    /// Channel that decides success under the primary rule.
    #[serde(default = "default_primary_channel")]
    pub primary_channel: String,
    /// Configured channels in dispatch order.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            batch_limit: default_batch_limit(),
            claim_lease_ms: default_claim_lease_ms(),
            aggregation: AggregationKind::default(),
            primary_channel: default_primary_channel(),
            channels: Vec::new(),
        }
    }
}

impl PublishConfig {
    /// Validates publish configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid("publish.max_retries must be greater than zero".to_string()));
        }
        if self.backoff_base_ms == 0 {
            return Err(ConfigError::Invalid("publish.backoff_base_ms must be greater than zero".to_string()));
        }
        if self.backoff_max_ms < self.backoff_base_ms {
            return Err(ConfigError::Invalid(
                "publish.backoff_max_ms must be at least publish.backoff_base_ms".to_string(),
            ));
        }
        millis_i64("publish.backoff_max_ms", self.backoff_max_ms)?;
        millis_i64("publish.claim_lease_ms", self.claim_lease_ms)?;
        if self.batch_limit == 0 || self.batch_limit > MAX_BATCH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "publish.batch_limit must be between 1 and {MAX_BATCH_LIMIT}"
            )));
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::Invalid("too many publish channels".to_string()));
        }
        let mut seen = BTreeSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !seen.insert(channel.name()) {
                return Err(ConfigError::Invalid(format!("duplicate publish channel: {}", channel.name())));
            }
        }
        let slowest = self.slowest_channel_timeout();
        if Duration::from_millis(self.claim_lease_ms) <= slowest + CLAIM_LEASE_MARGIN {
            return Err(ConfigError::Invalid(format!(
                "publish.claim_lease_ms must exceed the slowest channel timeout ({} ms) plus {} ms",
                slowest.as_millis(),
                CLAIM_LEASE_MARGIN.as_millis()
            )));
        }
        if self.aggregation == AggregationKind::Primary {
            validate_name("publish.primary_channel", &self.primary_channel)?;
            if !self.channels.is_empty() && !seen.contains(self.primary_channel.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "publish.primary_channel {} is not a configured channel",
                    self.primary_channel
                )));
            }
        }
        Ok(())
    }

    /// Returns the longest timeout any dispatch can wait on.
    ///
    /// Channels are called concurrently, so one attempt is bounded by the
    /// slowest channel. An empty channel list falls back to the stderr log
    /// channel at the default timeout.
    #[must_use]
    pub fn slowest_channel_timeout(&self) -> Duration {
        self.channels.iter().map(ChannelConfig::effective_timeout).max().unwrap_or(DEFAULT_CHANNEL_TIMEOUT)
    }

    /// Returns the runtime aggregation rule.
    #[must_use]
    pub fn aggregation_rule(&self) -> AggregationRule {
        match self.aggregation {
            AggregationKind::Primary => AggregationRule::Primary(ChannelName::new(self.primary_channel.clone())),
            AggregationKind::Any => AggregationRule::Any,
            AggregationKind::All => AggregationRule::All,
        }
    }

    /// Returns the runtime publish queue settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a duration overflows.
    pub fn queue_config(&self) -> Result<PublishQueueConfig, ConfigError> {
        Ok(PublishQueueConfig {
            retry: RetryPolicy {
                max_retries: self.max_retries,
                backoff_base_millis: millis_i64("publish.backoff_base_ms", self.backoff_base_ms)?,
                backoff_max_millis: millis_i64("publish.backoff_max_ms", self.backoff_max_ms)?,
            },
            aggregation: self.aggregation_rule(),
            claim_lease_millis: millis_i64("publish.claim_lease_ms", self.claim_lease_ms)?,
        })
    }
}

/// One configured publish channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChannelConfig {
    /// Broadcast channel posted through a bot API.
    Broadcast(BroadcastChannelConfig),
    /// Bot service webhook.
    Bot(BotChannelConfig),
    /// Newsletter provider campaign.
    EmailList(EmailListChannelConfig),
    /// JSON lines written to stderr or a file.
    Log(LogChannelConfig),
}

impl ChannelConfig {
    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Broadcast(config) => &config.name,
            Self::Bot(config) => &config.name,
            Self::EmailList(config) => &config.name,
            Self::Log(config) => &config.name,
        }
    }

    /// Returns the per-channel timeout override.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        let timeout_ms = match self {
            Self::Broadcast(config) => config.timeout_ms,
            Self::Bot(config) => config.timeout_ms,
            Self::EmailList(config) => config.timeout_ms,
            Self::Log(config) => config.timeout_ms,
        };
        timeout_ms.map(Duration::from_millis)
    }

    /// Returns the timeout the broker applies to this channel.
    #[must_use]
    pub fn effective_timeout(&self) -> Duration {
        self.timeout().unwrap_or(DEFAULT_CHANNEL_TIMEOUT)
    }

    /// Validates a channel declaration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_name("publish.channels.name", self.name())?;
        if self.timeout() == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(format!(
                "publish channel {} timeout_ms must be greater than zero",
                self.name()
            )));
        }
        match self {
            Self::Broadcast(config) => {
                if let Some(api_base) = &config.api_base {
                    validate_http_url("publish.channels.api_base", api_base)?;
                }
                if config.chat_id.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "broadcast channel {} requires chat_id",
                        config.name
                    )));
                }
                validate_env_name("publish.channels.token_env", &config.token_env)
            }
            Self::Bot(config) => {
                validate_http_url("publish.channels.endpoint", &config.endpoint)?;
                validate_env_name("publish.channels.token_env", &config.token_env)
            }
            Self::EmailList(config) => {
                validate_http_url("publish.channels.api_base", &config.api_base)?;
                if config.list_id.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "email_list channel {} requires list_id",
                        config.name
                    )));
                }
                validate_env_name("publish.channels.api_key_env", &config.api_key_env)
            }
            Self::Log(config) => match &config.path {
                Some(path) => validate_path_string("publish.channels.path", &path.to_string_lossy()),
                None => Ok(()),
            },
        }
    }
}

/// Broadcast channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastChannelConfig {
    /// Channel name.
    pub name: String,
    /// Bot API base URL (provider default when omitted).
    #[serde(default)]
    pub api_base: Option<String>,
    /// Target chat or channel identifier.
    pub chat_id: String,
    /// Environment variable holding the bot token.
    pub token_env: String,
    /// Per-call timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Bot webhook channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BotChannelConfig {
    /// Channel name.
    pub name: String,
    /// Webhook URL.
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub token_env: String,
    /// Per-call timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Email list channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailListChannelConfig {
    /// Channel name.
    pub name: String,
    /// Provider API base URL.
    pub api_base: String,
    /// Target list identifier.
    pub list_id: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-call timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Log channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LogChannelConfig {
    /// Channel name.
    pub name: String,
    /// Output file (stderr when omitted).
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Per-call timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
    /// A referenced secret is missing from the environment.
    #[error("missing secret: environment variable {0} is not set")]
    Secret(String),
}

// ============================================================================
// SECTION: Secrets
// ============================================================================

/// Reads a secret from the environment variable `name`.
///
/// # Errors
///
/// Returns [`ConfigError::Secret`] when the variable is unset, empty, or not
/// valid unicode.
pub fn resolve_secret(name: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Secret(name.to_string())),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a path that must stay inside its base directory.
fn validate_relative_path(field: &str, path: &Path) -> Result<(), ConfigError> {
    validate_path_string(field, &path.to_string_lossy())?;
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be relative without parent components"
                )));
            }
        }
    }
    Ok(())
}

/// Validates a channel name or resource identifier.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() || value.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "{field} must be 1 to {MAX_NAME_LENGTH} characters"
        )));
    }
    let allowed = |ch: char| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_';
    if !value.chars().all(allowed) {
        return Err(ConfigError::Invalid(format!(
            "{field} must use lowercase letters, digits, '-' or '_': {value}"
        )));
    }
    Ok(())
}

/// Validates an environment variable name.
fn validate_env_name(field: &str, value: &str) -> Result<(), ConfigError> {
    let valid = !value.is_empty()
        && !value.starts_with(|ch: char| ch.is_ascii_digit())
        && value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if !valid {
        return Err(ConfigError::Invalid(format!("{field} must be an environment variable name")));
    }
    Ok(())
}

/// Validates an admin token.
fn validate_admin_token(token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::Invalid("admin token must be non-empty".to_string()));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid("admin token must not contain whitespace".to_string()));
    }
    if token.len() < MIN_ADMIN_TOKEN_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "admin token must be at least {MIN_ADMIN_TOKEN_LENGTH} characters"
        )));
    }
    if token.len() > MAX_ADMIN_TOKEN_LENGTH {
        return Err(ConfigError::Invalid("admin token too long".to_string()));
    }
    Ok(())
}

/// Validates an http(s) URL without pulling in a URL parser.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"))
        .ok_or_else(|| ConfigError::Invalid(format!("{field} must be an http or https URL")))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} must include a host")));
    }
    Ok(())
}

/// Converts a millisecond setting to the runtime's signed representation.
fn millis_i64(field: &str, value: u64) -> Result<i64, ConfigError> {
    i64::try_from(value).map_err(|_| ConfigError::Invalid(format!("{field} is too large")))
}

/// Converts a token lifetime in seconds to milliseconds.
fn ttl_millis(secs: u64) -> Result<i64, ConfigError> {
    secs.checked_mul(1_000)
        .and_then(|millis| i64::try_from(millis).ok())
        .ok_or_else(|| ConfigError::Invalid("entitlements.token_ttl_secs is too large".to_string()))
}

/// Default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default `SQLite` busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

/// Default per-purchase download limit.
const fn default_max_downloads() -> u32 {
    DEFAULT_MAX_DOWNLOADS
}

/// Default token lifetime.
const fn default_token_ttl_secs() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

/// Default artifacts directory.
fn default_artifacts_root() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACTS_ROOT)
}

/// Default artifact fetch timeout.
fn default_fetch_timeout_ms() -> u64 {
    u64::try_from(DEFAULT_FETCH_TIMEOUT.as_millis()).unwrap_or(u64::MAX)
}

/// Returns true.
const fn default_true() -> bool {
    true
}

/// Default manifest entry path.
fn default_manifest_path() -> String {
    DEFAULT_MANIFEST_PATH.to_string()
}

/// Default retry budget.
const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// Default first backoff delay.
fn default_backoff_base_ms() -> u64 {
    u64::try_from(DEFAULT_BACKOFF_BASE_MILLIS).unwrap_or_default()
}

/// Default backoff ceiling.
fn default_backoff_max_ms() -> u64 {
    u64::try_from(DEFAULT_BACKOFF_MAX_MILLIS).unwrap_or_default()
}

/// Default batch size.
const fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}

/// Default claim lease.
fn default_claim_lease_ms() -> u64 {
    u64::try_from(DEFAULT_CLAIM_LEASE_MILLIS).unwrap_or_default()
}

/// Default primary channel.
fn default_primary_channel() -> String {
    DEFAULT_PRIMARY_CHANNEL.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
