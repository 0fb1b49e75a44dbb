// content-gate-server/src/services.rs
// ============================================================================
// Module: Service Assembly
// Description: Wires stores, channels, and runtime services from configuration.
// Purpose: Give the HTTP surface and the CLI one shared service graph.
// Dependencies: content-gate-{core, config, broker, store-sqlite, watermark}
// ============================================================================

//! ## Overview
//! [`Services::from_config`] opens the configured store, resolves channel
//! secrets from the environment, and builds the purchase ledger, delivery
//! pipeline, and publish queue over shared handles. A missing secret stops
//! assembly. With no `[[publish.channels]]` declared, a stderr log channel
//! named `log` is registered so the queue still has a destination.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::sync::Arc;

use content_gate_broker::BotChannel;
use content_gate_broker::BotConfig;
use content_gate_broker::BroadcastChannel;
use content_gate_broker::BroadcastConfig;
use content_gate_broker::Channel;
use content_gate_broker::EmailListChannel;
use content_gate_broker::EmailListConfig;
use content_gate_broker::FanoutBroker;
use content_gate_broker::LogChannel;
use content_gate_config::ChannelConfig;
use content_gate_config::ContentGateConfig;
use content_gate_config::PublishConfig;
use content_gate_config::StoreConfig;
use content_gate_config::StoreType;
use content_gate_config::resolve_secret;
use content_gate_core::AuditSink;
use content_gate_core::ChannelDispatcher;
use content_gate_core::Clock;
use content_gate_core::ContentCatalog;
use content_gate_core::DeliveryService;
use content_gate_core::EntitlementStore;
use content_gate_core::InMemoryContentCatalog;
use content_gate_core::InMemoryEntitlementStore;
use content_gate_core::InMemoryPublishTaskStore;
use content_gate_core::PublishQueue;
use content_gate_core::PublishTaskStore;
use content_gate_core::PurchaseLedger;
use content_gate_core::SystemClock;
use content_gate_core::TokenGate;
use content_gate_store_sqlite::SqliteStore;
use content_gate_watermark::ZipWatermarker;
use tracing::info;
use tracing::warn;

use crate::artifacts::FileArtifactStore;
use crate::audit::build_audit_sink;
use crate::server::ServerError;

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Store handles shared by every service.
#[derive(Clone)]
pub struct Stores {
    /// Purchases and download counters.
    pub entitlements: Arc<dyn EntitlementStore>,
    /// Publish tasks.
    pub tasks: Arc<dyn PublishTaskStore>,
    /// Publishable content.
    pub catalog: Arc<dyn ContentCatalog>,
}

impl Stores {
    /// Returns fresh in-memory stores.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            entitlements: Arc::new(InMemoryEntitlementStore::new()),
            tasks: Arc::new(InMemoryPublishTaskStore::new()),
            catalog: Arc::new(InMemoryContentCatalog::new()),
        }
    }

    /// Opens the stores selected by `[store]`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the sqlite path is missing and
    /// [`ServerError::Init`] when the database cannot be opened.
    pub fn from_config(config: &StoreConfig) -> Result<Self, ServerError> {
        match config.store_type {
            StoreType::Memory => {
                warn!("memory store selected; purchases and tasks are lost on restart");
                Ok(Self::in_memory())
            }
            StoreType::Sqlite => {
                let sqlite_config = config
                    .sqlite_config()
                    .ok_or_else(|| ServerError::Config("sqlite store requires path".to_string()))?;
                let path = sqlite_config.path.display().to_string();
                let store = SqliteStore::open(sqlite_config).map_err(|err| ServerError::Init(err.to_string()))?;
                info!(path = %path, "sqlite store opened");
                Ok(Self {
                    entitlements: Arc::new(store.clone()),
                    tasks: Arc::new(store.clone()),
                    catalog: Arc::new(store),
                })
            }
        }
    }
}

// ============================================================================
// SECTION: Services
// ============================================================================

/// Runtime services assembled from configuration.
#[derive(Clone)]
pub struct Services {
    /// Purchase lifecycle.
    pub ledger: PurchaseLedger,
    /// Download pipeline.
    pub delivery: DeliveryService,
    /// Publish queue and immediate publishing.
    pub queue: PublishQueue,
    /// Publishable content.
    pub catalog: Arc<dyn ContentCatalog>,
    /// Default batch size for queue processing.
    pub batch_limit: usize,
}

impl Services {
    /// Assembles services from configuration with the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when a store, sink, or channel cannot be built.
    pub fn from_config(config: &ContentGateConfig) -> Result<Self, ServerError> {
        let stores = Stores::from_config(&config.store)?;
        let dispatcher = build_dispatcher(&config.publish)?;
        let audit = build_audit_sink(&config.server.audit)?;
        Self::assemble(config, stores, Arc::new(dispatcher), audit, Arc::new(SystemClock))
    }

    /// Assembles services over explicit stores, dispatcher, sink, and clock.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when a resource declaration or duration
    /// is invalid.
    pub fn assemble(
        config: &ContentGateConfig,
        stores: Stores,
        dispatcher: Arc<dyn ChannelDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let policy = config.entitlements.policy().map_err(|err| ServerError::Config(err.to_string()))?;
        let queue_config = config.publish.queue_config().map_err(|err| ServerError::Config(err.to_string()))?;
        let artifacts =
            FileArtifactStore::from_config(&config.delivery).map_err(|err| ServerError::Config(err.to_string()))?;
        if artifacts.resource_ids().is_empty() {
            warn!("no delivery resources declared; every download will fail");
        }
        let watermarker =
            ZipWatermarker::new(config.delivery.watermark.manifest_path.clone()).with_clock(Arc::clone(&clock));

        let ledger = PurchaseLedger::new(Arc::clone(&stores.entitlements), Arc::clone(&clock), policy);
        let delivery = DeliveryService::new(
            TokenGate::new(Arc::clone(&stores.entitlements)),
            Arc::new(artifacts),
            Arc::new(watermarker),
            Arc::clone(&audit),
            Arc::clone(&clock),
            config.delivery.runtime_config(),
        );
        let queue = PublishQueue::new(
            Arc::clone(&stores.tasks),
            Arc::clone(&stores.catalog),
            dispatcher,
            audit,
            clock,
            queue_config,
        );
        Ok(Self {
            ledger,
            delivery,
            queue,
            catalog: stores.catalog,
            batch_limit: config.publish.batch_limit,
        })
    }
}

// ============================================================================
// SECTION: Channels
// ============================================================================

/// Builds the fan-out broker from `[[publish.channels]]`.
///
/// # Errors
///
/// Returns [`ServerError::Config`] when a secret is missing or a channel is
/// rejected, and [`ServerError::Init`] when a log file cannot be opened.
pub fn build_dispatcher(config: &PublishConfig) -> Result<FanoutBroker, ServerError> {
    let mut builder = FanoutBroker::builder();
    if config.channels.is_empty() {
        warn!("no publish channels configured; announcements go to a stderr log channel");
        builder = builder.channel(LogChannel::new("log", std::io::stderr()));
    }
    for declared in &config.channels {
        let timeout = declared.effective_timeout();
        let channel = build_channel(declared, timeout)?;
        info!(channel = declared.name(), timeout = ?timeout, "publish channel registered");
        builder = builder.shared_channel(channel, timeout);
    }
    builder.build().map_err(|err| ServerError::Config(err.to_string()))
}

/// Builds one channel adapter.
fn build_channel(declared: &ChannelConfig, timeout: std::time::Duration) -> Result<Arc<dyn Channel>, ServerError> {
    let secret = |name: &str| resolve_secret(name).map_err(|err| ServerError::Config(err.to_string()));
    let rejected = |err: content_gate_broker::ChannelError| ServerError::Config(err.to_string());
    let channel: Arc<dyn Channel> = match declared {
        ChannelConfig::Broadcast(config) => {
            let token = secret(&config.token_env)?;
            let mut settings = BroadcastConfig::new(config.name.clone(), token, config.chat_id.clone());
            if let Some(api_base) = &config.api_base {
                settings = settings.with_api_base(api_base.clone());
            }
            settings.timeout = timeout;
            Arc::new(BroadcastChannel::new(settings).map_err(rejected)?)
        }
        ChannelConfig::Bot(config) => {
            let mut settings = BotConfig::new(config.name.clone(), config.endpoint.clone(), secret(&config.token_env)?);
            settings.timeout = timeout;
            Arc::new(BotChannel::new(settings).map_err(rejected)?)
        }
        ChannelConfig::EmailList(config) => {
            let mut settings = EmailListConfig::new(
                config.name.clone(),
                config.api_base.clone(),
                secret(&config.api_key_env)?,
                config.list_id.clone(),
            );
            settings.timeout = timeout;
            Arc::new(EmailListChannel::new(settings).map_err(rejected)?)
        }
        ChannelConfig::Log(config) => match &config.path {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| ServerError::Init(format!("log channel {} open failed: {err}", config.name)))?;
                Arc::new(LogChannel::new(config.name.clone(), file))
            }
            None => Arc::new(LogChannel::new(config.name.clone(), std::io::stderr())),
        },
    };
    Ok(channel)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use content_gate_config::ContentGateConfig;
    use content_gate_core::ChannelDispatcher;
    use content_gate_core::ChannelName;

    use super::build_dispatcher;

    #[test]
    fn empty_channel_list_falls_back_to_log() {
        let config = ContentGateConfig::default();
        let broker = build_dispatcher(&config.publish).unwrap();
        assert_eq!(broker.channels(), vec![ChannelName::new("log")]);
    }

    #[test]
    fn log_channels_open_their_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("announcements.jsonl");
        let toml = format!(
            "[publish]\nprimary_channel = \"audit-log\"\n[[publish.channels]]\ntype = \"log\"\nname = \"audit-log\"\npath = {:?}\n",
            path.display().to_string()
        );
        let config = ContentGateConfig::from_toml(&toml).unwrap();
        let broker = build_dispatcher(&config.publish).unwrap();
        assert_eq!(broker.channels(), vec![ChannelName::new("audit-log")]);
        assert!(path.exists());
    }

    #[test]
    fn missing_channel_secret_stops_assembly() {
        let toml = "[publish]\n[[publish.channels]]\ntype = \"broadcast\"\nname = \"broadcast\"\nchat_id = \"@news\"\ntoken_env = \"CONTENT_GATE_TEST_UNSET_BROADCAST_TOKEN\"\n";
        let config = ContentGateConfig::from_toml(toml).unwrap();
        let err = build_dispatcher(&config.publish).err().unwrap();
        assert!(err.to_string().contains("CONTENT_GATE_TEST_UNSET_BROADCAST_TOKEN"));
    }
}
