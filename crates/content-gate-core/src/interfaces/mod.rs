// content-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Content Gate Interfaces
// Description: Backend-agnostic interfaces for storage, artifacts, and delivery.
// Purpose: Define the contract surfaces used by the Content Gate runtime.
// Dependencies: async-trait, crate::core, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Content Gate integrates with persistence, artifact
//! storage, container personalization, and outbound channels. Store traits
//! are synchronous and must make their contended updates conditional so that
//! concurrent callers never exceed a download limit or double-claim a task.
//! Artifact fetch and channel dispatch are async because they cross the
//! network or the filesystem.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::artifact::PersonalizationMeta;
use crate::core::artifact::StoredArtifact;
use crate::core::audit::AuditEvent;
use crate::core::entitlement::CountOutcome;
use crate::core::entitlement::EntitlementRecord;
use crate::core::entitlement::NewPurchase;
use crate::core::entitlement::PaymentConfirmation;
use crate::core::entitlement::PaymentStatus;
use crate::core::identifiers::ChannelName;
use crate::core::identifiers::ContentId;
use crate::core::identifiers::DownloadToken;
use crate::core::identifiers::PurchaseId;
use crate::core::identifiers::ResourceId;
use crate::core::identifiers::TaskId;
use crate::core::publish::ChannelMessage;
use crate::core::publish::ChannelOutcome;
use crate::core::publish::ContentType;
use crate::core::publish::NewPublishTask;
use crate::core::publish::PublishTask;
use crate::core::publish::PublishableContent;
use crate::core::publish::TaskFilter;
use crate::core::publish::TaskResolution;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Store errors shared by entitlement, task, and catalog stores.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails integrity checks.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Store schema version is incompatible.
    #[error("store version mismatch: {0}")]
    VersionMismatch(String),
    /// Input rejected by the store.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Referenced record does not exist.
    #[error("store record not found: {0}")]
    NotFound(String),
    /// Update conflicts with current state (uniqueness or lifecycle).
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Entitlement Store
// ============================================================================

/// Persistent purchase records and download rights.
pub trait EntitlementStore: Send + Sync {
    /// Records a purchase intent in the pending state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the purchase ID already exists.
    fn create_purchase(&self, purchase: &NewPurchase, now: Timestamp) -> Result<EntitlementRecord, StoreError>;

    /// Promotes a pending purchase to paid and binds the token.
    ///
    /// Confirming an already-paid purchase returns the record unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for unknown purchases and
    /// [`StoreError::Conflict`] for cancelled/refunded purchases or token collisions.
    fn confirm_payment(&self, confirmation: &PaymentConfirmation) -> Result<EntitlementRecord, StoreError>;

    /// Moves a purchase to `status` when the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] for illegal transitions, including any
    /// attempt to reach `paid` without a confirmation.
    fn set_payment_status(
        &self,
        purchase_id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<EntitlementRecord, StoreError>;

    /// Loads a record by purchase identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn find_by_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<EntitlementRecord>, StoreError>;

    /// Loads a record by download token.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn find_by_token(&self, token: &DownloadToken) -> Result<Option<EntitlementRecord>, StoreError>;

    /// Conditionally increments the download counter.
    ///
    /// The update applies only while the record is paid and below its limit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update cannot be executed.
    fn record_download(&self, token: &DownloadToken, now: Timestamp) -> Result<CountOutcome, StoreError>;
}

// ============================================================================
// SECTION: Publish Task Store
// ============================================================================

/// Durable publish task queue.
pub trait PublishTaskStore: Send + Sync {
    /// Inserts a pending task eligible immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn enqueue(&self, task: &NewPublishTask, now: Timestamp) -> Result<PublishTask, StoreError>;

    /// Loads a task by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn get(&self, task_id: TaskId) -> Result<Option<PublishTask>, StoreError>;

    /// Lists tasks, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list(&self, filter: &TaskFilter) -> Result<Vec<PublishTask>, StoreError>;

    /// Returns up to `limit` pending task IDs due at `now`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn due_tasks(&self, limit: usize, now: Timestamp) -> Result<Vec<TaskId>, StoreError>;

    /// Claims a pending task; returns the claimed task only for the winner.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update cannot be executed.
    fn claim(&self, task_id: TaskId, now: Timestamp) -> Result<Option<PublishTask>, StoreError>;

    /// Settles the claim taken at `claimed_at`; returns false when that claim
    /// no longer holds (settled, expired, or re-claimed by another worker).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update cannot be executed.
    fn settle(
        &self,
        task_id: TaskId,
        claimed_at: Timestamp,
        resolution: &TaskResolution,
        now: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Lists processing tasks claimed before `claimed_before`, oldest claim first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn stale_claims(&self, claimed_before: Timestamp) -> Result<Vec<PublishTask>, StoreError>;
}

// ============================================================================
// SECTION: Content Catalog
// ============================================================================

/// Resolves publishable content by type and identifier.
pub trait ContentCatalog: Send + Sync {
    /// Loads a content item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn resolve(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<Option<PublishableContent>, StoreError>;

    /// Inserts or replaces a content item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert(&self, content: &PublishableContent) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Artifact fetch errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArtifactError {
    /// Resource is not declared.
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    /// Backing storage failed.
    #[error("artifact io error: {0}")]
    Io(String),
    /// Declaration is invalid (unsafe path, bad root).
    #[error("artifact declaration invalid: {0}")]
    Invalid(String),
}

/// Source of artifact bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetches the stored bytes for a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError`] when the resource is unknown or unreadable.
    async fn fetch(&self, resource_id: &ResourceId) -> Result<StoredArtifact, ArtifactError>;
}

// ============================================================================
// SECTION: Watermarker
// ============================================================================

/// Personalization errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatermarkError {
    /// Input is not a readable ZIP container.
    #[error("invalid container: {0}")]
    InvalidContainer(String),
    /// Rewriting the archive failed.
    #[error("archive rewrite failed: {0}")]
    Archive(String),
    /// Manifest encoding failed.
    #[error("manifest encoding failed: {0}")]
    Encode(String),
}

/// Embeds purchaser metadata into a container.
pub trait Watermarker: Send + Sync {
    /// Returns a personalized copy of `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`WatermarkError`] when the container cannot be personalized.
    fn personalize(&self, raw: &[u8], meta: &PersonalizationMeta) -> Result<Vec<u8>, WatermarkError>;
}

// ============================================================================
// SECTION: Channel Dispatcher
// ============================================================================

/// Fans a message out to registered channels.
#[async_trait]
pub trait ChannelDispatcher: Send + Sync {
    /// Returns registered channel names in registration order.
    fn channels(&self) -> Vec<ChannelName>;

    /// Delivers `message` to each channel in `channels`.
    ///
    /// Returns one outcome per requested channel, in registration order.
    /// Unknown names produce a failed outcome rather than an error.
    async fn dispatch(&self, message: &ChannelMessage, channels: &[ChannelName])
    -> Vec<ChannelOutcome>;
}

// ============================================================================
// SECTION: Audit and Time
// ============================================================================

/// Audit sink for structured events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Time source for runtime services.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}
