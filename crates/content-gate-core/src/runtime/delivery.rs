// content-gate-core/src/runtime/delivery.rs
// ============================================================================
// Module: Delivery Service
// Description: Single-download pipeline from token to served bytes.
// Purpose: Authorize, fetch, personalize, serve, and count one download.
// Dependencies: bytes, crate::{core, interfaces}, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! A download moves through [`DeliveryStage`]s:
//! `Authorizing -> Fetching -> Personalizing -> Serving -> Counting`.
//! Authorization is fail-closed and short-circuits with no side effects.
//! Fetch failures surface as [`DeliveryError::StorageUnavailable`] and a
//! failed structural check as [`DeliveryError::CorruptSource`]. Past that
//! point the purchaser always receives bytes: a personalization failure
//! falls back to the original file, and a counting failure is logged and
//! audited without undoing the delivery.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::artifact::PersonalizationMeta;
use crate::core::artifact::StoredArtifact;
use crate::core::audit::AuditEvent;
use crate::core::entitlement::AuthDecision;
use crate::core::entitlement::CountOutcome;
use crate::core::entitlement::EntitlementRecord;
use crate::core::entitlement::Rejection;
use crate::core::identifiers::DownloadToken;
use crate::core::identifiers::PurchaseId;
use crate::interfaces::ArtifactStore;
use crate::interfaces::AuditSink;
use crate::interfaces::Clock;
use crate::interfaces::StoreError;
use crate::interfaces::Watermarker;
use crate::runtime::token_gate::TokenGate;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default artifact fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivery pipeline settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Upper bound on a single artifact fetch.
    pub fetch_timeout: Duration,
    /// Personalize zip-based artifacts when true.
    pub watermark_enabled: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            watermark_enabled: true,
        }
    }
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Pipeline stage, used for structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStage {
    /// Checking the token.
    Authorizing,
    /// Loading artifact bytes.
    Fetching,
    /// Embedding purchaser metadata.
    Personalizing,
    /// Handing bytes to the caller.
    Serving,
    /// Incrementing the download counter.
    Counting,
}

impl DeliveryStage {
    /// Returns a stable label for this stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorizing => "authorizing",
            Self::Fetching => "fetching",
            Self::Personalizing => "personalizing",
            Self::Serving => "serving",
            Self::Counting => "counting",
        }
    }
}

/// Personalization result for a served file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkStatus {
    /// Personalized copy served.
    Applied,
    /// Not attempted (disabled or not a zip-based format).
    Skipped,
    /// Personalization failed; original bytes served.
    Fallback {
        /// Failure reason.
        reason: String,
    },
}

impl WatermarkStatus {
    /// Returns a stable label for this status.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Fallback { .. } => "fallback",
        }
    }
}

/// A served download.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Response body.
    pub bytes: Bytes,
    /// File name offered to the purchaser.
    pub filename: String,
    /// HTTP content type.
    pub content_type: &'static str,
    /// Personalization result.
    pub watermark: WatermarkStatus,
    /// Counter result.
    pub counted: CountOutcome,
    /// Purchase served.
    pub purchase_id: PurchaseId,
}

/// Download errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Token gate refused the request.
    #[error("download rejected: {}", .0.label())]
    Rejected(Rejection),
    /// Artifact could not be fetched in time.
    #[error("artifact storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Artifact bytes failed the structural check.
    #[error("artifact is corrupt: {0}")]
    CorruptSource(String),
    /// Entitlement store failure during authorization.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Download pipeline.
#[derive(Clone)]
pub struct DeliveryService {
    /// Token gate.
    gate: TokenGate,
    /// Artifact source.
    artifacts: Arc<dyn ArtifactStore>,
    /// Container personalizer.
    watermarker: Arc<dyn Watermarker>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Settings.
    config: DeliveryConfig,
}

impl DeliveryService {
    /// Creates a delivery service.
    #[must_use]
    pub fn new(
        gate: TokenGate,
        artifacts: Arc<dyn ArtifactStore>,
        watermarker: Arc<dyn Watermarker>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            gate,
            artifacts,
            watermarker,
            audit,
            clock,
            config,
        }
    }

    /// Serves one download for `token`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Rejected`] when the gate refuses,
    /// [`DeliveryError::StorageUnavailable`] or [`DeliveryError::CorruptSource`]
    /// when the artifact cannot be served, and [`DeliveryError::Store`] when the
    /// entitlement store cannot be read.
    pub async fn download(&self, token: &DownloadToken) -> Result<Delivery, DeliveryError> {
        debug!(stage = DeliveryStage::Authorizing.as_str(), "download requested");
        let record = match self.gate.authorize(token, self.clock.now())? {
            AuthDecision::Authorized(record) => record,
            AuthDecision::Rejected(rejection) => {
                info!(reason = rejection.label(), "download rejected");
                self.audit.record(&AuditEvent::DownloadRejected {
                    timestamp_ms: self.clock.now(),
                    reason: rejection,
                });
                return Err(DeliveryError::Rejected(rejection));
            }
        };

        debug!(stage = DeliveryStage::Fetching.as_str(), purchase_id = %record.purchase_id);
        let artifact = self.fetch(&record).await?;
        artifact
            .format
            .check_signature(&artifact.bytes)
            .map_err(DeliveryError::CorruptSource)?;

        let (bytes, watermark) = self.personalize(&record, &artifact).await;

        debug!(stage = DeliveryStage::Serving.as_str(), purchase_id = %record.purchase_id, bytes = bytes.len());
        let counted = self.count(token, &record);
        self.audit.record(&AuditEvent::DownloadServed {
            timestamp_ms: self.clock.now(),
            purchase_id: record.purchase_id.clone(),
            resource_id: record.resource_id.clone(),
            watermark: watermark.label(),
            counted,
            bytes: bytes.len(),
        });
        Ok(Delivery {
            bytes,
            filename: artifact.filename,
            content_type: artifact.format.content_type(),
            watermark,
            counted,
            purchase_id: record.purchase_id,
        })
    }

    /// Fetches the artifact under the configured timeout.
    async fn fetch(&self, record: &EntitlementRecord) -> Result<StoredArtifact, DeliveryError> {
        let fetch = self.artifacts.fetch(&record.resource_id);
        match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(err)) => {
                warn!(resource_id = %record.resource_id, error = %err, "artifact fetch failed");
                Err(DeliveryError::StorageUnavailable(err.to_string()))
            }
            Err(_) => {
                warn!(
                    resource_id = %record.resource_id,
                    timeout = ?self.config.fetch_timeout,
                    "artifact fetch timed out"
                );
                Err(DeliveryError::StorageUnavailable("artifact fetch timed out".to_string()))
            }
        }
    }

    /// Personalizes zip-based artifacts, falling back to the original bytes.
    async fn personalize(
        &self,
        record: &EntitlementRecord,
        artifact: &StoredArtifact,
    ) -> (Bytes, WatermarkStatus) {
        if !self.config.watermark_enabled || !artifact.format.is_zip_based() {
            return (artifact.bytes.clone(), WatermarkStatus::Skipped);
        }
        let Some(meta) = PersonalizationMeta::from_record(record) else {
            return self.fallback(record, artifact, "record has no download token".to_string());
        };
        debug!(stage = DeliveryStage::Personalizing.as_str(), purchase_id = %record.purchase_id);
        let watermarker = Arc::clone(&self.watermarker);
        let raw = artifact.bytes.clone();
        let result = tokio::task::spawn_blocking(move || watermarker.personalize(&raw, &meta)).await;
        match result {
            Ok(Ok(bytes)) => (Bytes::from(bytes), WatermarkStatus::Applied),
            Ok(Err(err)) => self.fallback(record, artifact, err.to_string()),
            Err(err) => self.fallback(record, artifact, format!("personalization task failed: {err}")),
        }
    }

    /// Logs and audits a personalization fallback.
    fn fallback(
        &self,
        record: &EntitlementRecord,
        artifact: &StoredArtifact,
        reason: String,
    ) -> (Bytes, WatermarkStatus) {
        warn!(purchase_id = %record.purchase_id, reason = %reason, "watermark failed; serving original bytes");
        self.audit.record(&AuditEvent::WatermarkFallback {
            timestamp_ms: self.clock.now(),
            purchase_id: record.purchase_id.clone(),
            reason: reason.clone(),
        });
        (
            artifact.bytes.clone(),
            WatermarkStatus::Fallback {
                reason,
            },
        )
    }

    /// Counts the download; failures never undo the delivery.
    fn count(&self, token: &DownloadToken, record: &EntitlementRecord) -> CountOutcome {
        debug!(stage = DeliveryStage::Counting.as_str(), purchase_id = %record.purchase_id);
        match self.gate.record_download(token, self.clock.now()) {
            Ok(CountOutcome::Counted) => CountOutcome::Counted,
            Ok(CountOutcome::NotCounted) => {
                warn!(purchase_id = %record.purchase_id, "download served but counter update matched no row");
                self.audit.record(&AuditEvent::CountingFailed {
                    timestamp_ms: self.clock.now(),
                    purchase_id: record.purchase_id.clone(),
                    detail: "conditional update matched no row".to_string(),
                });
                CountOutcome::NotCounted
            }
            Err(err) => {
                error!(purchase_id = %record.purchase_id, error = %err, "download counter update failed");
                self.audit.record(&AuditEvent::CountingFailed {
                    timestamp_ms: self.clock.now(),
                    purchase_id: record.purchase_id.clone(),
                    detail: err.to_string(),
                });
                CountOutcome::NotCounted
            }
        }
    }
}
