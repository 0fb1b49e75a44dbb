// content-gate-core/src/core/audit.rs
// ============================================================================
// Module: Content Gate Audit Events
// Description: Structured audit payloads for downloads and publishing.
// Purpose: Give operators a redacted, machine-readable trail of side effects.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Audit events are emitted through [`crate::interfaces::AuditSink`] and
//! serialize as one JSON object per line with an `event` tag. Download
//! tokens never appear in audit payloads; purchases are referenced by
//! purchase ID.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::core::entitlement::CountOutcome;
use crate::core::entitlement::Rejection;
use crate::core::identifiers::ContentId;
use crate::core::identifiers::PurchaseId;
use crate::core::identifiers::ResourceId;
use crate::core::identifiers::TaskId;
use crate::core::publish::ChannelOutcome;
use crate::core::publish::ContentType;
use crate::core::publish::TaskStatus;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A file was served.
    DownloadServed {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Purchase served.
        purchase_id: PurchaseId,
        /// Resource served.
        resource_id: ResourceId,
        /// Watermark status label.
        watermark: &'static str,
        /// Counter outcome.
        counted: CountOutcome,
        /// Response size in bytes.
        bytes: usize,
    },
    /// A download request was refused.
    DownloadRejected {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Rejection reason.
        reason: Rejection,
    },
    /// Personalization failed and the original bytes were served.
    WatermarkFallback {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Purchase served.
        purchase_id: PurchaseId,
        /// Failure reason.
        reason: String,
    },
    /// The download counter could not be updated after serving.
    CountingFailed {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Purchase served.
        purchase_id: PurchaseId,
        /// Failure detail.
        detail: String,
    },
    /// A publish task attempt settled.
    PublishTaskSettled {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Task identifier.
        task_id: TaskId,
        /// Resulting status.
        status: TaskStatus,
        /// Retry count after the attempt.
        retry_count: u32,
        /// Channel outcomes for this attempt.
        outcomes: Vec<ChannelOutcome>,
    },
    /// An immediate publish was dispatched.
    PublishDispatched {
        /// Event time.
        timestamp_ms: Timestamp,
        /// Content kind.
        content_type: ContentType,
        /// Content identifier.
        content_id: ContentId,
        /// Aggregated success.
        success: bool,
        /// Channel outcomes.
        outcomes: Vec<ChannelOutcome>,
    },
}

impl AuditEvent {
    /// Returns the stable event label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DownloadServed { .. } => "download_served",
            Self::DownloadRejected { .. } => "download_rejected",
            Self::WatermarkFallback { .. } => "watermark_fallback",
            Self::CountingFailed { .. } => "counting_failed",
            Self::PublishTaskSettled { .. } => "publish_task_settled",
            Self::PublishDispatched { .. } => "publish_dispatched",
        }
    }
}
