// content-gate-core/src/core/entitlement.rs
// ============================================================================
// Module: Content Gate Entitlements
// Description: Purchase entitlement records and authorization outcomes.
// Purpose: Model one purchaser's right to download one artifact.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! An [`EntitlementRecord`] is created when a purchase starts, gains a
//! download token when payment is confirmed, and is mutated afterwards only
//! by the download counter. Records are never deleted; cancellation and
//! refunds are status transitions.
//!
//! ## Invariants
//! - `download_count <= max_downloads`.
//! - `download_token` is present only once the record has been paid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::DownloadToken;
use crate::core::identifiers::PurchaseId;
use crate::core::identifiers::ResourceId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Payment Status
// ============================================================================

/// Payment lifecycle state of a purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Purchase intent recorded, payment not confirmed.
    Pending,
    /// Payment confirmed; the only status that grants downloads.
    Paid,
    /// Purchase abandoned before payment.
    Cancelled,
    /// Payment returned after confirmation.
    Refunded,
}

impl PaymentStatus {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Returns true when a move from `self` to `next` is a legal transition.
    ///
    /// Staying in the same status is accepted so repeated requests are idempotent.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Paid | Self::Refunded)
                | (Self::Cancelled, Self::Cancelled)
                | (Self::Refunded, Self::Refunded)
        )
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One purchaser's right to download one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Unique purchase identifier.
    pub purchase_id: PurchaseId,
    /// Purchased resource.
    pub resource_id: ResourceId,
    /// Purchaser email.
    pub purchaser_email: String,
    /// Purchaser display name.
    pub purchaser_name: String,
    /// Download token, set when payment is confirmed.
    pub download_token: Option<DownloadToken>,
    /// Token expiry.
    pub token_expires_at: Option<Timestamp>,
    /// Maximum counted downloads.
    pub max_downloads: u32,
    /// Counted downloads so far.
    pub download_count: u32,
    /// Last counted download.
    pub last_downloaded_at: Option<Timestamp>,
    /// Payment status.
    pub payment_status: PaymentStatus,
    /// Record creation time.
    pub created_at: Timestamp,
    /// Payment confirmation time.
    pub paid_at: Option<Timestamp>,
}

impl EntitlementRecord {
    /// Returns the number of downloads left before the limit.
    #[must_use]
    pub const fn remaining_downloads(&self) -> u32 {
        self.max_downloads.saturating_sub(self.download_count)
    }
}

/// Purchase intent captured before payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    /// Unique purchase identifier.
    pub purchase_id: PurchaseId,
    /// Purchased resource.
    pub resource_id: ResourceId,
    /// Purchaser email.
    pub purchaser_email: String,
    /// Purchaser display name.
    pub purchaser_name: String,
    /// Maximum counted downloads.
    pub max_downloads: u32,
}

/// Payment confirmation applied to a pending purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// Purchase being confirmed.
    pub purchase_id: PurchaseId,
    /// Freshly minted token to bind when the purchase is still pending.
    pub token: DownloadToken,
    /// Token expiry.
    pub expires_at: Timestamp,
    /// Confirmation time.
    pub paid_at: Timestamp,
}

// ============================================================================
// SECTION: Authorization Outcomes
// ============================================================================

/// Reason a download request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Token unknown.
    NotFound,
    /// Purchase is not in the paid state.
    PaymentIncomplete,
    /// Token expiry has passed or was never set.
    Expired,
    /// Download limit reached.
    LimitReached,
}

impl Rejection {
    /// Returns a stable label for logs and audit events.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PaymentIncomplete => "payment_incomplete",
            Self::Expired => "expired",
            Self::LimitReached => "limit_reached",
        }
    }

    /// Returns a purchaser-facing message that carries no identifiers.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotFound => "download link not found",
            Self::PaymentIncomplete => "payment has not been completed",
            Self::Expired => "download link has expired",
            Self::LimitReached => "download limit reached",
        }
    }
}

/// Token gate decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may receive the file.
    Authorized(EntitlementRecord),
    /// Request is refused.
    Rejected(Rejection),
}

/// Result of the conditional download counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountOutcome {
    /// The counter was incremented.
    Counted,
    /// The update matched no row (limit reached concurrently or status changed).
    NotCounted,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
