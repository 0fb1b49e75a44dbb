// content-gate-core/src/runtime/ledger.rs
// ============================================================================
// Module: Purchase Ledger
// Description: Purchase intent, payment confirmation, cancellation, and refund.
// Purpose: Own the entitlement lifecycle up to the point a token is minted.
// Dependencies: crate::{core, interfaces}, thiserror, tracing
// ============================================================================

//! ## Overview
//! The ledger records a pending purchase, mints a token when payment is
//! confirmed, and applies cancel/refund transitions. It is the only writer of
//! entitlement records outside the download counter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::core::entitlement::EntitlementRecord;
use crate::core::entitlement::NewPurchase;
use crate::core::entitlement::PaymentConfirmation;
use crate::core::entitlement::PaymentStatus;
use crate::core::identifiers::PurchaseId;
use crate::core::identifiers::ResourceId;
use crate::interfaces::Clock;
use crate::interfaces::EntitlementStore;
use crate::interfaces::StoreError;
use crate::runtime::token::mint_download_token;

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Default download limit per purchase.
pub const DEFAULT_MAX_DOWNLOADS: u32 = 5;

/// Default token lifetime (30 days).
pub const DEFAULT_TOKEN_TTL_MILLIS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Token minting attempts before a collision is reported.
const MINT_ATTEMPTS: usize = 3;

/// Entitlement defaults applied at purchase and confirmation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    /// Download limit applied when the caller does not pick one.
    pub default_max_downloads: u32,
    /// Token lifetime counted from payment confirmation.
    pub token_ttl_millis: i64,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            default_max_downloads: DEFAULT_MAX_DOWNLOADS,
            token_ttl_millis: DEFAULT_TOKEN_TTL_MILLIS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Purchase ledger errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Request fields are invalid.
    #[error("invalid purchase: {0}")]
    Invalid(String),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Ledger
// ============================================================================

/// Purchase intent request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Unique purchase identifier.
    pub purchase_id: PurchaseId,
    /// Purchased resource.
    pub resource_id: ResourceId,
    /// Purchaser email.
    pub purchaser_email: String,
    /// Purchaser display name.
    pub purchaser_name: String,
    /// Download limit override.
    pub max_downloads: Option<u32>,
}

/// Entitlement lifecycle service.
#[derive(Clone)]
pub struct PurchaseLedger {
    /// Backing store.
    store: Arc<dyn EntitlementStore>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Defaults.
    policy: EntitlementPolicy,
}

impl PurchaseLedger {
    /// Creates a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn EntitlementStore>, clock: Arc<dyn Clock>, policy: EntitlementPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    /// Records a pending purchase with no token.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Invalid`] for empty identity fields or a zero
    /// download limit, and [`LedgerError::Store`] when the insert fails.
    pub fn create_purchase(&self, request: PurchaseRequest) -> Result<EntitlementRecord, LedgerError> {
        if request.purchase_id.as_str().trim().is_empty() {
            return Err(LedgerError::Invalid("purchase_id is empty".to_string()));
        }
        if request.resource_id.as_str().trim().is_empty() {
            return Err(LedgerError::Invalid("resource_id is empty".to_string()));
        }
        if !request.purchaser_email.contains('@') {
            return Err(LedgerError::Invalid("purchaser_email is not an address".to_string()));
        }
        let max_downloads = request.max_downloads.unwrap_or(self.policy.default_max_downloads);
        if max_downloads == 0 {
            return Err(LedgerError::Invalid("max_downloads must be at least 1".to_string()));
        }
        let purchase = NewPurchase {
            purchase_id: request.purchase_id,
            resource_id: request.resource_id,
            purchaser_email: request.purchaser_email,
            purchaser_name: request.purchaser_name,
            max_downloads,
        };
        let record = self.store.create_purchase(&purchase, self.clock.now())?;
        info!(purchase_id = %record.purchase_id, resource_id = %record.resource_id, "purchase recorded");
        Ok(record)
    }

    /// Confirms payment and mints a download token.
    ///
    /// Confirming an already-paid purchase returns the existing token.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] for unknown or closed purchases, or when
    /// every minted token collides.
    pub fn confirm_payment(&self, purchase_id: &PurchaseId) -> Result<EntitlementRecord, LedgerError> {
        let now = self.clock.now();
        let mut last_conflict = None;
        for _ in 0..MINT_ATTEMPTS {
            let confirmation = PaymentConfirmation {
                purchase_id: purchase_id.clone(),
                token: mint_download_token(),
                expires_at: now.saturating_add_millis(self.policy.token_ttl_millis),
                paid_at: now,
            };
            match self.store.confirm_payment(&confirmation) {
                Ok(record) => {
                    info!(purchase_id = %record.purchase_id, "payment confirmed");
                    return Ok(record);
                }
                Err(StoreError::Conflict(detail)) if detail.contains("token") => {
                    last_conflict = Some(detail);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(StoreError::Conflict(last_conflict.unwrap_or_else(|| "token collision".to_string())).into())
    }

    /// Cancels a pending purchase.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the purchase is unknown or already paid.
    pub fn cancel(&self, purchase_id: &PurchaseId) -> Result<EntitlementRecord, LedgerError> {
        let record = self.store.set_payment_status(purchase_id, PaymentStatus::Cancelled)?;
        info!(purchase_id = %purchase_id, "purchase cancelled");
        Ok(record)
    }

    /// Refunds a paid purchase; its token stops authorizing downloads.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when the purchase is unknown or not paid.
    pub fn refund(&self, purchase_id: &PurchaseId) -> Result<EntitlementRecord, LedgerError> {
        let record = self.store.set_payment_status(purchase_id, PaymentStatus::Refunded)?;
        info!(purchase_id = %purchase_id, "purchase refunded");
        Ok(record)
    }

    /// Loads a purchase record.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Store`] when loading fails.
    pub fn find(&self, purchase_id: &PurchaseId) -> Result<Option<EntitlementRecord>, LedgerError> {
        Ok(self.store.find_by_purchase(purchase_id)?)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
