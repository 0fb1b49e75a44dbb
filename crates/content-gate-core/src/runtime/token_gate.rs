// content-gate-core/src/runtime/token_gate.rs
// ============================================================================
// Module: Token Gate
// Description: Download token authorization and counter bookkeeping.
// Purpose: Be the single authority for "may this request have the file".
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Authorization is a pure read: the gate loads the record for a token and
//! evaluates it against `now`. Checks run in a fixed order (existence,
//! payment, expiry, limit) so a request always gets the most fundamental
//! rejection. Counting is a separate conditional update owned by the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::entitlement::AuthDecision;
use crate::core::entitlement::CountOutcome;
use crate::core::entitlement::EntitlementRecord;
use crate::core::entitlement::PaymentStatus;
use crate::core::entitlement::Rejection;
use crate::core::identifiers::DownloadToken;
use crate::core::time::Timestamp;
use crate::interfaces::EntitlementStore;
use crate::interfaces::StoreError;
use crate::runtime::token::is_well_formed;

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates a loaded record at `now`.
///
/// # Errors
///
/// Returns the [`Rejection`] for the first failed check.
pub fn evaluate_entitlement(record: &EntitlementRecord, now: Timestamp) -> Result<(), Rejection> {
    if record.payment_status != PaymentStatus::Paid {
        return Err(Rejection::PaymentIncomplete);
    }
    match record.token_expires_at {
        Some(expires_at) if now <= expires_at => {}
        _ => return Err(Rejection::Expired),
    }
    if record.download_count >= record.max_downloads {
        return Err(Rejection::LimitReached);
    }
    Ok(())
}

// ============================================================================
// SECTION: Gate
// ============================================================================

/// Download token gate.
#[derive(Clone)]
pub struct TokenGate {
    /// Entitlement store.
    store: Arc<dyn EntitlementStore>,
}

impl TokenGate {
    /// Creates a gate over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn EntitlementStore>) -> Self {
        Self {
            store,
        }
    }

    /// Decides whether `token` may download at `now`. Has no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the store cannot be read.
    pub fn authorize(&self, token: &DownloadToken, now: Timestamp) -> Result<AuthDecision, StoreError> {
        if !is_well_formed(token.as_str()) {
            return Ok(AuthDecision::Rejected(Rejection::NotFound));
        }
        let Some(record) = self.store.find_by_token(token)? else {
            return Ok(AuthDecision::Rejected(Rejection::NotFound));
        };
        Ok(match evaluate_entitlement(&record, now) {
            Ok(()) => AuthDecision::Authorized(record),
            Err(rejection) => AuthDecision::Rejected(rejection),
        })
    }

    /// Counts a served download.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update cannot be executed.
    pub fn record_download(&self, token: &DownloadToken, now: Timestamp) -> Result<CountOutcome, StoreError> {
        self.store.record_download(token, now)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
