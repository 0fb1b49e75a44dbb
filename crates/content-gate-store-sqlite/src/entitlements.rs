// content-gate-store-sqlite/src/entitlements.rs
// ============================================================================
// Module: SQLite Entitlement Store
// Description: EntitlementStore over the `entitlements` table.
// Purpose: Persist purchases and enforce the download counter bound.
// Dependencies: content-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! Tokens are unique at the schema level, so a collision surfaces as a
//! constraint violation and becomes [`StoreError::Conflict`]. The counter
//! increment is one `UPDATE ... WHERE download_count < max_downloads`; the
//! row count decides whether the download was counted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use content_gate_core::CountOutcome;
use content_gate_core::DownloadToken;
use content_gate_core::EntitlementRecord;
use content_gate_core::EntitlementStore;
use content_gate_core::NewPurchase;
use content_gate_core::PaymentConfirmation;
use content_gate_core::PaymentStatus;
use content_gate_core::PurchaseId;
use content_gate_core::ResourceId;
use content_gate_core::StoreError;
use content_gate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::TransactionBehavior;
use rusqlite::params;

use crate::store::SqliteStore;
use crate::store::db_error;
use crate::store::is_constraint_violation;
use crate::store::opt_timestamp;
use crate::store::stored_u32;

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Column list shared by every entitlement query.
const COLUMNS: &str = "purchase_id, resource_id, purchaser_email, purchaser_name, download_token, \
                       token_expires_at, max_downloads, download_count, last_downloaded_at, \
                       payment_status, created_at, paid_at";

/// Raw entitlement row prior to validation.
#[allow(clippy::missing_docs_in_private_items, reason = "Fields mirror the table columns.")]
struct EntitlementRow {
    purchase_id: String,
    resource_id: String,
    purchaser_email: String,
    purchaser_name: String,
    download_token: Option<String>,
    token_expires_at: Option<i64>,
    max_downloads: i64,
    download_count: i64,
    last_downloaded_at: Option<i64>,
    payment_status: String,
    created_at: i64,
    paid_at: Option<i64>,
}

impl EntitlementRow {
    /// Reads a row selected with [`COLUMNS`].
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            purchase_id: row.get(0)?,
            resource_id: row.get(1)?,
            purchaser_email: row.get(2)?,
            purchaser_name: row.get(3)?,
            download_token: row.get(4)?,
            token_expires_at: row.get(5)?,
            max_downloads: row.get(6)?,
            download_count: row.get(7)?,
            last_downloaded_at: row.get(8)?,
            payment_status: row.get(9)?,
            created_at: row.get(10)?,
            paid_at: row.get(11)?,
        })
    }

    /// Validates the row into a domain record.
    fn into_record(self) -> Result<EntitlementRecord, StoreError> {
        let payment_status = PaymentStatus::parse(&self.payment_status).ok_or_else(|| {
            StoreError::Corrupt(format!("unknown payment status: {}", self.payment_status))
        })?;
        Ok(EntitlementRecord {
            purchase_id: PurchaseId::new(self.purchase_id),
            resource_id: ResourceId::new(self.resource_id),
            purchaser_email: self.purchaser_email,
            purchaser_name: self.purchaser_name,
            download_token: self.download_token.map(DownloadToken::new),
            token_expires_at: opt_timestamp(self.token_expires_at),
            max_downloads: stored_u32("max_downloads", self.max_downloads)?,
            download_count: stored_u32("download_count", self.download_count)?,
            last_downloaded_at: opt_timestamp(self.last_downloaded_at),
            payment_status,
            created_at: Timestamp::from_unix_millis(self.created_at),
            paid_at: opt_timestamp(self.paid_at),
        })
    }
}

/// Loads a record by purchase identifier on an open connection.
fn load_by_purchase(connection: &Connection, purchase_id: &str) -> Result<Option<EntitlementRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM entitlements WHERE purchase_id = ?1");
    let row = connection
        .query_row(&sql, params![purchase_id], EntitlementRow::read)
        .optional()
        .map_err(|err| db_error(&err))?;
    row.map(EntitlementRow::into_record).transpose()
}

/// Loads a record that must exist.
fn require_by_purchase(connection: &Connection, purchase_id: &PurchaseId) -> Result<EntitlementRecord, StoreError> {
    load_by_purchase(connection, purchase_id.as_str())?
        .ok_or_else(|| StoreError::NotFound(format!("purchase {purchase_id}")))
}

// ============================================================================
// SECTION: EntitlementStore
// ============================================================================

impl EntitlementStore for SqliteStore {
    fn create_purchase(&self, purchase: &NewPurchase, now: Timestamp) -> Result<EntitlementRecord, StoreError> {
        let connection = self.lock()?;
        connection
            .execute(
                "INSERT INTO entitlements (purchase_id, resource_id, purchaser_email, purchaser_name, \
                 max_downloads, download_count, payment_status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
                params![
                    purchase.purchase_id.as_str(),
                    purchase.resource_id.as_str(),
                    purchase.purchaser_email,
                    purchase.purchaser_name,
                    i64::from(purchase.max_downloads),
                    PaymentStatus::Pending.as_str(),
                    now.as_unix_millis(),
                ],
            )
            .map_err(|err| {
                if is_constraint_violation(&err) {
                    StoreError::Conflict(format!("purchase already exists: {}", purchase.purchase_id))
                } else {
                    db_error(&err)
                }
            })?;
        require_by_purchase(&connection, &purchase.purchase_id)
    }

    fn confirm_payment(&self, confirmation: &PaymentConfirmation) -> Result<EntitlementRecord, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let current = require_by_purchase(&tx, &confirmation.purchase_id)?;
        match current.payment_status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => return Ok(current),
            status @ (PaymentStatus::Cancelled | PaymentStatus::Refunded) => {
                return Err(StoreError::Conflict(format!(
                    "purchase is {} and cannot be confirmed",
                    status.as_str()
                )));
            }
        }
        tx.execute(
            "UPDATE entitlements
             SET payment_status = ?2, download_token = ?3, token_expires_at = ?4, paid_at = ?5
             WHERE purchase_id = ?1 AND payment_status = ?6",
            params![
                confirmation.purchase_id.as_str(),
                PaymentStatus::Paid.as_str(),
                confirmation.token.as_str(),
                confirmation.expires_at.as_unix_millis(),
                confirmation.paid_at.as_unix_millis(),
                PaymentStatus::Pending.as_str(),
            ],
        )
        .map_err(|err| {
            if is_constraint_violation(&err) {
                StoreError::Conflict("download token already in use".to_string())
            } else {
                db_error(&err)
            }
        })?;
        let updated = require_by_purchase(&tx, &confirmation.purchase_id)?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(updated)
    }

    fn set_payment_status(
        &self,
        purchase_id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<EntitlementRecord, StoreError> {
        let mut connection = self.lock()?;
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let current = require_by_purchase(&tx, purchase_id)?;
        let reaches_paid = status == PaymentStatus::Paid && current.payment_status != PaymentStatus::Paid;
        if reaches_paid || !current.payment_status.can_transition_to(status) {
            return Err(StoreError::Conflict(format!(
                "illegal payment transition {} -> {}",
                current.payment_status.as_str(),
                status.as_str()
            )));
        }
        let changed = tx
            .execute(
                "UPDATE entitlements SET payment_status = ?2 WHERE purchase_id = ?1 AND payment_status = ?3",
                params![purchase_id.as_str(), status.as_str(), current.payment_status.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        if changed != 1 {
            return Err(StoreError::Conflict("payment status changed concurrently".to_string()));
        }
        let updated = require_by_purchase(&tx, purchase_id)?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(updated)
    }

    fn find_by_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<EntitlementRecord>, StoreError> {
        let connection = self.lock()?;
        load_by_purchase(&connection, purchase_id.as_str())
    }

    fn find_by_token(&self, token: &DownloadToken) -> Result<Option<EntitlementRecord>, StoreError> {
        let connection = self.lock()?;
        let sql = format!("SELECT {COLUMNS} FROM entitlements WHERE download_token = ?1");
        let row = connection
            .query_row(&sql, params![token.as_str()], EntitlementRow::read)
            .optional()
            .map_err(|err| db_error(&err))?;
        row.map(EntitlementRow::into_record).transpose()
    }

    fn record_download(&self, token: &DownloadToken, now: Timestamp) -> Result<CountOutcome, StoreError> {
        let connection = self.lock()?;
        let changed = connection
            .execute(
                "UPDATE entitlements
                 SET download_count = download_count + 1, last_downloaded_at = ?2
                 WHERE download_token = ?1 AND payment_status = ?3 AND download_count < max_downloads",
                params![token.as_str(), now.as_unix_millis(), PaymentStatus::Paid.as_str()],
            )
            .map_err(|err| db_error(&err))?;
        Ok(if changed == 1 { CountOutcome::Counted } else { CountOutcome::NotCounted })
    }
}
