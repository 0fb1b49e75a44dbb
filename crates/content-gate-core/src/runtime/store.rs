// content-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Content Gate In-Memory Stores
// Description: Mutex-guarded entitlement, task, and catalog stores.
// Purpose: Provide reference store semantics for tests and single-process use.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! These stores hold state in maps behind a single mutex each. Every
//! conditional update (download counter, task claim, task settle) runs under
//! that lock, which gives the same "exactly one winner" behavior the SQLite
//! store gets from conditional `UPDATE` statements.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::entitlement::CountOutcome;
use crate::core::entitlement::EntitlementRecord;
use crate::core::entitlement::NewPurchase;
use crate::core::entitlement::PaymentConfirmation;
use crate::core::entitlement::PaymentStatus;
use crate::core::identifiers::ContentId;
use crate::core::identifiers::DownloadToken;
use crate::core::identifiers::PurchaseId;
use crate::core::identifiers::TaskId;
use crate::core::publish::ContentType;
use crate::core::publish::NewPublishTask;
use crate::core::publish::PublishTask;
use crate::core::publish::PublishableContent;
use crate::core::publish::TaskFilter;
use crate::core::publish::TaskResolution;
use crate::core::publish::TaskStatus;
use crate::core::time::Timestamp;
use crate::interfaces::ContentCatalog;
use crate::interfaces::EntitlementStore;
use crate::interfaces::PublishTaskStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Entitlement Store
// ============================================================================

/// Entitlement state guarded by one mutex.
#[derive(Debug, Default)]
struct EntitlementState {
    /// Records keyed by purchase identifier.
    records: BTreeMap<PurchaseId, EntitlementRecord>,
    /// Token to purchase index.
    tokens: BTreeMap<String, PurchaseId>,
}

/// In-memory entitlement store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlementStore {
    /// Shared state.
    state: Arc<Mutex<EntitlementState>>,
}

impl InMemoryEntitlementStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, mapping poisoning to a store error.
    fn lock(&self) -> Result<MutexGuard<'_, EntitlementState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("entitlement store mutex poisoned".to_string()))
    }
}

impl EntitlementStore for InMemoryEntitlementStore {
    fn create_purchase(&self, purchase: &NewPurchase, now: Timestamp) -> Result<EntitlementRecord, StoreError> {
        let mut state = self.lock()?;
        if state.records.contains_key(&purchase.purchase_id) {
            return Err(StoreError::Conflict(format!("purchase already exists: {}", purchase.purchase_id)));
        }
        let record = EntitlementRecord {
            purchase_id: purchase.purchase_id.clone(),
            resource_id: purchase.resource_id.clone(),
            purchaser_email: purchase.purchaser_email.clone(),
            purchaser_name: purchase.purchaser_name.clone(),
            download_token: None,
            token_expires_at: None,
            max_downloads: purchase.max_downloads,
            download_count: 0,
            last_downloaded_at: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            paid_at: None,
        };
        state.records.insert(record.purchase_id.clone(), record.clone());
        Ok(record)
    }

    fn confirm_payment(&self, confirmation: &PaymentConfirmation) -> Result<EntitlementRecord, StoreError> {
        let mut state = self.lock()?;
        let status = state
            .records
            .get(&confirmation.purchase_id)
            .map(|record| record.payment_status)
            .ok_or_else(|| StoreError::NotFound(format!("purchase {}", confirmation.purchase_id)))?;
        match status {
            PaymentStatus::Pending => {}
            PaymentStatus::Paid => {
                return state
                    .records
                    .get(&confirmation.purchase_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Corrupt("record vanished under lock".to_string()));
            }
            PaymentStatus::Cancelled | PaymentStatus::Refunded => {
                return Err(StoreError::Conflict(format!("purchase is {} and cannot be confirmed", status.as_str())));
            }
        }
        if state.tokens.contains_key(confirmation.token.as_str()) {
            return Err(StoreError::Conflict("download token already in use".to_string()));
        }
        let record = state
            .records
            .get_mut(&confirmation.purchase_id)
            .ok_or_else(|| StoreError::Corrupt("record vanished under lock".to_string()))?;
        record.payment_status = PaymentStatus::Paid;
        record.download_token = Some(confirmation.token.clone());
        record.token_expires_at = Some(confirmation.expires_at);
        record.paid_at = Some(confirmation.paid_at);
        let updated = record.clone();
        state.tokens.insert(confirmation.token.as_str().to_string(), confirmation.purchase_id.clone());
        Ok(updated)
    }

    fn set_payment_status(
        &self,
        purchase_id: &PurchaseId,
        status: PaymentStatus,
    ) -> Result<EntitlementRecord, StoreError> {
        let mut state = self.lock()?;
        let record = state
            .records
            .get_mut(purchase_id)
            .ok_or_else(|| StoreError::NotFound(format!("purchase {purchase_id}")))?;
        let reaches_paid = status == PaymentStatus::Paid && record.payment_status != PaymentStatus::Paid;
        if reaches_paid || !record.payment_status.can_transition_to(status) {
            return Err(StoreError::Conflict(format!(
                "illegal payment transition {} -> {}",
                record.payment_status.as_str(),
                status.as_str()
            )));
        }
        record.payment_status = status;
        Ok(record.clone())
    }

    fn find_by_purchase(&self, purchase_id: &PurchaseId) -> Result<Option<EntitlementRecord>, StoreError> {
        Ok(self.lock()?.records.get(purchase_id).cloned())
    }

    fn find_by_token(&self, token: &DownloadToken) -> Result<Option<EntitlementRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .tokens
            .get(token.as_str())
            .and_then(|purchase_id| state.records.get(purchase_id))
            .cloned())
    }

    fn record_download(&self, token: &DownloadToken, now: Timestamp) -> Result<CountOutcome, StoreError> {
        let mut state = self.lock()?;
        let Some(purchase_id) = state.tokens.get(token.as_str()).cloned() else {
            return Ok(CountOutcome::NotCounted);
        };
        let Some(record) = state.records.get_mut(&purchase_id) else {
            return Ok(CountOutcome::NotCounted);
        };
        if record.payment_status != PaymentStatus::Paid || record.download_count >= record.max_downloads {
            return Ok(CountOutcome::NotCounted);
        }
        record.download_count += 1;
        record.last_downloaded_at = Some(now);
        Ok(CountOutcome::Counted)
    }
}

// ============================================================================
// SECTION: Publish Task Store
// ============================================================================

/// Task state guarded by one mutex.
#[derive(Debug, Default)]
struct TaskState {
    /// Last assigned task identifier.
    last_id: i64,
    /// Tasks keyed by identifier (insertion order).
    tasks: BTreeMap<TaskId, PublishTask>,
}

/// In-memory publish task store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublishTaskStore {
    /// Shared state.
    state: Arc<Mutex<TaskState>>,
}

impl InMemoryPublishTaskStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, mapping poisoning to a store error.
    fn lock(&self) -> Result<MutexGuard<'_, TaskState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("publish task store mutex poisoned".to_string()))
    }
}

impl PublishTaskStore for InMemoryPublishTaskStore {
    fn enqueue(&self, task: &NewPublishTask, now: Timestamp) -> Result<PublishTask, StoreError> {
        let mut state = self.lock()?;
        state.last_id += 1;
        let task = PublishTask {
            task_id: TaskId::new(state.last_id),
            content_type: task.content_type,
            content_id: task.content_id.clone(),
            status: TaskStatus::Pending,
            retry_count: 0,
            error_message: None,
            created_at: now,
            processed_at: None,
            next_attempt_at: now,
            claimed_at: None,
            delivered_channels: Vec::new(),
        };
        state.tasks.insert(task.task_id, task.clone());
        Ok(task)
    }

    fn get(&self, task_id: TaskId) -> Result<Option<PublishTask>, StoreError> {
        Ok(self.lock()?.tasks.get(&task_id).cloned())
    }

    fn list(&self, filter: &TaskFilter) -> Result<Vec<PublishTask>, StoreError> {
        let state = self.lock()?;
        let mut tasks: Vec<PublishTask> = state
            .tasks
            .values()
            .filter(|task| filter.status.is_none_or(|status| task.status == status))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.task_id.cmp(&a.task_id)));
        tasks.truncate(filter.limit);
        Ok(tasks)
    }

    fn due_tasks(&self, limit: usize, now: Timestamp) -> Result<Vec<TaskId>, StoreError> {
        let state = self.lock()?;
        let mut due: Vec<&PublishTask> = state
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Pending && task.next_attempt_at <= now)
            .collect();
        due.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.task_id.cmp(&b.task_id)));
        Ok(due.into_iter().take(limit).map(|task| task.task_id).collect())
    }

    fn claim(&self, task_id: TaskId, now: Timestamp) -> Result<Option<PublishTask>, StoreError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(None);
        };
        if task.status != TaskStatus::Pending {
            return Ok(None);
        }
        task.status = TaskStatus::Processing;
        task.claimed_at = Some(now);
        Ok(Some(task.clone()))
    }

    fn settle(
        &self,
        task_id: TaskId,
        claimed_at: Timestamp,
        resolution: &TaskResolution,
        now: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        let Some(task) = state.tasks.get_mut(&task_id) else {
            return Ok(false);
        };
        if task.status != TaskStatus::Processing || task.claimed_at != Some(claimed_at) {
            return Ok(false);
        }
        task.status = resolution.status();
        task.processed_at = Some(now);
        task.claimed_at = None;
        match resolution {
            TaskResolution::Completed {
                delivered_channels,
                error_message,
            } => {
                task.delivered_channels.clone_from(delivered_channels);
                task.error_message.clone_from(error_message);
            }
            TaskResolution::Retry {
                delivered_channels,
                error_message,
                next_attempt_at,
            } => {
                task.delivered_channels.clone_from(delivered_channels);
                task.error_message = Some(error_message.clone());
                task.retry_count += 1;
                task.next_attempt_at = *next_attempt_at;
            }
            TaskResolution::Failed {
                delivered_channels,
                error_message,
            } => {
                task.delivered_channels.clone_from(delivered_channels);
                task.error_message = Some(error_message.clone());
                task.retry_count += 1;
            }
        }
        Ok(true)
    }

    fn stale_claims(&self, claimed_before: Timestamp) -> Result<Vec<PublishTask>, StoreError> {
        let state = self.lock()?;
        let mut stale: Vec<PublishTask> = state
            .tasks
            .values()
            .filter(|task| {
                task.status == TaskStatus::Processing && task.claimed_at.is_some_and(|claimed| claimed < claimed_before)
            })
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.claimed_at.cmp(&b.claimed_at).then(a.task_id.cmp(&b.task_id)));
        Ok(stale)
    }
}

// ============================================================================
// SECTION: Content Catalog
// ============================================================================

/// In-memory content catalog.
#[derive(Debug, Clone, Default)]
pub struct InMemoryContentCatalog {
    /// Items keyed by type and identifier.
    items: Arc<Mutex<BTreeMap<(ContentType, ContentId), PublishableContent>>>,
}

impl InMemoryContentCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContentCatalog for InMemoryContentCatalog {
    fn resolve(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<Option<PublishableContent>, StoreError> {
        let guard = self
            .items
            .lock()
            .map_err(|_| StoreError::Store("content catalog mutex poisoned".to_string()))?;
        Ok(guard.get(&(content_type, content_id.clone())).cloned())
    }

    fn upsert(&self, content: &PublishableContent) -> Result<(), StoreError> {
        self.items
            .lock()
            .map_err(|_| StoreError::Store("content catalog mutex poisoned".to_string()))?
            .insert((content.content_type, content.content_id.clone()), content.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use std::sync::Arc;
    use std::thread;

    use super::InMemoryEntitlementStore;
    use super::InMemoryPublishTaskStore;
    use crate::core::entitlement::CountOutcome;
    use crate::core::entitlement::NewPurchase;
    use crate::core::entitlement::PaymentConfirmation;
    use crate::core::identifiers::ContentId;
    use crate::core::identifiers::DownloadToken;
    use crate::core::identifiers::PurchaseId;
    use crate::core::identifiers::ResourceId;
    use crate::core::publish::ContentType;
    use crate::core::publish::NewPublishTask;
    use crate::core::time::Timestamp;
    use crate::interfaces::EntitlementStore;
    use crate::interfaces::PublishTaskStore;

    fn paid_store(max_downloads: u32) -> (InMemoryEntitlementStore, DownloadToken) {
        let store = InMemoryEntitlementStore::new();
        let purchase = NewPurchase {
            purchase_id: PurchaseId::new("p-1"),
            resource_id: ResourceId::new("ebook"),
            purchaser_email: "reader@example.com".to_string(),
            purchaser_name: "Reader".to_string(),
            max_downloads,
        };
        store.create_purchase(&purchase, Timestamp::from_unix_millis(1)).unwrap();
        let token = DownloadToken::new("tok");
        store
            .confirm_payment(&PaymentConfirmation {
                purchase_id: PurchaseId::new("p-1"),
                token: token.clone(),
                expires_at: Timestamp::from_unix_millis(1_000),
                paid_at: Timestamp::from_unix_millis(2),
            })
            .unwrap();
        (store, token)
    }

    #[test]
    fn concurrent_increments_never_exceed_limit() {
        let (store, token) = paid_store(3);
        let store = Arc::new(store);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let token = token.clone();
                thread::spawn(move || store.record_download(&token, Timestamp::from_unix_millis(5)))
            })
            .collect();
        let counted = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .filter(|outcome| *outcome == CountOutcome::Counted)
            .count();
        assert_eq!(counted, 3);
        assert_eq!(store.find_by_token(&token).unwrap().unwrap().download_count, 3);
    }

    #[test]
    fn only_one_claim_wins() {
        let store = Arc::new(InMemoryPublishTaskStore::new());
        let task = store
            .enqueue(
                &NewPublishTask {
                    content_type: ContentType::Article,
                    content_id: ContentId::new("a-1"),
                },
                Timestamp::from_unix_millis(1),
            )
            .unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.claim(task.task_id, Timestamp::from_unix_millis(2)))
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap().unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1);
    }
}
