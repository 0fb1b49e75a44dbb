// content-gate-core/src/runtime/publish_queue.rs
// ============================================================================
// Module: Publish Queue
// Description: Claim, dispatch, aggregate, and settle publish tasks.
// Purpose: Fan published content out to every channel with durable retries.
// Dependencies: crate::{core, interfaces}, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`PublishQueue::process_batch`] is driven externally (HTTP trigger or the
//! CLI under cron). Each run first settles claims that outlived their lease
//! as failed attempts, then claims due tasks one conditional update at a time. A claimed task resolves
//! its content, dispatches to every channel that has not yet delivered, and
//! settles as completed, re-queued with exponential backoff, or failed.
//!
//! Missing or unpublished content is a permanent failure. Channel failures
//! are transient until the retry budget is spent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::audit::AuditEvent;
use crate::core::identifiers::ChannelName;
use crate::core::identifiers::ContentId;
use crate::core::publish::AggregationRule;
use crate::core::publish::BatchSummary;
use crate::core::publish::ChannelOutcome;
use crate::core::publish::ContentState;
use crate::core::publish::ContentType;
use crate::core::publish::NewPublishTask;
use crate::core::publish::PublishReport;
use crate::core::publish::PublishTask;
use crate::core::publish::PublishableContent;
use crate::core::publish::TaskFilter;
use crate::core::publish::TaskResolution;
use crate::core::publish::summarize_failures;
use crate::core::time::Timestamp;
use crate::interfaces::AuditSink;
use crate::interfaces::ChannelDispatcher;
use crate::interfaces::Clock;
use crate::interfaces::ContentCatalog;
use crate::interfaces::PublishTaskStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default retry budget per task.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default first backoff step.
pub const DEFAULT_BACKOFF_BASE_MILLIS: i64 = 30_000;

/// Default backoff ceiling.
pub const DEFAULT_BACKOFF_MAX_MILLIS: i64 = 30 * 60 * 1000;

/// Default claim lease before a processing task counts as abandoned.
pub const DEFAULT_CLAIM_LEASE_MILLIS: i64 = 10 * 60 * 1000;

/// Error message recorded when a claim outlives its lease.
pub const CLAIM_EXPIRED: &str = "claim lease expired";

/// Retry budget and backoff curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a task fails terminally.
    pub max_retries: u32,
    /// Delay after the first failure.
    pub backoff_base_millis: i64,
    /// Largest delay between attempts.
    pub backoff_max_millis: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base_millis: DEFAULT_BACKOFF_BASE_MILLIS,
            backoff_max_millis: DEFAULT_BACKOFF_MAX_MILLIS,
        }
    }
}

impl RetryPolicy {
    /// Returns the delay before attempt `failures + 1`: `base * 2^(failures-1)`, capped.
    #[must_use]
    pub fn backoff_millis(&self, failures: u32) -> i64 {
        let exponent = failures.saturating_sub(1).min(32);
        let factor = 1_i64 << exponent;
        self.backoff_base_millis.saturating_mul(factor).min(self.backoff_max_millis)
    }
}

/// Publish queue settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishQueueConfig {
    /// Retry budget and backoff.
    pub retry: RetryPolicy,
    /// Success rule.
    pub aggregation: AggregationRule,
    /// Claim lease.
    pub claim_lease_millis: i64,
}

impl Default for PublishQueueConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            aggregation: AggregationRule::Primary(ChannelName::new("broadcast")),
            claim_lease_millis: DEFAULT_CLAIM_LEASE_MILLIS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Publish errors.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Content does not exist.
    #[error("content not found: {content_type}/{content_id}", content_type = .0.as_str(), content_id = .1)]
    ContentNotFound(ContentType, ContentId),
    /// Content exists but is not published.
    #[error("content not published: {content_type}/{content_id}", content_type = .0.as_str(), content_id = .1)]
    ContentNotPublished(ContentType, ContentId),
    /// Request is malformed.
    #[error("invalid publish request: {0}")]
    InvalidRequest(String),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PublishError {
    /// Returns true when retrying the same request cannot succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::ContentNotFound(..) | Self::ContentNotPublished(..) | Self::InvalidRequest(_))
    }
}

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Immediate publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Content kind.
    pub content_type: ContentType,
    /// Content identifier.
    pub content_id: ContentId,
    /// Channels to leave out.
    pub skip_channels: Vec<ChannelName>,
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// Publish queue service.
#[derive(Clone)]
pub struct PublishQueue {
    /// Task store.
    tasks: Arc<dyn PublishTaskStore>,
    /// Content catalog.
    catalog: Arc<dyn ContentCatalog>,
    /// Channel dispatcher.
    dispatcher: Arc<dyn ChannelDispatcher>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Settings.
    config: PublishQueueConfig,
}

impl PublishQueue {
    /// Creates a publish queue.
    #[must_use]
    pub fn new(
        tasks: Arc<dyn PublishTaskStore>,
        catalog: Arc<dyn ContentCatalog>,
        dispatcher: Arc<dyn ChannelDispatcher>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: PublishQueueConfig,
    ) -> Self {
        Self {
            tasks,
            catalog,
            dispatcher,
            audit,
            clock,
            config,
        }
    }

    /// Enqueues a pending task eligible immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::InvalidRequest`] for an empty content ID and
    /// [`PublishError::Store`] when the insert fails.
    pub fn enqueue(&self, content_type: ContentType, content_id: ContentId) -> Result<PublishTask, PublishError> {
        if content_id.as_str().trim().is_empty() {
            return Err(PublishError::InvalidRequest("content_id is empty".to_string()));
        }
        let task = self.tasks.enqueue(
            &NewPublishTask {
                content_type,
                content_id,
            },
            self.clock.now(),
        )?;
        info!(
            task_id = %task.task_id,
            content_type = task.content_type.as_str(),
            content_id = %task.content_id,
            "publish task enqueued"
        );
        Ok(task)
    }

    /// Lists tasks for inspection, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Store`] when loading fails.
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<PublishTask>, PublishError> {
        Ok(self.tasks.list(filter)?)
    }

    /// Processes up to `limit` due tasks.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Store`] when stale recovery or due-task selection
    /// fails. Per-task failures are counted, not returned.
    pub async fn process_batch(&self, limit: usize) -> Result<BatchSummary, PublishError> {
        self.expire_stale_claims()?;

        let mut summary = BatchSummary::default();
        for task_id in self.tasks.due_tasks(limit, self.clock.now())? {
            let claimed_at = self.clock.now();
            let claimed = match self.tasks.claim(task_id, claimed_at) {
                Ok(Some(task)) => task,
                Ok(None) => continue,
                Err(err) => {
                    error!(task_id = %task_id, error = %err, "publish task claim failed");
                    continue;
                }
            };
            summary.total += 1;
            let (resolution, outcomes) = self.attempt(&claimed).await;
            let settled_at = self.clock.now();
            match self.tasks.settle(claimed.task_id, claimed_at, &resolution, settled_at) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(task_id = %claimed.task_id, "publish task claim lost before settle");
                    continue;
                }
                Err(err) => {
                    error!(task_id = %claimed.task_id, error = %err, "publish task settle failed");
                    summary.failed += 1;
                    continue;
                }
            }
            match &resolution {
                TaskResolution::Completed { .. } => summary.processed += 1,
                TaskResolution::Retry { .. } => {
                    summary.failed += 1;
                    summary.requeued += 1;
                }
                TaskResolution::Failed { .. } => summary.failed += 1,
            }
            self.record_settled(&claimed, &resolution, settled_at, outcomes);
        }
        Ok(summary)
    }

    /// Settles claims older than the lease as failed attempts.
    ///
    /// An abandoned claim spends one unit of the retry budget, so a task that
    /// keeps stalling its worker ends `failed` instead of cycling forever.
    fn expire_stale_claims(&self) -> Result<(), PublishError> {
        let now = self.clock.now();
        let stale_before = now.saturating_sub_millis(self.config.claim_lease_millis);
        for task in self.tasks.stale_claims(stale_before)? {
            let Some(claimed_at) = task.claimed_at else {
                continue;
            };
            let resolution = self.retry_or_fail(&task, task.delivered_channels.clone(), CLAIM_EXPIRED.to_string());
            match self.tasks.settle(task.task_id, claimed_at, &resolution, now) {
                Ok(true) => {
                    warn!(
                        task_id = %task.task_id,
                        status = resolution.status().as_str(),
                        "publish task claim lease expired"
                    );
                    self.record_settled(&task, &resolution, now, Vec::new());
                }
                Ok(false) => {}
                Err(err) => {
                    error!(task_id = %task.task_id, error = %err, "expired publish task settle failed");
                }
            }
        }
        Ok(())
    }

    /// Logs and audits a settled attempt.
    fn record_settled(
        &self,
        task: &PublishTask,
        resolution: &TaskResolution,
        settled_at: Timestamp,
        outcomes: Vec<ChannelOutcome>,
    ) {
        let retry_count = if resolution.is_failure() { task.retry_count + 1 } else { task.retry_count };
        info!(
            task_id = %task.task_id,
            status = resolution.status().as_str(),
            retry_count,
            "publish task settled"
        );
        self.audit.record(&AuditEvent::PublishTaskSettled {
            timestamp_ms: settled_at,
            task_id: task.task_id,
            status: resolution.status(),
            retry_count,
            outcomes,
        });
    }

    /// Runs one attempt for a claimed task and decides how to settle it.
    async fn attempt(&self, task: &PublishTask) -> (TaskResolution, Vec<ChannelOutcome>) {
        let delivered_before = task.delivered_channels.clone();
        let content = match self.resolve_published(task.content_type, &task.content_id) {
            Ok(content) => content,
            Err(err) if err.is_permanent() => {
                return (
                    TaskResolution::Failed {
                        delivered_channels: delivered_before,
                        error_message: err.to_string(),
                    },
                    Vec::new(),
                );
            }
            Err(err) => return (self.retry_or_fail(task, delivered_before, err.to_string()), Vec::new()),
        };

        let configured = self.dispatcher.channels();
        let pending: Vec<ChannelName> =
            configured.iter().filter(|channel| !delivered_before.contains(channel)).cloned().collect();
        let outcomes = if pending.is_empty() {
            Vec::new()
        } else {
            self.dispatcher.dispatch(&content.to_message(), &pending).await
        };

        let mut delivered = delivered_before;
        for outcome in outcomes.iter().filter(|outcome| outcome.success) {
            if !delivered.contains(&outcome.channel) {
                delivered.push(outcome.channel.clone());
            }
        }
        let rule = self.config.aggregation.for_selection(&configured);
        let failures = summarize_failures(&outcomes);
        let resolution = if rule.is_satisfied(&delivered, &configured) {
            TaskResolution::Completed {
                delivered_channels: delivered,
                error_message: failures,
            }
        } else {
            let message = failures.unwrap_or_else(|| "no channel delivered".to_string());
            self.retry_or_fail(task, delivered, message)
        };
        (resolution, outcomes)
    }

    /// Re-queues with backoff while budget remains, else fails terminally.
    fn retry_or_fail(&self, task: &PublishTask, delivered: Vec<ChannelName>, error_message: String) -> TaskResolution {
        let failures = task.retry_count + 1;
        if failures < self.config.retry.max_retries {
            let delay = self.config.retry.backoff_millis(failures);
            TaskResolution::Retry {
                delivered_channels: delivered,
                error_message,
                next_attempt_at: self.clock.now().saturating_add_millis(delay),
            }
        } else {
            TaskResolution::Failed {
                delivered_channels: delivered,
                error_message,
            }
        }
    }

    /// Resolves content that may be announced.
    fn resolve_published(
        &self,
        content_type: ContentType,
        content_id: &ContentId,
    ) -> Result<PublishableContent, PublishError> {
        match self.catalog.resolve(content_type, content_id)? {
            Some(content) if content.state == ContentState::Published => Ok(content),
            Some(_) => Err(PublishError::ContentNotPublished(content_type, content_id.clone())),
            None => Err(PublishError::ContentNotFound(content_type, content_id.clone())),
        }
    }

    /// Publishes immediately without persisting a task.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::ContentNotFound`] / [`PublishError::ContentNotPublished`]
    /// for unusable content and [`PublishError::InvalidRequest`] when a skipped
    /// channel is unknown or every channel is skipped.
    pub async fn publish_now(&self, request: &PublishRequest) -> Result<PublishReport, PublishError> {
        let content = self.resolve_published(request.content_type, &request.content_id)?;
        let configured = self.dispatcher.channels();
        if let Some(unknown) = request.skip_channels.iter().find(|channel| !configured.contains(channel)) {
            return Err(PublishError::InvalidRequest(format!("unknown channel: {unknown}")));
        }
        let selected: Vec<ChannelName> =
            configured.into_iter().filter(|channel| !request.skip_channels.contains(channel)).collect();
        if selected.is_empty() {
            return Err(PublishError::InvalidRequest("every channel was skipped".to_string()));
        }

        let outcomes = self.dispatcher.dispatch(&content.to_message(), &selected).await;
        let delivered: Vec<ChannelName> =
            outcomes.iter().filter(|outcome| outcome.success).map(|outcome| outcome.channel.clone()).collect();
        let success = self.config.aggregation.for_selection(&selected).is_satisfied(&delivered, &selected);
        info!(
            content_type = request.content_type.as_str(),
            content_id = %request.content_id,
            success,
            channels = selected.len(),
            "publish dispatched"
        );
        self.audit.record(&AuditEvent::PublishDispatched {
            timestamp_ms: self.clock.now(),
            content_type: request.content_type,
            content_id: request.content_id.clone(),
            success,
            outcomes: outcomes.clone(),
        });
        Ok(PublishReport {
            success,
            outcomes,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::RetryPolicy;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            backoff_base_millis: 1_000,
            backoff_max_millis: 5_000,
        };
        assert_eq!(policy.backoff_millis(1), 1_000);
        assert_eq!(policy.backoff_millis(2), 2_000);
        assert_eq!(policy.backoff_millis(3), 4_000);
        assert_eq!(policy.backoff_millis(4), 5_000);
        assert_eq!(policy.backoff_millis(60), 5_000);
    }
}
