// content-gate-core/src/core/publish.rs
// ============================================================================
// Module: Content Gate Publishing
// Description: Publish tasks, channel messages, outcomes, and aggregation.
// Purpose: Model durable fan-out work and its per-channel results.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`PublishTask`] is the durable unit of fan-out work. Each attempt sends
//! a [`ChannelMessage`] to every channel that has not yet delivered, records a
//! [`ChannelOutcome`] per channel, and settles the task through a
//! [`TaskResolution`]. The [`AggregationRule`] decides whether a set of
//! delivered channels counts as success.
//!
//! ## Invariants
//! - Status moves `pending -> processing -> {completed | failed | pending}`.
//! - `delivered_channels` only grows across attempts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ChannelName;
use crate::core::identifiers::ContentId;
use crate::core::identifiers::TaskId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Content
// ============================================================================

/// Kind of publishable content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Blog article.
    Article,
    /// Video post.
    Video,
    /// Downloadable resource announcement.
    Resource,
}

impl ContentType {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Resource => "resource",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "article" => Some(Self::Article),
            "video" => Some(Self::Video),
            "resource" => Some(Self::Resource),
            _ => None,
        }
    }
}

/// Editorial state of a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentState {
    /// Not yet visible.
    Draft,
    /// Live; the only state that may be announced.
    Published,
    /// Withdrawn.
    Archived,
}

impl ContentState {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Content fields needed by channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishableContent {
    /// Content kind.
    pub content_type: ContentType,
    /// Content identifier.
    pub content_id: ContentId,
    /// Headline.
    pub title: String,
    /// Short teaser text.
    #[serde(default)]
    pub summary: Option<String>,
    /// Public URL of the content.
    pub url: String,
    /// Optional image or thumbnail URL.
    #[serde(default)]
    pub media_url: Option<String>,
    /// Editorial state.
    pub state: ContentState,
}

impl PublishableContent {
    /// Builds the channel message announcing this content.
    #[must_use]
    pub fn to_message(&self) -> ChannelMessage {
        ChannelMessage {
            content_type: self.content_type,
            content_id: self.content_id.clone(),
            title: self.title.clone(),
            summary: self.summary.clone(),
            url: self.url.clone(),
            media_url: self.media_url.clone(),
        }
    }
}

/// Message handed to every channel adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Content kind.
    pub content_type: ContentType,
    /// Content identifier.
    pub content_id: ContentId,
    /// Headline.
    pub title: String,
    /// Short teaser text.
    pub summary: Option<String>,
    /// Public URL.
    pub url: String,
    /// Optional image URL.
    pub media_url: Option<String>,
}

// ============================================================================
// SECTION: Tasks
// ============================================================================

/// Publish task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be claimed.
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Aggregation rule satisfied.
    Completed,
    /// Terminal failure.
    Failed,
}

impl TaskStatus {
    /// Returns the stable storage label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a storage label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Durable fan-out job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTask {
    /// Task identifier.
    pub task_id: TaskId,
    /// Content kind.
    pub content_type: ContentType,
    /// Content identifier.
    pub content_id: ContentId,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Summary of the last failed channels.
    pub error_message: Option<String>,
    /// Enqueue time.
    pub created_at: Timestamp,
    /// Time of the last settled attempt.
    pub processed_at: Option<Timestamp>,
    /// Earliest time the task may be claimed.
    pub next_attempt_at: Timestamp,
    /// Start of the current claim.
    pub claimed_at: Option<Timestamp>,
    /// Channels that have already delivered this task.
    pub delivered_channels: Vec<ChannelName>,
}

/// Task enqueue request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPublishTask {
    /// Content kind.
    pub content_type: ContentType,
    /// Content identifier.
    pub content_id: ContentId,
}

/// Queue listing filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskFilter {
    /// Optional status to match.
    pub status: Option<TaskStatus>,
    /// Maximum rows returned.
    pub limit: usize,
}

/// How a claimed task is settled after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResolution {
    /// Aggregation rule satisfied.
    Completed {
        /// Channels delivered across all attempts.
        delivered_channels: Vec<ChannelName>,
        /// Channels that still failed, if any.
        error_message: Option<String>,
    },
    /// Attempt failed; return to pending after the backoff.
    Retry {
        /// Channels delivered across all attempts.
        delivered_channels: Vec<ChannelName>,
        /// Failure summary.
        error_message: String,
        /// Earliest next attempt.
        next_attempt_at: Timestamp,
    },
    /// Attempt failed terminally.
    Failed {
        /// Channels delivered across all attempts.
        delivered_channels: Vec<ChannelName>,
        /// Failure summary.
        error_message: String,
    },
}

impl TaskResolution {
    /// Returns the status the task lands in.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        match self {
            Self::Completed { .. } => TaskStatus::Completed,
            Self::Retry { .. } => TaskStatus::Pending,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }

    /// Returns true when the attempt counts as a failure (retry or terminal).
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !matches!(self, Self::Completed { .. })
    }
}

// ============================================================================
// SECTION: Channel Outcomes
// ============================================================================

/// Classified channel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelFailureKind {
    /// Call exceeded its timeout.
    Timeout,
    /// Remote side refused the message.
    Rejected,
    /// Remote side unreachable.
    Unavailable,
    /// Channel misconfigured or unknown.
    Config,
}

/// Result of one channel call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    /// Channel name.
    pub channel: ChannelName,
    /// True when the channel accepted the message.
    pub success: bool,
    /// Failure class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ChannelFailureKind>,
    /// Failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl ChannelOutcome {
    /// Builds a success outcome.
    #[must_use]
    pub const fn delivered(channel: ChannelName) -> Self {
        Self {
            channel,
            success: true,
            error_kind: None,
            error_detail: None,
        }
    }

    /// Builds a failure outcome.
    #[must_use]
    pub fn failed(channel: ChannelName, kind: ChannelFailureKind, detail: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
        }
    }
}

/// Joins failed outcomes into a single `channel: detail; ...` summary.
#[must_use]
pub fn summarize_failures(outcomes: &[ChannelOutcome]) -> Option<String> {
    let parts: Vec<String> = outcomes
        .iter()
        .filter(|outcome| !outcome.success)
        .map(|outcome| {
            let detail = outcome.error_detail.as_deref().unwrap_or("failed");
            format!("{}: {detail}", outcome.channel)
        })
        .collect();
    if parts.is_empty() { None } else { Some(parts.join("; ")) }
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Rule deciding when a fan-out attempt counts as success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", content = "channel", rename_all = "snake_case")]
pub enum AggregationRule {
    /// The named channel must have delivered.
    Primary(ChannelName),
    /// At least one channel delivered.
    Any,
    /// Every selected channel delivered.
    All,
}

impl AggregationRule {
    /// Adapts the rule to a channel selection.
    ///
    /// A primary rule whose channel is not selected degrades to [`Self::Any`].
    #[must_use]
    pub fn for_selection(&self, selected: &[ChannelName]) -> Self {
        match self {
            Self::Primary(primary) if !selected.contains(primary) => Self::Any,
            other => other.clone(),
        }
    }

    /// Returns true when `delivered` satisfies the rule over `selected`.
    #[must_use]
    pub fn is_satisfied(&self, delivered: &[ChannelName], selected: &[ChannelName]) -> bool {
        match self {
            Self::Primary(primary) => delivered.contains(primary),
            Self::Any => !delivered.is_empty(),
            Self::All => selected.iter().all(|channel| delivered.contains(channel)),
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Counts reported by one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Tasks completed in this batch.
    pub processed: usize,
    /// Tasks whose attempt failed (re-queued or terminal).
    pub failed: usize,
    /// Failed tasks returned to pending for a later attempt.
    pub requeued: usize,
    /// Tasks claimed by this batch.
    pub total: usize,
}

/// Result of an immediate publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Aggregated success.
    pub success: bool,
    /// Per-channel outcomes in registration order.
    pub outcomes: Vec<ChannelOutcome>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::AggregationRule;
    use super::ChannelFailureKind;
    use super::ChannelName;
    use super::ChannelOutcome;
    use super::summarize_failures;

    fn names(values: &[&str]) -> Vec<ChannelName> {
        values.iter().map(|value| ChannelName::new(*value)).collect()
    }

    #[test]
    fn primary_rule_requires_primary_delivery() {
        let rule = AggregationRule::Primary(ChannelName::new("broadcast"));
        let selected = names(&["broadcast", "bot", "email"]);
        assert!(rule.is_satisfied(&names(&["broadcast"]), &selected));
        assert!(!rule.is_satisfied(&names(&["bot", "email"]), &selected));
    }

    #[test]
    fn primary_rule_degrades_when_primary_skipped() {
        let rule = AggregationRule::Primary(ChannelName::new("broadcast"));
        let selected = names(&["bot", "email"]);
        let effective = rule.for_selection(&selected);
        assert_eq!(effective, AggregationRule::Any);
        assert!(effective.is_satisfied(&names(&["email"]), &selected));
    }

    #[test]
    fn all_rule_requires_every_selected_channel() {
        let selected = names(&["broadcast", "bot"]);
        assert!(!AggregationRule::All.is_satisfied(&names(&["bot"]), &selected));
        assert!(AggregationRule::All.is_satisfied(&names(&["bot", "broadcast"]), &selected));
    }

    #[test]
    fn failure_summary_lists_only_failed_channels() {
        let outcomes = vec![
            ChannelOutcome::delivered(ChannelName::new("broadcast")),
            ChannelOutcome::failed(ChannelName::new("email"), ChannelFailureKind::Timeout, "timed out"),
        ];
        assert_eq!(summarize_failures(&outcomes).as_deref(), Some("email: timed out"));
        assert_eq!(summarize_failures(&outcomes[..1]), None);
    }
}
