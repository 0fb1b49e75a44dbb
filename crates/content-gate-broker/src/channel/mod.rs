// content-gate-broker/src/channel/mod.rs
// ============================================================================
// Module: Content Gate Channels
// Description: Channel trait, errors, and reference adapters.
// Purpose: Deliver one publish notification to one destination.
// Dependencies: async-trait, content-gate-core, thiserror
// ============================================================================

//! ## Overview
//! A [`Channel`] delivers a [`ChannelMessage`] and returns a
//! [`ChannelReceipt`] only after the destination accepted it. Failures are
//! classified by [`ChannelError`] so the publish queue can report them.
//! Invariants:
//! - Receipts are returned only after successful delivery.
//! - Error details never contain credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use content_gate_core::ChannelFailureKind;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use thiserror::Error;

// ============================================================================
// SECTION: Channel Errors
// ============================================================================

/// Errors emitted by channel adapters.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Call did not complete in time.
    #[error("channel timed out: {0}")]
    Timeout(String),
    /// Destination refused the message.
    #[error("channel rejected message: {detail}")]
    Rejected {
        /// HTTP status, when one was received.
        status: Option<u16>,
        /// Refusal detail.
        detail: String,
    },
    /// Destination could not be reached.
    #[error("channel unavailable: {0}")]
    Unavailable(String),
    /// Channel is misconfigured.
    #[error("channel misconfigured: {0}")]
    Config(String),
}

impl ChannelError {
    /// Returns the failure class reported in outcomes.
    #[must_use]
    pub const fn kind(&self) -> ChannelFailureKind {
        match self {
            Self::Timeout(_) => ChannelFailureKind::Timeout,
            Self::Rejected {
                ..
            } => ChannelFailureKind::Rejected,
            Self::Unavailable(_) => ChannelFailureKind::Unavailable,
            Self::Config(_) => ChannelFailureKind::Config,
        }
    }
}

// ============================================================================
// SECTION: Channel Trait
// ============================================================================

/// Proof of delivery returned by a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReceipt {
    /// Channel that accepted the message.
    pub channel: ChannelName,
    /// Destination-assigned reference, when the destination returns one.
    pub reference: Option<String>,
}

/// Delivers publish notifications to one destination.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Returns the registered channel name.
    fn name(&self) -> &ChannelName;

    /// Delivers `message`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when delivery fails.
    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError>;
}

// ============================================================================
// SECTION: Implementations
// ============================================================================

pub mod bot;
pub mod broadcast;
pub mod callback;
pub mod email;
mod http;
pub mod log;

pub use bot::BotChannel;
pub use bot::BotConfig;
pub use broadcast::BroadcastChannel;
pub use broadcast::BroadcastConfig;
pub use callback::CallbackChannel;
pub use email::EmailListChannel;
pub use email::EmailListConfig;
pub use log::LogChannel;
