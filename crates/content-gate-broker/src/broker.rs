// content-gate-broker/src/broker.rs
// ============================================================================
// Module: Content Gate Fan-out Broker
// Description: Concurrent dispatcher over registered channels.
// Purpose: Deliver one message to many channels with per-channel timeouts.
// Dependencies: async-trait, content-gate-core, thiserror, tokio, tracing
// ============================================================================

//! ## Overview
//! [`FanoutBroker`] implements [`content_gate_core::ChannelDispatcher`]. Every
//! selected channel runs on its own task inside a [`JoinSet`], wrapped in
//! `tokio::time::timeout`. Outcomes come back in registration order no matter
//! which call finished first.
//! Invariants:
//! - Exactly one outcome per requested channel.
//! - A timeout, error, or panic in one channel never affects another.
//! - Unknown channel names yield a `config` failure, never an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use content_gate_core::ChannelDispatcher;
use content_gate_core::ChannelFailureKind;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use content_gate_core::ChannelOutcome;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::info;
use tracing::warn;

use crate::channel::Channel;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-channel call timeout.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Broker Errors
// ============================================================================

/// Errors returned while building a broker.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// No channels were registered.
    #[error("broker has no channels configured")]
    MissingChannels,
    /// Two channels share a name.
    #[error("duplicate channel name: {0}")]
    DuplicateChannel(String),
    /// A timeout of zero was supplied.
    #[error("channel {0} has a zero timeout")]
    ZeroTimeout(String),
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// A channel plus its call timeout.
#[derive(Clone)]
struct Registration {
    /// Channel implementation.
    channel: Arc<dyn Channel>,
    /// Upper bound on one call.
    timeout: Duration,
}

/// Builder for a fan-out broker.
///
/// # Invariants
/// - `build` succeeds only with at least one channel and unique names.
/// - Registration order is dispatch order.
pub struct FanoutBrokerBuilder {
    /// Registered channels, in order.
    channels: Vec<Registration>,
    /// Timeout applied by [`Self::channel`].
    default_timeout: Duration,
}

impl Default for FanoutBrokerBuilder {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            default_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }
}

impl FanoutBrokerBuilder {
    /// Sets the timeout used by later [`Self::channel`] registrations.
    #[must_use]
    pub const fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Registers a channel with the default timeout.
    #[must_use]
    pub fn channel(self, channel: impl Channel + 'static) -> Self {
        let timeout = self.default_timeout;
        self.shared_channel(Arc::new(channel), timeout)
    }

    /// Registers a channel with its own timeout.
    #[must_use]
    pub fn channel_with_timeout(self, channel: impl Channel + 'static, timeout: Duration) -> Self {
        self.shared_channel(Arc::new(channel), timeout)
    }

    /// Registers an already shared channel.
    #[must_use]
    pub fn shared_channel(mut self, channel: Arc<dyn Channel>, timeout: Duration) -> Self {
        self.channels.push(Registration {
            channel,
            timeout,
        });
        self
    }

    /// Builds the broker.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when no channel is registered, a name repeats,
    /// or a timeout is zero.
    pub fn build(self) -> Result<FanoutBroker, BrokerError> {
        if self.channels.is_empty() {
            return Err(BrokerError::MissingChannels);
        }
        let mut seen = BTreeSet::new();
        for registration in &self.channels {
            let name = registration.channel.name().clone();
            if registration.timeout.is_zero() {
                return Err(BrokerError::ZeroTimeout(name.to_string()));
            }
            if !seen.insert(name.clone()) {
                return Err(BrokerError::DuplicateChannel(name.to_string()));
            }
        }
        Ok(FanoutBroker {
            channels: self.channels,
        })
    }
}

// ============================================================================
// SECTION: Broker
// ============================================================================

/// Concurrent fan-out dispatcher.
#[derive(Clone)]
pub struct FanoutBroker {
    /// Registered channels, in order.
    channels: Vec<Registration>,
}

impl FanoutBroker {
    /// Returns a new builder.
    #[must_use]
    pub fn builder() -> FanoutBrokerBuilder {
        FanoutBrokerBuilder::default()
    }
}

#[async_trait]
impl ChannelDispatcher for FanoutBroker {
    fn channels(&self) -> Vec<ChannelName> {
        self.channels.iter().map(|registration| registration.channel.name().clone()).collect()
    }

    async fn dispatch(&self, message: &ChannelMessage, channels: &[ChannelName]) -> Vec<ChannelOutcome> {
        let requested: BTreeSet<&ChannelName> = channels.iter().collect();
        let selected: Vec<&Registration> = self
            .channels
            .iter()
            .filter(|registration| requested.contains(registration.channel.name()))
            .collect();

        let mut set = JoinSet::new();
        for (slot, registration) in selected.iter().enumerate() {
            let channel = Arc::clone(&registration.channel);
            let timeout = registration.timeout;
            let message = message.clone();
            set.spawn(async move { (slot, call_channel(channel.as_ref(), &message, timeout).await) });
        }

        let mut results: Vec<Option<ChannelOutcome>> = vec![None; selected.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((slot, outcome)) => {
                    if let Some(entry) = results.get_mut(slot) {
                        *entry = Some(outcome);
                    }
                }
                Err(err) => warn!(error = %err, "channel task did not complete"),
            }
        }

        let mut outcomes: Vec<ChannelOutcome> = selected
            .iter()
            .zip(results)
            .map(|(registration, result)| {
                result.unwrap_or_else(|| {
                    ChannelOutcome::failed(
                        registration.channel.name().clone(),
                        ChannelFailureKind::Unavailable,
                        "channel task aborted",
                    )
                })
            })
            .collect();

        let known: BTreeSet<&ChannelName> =
            self.channels.iter().map(|registration| registration.channel.name()).collect();
        let mut reported = BTreeSet::new();
        for name in channels {
            if !known.contains(name) && reported.insert(name) {
                warn!(channel = %name, "dispatch requested unknown channel");
                outcomes.push(ChannelOutcome::failed(name.clone(), ChannelFailureKind::Config, "unknown channel"));
            }
        }
        outcomes
    }
}

/// Runs one channel call under its timeout.
async fn call_channel(channel: &dyn Channel, message: &ChannelMessage, timeout: Duration) -> ChannelOutcome {
    let name = channel.name().clone();
    match tokio::time::timeout(timeout, channel.deliver(message)).await {
        Ok(Ok(receipt)) => {
            info!(
                channel = %name,
                content_id = %message.content_id,
                reference = receipt.reference.as_deref().unwrap_or("-"),
                "channel delivered"
            );
            ChannelOutcome::delivered(name)
        }
        Ok(Err(err)) => {
            warn!(channel = %name, content_id = %message.content_id, error = %err, "channel delivery failed");
            ChannelOutcome::failed(name, err.kind(), err.to_string())
        }
        Err(_) => {
            warn!(channel = %name, content_id = %message.content_id, timeout = ?timeout, "channel delivery timed out");
            ChannelOutcome::failed(
                name,
                ChannelFailureKind::Timeout,
                format!("channel timed out after {}ms", timeout.as_millis()),
            )
        }
    }
}
