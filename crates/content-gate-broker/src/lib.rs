// content-gate-broker/src/lib.rs
// ============================================================================
// Module: Content Gate Broker Library
// Description: Channel adapters and the fan-out dispatcher.
// Purpose: Deliver publish notifications to external channels.
// Dependencies: content-gate-core, reqwest, tokio, tracing
// ============================================================================

//! ## Overview
//! Each [`Channel`] delivers one [`content_gate_core::ChannelMessage`] to one
//! destination. [`FanoutBroker`] registers channels in order and implements
//! [`content_gate_core::ChannelDispatcher`] by calling every selected channel
//! concurrently, each under its own timeout.
//!
//! Security posture: channel credentials are held in memory only and are
//! never included in error details or logs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod channel;
mod render;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::BrokerError;
pub use broker::DEFAULT_CHANNEL_TIMEOUT;
pub use broker::FanoutBroker;
pub use broker::FanoutBrokerBuilder;
pub use channel::BotChannel;
pub use channel::BotConfig;
pub use channel::BroadcastChannel;
pub use channel::BroadcastConfig;
pub use channel::CallbackChannel;
pub use channel::Channel;
pub use channel::ChannelError;
pub use channel::ChannelReceipt;
pub use channel::EmailListChannel;
pub use channel::EmailListConfig;
pub use channel::LogChannel;
pub use channel::bot::BOT_EVENT;
pub use channel::broadcast::DEFAULT_BROADCAST_API_BASE;
