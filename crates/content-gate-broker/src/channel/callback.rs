// content-gate-broker/src/channel/callback.rs
// ============================================================================
// Module: Callback Channel
// Description: Channel backed by an in-process handler.
// Purpose: Route notifications to embedding code or test doubles.
// Dependencies: async-trait, content-gate-core
// ============================================================================

//! ## Overview
//! The handler runs inline on the dispatch task and must not block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;

use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::channel::ChannelReceipt;

// ============================================================================
// SECTION: Callback Channel
// ============================================================================

/// Callback handler signature used by the channel.
type CallbackHandler = dyn Fn(&ChannelMessage) -> Result<Option<String>, ChannelError> + Send + Sync;

/// Callback-based channel.
#[derive(Clone)]
pub struct CallbackChannel {
    /// Registered channel name.
    name: ChannelName,
    /// Handler invoked with each message; returns an optional reference.
    handler: Arc<CallbackHandler>,
}

impl CallbackChannel {
    /// Creates a callback channel from a handler function.
    pub fn new<F>(name: impl Into<ChannelName>, handler: F) -> Self
    where
        F: Fn(&ChannelMessage) -> Result<Option<String>, ChannelError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl Channel for CallbackChannel {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        let reference = (self.handler)(message)?;
        Ok(ChannelReceipt {
            channel: self.name.clone(),
            reference,
        })
    }
}
