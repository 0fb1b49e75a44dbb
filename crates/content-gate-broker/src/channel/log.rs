// content-gate-broker/src/channel/log.rs
// ============================================================================
// Module: Log Channel
// Description: Channel that records notifications as JSON lines.
// Purpose: Keep an audit-only record of what would have been published.
// Dependencies: async-trait, content-gate-core, serde_json
// ============================================================================

//! ## Overview
//! Each delivery appends one JSON object per line to the writer. References
//! are `<name>-<seq>` with a per-channel monotonic sequence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use serde_json::json;

use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::channel::ChannelReceipt;

// ============================================================================
// SECTION: Log Channel
// ============================================================================

/// Log-only channel.
pub struct LogChannel<W: Write + Send> {
    /// Registered channel name.
    name: ChannelName,
    /// Output writer for log records.
    writer: Mutex<W>,
    /// Monotonic counter for references.
    counter: AtomicU64,
}

impl<W: Write + Send> LogChannel<W> {
    /// Creates a log channel writing to `writer`.
    pub fn new(name: impl Into<ChannelName>, writer: W) -> Self {
        Self {
            name: name.into(),
            writer: Mutex::new(writer),
            counter: AtomicU64::new(0),
        }
    }

    /// Consumes the channel and returns its writer.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] when the writer mutex is poisoned.
    pub fn into_writer(self) -> Result<W, ChannelError> {
        self.writer
            .into_inner()
            .map_err(|_| ChannelError::Config("log writer mutex poisoned".to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> Channel for LogChannel<W> {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        let seq = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let reference = format!("{}-{seq}", self.name);
        let record = json!({
            "reference": reference,
            "channel": self.name,
            "content_type": message.content_type,
            "content_id": message.content_id,
            "title": message.title,
            "url": message.url,
        });
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| ChannelError::Unavailable("log writer mutex poisoned".to_string()))?;
        serde_json::to_writer(&mut *guard, &record)
            .map_err(|err| ChannelError::Unavailable(err.to_string()))?;
        guard.write_all(b"\n").map_err(|err| ChannelError::Unavailable(err.to_string()))?;
        guard.flush().map_err(|err| ChannelError::Unavailable(err.to_string()))?;
        drop(guard);
        Ok(ChannelReceipt {
            channel: self.name.clone(),
            reference: Some(reference),
        })
    }
}
