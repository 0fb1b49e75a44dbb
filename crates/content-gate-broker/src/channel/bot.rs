// content-gate-broker/src/channel/bot.rs
// ============================================================================
// Module: Bot Webhook Channel
// Description: JSON webhook notifying a bot service about new content.
// Purpose: Let the bot fan the notification out to its own subscribers.
// Dependencies: async-trait, content-gate-core, serde_json, url
// ============================================================================

//! ## Overview
//! Posts a `content_published` event to the configured endpoint with a
//! bearer token. Any 2xx status is acceptance; the body is ignored except for
//! an optional `id` used as the receipt reference.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use serde_json::Value;
use serde_json::json;
use url::Url;

use crate::broker::DEFAULT_CHANNEL_TIMEOUT;
use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::channel::ChannelReceipt;
use crate::channel::http::HttpPoster;
use crate::channel::http::parse_url;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Event name sent to the bot service.
pub const BOT_EVENT: &str = "content_published";

/// Bot webhook settings.
#[derive(Clone)]
pub struct BotConfig {
    /// Registered channel name.
    pub name: ChannelName,
    /// Webhook endpoint.
    pub endpoint: String,
    /// Bearer token sent with each request.
    pub token: String,
    /// Client-side request timeout.
    pub timeout: Duration,
}

impl BotConfig {
    /// Creates settings with the default timeout.
    #[must_use]
    pub fn new(name: impl Into<ChannelName>, endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            token: token.into(),
            timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// Bot webhook channel adapter.
pub struct BotChannel {
    /// Registered channel name.
    name: ChannelName,
    /// Webhook endpoint.
    endpoint: Url,
    /// Bearer token.
    token: String,
    /// HTTP client.
    http: HttpPoster,
}

impl BotChannel {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] when the endpoint or token is invalid.
    pub fn new(config: BotConfig) -> Result<Self, ChannelError> {
        if config.token.trim().is_empty() {
            return Err(ChannelError::Config("bot token is empty".to_string()));
        }
        Ok(Self {
            name: config.name,
            endpoint: parse_url(&config.endpoint)?,
            token: config.token,
            http: HttpPoster::new(config.timeout)?,
        })
    }
}

#[async_trait]
impl Channel for BotChannel {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        let body = json!({
            "event": BOT_EVENT,
            "content_type": message.content_type,
            "content_id": message.content_id,
            "title": message.title,
            "summary": message.summary,
            "url": message.url,
            "media_url": message.media_url,
        });
        let reply = self.http.post_json(&self.endpoint, Some(&self.token), &body).await?;
        let reference = serde_json::from_str::<Value>(&reply.body)
            .ok()
            .and_then(|value| value.get("id").map(reference_text));
        Ok(ChannelReceipt {
            channel: self.name.clone(),
            reference,
        })
    }
}

/// Renders a JSON id as text.
pub(crate) fn reference_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
