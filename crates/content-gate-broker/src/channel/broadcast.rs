// content-gate-broker/src/channel/broadcast.rs
// ============================================================================
// Module: Broadcast Channel
// Description: Bot-API broadcast posts into a public channel chat.
// Purpose: Announce published content to channel subscribers.
// Dependencies: async-trait, content-gate-core, serde, serde_json, url
// ============================================================================

//! ## Overview
//! Posts to `{api_base}/bot{token}/sendMessage`, or `sendPhoto` when the
//! message carries a media URL. The API answers `{"ok": bool, ...}`; a
//! response with `ok: false` is a rejection even under a 2xx status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::broker::DEFAULT_CHANNEL_TIMEOUT;
use crate::channel::Channel;
use crate::channel::ChannelError;
use crate::channel::ChannelReceipt;
use crate::channel::http::HttpPoster;
use crate::channel::http::parse_url;
use crate::channel::http::snippet;
use crate::render::CAPTION_LIMIT;
use crate::render::TEXT_LIMIT;
use crate::render::broadcast_text;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default bot API base URL.
pub const DEFAULT_BROADCAST_API_BASE: &str = "https://api.telegram.org";

/// Broadcast channel settings.
#[derive(Clone)]
pub struct BroadcastConfig {
    /// Registered channel name.
    pub name: ChannelName,
    /// Bot API base URL.
    pub api_base: String,
    /// Bot token. Embedded in the request path.
    pub bot_token: String,
    /// Target chat identifier (numeric id or `@channel`).
    pub chat_id: String,
    /// Client-side request timeout.
    pub timeout: Duration,
}

impl BroadcastConfig {
    /// Creates settings with the default API base and timeout.
    #[must_use]
    pub fn new(name: impl Into<ChannelName>, bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_base: DEFAULT_BROADCAST_API_BASE.to_string(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    /// Replaces the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// Broadcast channel adapter.
pub struct BroadcastChannel {
    /// Registered channel name.
    name: ChannelName,
    /// `sendMessage` endpoint.
    send_message: Url,
    /// `sendPhoto` endpoint.
    send_photo: Url,
    /// Target chat identifier.
    chat_id: String,
    /// HTTP client.
    http: HttpPoster,
}

impl BroadcastChannel {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] when the token, chat id, or base URL
    /// is invalid.
    pub fn new(config: BroadcastConfig) -> Result<Self, ChannelError> {
        if config.bot_token.trim().is_empty() {
            return Err(ChannelError::Config("broadcast bot token is empty".to_string()));
        }
        if config.chat_id.trim().is_empty() {
            return Err(ChannelError::Config("broadcast chat id is empty".to_string()));
        }
        parse_url(&config.api_base)?;
        let base = config.api_base.trim_end_matches('/');
        let send_message = parse_url(&format!("{base}/bot{}/sendMessage", config.bot_token))?;
        let send_photo = parse_url(&format!("{base}/bot{}/sendPhoto", config.bot_token))?;
        Ok(Self {
            name: config.name,
            send_message,
            send_photo,
            chat_id: config.chat_id,
            http: HttpPoster::new(config.timeout)?,
        })
    }
}

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiReply {
    /// Success flag.
    ok: bool,
    /// Error description when `ok` is false.
    #[serde(default)]
    description: Option<String>,
    /// Sent message when `ok` is true.
    #[serde(default)]
    result: Option<ApiMessage>,
}

/// Sent message summary.
#[derive(Debug, Deserialize)]
struct ApiMessage {
    /// Message identifier.
    message_id: i64,
}

#[async_trait]
impl Channel for BroadcastChannel {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        let (url, body) = match &message.media_url {
            Some(media_url) => (
                &self.send_photo,
                json!({
                    "chat_id": self.chat_id,
                    "photo": media_url,
                    "caption": broadcast_text(message, CAPTION_LIMIT),
                    "parse_mode": "HTML",
                }),
            ),
            None => (
                &self.send_message,
                json!({
                    "chat_id": self.chat_id,
                    "text": broadcast_text(message, TEXT_LIMIT),
                    "parse_mode": "HTML",
                }),
            ),
        };
        let reply = self.http.post_json(url, None, &body).await?;
        let parsed: ApiReply = serde_json::from_str(&reply.body).map_err(|err| ChannelError::Rejected {
            status: None,
            detail: format!("malformed api response: {err}"),
        })?;
        if !parsed.ok {
            return Err(ChannelError::Rejected {
                status: None,
                detail: parsed.description.unwrap_or_else(|| snippet(&reply.body)),
            });
        }
        Ok(ChannelReceipt {
            channel: self.name.clone(),
            reference: parsed.result.map(|result| result.message_id.to_string()),
        })
    }
}
