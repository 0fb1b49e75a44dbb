// content-gate-broker/src/channel/email.rs
// ============================================================================
// Module: Email List Channel
// Description: Newsletter campaign creation through a provider API.
// Purpose: Send published content to the mailing list.
// Dependencies: async-trait, content-gate-core, serde_json, url
// ============================================================================

//! ## Overview
//! Creates and sends a campaign with `POST {api_base}/campaigns`. The API key
//! travels as a bearer token; the body names the list, subject, and HTML.

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
use crate::channel::bot::reference_text;
use crate::channel::http::HttpPoster;
use crate::channel::http::parse_url;
use crate::render::email_html;
use crate::render::email_subject;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Email list settings.
#[derive(Clone)]
pub struct EmailListConfig {
    /// Registered channel name.
    pub name: ChannelName,
    /// Provider API base URL.
    pub api_base: String,
    /// Provider API key.
    pub api_key: String,
    /// Mailing list identifier.
    pub list_id: String,
    /// Client-side request timeout.
    pub timeout: Duration,
}

impl EmailListConfig {
    /// Creates settings with the default timeout.
    #[must_use]
    pub fn new(
        name: impl Into<ChannelName>,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        list_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            api_base: api_base.into(),
            api_key: api_key.into(),
            list_id: list_id.into(),
            timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }
}

// ============================================================================
// SECTION: Channel
// ============================================================================

/// Email list channel adapter.
pub struct EmailListChannel {
    /// Registered channel name.
    name: ChannelName,
    /// Campaign endpoint.
    campaigns: Url,
    /// Provider API key.
    api_key: String,
    /// Mailing list identifier.
    list_id: String,
    /// HTTP client.
    http: HttpPoster,
}

impl EmailListChannel {
    /// Builds the adapter.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] when the base URL, key, or list id is
    /// invalid.
    pub fn new(config: EmailListConfig) -> Result<Self, ChannelError> {
        if config.api_key.trim().is_empty() {
            return Err(ChannelError::Config("email api key is empty".to_string()));
        }
        if config.list_id.trim().is_empty() {
            return Err(ChannelError::Config("email list id is empty".to_string()));
        }
        parse_url(&config.api_base)?;
        let campaigns = parse_url(&format!("{}/campaigns", config.api_base.trim_end_matches('/')))?;
        Ok(Self {
            name: config.name,
            campaigns,
            api_key: config.api_key,
            list_id: config.list_id,
            http: HttpPoster::new(config.timeout)?,
        })
    }
}

#[async_trait]
impl Channel for EmailListChannel {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        let body = json!({
            "list_id": self.list_id,
            "subject": email_subject(message),
            "html": email_html(message),
            "send_now": true,
        });
        let reply = self.http.post_json(&self.campaigns, Some(&self.api_key), &body).await?;
        let reference = serde_json::from_str::<Value>(&reply.body)
            .ok()
            .and_then(|value| value.get("id").map(reference_text));
        Ok(ChannelReceipt {
            channel: self.name.clone(),
            reference,
        })
    }
}
