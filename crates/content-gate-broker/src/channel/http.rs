// content-gate-broker/src/channel/http.rs
// ============================================================================
// Module: Channel HTTP Client
// Description: Shared JSON POST helper for HTTP channel adapters.
// Purpose: Apply one request policy and one error mapping to every adapter.
// Dependencies: reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Requests never follow redirects and carry a client-side timeout. Errors are
//! stripped of their URL before formatting, since some destinations embed
//! credentials in the path. Non-success status codes fail closed as
//! [`ChannelError::Rejected`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::redirect::Policy;
use serde_json::Value;
use url::Url;

use crate::channel::ChannelError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum characters of a response body echoed into error details.
const DETAIL_LIMIT: usize = 256;

// ============================================================================
// SECTION: Client
// ============================================================================

/// Successful response body.
#[derive(Debug)]
pub(crate) struct HttpReply {
    /// Response body text.
    pub(crate) body: String,
}

/// JSON POST client shared by HTTP adapters.
#[derive(Debug, Clone)]
pub(crate) struct HttpPoster {
    /// Underlying HTTP client.
    client: Client,
}

impl HttpPoster {
    /// Builds a client with redirects disabled and the given timeout.
    pub(crate) fn new(timeout: Duration) -> Result<Self, ChannelError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|err| ChannelError::Config(err.to_string()))?;
        Ok(Self {
            client,
        })
    }

    /// Posts `body` as JSON, failing on any non-success status.
    pub(crate) async fn post_json(
        &self,
        url: &Url,
        bearer: Option<&str>,
        body: &Value,
    ) -> Result<HttpReply, ChannelError> {
        let mut request = self.client.post(url.clone()).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status();
        let text = response.text().await.map_err(map_send_error)?;
        if !status.is_success() {
            return Err(ChannelError::Rejected {
                status: Some(status.as_u16()),
                detail: format!("http status {}: {}", status.as_u16(), snippet(&text)),
            });
        }
        Ok(HttpReply {
            body: text,
        })
    }
}

/// Parses a configured URL.
pub(crate) fn parse_url(raw: &str) -> Result<Url, ChannelError> {
    let url = Url::parse(raw).map_err(|err| ChannelError::Config(format!("invalid url: {err}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ChannelError::Config(format!("unsupported url scheme: {other}"))),
    }
}

/// Returns a bounded excerpt of a response body for error details.
pub(crate) fn snippet(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(DETAIL_LIMIT) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_string(),
    }
}

/// Classifies a transport error without its URL.
fn map_send_error(err: reqwest::Error) -> ChannelError {
    let timeout = err.is_timeout();
    let connect = err.is_connect();
    let detail = err.without_url().to_string();
    if timeout {
        ChannelError::Timeout(detail)
    } else if connect {
        ChannelError::Unavailable(detail)
    } else {
        ChannelError::Unavailable(format!("request failed: {detail}"))
    }
}
