// content-gate-broker/tests/http_channels.rs
// ============================================================================
// Module: HTTP Channel Tests
// Description: Request shapes and error mapping for HTTP channel adapters.
// Purpose: Validate adapters against fake local servers.
// Dependencies: content-gate-broker, content-gate-core, tiny_http, tokio
// ============================================================================

//! Request shapes and error mapping for HTTP channel adapters.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::time::Duration;

use content_gate_broker::BotChannel;
use content_gate_broker::BotConfig;
use content_gate_broker::BroadcastChannel;
use content_gate_broker::BroadcastConfig;
use content_gate_broker::Channel;
use content_gate_broker::ChannelError;
use content_gate_broker::EmailListChannel;
use content_gate_broker::EmailListConfig;
use content_gate_broker::LogChannel;
use content_gate_core::ChannelFailureKind;

use crate::common::FakeServer;
use crate::common::article;
use crate::common::closed_port_url;

const BOT_TOKEN: &str = "123456:secret-token";

fn broadcast(base: &str) -> BroadcastChannel {
    BroadcastChannel::new(BroadcastConfig::new("broadcast", BOT_TOKEN, "@updates").with_api_base(base)).unwrap()
}

// ============================================================================
// SECTION: Broadcast
// ============================================================================

#[tokio::test]
async fn broadcast_posts_send_message() {
    let server = FakeServer::once(200, r#"{"ok":true,"result":{"message_id":42}}"#);
    let channel = broadcast(&server.base);

    let receipt = channel.deliver(&article()).await.unwrap();

    assert_eq!(receipt.reference.as_deref(), Some("42"));
    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, format!("/bot{BOT_TOKEN}/sendMessage"));
    let body = requests[0].json();
    assert_eq!(body["chat_id"], "@updates");
    assert_eq!(body["parse_mode"], "HTML");
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("Ownership &amp; &lt;borrowing&gt;"));
    assert!(text.contains("https://example.com/articles/rust-ownership"));
}

#[tokio::test]
async fn broadcast_uses_send_photo_for_media() {
    let server = FakeServer::once(200, r#"{"ok":true,"result":{"message_id":7}}"#);
    let channel = broadcast(&server.base);
    let mut message = article();
    message.media_url = Some("https://example.com/cover.png".to_string());

    channel.deliver(&message).await.unwrap();

    let requests = server.finish();
    assert_eq!(requests[0].path, format!("/bot{BOT_TOKEN}/sendPhoto"));
    let body = requests[0].json();
    assert_eq!(body["photo"], "https://example.com/cover.png");
    assert!(body["caption"].as_str().unwrap().contains("A short tour"));
}

#[tokio::test]
async fn broadcast_ok_false_is_rejected() {
    let server = FakeServer::once(200, r#"{"ok":false,"description":"chat not found"}"#);
    let channel = broadcast(&server.base);

    let err = channel.deliver(&article()).await.unwrap_err();

    assert_eq!(err.kind(), ChannelFailureKind::Rejected);
    assert!(err.to_string().contains("chat not found"));
    server.finish();
}

#[tokio::test]
async fn broadcast_errors_never_echo_the_token() {
    let server = FakeServer::once(401, r#"{"ok":false,"description":"Unauthorized"}"#);
    let rejected = broadcast(&server.base).deliver(&article()).await.unwrap_err();
    server.finish();
    assert_eq!(
        rejected,
        ChannelError::Rejected {
            status: Some(401),
            detail: r#"http status 401: {"ok":false,"description":"Unauthorized"}"#.to_string(),
        }
    );
    assert!(!rejected.to_string().contains("secret-token"));

    let unreachable = broadcast(&closed_port_url()).deliver(&article()).await.unwrap_err();
    assert_eq!(unreachable.kind(), ChannelFailureKind::Unavailable);
    assert!(!unreachable.to_string().contains("secret-token"));
}

#[test]
fn broadcast_rejects_missing_settings() {
    let empty_token = BroadcastChannel::new(BroadcastConfig::new("broadcast", " ", "@updates"));
    assert!(matches!(empty_token, Err(ChannelError::Config(_))));
    let empty_chat = BroadcastChannel::new(BroadcastConfig::new("broadcast", BOT_TOKEN, ""));
    assert!(matches!(empty_chat, Err(ChannelError::Config(_))));
    let bad_scheme =
        BroadcastChannel::new(BroadcastConfig::new("broadcast", BOT_TOKEN, "@updates").with_api_base("ftp://x"));
    assert!(matches!(bad_scheme, Err(ChannelError::Config(_))));
}

// ============================================================================
// SECTION: Bot
// ============================================================================

#[tokio::test]
async fn bot_posts_event_with_bearer_token() {
    let server = FakeServer::once(202, r#"{"id":"evt-9"}"#);
    let endpoint = format!("{}/hooks/content", server.base);
    let channel = BotChannel::new(BotConfig::new("bot", endpoint, "bot-secret")).unwrap();

    let receipt = channel.deliver(&article()).await.unwrap();

    assert_eq!(receipt.reference.as_deref(), Some("evt-9"));
    let requests = server.finish();
    assert_eq!(requests[0].path, "/hooks/content");
    assert_eq!(requests[0].header("Authorization"), Some("Bearer bot-secret"));
    let body = requests[0].json();
    assert_eq!(body["event"], "content_published");
    assert_eq!(body["content_type"], "article");
    assert_eq!(body["content_id"], "rust-ownership");
    assert_eq!(body["title"], "Ownership & <borrowing>");
}

#[tokio::test]
async fn bot_server_error_is_rejected_with_status() {
    let server = FakeServer::once(503, "maintenance");
    let channel = BotChannel::new(BotConfig::new("bot", server.base.clone(), "bot-secret")).unwrap();

    let err = channel.deliver(&article()).await.unwrap_err();

    assert!(matches!(
        err,
        ChannelError::Rejected {
            status: Some(503),
            ..
        }
    ));
    server.finish();
}

#[tokio::test]
async fn bot_slow_response_times_out() {
    let server = FakeServer::spawn(vec![(200, "{}")], Duration::from_millis(600));
    let mut config = BotConfig::new("bot", server.base.clone(), "bot-secret");
    config.timeout = Duration::from_millis(100);
    let channel = BotChannel::new(config).unwrap();

    let err = channel.deliver(&article()).await.unwrap_err();

    assert_eq!(err.kind(), ChannelFailureKind::Timeout);
    server.finish();
}

// ============================================================================
// SECTION: Email List
// ============================================================================

#[tokio::test]
async fn email_list_creates_campaign() {
    let server = FakeServer::once(201, r#"{"id":314}"#);
    let channel =
        EmailListChannel::new(EmailListConfig::new("email", format!("{}/api/", server.base), "key-1", "list-7"))
            .unwrap();

    let receipt = channel.deliver(&article()).await.unwrap();

    assert_eq!(receipt.reference.as_deref(), Some("314"));
    let requests = server.finish();
    assert_eq!(requests[0].path, "/api/campaigns");
    assert_eq!(requests[0].header("Authorization"), Some("Bearer key-1"));
    let body = requests[0].json();
    assert_eq!(body["list_id"], "list-7");
    assert_eq!(body["subject"], "New article: Ownership & <borrowing>");
    assert_eq!(body["send_now"], true);
    let html = body["html"].as_str().unwrap();
    assert!(html.contains("<h1>Ownership &amp; &lt;borrowing&gt;</h1>"));
    assert!(html.contains("<p>A short tour</p>"));
}

#[test]
fn email_list_requires_key_and_list() {
    let no_key = EmailListChannel::new(EmailListConfig::new("email", "https://mail.example.com", "", "list"));
    assert!(matches!(no_key, Err(ChannelError::Config(_))));
    let no_list = EmailListChannel::new(EmailListConfig::new("email", "https://mail.example.com", "key", ""));
    assert!(matches!(no_list, Err(ChannelError::Config(_))));
}

// ============================================================================
// SECTION: Log
// ============================================================================

#[tokio::test]
async fn log_channel_writes_json_lines() {
    let channel = LogChannel::new("log", Vec::new());
    let first = channel.deliver(&article()).await.unwrap();
    let second = channel.deliver(&article()).await.unwrap();
    assert_eq!(first.reference.as_deref(), Some("log-1"));
    assert_eq!(second.reference.as_deref(), Some("log-2"));

    let output = String::from_utf8(channel.into_writer().unwrap()).unwrap();
    let lines: Vec<serde_json::Value> = output.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["content_id"], "rust-ownership");
    assert_eq!(lines[1]["reference"], "log-2");
}
