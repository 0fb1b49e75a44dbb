// content-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic starting point for `content-gate config example`.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The example validates as-is. Secrets are named by environment variable
//! and are only required when the server is assembled.

/// Returns a canonical example `content-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[server]
bind = "127.0.0.1:8080"
max_body_bytes = 65536

[server.auth]
token_env = "CONTENT_GATE_ADMIN_TOKEN"

[server.audit]
sink = "file"
path = "content-gate-audit.jsonl"

[store]
type = "sqlite"
path = "content-gate.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[entitlements]
default_max_downloads = 5
token_ttl_secs = 2592000

[delivery]
artifacts_root = "artifacts"
fetch_timeout_ms = 10000

[delivery.watermark]
enabled = true
manifest_path = "META-INF/purchase.json"

[[delivery.resources]]
id = "ebook"
path = "books/rust-in-practice.epub"
filename = "Rust in Practice.epub"
format = "epub"

[[delivery.resources]]
id = "guide-async"
path = "guides/async.pdf"

[publish]
max_retries = 3
backoff_base_ms = 30000
backoff_max_ms = 1800000
batch_limit = 20
claim_lease_ms = 600000
aggregation = "primary"
primary_channel = "broadcast"

[[publish.channels]]
type = "broadcast"
name = "broadcast"
chat_id = "@example_channel"
token_env = "CONTENT_GATE_BROADCAST_TOKEN"
timeout_ms = 10000

[[publish.channels]]
type = "bot"
name = "bot"
endpoint = "https://bot.example.com/hooks/content"
token_env = "CONTENT_GATE_BOT_TOKEN"

[[publish.channels]]
type = "email_list"
name = "newsletter"
api_base = "https://newsletter.example.com/api/v1"
list_id = "weekly"
api_key_env = "CONTENT_GATE_NEWSLETTER_KEY"
timeout_ms = 15000
"#,
    )
}
