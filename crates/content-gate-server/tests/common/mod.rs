// content-gate-server/tests/common/mod.rs
// =============================================================================
// Module: Server Test Helpers
// Description: Loopback server harness and artifact fixtures.
// Purpose: Run the real router on 127.0.0.1 with in-memory stores.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::io::Cursor;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use content_gate_broker::CallbackChannel;
use content_gate_broker::ChannelError;
use content_gate_broker::FanoutBroker;
use content_gate_config::ContentGateConfig;
use content_gate_core::ContentId;
use content_gate_core::ContentState;
use content_gate_core::ContentType;
use content_gate_core::DownloadToken;
use content_gate_core::ManualClock;
use content_gate_core::NoopAuditSink;
use content_gate_core::PublishableContent;
use content_gate_core::PurchaseId;
use content_gate_core::PurchaseRequest;
use content_gate_core::ResourceId;
use content_gate_core::Timestamp;
use content_gate_server::ContentGateServer;
use content_gate_server::Services;
use content_gate_server::Stores;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use zip::CompressionMethod;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Test result alias.
pub type TestResult = Result<(), String>;

/// Admin token accepted by the harness.
pub const ADMIN_TOKEN: &str = "test-admin-token-0123456789";

/// Harness start time.
pub const START_MILLIS: i64 = 1_700_000_000_000;

/// Running loopback server.
pub struct Harness {
    /// `http://127.0.0.1:<port>`.
    pub base_url: String,
    /// HTTP client.
    pub client: reqwest::Client,
    /// Services behind the router.
    pub services: Arc<Services>,
    /// Clock shared with the services.
    pub clock: Arc<ManualClock>,
    /// Artifacts directory.
    pub dir: TempDir,
    /// Server task.
    handle: JoinHandle<()>,
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Harness {
    /// Returns an absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Creates and confirms a purchase, returning its token.
    pub fn paid_purchase(&self, purchase_id: &str, resource_id: &str, max_downloads: u32) -> Result<DownloadToken, String> {
        self.services
            .ledger
            .create_purchase(PurchaseRequest {
                purchase_id: PurchaseId::new(purchase_id),
                resource_id: ResourceId::new(resource_id),
                purchaser_email: "reader@example.com".to_string(),
                purchaser_name: "Ada Reader".to_string(),
                max_downloads: Some(max_downloads),
            })
            .map_err(|err| err.to_string())?;
        let record = self.services.ledger.confirm_payment(&PurchaseId::new(purchase_id)).map_err(|err| err.to_string())?;
        record.download_token.ok_or_else(|| "confirmed purchase has no token".to_string())
    }

    /// Stores a content item in the catalog.
    pub fn add_content(&self, content_id: &str, state: ContentState) -> TestResult {
        self.services
            .catalog
            .upsert(&PublishableContent {
                content_type: ContentType::Article,
                content_id: ContentId::new(content_id),
                title: "Launch notes".to_string(),
                summary: Some("What shipped this week".to_string()),
                url: format!("https://example.com/articles/{content_id}"),
                media_url: None,
                state,
            })
            .map_err(|err| err.to_string())
    }
}

/// Builds a config rooted at `artifacts_root` with the fixture resources.
pub fn harness_config(artifacts_root: &Path) -> Result<ContentGateConfig, String> {
    let toml = format!(
        r#"
[server]
bind = "127.0.0.1:0"
max_body_bytes = 4096

[server.auth]
tokens = ["{ADMIN_TOKEN}"]

[server.audit]
sink = "none"

[delivery]
artifacts_root = {root:?}

[[delivery.resources]]
id = "ebook"
path = "ebook.epub"
filename = "Field Guide – 2nd ed.epub"

[[delivery.resources]]
id = "guide"
path = "guide.pdf"

[[delivery.resources]]
id = "broken"
path = "broken.epub"

[[delivery.resources]]
id = "corrupt"
path = "corrupt.epub"

[[delivery.resources]]
id = "missing"
path = "missing.pdf"

[publish]
primary_channel = "broadcast"
"#,
        root = artifacts_root.display().to_string()
    );
    ContentGateConfig::from_toml(&toml).map_err(|err| err.to_string())
}

/// Writes the fixture artifacts into `dir`.
pub fn write_artifacts(dir: &Path) -> TestResult {
    std::fs::write(dir.join("ebook.epub"), sample_epub()?).map_err(|err| err.to_string())?;
    std::fs::write(dir.join("guide.pdf"), b"%PDF-1.7\nbody\n%%EOF").map_err(|err| err.to_string())?;
    std::fs::write(dir.join("broken.epub"), b"PK\x03\x04 truncated central directory").map_err(|err| err.to_string())?;
    std::fs::write(dir.join("corrupt.epub"), b"not a zip at all").map_err(|err| err.to_string())
}

/// Builds a small EPUB-shaped archive.
pub fn sample_epub() -> Result<Vec<u8>, String> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let entries: [(&str, &[u8], CompressionMethod); 3] = [
        ("mimetype", b"application/epub+zip", CompressionMethod::Stored),
        ("META-INF/container.xml", b"<container/>", CompressionMethod::Deflated),
        ("OEBPS/chapter1.xhtml", b"<html><body><p>Chapter one.</p></body></html>", CompressionMethod::Deflated),
    ];
    for (name, body, method) in entries {
        writer
            .start_file(name, SimpleFileOptions::default().compression_method(method))
            .map_err(|err| err.to_string())?;
        writer.write_all(body).map_err(|err| err.to_string())?;
    }
    Ok(writer.finish().map_err(|err| err.to_string())?.into_inner())
}

/// Broker with a succeeding `broadcast` and a failing `newsletter` channel.
pub fn mixed_broker() -> Result<FanoutBroker, String> {
    FanoutBroker::builder()
        .channel(CallbackChannel::new("broadcast", |_| Ok(Some("msg-1".to_string()))))
        .channel(CallbackChannel::new("newsletter", |_| {
            Err(ChannelError::Rejected {
                status: Some(502),
                detail: "provider unavailable".to_string(),
            })
        }))
        .build()
        .map_err(|err| err.to_string())
}

/// Starts a loopback server over `broker`.
pub async fn spawn(broker: FanoutBroker) -> Result<Harness, String> {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    write_artifacts(dir.path())?;
    let config = harness_config(dir.path())?;
    let clock = Arc::new(ManualClock::new(Timestamp::from_unix_millis(START_MILLIS)));
    let services = Services::assemble(
        &config,
        Stores::in_memory(),
        Arc::new(broker),
        Arc::new(NoopAuditSink),
        clock.clone(),
    )
    .map_err(|err| err.to_string())?;
    let server = ContentGateServer::with_services(&config.server, services).map_err(|err| err.to_string())?;
    let services = server.services();
    let listener = TcpListener::bind("127.0.0.1:0").await.map_err(|err| err.to_string())?;
    let addr = listener.local_addr().map_err(|err| err.to_string())?;
    let handle = tokio::spawn(async move {
        let _ = server.serve_on(listener).await;
    });
    Ok(Harness {
        base_url: format!("http://{addr}"),
        client: reqwest::Client::new(),
        services,
        clock,
        dir,
        handle,
    })
}
