// content-gate-broker/tests/common/mod.rs
// ============================================================================
// Module: Broker Test Helpers
// Description: Fake HTTP servers, slow channels, and sample messages.
// Purpose: Share fixtures across broker integration tests.
// Dependencies: content-gate-broker, content-gate-core, tiny_http, tokio
// ============================================================================

#![allow(dead_code, reason = "Helpers are shared across test binaries.")]

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use content_gate_broker::Channel;
use content_gate_broker::ChannelError;
use content_gate_broker::ChannelReceipt;
use content_gate_core::ChannelMessage;
use content_gate_core::ChannelName;
use content_gate_core::ContentId;
use content_gate_core::ContentType;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Request observed by a fake server.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Fake HTTP server answering a fixed script of responses.
pub struct FakeServer {
    pub base: String,
    handle: JoinHandle<Vec<CapturedRequest>>,
}

impl FakeServer {
    /// Serves one response per entry, optionally delaying each answer.
    pub fn spawn(responses: Vec<(u16, &str)>, delay: Duration) -> Self {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let responses: Vec<(u16, String)> =
            responses.into_iter().map(|(status, body)| (status, body.to_string())).collect();
        let handle = std::thread::spawn(move || {
            let mut captured = Vec::new();
            for (status, body) in responses {
                let Ok(mut request) = server.recv() else {
                    break;
                };
                let mut text = String::new();
                let _ = request.as_reader().read_to_string(&mut text);
                captured.push(CapturedRequest {
                    method: request.method().to_string(),
                    path: request.url().to_string(),
                    headers: request
                        .headers()
                        .iter()
                        .map(|header| (header.field.to_string(), header.value.to_string()))
                        .collect(),
                    body: text,
                });
                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                let content_type = Header::from_bytes("Content-Type", "application/json").unwrap();
                let response = Response::from_string(body).with_status_code(status).with_header(content_type);
                let _ = request.respond(response);
            }
            captured
        });
        Self {
            base: format!("http://{addr}"),
            handle,
        }
    }

    /// Serves a single immediate response.
    pub fn once(status: u16, body: &str) -> Self {
        Self::spawn(vec![(status, body)], Duration::ZERO)
    }

    /// Waits for the script to finish and returns the captured requests.
    pub fn finish(self) -> Vec<CapturedRequest> {
        self.handle.join().unwrap()
    }
}

/// Returns a loopback URL with nothing listening on it.
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Sample article message.
pub fn article() -> ChannelMessage {
    ChannelMessage {
        content_type: ContentType::Article,
        content_id: ContentId::new("rust-ownership"),
        title: "Ownership & <borrowing>".to_string(),
        summary: Some("A short tour".to_string()),
        url: "https://example.com/articles/rust-ownership".to_string(),
        media_url: None,
    }
}

/// Channel that sleeps before answering and counts its calls.
pub struct SlowChannel {
    name: ChannelName,
    delay: Duration,
    result: Result<(), ChannelError>,
    pub calls: Arc<AtomicUsize>,
}

impl SlowChannel {
    pub fn ok(name: &str, delay: Duration) -> Self {
        Self {
            name: ChannelName::new(name),
            delay,
            result: Ok(()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str, delay: Duration, err: ChannelError) -> Self {
        Self {
            name: ChannelName::new(name),
            delay,
            result: Err(err),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Channel for SlowChannel {
    fn name(&self) -> &ChannelName {
        &self.name
    }

    async fn deliver(&self, _message: &ChannelMessage) -> Result<ChannelReceipt, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.result.clone().map(|()| ChannelReceipt {
            channel: self.name.clone(),
            reference: None,
        })
    }
}
