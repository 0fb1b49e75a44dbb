// content-gate-server/tests/http_endpoints.rs
// ============================================================================
// Module: HTTP Endpoint Tests
// Description: Loopback tests for download and publish endpoints.
// Purpose: Pin status codes, headers, and JSON shapes of the HTTP surface.
// Dependencies: content-gate-server, reqwest, tokio, zip
// ============================================================================

//! ## Overview
//! Each test starts the real router on an ephemeral loopback port with
//! in-memory stores, a manual clock, and callback channels, then drives it
//! with `reqwest`.

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

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::io::Read;

use content_gate_core::ContentState;
use content_gate_core::PurchaseId;
use content_gate_server::WATERMARK_HEADER;
use content_gate_watermark::DEFAULT_MANIFEST_PATH;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use zip::ZipArchive;

use crate::common::ADMIN_TOKEN;
use crate::common::TestResult;
use crate::common::mixed_broker;
use crate::common::sample_epub;
use crate::common::spawn;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

async fn error_message(response: reqwest::Response) -> Result<String, String> {
    let body: Value = response.json().await.map_err(|err| err.to_string())?;
    body["error"].as_str().map(str::to_string).ok_or_else(|| format!("missing error field: {body}"))
}

fn header(response: &reqwest::Response, name: &str) -> String {
    response.headers().get(name).and_then(|value| value.to_str().ok()).unwrap_or_default().to_string()
}

// ============================================================================
// SECTION: Health
// ============================================================================

#[tokio::test]
async fn healthz_reports_ok() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let response = harness.client.get(harness.url("/healthz")).send().await.map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.map_err(|err| err.to_string())?;
    assert_eq!(body, json!({"status": "ok"}));
    Ok(())
}

// ============================================================================
// SECTION: Downloads
// ============================================================================

#[tokio::test]
async fn epub_download_is_personalized_and_counted() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-epub", "ebook", 3)?;

    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", token.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/epub+zip");
    assert_eq!(header(&response, "cache-control"), "no-store");
    assert_eq!(header(&response, WATERMARK_HEADER), "applied");
    let disposition = header(&response, "content-disposition");
    assert!(disposition.starts_with("attachment; filename=\"Field Guide _ 2nd ed.epub\""), "{disposition}");
    assert!(disposition.ends_with("filename*=UTF-8''Field%20Guide%20%E2%80%93%202nd%20ed.epub"), "{disposition}");

    let bytes = response.bytes().await.map_err(|err| err.to_string())?;
    let mut archive = ZipArchive::new(Cursor::new(bytes.to_vec())).map_err(|err| err.to_string())?;
    assert_eq!(archive.by_index(0).map_err(|err| err.to_string())?.name(), "mimetype");
    let mut manifest = String::new();
    archive
        .by_name(DEFAULT_MANIFEST_PATH)
        .map_err(|err| err.to_string())?
        .read_to_string(&mut manifest)
        .map_err(|err| err.to_string())?;
    let manifest: Value = serde_json::from_str(&manifest).map_err(|err| err.to_string())?;
    assert_eq!(manifest["email"], "reader@example.com");
    assert_eq!(manifest["purchase_id"], "p-epub");

    let record = harness.services.ledger.find(&PurchaseId::new("p-epub")).map_err(|err| err.to_string())?.unwrap();
    assert_eq!(record.download_count, 1);
    Ok(())
}

#[tokio::test]
async fn pdf_download_is_served_unchanged() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-pdf", "guide", 3)?;
    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", token.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/pdf");
    assert_eq!(header(&response, WATERMARK_HEADER), "skipped");
    let bytes = response.bytes().await.map_err(|err| err.to_string())?;
    assert_eq!(bytes.as_ref(), b"%PDF-1.7\nbody\n%%EOF");
    Ok(())
}

#[tokio::test]
async fn unknown_token_is_not_found_without_echoing_it() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let response = harness
        .client
        .get(harness.url("/download/does-not-exist-abcdef"))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let message = error_message(response).await?;
    assert_eq!(message, "download link not found");
    Ok(())
}

#[tokio::test]
async fn download_limit_is_enforced() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-limit", "guide", 1)?;
    let url = harness.url(&format!("/download/{}", token.as_str()));

    let first = harness.client.get(&url).send().await.map_err(|err| err.to_string())?;
    assert_eq!(first.status(), StatusCode::OK);
    let second = harness.client.get(&url).send().await.map_err(|err| err.to_string())?;
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_message(second).await?, "download limit reached");

    let record = harness.services.ledger.find(&PurchaseId::new("p-limit")).map_err(|err| err.to_string())?.unwrap();
    assert_eq!(record.download_count, 1);
    Ok(())
}

#[tokio::test]
async fn expired_token_is_forbidden() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-expired", "guide", 3)?;
    harness.clock.advance_millis(31 * DAY_MILLIS);
    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", token.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_message(response).await?, "download link has expired");
    Ok(())
}

#[tokio::test]
async fn refunded_purchase_is_forbidden() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-refund", "guide", 3)?;
    harness.services.ledger.refund(&PurchaseId::new("p-refund")).map_err(|err| err.to_string())?;
    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", token.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_message(response).await?, "payment has not been completed");
    Ok(())
}

#[tokio::test]
async fn unreadable_zip_falls_back_to_original_bytes() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let token = harness.paid_purchase("p-broken", "broken", 3)?;
    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", token.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, WATERMARK_HEADER), "fallback");
    let bytes = response.bytes().await.map_err(|err| err.to_string())?;
    assert_eq!(bytes.as_ref(), b"PK\x03\x04 truncated central directory");
    Ok(())
}

#[tokio::test]
async fn corrupt_and_missing_artifacts_map_to_server_errors() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let corrupt = harness.paid_purchase("p-corrupt", "corrupt", 3)?;
    let missing = harness.paid_purchase("p-missing", "missing", 3)?;

    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", corrupt.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_message(response).await?, "download could not be prepared");

    let response = harness
        .client
        .get(harness.url(&format!("/download/{}", missing.as_str())))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let message = error_message(response).await?;
    assert!(!message.contains("missing.pdf"), "{message}");

    for purchase in ["p-corrupt", "p-missing"] {
        let record = harness.services.ledger.find(&PurchaseId::new(purchase)).map_err(|err| err.to_string())?.unwrap();
        assert_eq!(record.download_count, 0, "{purchase}");
    }
    Ok(())
}

#[tokio::test]
async fn fixture_epub_is_a_valid_archive() -> TestResult {
    let bytes = sample_epub()?;
    let archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| err.to_string())?;
    assert_eq!(archive.len(), 3);
    Ok(())
}

// ============================================================================
// SECTION: Publish
// ============================================================================

#[tokio::test]
async fn publish_requires_a_bearer_token() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let body = json!({"contentType": "article", "contentId": "launch"});

    let anonymous = harness.client.post(harness.url("/publish")).json(&body).send().await.map_err(|err| err.to_string())?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header(&anonymous, "www-authenticate"), "Bearer");

    let wrong = harness
        .client
        .post(harness.url("/publish"))
        .bearer_auth("not-the-admin-token-000")
        .json(&body)
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn publish_reports_per_channel_results() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    harness.add_content("launch", ContentState::Published)?;
    let response = harness
        .client
        .post(harness.url("/publish"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"contentType": "article", "contentId": "launch"}))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.map_err(|err| err.to_string())?;
    assert_eq!(body["success"], true);
    assert_eq!(body["results"]["broadcast"], json!({"success": true}));
    assert_eq!(body["results"]["newsletter"]["success"], false);
    assert!(body["results"]["newsletter"]["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn publish_with_primary_skipped_uses_remaining_channels() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    harness.add_content("launch", ContentState::Published)?;
    let response = harness
        .client
        .post(harness.url("/publish"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"contentType": "article", "contentId": "launch", "skipChannels": ["broadcast"]}))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.map_err(|err| err.to_string())?;
    assert_eq!(body["success"], false);
    assert!(body["results"].get("broadcast").is_none());
    Ok(())
}

#[tokio::test]
async fn publish_error_statuses() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    harness.add_content("draft", ContentState::Draft)?;
    harness.add_content("live", ContentState::Published)?;
    let cases = [
        (json!({"contentType": "article", "contentId": "nope"}), StatusCode::NOT_FOUND),
        (json!({"contentType": "article", "contentId": "draft"}), StatusCode::CONFLICT),
        (json!({"contentType": "article", "contentId": "live", "skipChannels": ["fax"]}), StatusCode::BAD_REQUEST),
        (
            json!({"contentType": "article", "contentId": "live", "skipChannels": ["broadcast", "newsletter"]}),
            StatusCode::BAD_REQUEST,
        ),
        (json!({"contentType": "podcast", "contentId": "live"}), StatusCode::BAD_REQUEST),
        (json!({"contentId": "live"}), StatusCode::BAD_REQUEST),
    ];
    for (body, expected) in cases {
        let response = harness
            .client
            .post(harness.url("/publish"))
            .bearer_auth(ADMIN_TOKEN)
            .json(&body)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        assert_eq!(response.status(), expected, "{body}");
        error_message(response).await?;
    }
    Ok(())
}

#[tokio::test]
async fn oversized_bodies_are_rejected() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    let padding = "x".repeat(8 * 1024);
    let response = harness
        .client
        .post(harness.url("/publish"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"contentType": "article", "contentId": padding}))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

// ============================================================================
// SECTION: Queue
// ============================================================================

#[tokio::test]
async fn queue_enqueue_list_and_process() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    harness.add_content("launch", ContentState::Published)?;

    let created = harness
        .client
        .post(harness.url("/publish/queue"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"contentType": "article", "contentId": "launch"}))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let task: Value = created.json().await.map_err(|err| err.to_string())?;
    assert_eq!(task["status"], "pending");
    assert_eq!(task["content_id"], "launch");

    let pending: Value = harness
        .client
        .get(harness.url("/publish/queue?status=pending&limit=10"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .map_err(|err| err.to_string())?
        .json()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(pending["tasks"].as_array().map(Vec::len), Some(1));

    let processed = harness
        .client
        .post(harness.url("/publish/queue/process"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(processed.status(), StatusCode::OK);
    let summary: Value = processed.json().await.map_err(|err| err.to_string())?;
    assert_eq!(summary, json!({"processed": 1, "failed": 0, "requeued": 0, "total": 1}));

    let completed: Value = harness
        .client
        .get(harness.url("/publish/queue?status=completed"))
        .bearer_auth(ADMIN_TOKEN)
        .send()
        .await
        .map_err(|err| err.to_string())?
        .json()
        .await
        .map_err(|err| err.to_string())?;
    let tasks = completed["tasks"].as_array().cloned().unwrap_or_default();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["delivered_channels"], json!(["broadcast"]));
    Ok(())
}

#[tokio::test]
async fn queue_process_accepts_an_explicit_limit() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    harness.add_content("one", ContentState::Published)?;
    harness.add_content("two", ContentState::Published)?;
    for content_id in ["one", "two"] {
        let response = harness
            .client
            .post(harness.url("/publish/queue"))
            .bearer_auth(ADMIN_TOKEN)
            .json(&json!({"contentType": "article", "contentId": content_id}))
            .send()
            .await
            .map_err(|err| err.to_string())?;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    let summary: Value = harness
        .client
        .post(harness.url("/publish/queue/process"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"limit": 1}))
        .send()
        .await
        .map_err(|err| err.to_string())?
        .json()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(summary["total"], 1);
    Ok(())
}

#[tokio::test]
async fn queue_rejects_bad_filters_and_limits() -> TestResult {
    let harness = spawn(mixed_broker()?).await?;
    for query in ["status=bogus", "limit=0", "limit=abc", "limit=100000"] {
        let response = harness
            .client
            .get(harness.url(&format!("/publish/queue?{query}")))
            .bearer_auth(ADMIN_TOKEN)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{query}");
    }
    let response = harness
        .client
        .post(harness.url("/publish/queue/process"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({"limit": 0}))
        .send()
        .await
        .map_err(|err| err.to_string())?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let anonymous = harness.client.get(harness.url("/publish/queue")).send().await.map_err(|err| err.to_string())?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
