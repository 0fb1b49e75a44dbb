// content-gate-server/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: Download and publish-administration endpoints.
// Purpose: Map HTTP requests onto runtime services with stable status codes.
// Dependencies: axum, content-gate-core, serde_json
// ============================================================================

//! ## Overview
//! `GET /download/{token}` is public; the entitlement counter bounds how
//! often a token is served. Every `/publish` route requires an admin bearer
//! token. Failures are JSON `{"error": ...}` bodies whose messages never carry
//! tokens, purchase identifiers, or storage paths. Request bodies are read
//! as raw bytes and decoded here so malformed input maps to a JSON 400.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::http::header::CACHE_CONTROL;
use axum::http::header::CONTENT_DISPOSITION;
use axum::http::header::CONTENT_TYPE;
use axum::http::header::WWW_AUTHENTICATE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use content_gate_config::MAX_BATCH_LIMIT;
use content_gate_core::ChannelName;
use content_gate_core::ContentId;
use content_gate_core::ContentType;
use content_gate_core::DeliveryError;
use content_gate_core::DownloadToken;
use content_gate_core::PublishError;
use content_gate_core::PublishRequest;
use content_gate_core::PublishTask;
use content_gate_core::Rejection;
use content_gate_core::TaskFilter;
use content_gate_core::TaskStatus;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::auth::AdminAuth;
use crate::disposition::content_disposition;
use crate::services::Services;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response header reporting the personalization result.
pub const WATERMARK_HEADER: &str = "x-content-gate-watermark";

/// Default number of tasks returned by the queue listing.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Largest accepted download token, in bytes.
const MAX_TOKEN_PATH_BYTES: usize = 256;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Runtime services.
    pub services: Arc<Services>,
    /// Admin authenticator.
    pub auth: AdminAuth,
    /// Maximum accepted request body size.
    pub max_body_bytes: usize,
}

/// Builds the route table over `state`.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(healthz))
        .route("/download/{token}", get(download))
        .route("/publish", post(publish))
        .route("/publish/queue", get(list_queue).post(enqueue))
        .route("/publish/queue/process", post(process_queue))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(Arc::new(state))
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// JSON error response.
#[derive(Debug)]
struct ApiError {
    /// HTTP status.
    status: StatusCode,
    /// Client-facing message.
    message: String,
}

impl ApiError {
    /// Creates an error response.
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Generic 500 that hides the underlying failure.
    fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
    }
}

/// Error body.
#[derive(Serialize)]
struct ErrorBody {
    /// Message.
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let unauthorized = self.status == StatusCode::UNAUTHORIZED;
        let mut response = (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response();
        if unauthorized {
            response.headers_mut().insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Maps a download failure to a response.
fn download_error(err: &DeliveryError) -> ApiError {
    match err {
        DeliveryError::Rejected(Rejection::NotFound) => {
            ApiError::new(StatusCode::NOT_FOUND, Rejection::NotFound.message())
        }
        DeliveryError::Rejected(rejection) => ApiError::new(StatusCode::FORBIDDEN, rejection.message()),
        DeliveryError::StorageUnavailable(_) => {
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "download temporarily unavailable")
        }
        DeliveryError::CorruptSource(_) => {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "download could not be prepared")
        }
        DeliveryError::Store(_) => ApiError::internal(),
    }
}

/// Maps a publish failure to a response.
fn publish_error(err: PublishError) -> ApiError {
    match err {
        PublishError::ContentNotFound(..) => ApiError::new(StatusCode::NOT_FOUND, "content not found"),
        PublishError::ContentNotPublished(..) => ApiError::new(StatusCode::CONFLICT, "content is not published"),
        PublishError::InvalidRequest(message) => ApiError::new(StatusCode::BAD_REQUEST, message),
        PublishError::Store(err) => {
            error!(error = %err, "publish store failure");
            ApiError::internal()
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects requests without a valid admin bearer token.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    state.auth.authorize(headers).map_err(|err| {
        warn!(reason = %err, "admin request refused");
        ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized")
    })
}

/// Decodes a JSON body, treating an empty body as `default` when given.
fn decode_body<T: DeserializeOwned>(bytes: &Bytes, max_body_bytes: usize, default: Option<T>) -> Result<T, ApiError> {
    if bytes.len() > max_body_bytes {
        return Err(ApiError::new(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
    }
    if bytes.iter().all(u8::is_ascii_whitespace)
        && let Some(value) = default
    {
        return Ok(value);
    }
    serde_json::from_slice(bytes)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {err}")))
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Liveness body.
#[derive(Serialize)]
struct HealthBody {
    /// Always `ok`.
    status: &'static str,
}

/// Liveness probe.
async fn healthz() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
    })
}

// ============================================================================
// SECTION: Download
// ============================================================================

/// Serves one download.
async fn download(State(state): State<Arc<AppState>>, Path(token): Path<String>) -> Response {
    if token.len() > MAX_TOKEN_PATH_BYTES {
        return download_error(&DeliveryError::Rejected(Rejection::NotFound)).into_response();
    }
    let token = DownloadToken::new(token);
    match state.services.delivery.download(&token).await {
        Ok(delivery) => {
            let headers = [
                (CONTENT_TYPE, delivery.content_type.to_string()),
                (CONTENT_DISPOSITION, content_disposition(&delivery.filename)),
                (CACHE_CONTROL, "no-store".to_string()),
                (HeaderName::from_static(WATERMARK_HEADER), delivery.watermark.label().to_string()),
            ];
            (StatusCode::OK, headers, delivery.bytes).into_response()
        }
        Err(err) => {
            if matches!(err, DeliveryError::Store(_) | DeliveryError::CorruptSource(_)) {
                error!(error = %err, "download failed");
            }
            download_error(&err).into_response()
        }
    }
}

// ============================================================================
// SECTION: Publish
// ============================================================================

/// `POST /publish` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PublishBody {
    /// Content kind.
    content_type: ContentType,
    /// Content identifier.
    content_id: ContentId,
    /// Channels to leave out.
    #[serde(default)]
    skip_channels: Vec<ChannelName>,
}

/// Per-channel publish result.
#[derive(Serialize)]
struct ChannelResult {
    /// True when the channel accepted the message.
    success: bool,
    /// Failure detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// `POST /publish` response.
#[derive(Serialize)]
struct PublishResponse {
    /// Aggregated success.
    success: bool,
    /// Results keyed by channel name.
    results: BTreeMap<String, ChannelResult>,
}

/// Publishes content to every channel not skipped.
async fn publish(State(state): State<Arc<AppState>>, headers: HeaderMap, bytes: Bytes) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let body: PublishBody = decode_body(&bytes, state.max_body_bytes, None)?;
    let request = PublishRequest {
        content_type: body.content_type,
        content_id: body.content_id,
        skip_channels: body.skip_channels,
    };
    let report = state.services.queue.publish_now(&request).await.map_err(publish_error)?;
    let results = report
        .outcomes
        .into_iter()
        .map(|outcome| {
            (
                outcome.channel.to_string(),
                ChannelResult {
                    success: outcome.success,
                    error: outcome.error_detail,
                },
            )
        })
        .collect();
    Ok(Json(PublishResponse {
        success: report.success,
        results,
    })
    .into_response())
}

// ============================================================================
// SECTION: Queue
// ============================================================================

/// `GET /publish/queue` query parameters.
#[derive(Deserialize)]
struct QueueQuery {
    /// Status filter.
    status: Option<String>,
    /// Row limit.
    limit: Option<String>,
}

/// `GET /publish/queue` response.
#[derive(Serialize)]
struct QueueListing {
    /// Matching tasks, newest first.
    tasks: Vec<PublishTask>,
}

/// Lists publish tasks.
async fn list_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<QueueQuery>,
) -> Result<Json<QueueListing>, ApiError> {
    require_admin(&state, &headers)?;
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(value) => Some(
            TaskStatus::parse(value)
                .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, format!("unknown task status: {value}")))?,
        ),
    };
    let limit = match query.limit.as_deref() {
        None | Some("") => DEFAULT_LIST_LIMIT,
        Some(value) => parse_limit(value)?,
    };
    let tasks = state.services.queue.list(&TaskFilter {
        status,
        limit,
    });
    Ok(Json(QueueListing {
        tasks: tasks.map_err(publish_error)?,
    }))
}

/// Parses a query-string limit.
fn parse_limit(value: &str) -> Result<usize, ApiError> {
    value.parse::<usize>().map_err(|_| limit_error()).and_then(check_limit)
}

/// Accepts limits in `1..=MAX_BATCH_LIMIT`.
fn check_limit(limit: usize) -> Result<usize, ApiError> {
    if (1..=MAX_BATCH_LIMIT).contains(&limit) { Ok(limit) } else { Err(limit_error()) }
}

/// Out-of-range limit response.
fn limit_error() -> ApiError {
    ApiError::new(StatusCode::BAD_REQUEST, format!("limit must be between 1 and {MAX_BATCH_LIMIT}"))
}

/// `POST /publish/queue` body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct EnqueueBody {
    /// Content kind.
    content_type: ContentType,
    /// Content identifier.
    content_id: ContentId,
}

/// Enqueues a publish task.
async fn enqueue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<(StatusCode, Json<PublishTask>), ApiError> {
    require_admin(&state, &headers)?;
    let body: EnqueueBody = decode_body(&bytes, state.max_body_bytes, None)?;
    let task = state.services.queue.enqueue(body.content_type, body.content_id).map_err(publish_error)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `POST /publish/queue/process` body.
#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ProcessBody {
    /// Batch size override.
    #[serde(default)]
    limit: Option<usize>,
}

/// Processes one batch of due tasks.
async fn process_queue(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Response, ApiError> {
    require_admin(&state, &headers)?;
    let body: ProcessBody = decode_body(&bytes, state.max_body_bytes, Some(ProcessBody::default()))?;
    let limit = match body.limit {
        Some(limit) => check_limit(limit)?,
        None => state.services.batch_limit,
    };
    let summary = state.services.queue.process_batch(limit).await.map_err(publish_error)?;
    info!(
        processed = summary.processed,
        failed = summary.failed,
        requeued = summary.requeued,
        total = summary.total,
        "publish batch processed over http"
    );
    Ok(Json(summary).into_response())
}
