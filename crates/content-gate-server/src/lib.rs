// content-gate-server/src/lib.rs
// ============================================================================
// Module: Content Gate Server Library
// Description: HTTP surface for downloads and publish administration.
// Purpose: Assemble runtime services from configuration and serve them.
// Dependencies: content-gate-{core, config, broker, store-sqlite, watermark}, axum
// ============================================================================

//! ## Overview
//! [`ContentGateServer`] serves purchased files at `GET /download/{token}`
//! and exposes admin-only publish endpoints under `/publish`. [`Services`]
//! is the shared service graph, also used directly by the CLI.
//!
//! Security posture: download tokens, request bodies, and artifact paths are
//! untrusted; admin endpoints fail closed when no token is configured.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifacts;
pub mod audit;
pub mod auth;
pub mod disposition;
pub mod routes;
pub mod server;
pub mod services;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifacts::FileArtifactStore;
pub use audit::FileAuditSink;
pub use audit::StderrAuditSink;
pub use audit::build_audit_sink;
pub use auth::AdminAuth;
pub use auth::AuthError;
pub use disposition::content_disposition;
pub use routes::WATERMARK_HEADER;
pub use server::ContentGateServer;
pub use server::ServerError;
pub use services::Services;
pub use services::Stores;
pub use services::build_dispatcher;
