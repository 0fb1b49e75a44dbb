// content-gate-core/src/lib.rs
// ============================================================================
// Module: Content Gate Core Library
// Description: Public API surface for the Content Gate core.
// Purpose: Expose domain types, interfaces, and runtime services.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Content Gate core owns the entitlement rules for paid downloads and the
//! fan-out rules for publish tasks. Persistence, artifact storage, container
//! personalization, and channel delivery are reached through the traits in
//! [`interfaces`], so the same runtime runs against in-memory stores in tests
//! and SQLite plus real HTTP channels in production.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::ArtifactError;
pub use interfaces::ArtifactStore;
pub use interfaces::AuditSink;
pub use interfaces::ChannelDispatcher;
pub use interfaces::Clock;
pub use interfaces::ContentCatalog;
pub use interfaces::EntitlementStore;
pub use interfaces::NoopAuditSink;
pub use interfaces::PublishTaskStore;
pub use interfaces::StoreError;
pub use interfaces::WatermarkError;
pub use interfaces::Watermarker;
pub use runtime::Delivery;
pub use runtime::DeliveryConfig;
pub use runtime::DeliveryError;
pub use runtime::DeliveryService;
pub use runtime::DeliveryStage;
pub use runtime::EntitlementPolicy;
pub use runtime::InMemoryContentCatalog;
pub use runtime::InMemoryEntitlementStore;
pub use runtime::InMemoryPublishTaskStore;
pub use runtime::LedgerError;
pub use runtime::ManualClock;
pub use runtime::PublishError;
pub use runtime::PublishQueue;
pub use runtime::PublishQueueConfig;
pub use runtime::PublishRequest;
pub use runtime::PurchaseLedger;
pub use runtime::PurchaseRequest;
pub use runtime::RetryPolicy;
pub use runtime::SystemClock;
pub use runtime::TokenGate;
pub use runtime::WatermarkStatus;
pub use runtime::evaluate_entitlement;
pub use runtime::mint_download_token;
