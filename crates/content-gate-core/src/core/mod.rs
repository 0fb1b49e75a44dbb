// content-gate-core/src/core/mod.rs
// ============================================================================
// Module: Content Gate Core Types
// Description: Canonical entitlement, artifact, and publish data structures.
// Purpose: Provide stable, serializable types shared by every Content Gate crate.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Content Gate core types describe purchase entitlements, stored artifacts,
//! publish tasks, channel outcomes, and audit events. Stores, the HTTP
//! surface, and the CLI all speak these types.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod artifact;
pub mod audit;
pub mod entitlement;
pub mod identifiers;
pub mod publish;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifact::ArtifactFormat;
pub use artifact::PDF_SIGNATURE;
pub use artifact::PersonalizationMeta;
pub use artifact::StoredArtifact;
pub use artifact::ZIP_LOCAL_HEADER_SIGNATURE;
pub use audit::AuditEvent;
pub use entitlement::AuthDecision;
pub use entitlement::CountOutcome;
pub use entitlement::EntitlementRecord;
pub use entitlement::NewPurchase;
pub use entitlement::PaymentConfirmation;
pub use entitlement::PaymentStatus;
pub use entitlement::Rejection;
pub use identifiers::ChannelName;
pub use identifiers::ContentId;
pub use identifiers::DownloadToken;
pub use identifiers::PurchaseId;
pub use identifiers::ResourceId;
pub use identifiers::TaskId;
pub use publish::AggregationRule;
pub use publish::BatchSummary;
pub use publish::ChannelFailureKind;
pub use publish::ChannelMessage;
pub use publish::ChannelOutcome;
pub use publish::ContentState;
pub use publish::ContentType;
pub use publish::NewPublishTask;
pub use publish::PublishReport;
pub use publish::PublishTask;
pub use publish::PublishableContent;
pub use publish::TaskFilter;
pub use publish::TaskResolution;
pub use publish::TaskStatus;
pub use publish::summarize_failures;
pub use time::Timestamp;
