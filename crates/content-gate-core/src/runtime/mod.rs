// content-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Content Gate Runtime
// Description: Entitlement, delivery, and publish services plus in-memory stores.
// Purpose: Execute purchase, download, and fan-out flows against the interfaces.
// Dependencies: crate::{core, interfaces}, tokio, tracing
// ============================================================================

//! ## Overview
//! Runtime modules implement the purchase ledger, the token gate, the
//! download pipeline, and the publish queue. The HTTP server and the CLI
//! both call into these services so every entry point enforces the same
//! entitlement and retry rules.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod delivery;
pub mod ledger;
pub mod publish_queue;
pub mod store;
pub mod token;
pub mod token_gate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::ManualClock;
pub use clock::SystemClock;
pub use delivery::Delivery;
pub use delivery::DeliveryConfig;
pub use delivery::DeliveryError;
pub use delivery::DeliveryService;
pub use delivery::DeliveryStage;
pub use delivery::WatermarkStatus;
pub use ledger::EntitlementPolicy;
pub use ledger::LedgerError;
pub use ledger::PurchaseLedger;
pub use ledger::PurchaseRequest;
pub use publish_queue::PublishError;
pub use publish_queue::PublishQueue;
pub use publish_queue::PublishQueueConfig;
pub use publish_queue::PublishRequest;
pub use publish_queue::RetryPolicy;
pub use store::InMemoryContentCatalog;
pub use store::InMemoryEntitlementStore;
pub use store::InMemoryPublishTaskStore;
pub use token::mint_download_token;
pub use token_gate::TokenGate;
pub use token_gate::evaluate_entitlement;
