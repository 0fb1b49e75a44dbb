// content-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Content Gate Store
// Description: Durable stores for entitlements, publish tasks, and content.
// Purpose: Provide production persistence for the Content Gate runtime.
// Dependencies: content-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteStore`] implements [`content_gate_core::EntitlementStore`],
//! [`content_gate_core::PublishTaskStore`], and
//! [`content_gate_core::ContentCatalog`] over one `SQLite` database in WAL
//! mode. Every contended mutation (download counter, task claim, task settle)
//! is a single conditional `UPDATE`, so correctness holds even when several
//! processes share the file. Security posture: stored rows are untrusted and
//! are validated on load.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod catalog;
mod entitlements;
pub mod store;
mod tasks;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SCHEMA_VERSION;
pub use store::SqliteStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
