// content-gate-watermark/src/lib.rs
// ============================================================================
// Module: Content Gate Watermark Library
// Description: ZIP container personalization for purchased e-books.
// Purpose: Embed purchaser metadata without corrupting the container.
// Dependencies: content-gate-core, zip
// ============================================================================

//! ## Overview
//! [`ZipWatermarker`] implements [`content_gate_core::Watermarker`] for
//! ZIP-based containers (EPUB, plain ZIP). It writes a JSON purchase manifest
//! into the archive and raw-copies every other entry.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod manifest;
pub mod zip_container;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use manifest::PurchaseManifest;
pub use manifest::fingerprint;
pub use zip_container::DEFAULT_MANIFEST_PATH;
pub use zip_container::ZipWatermarker;
