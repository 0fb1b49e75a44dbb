// content-gate-watermark/src/manifest.rs
// ============================================================================
// Module: Purchase Manifest
// Description: JSON payload embedded into personalized containers.
// Purpose: Bind a copy of the file to the purchaser who downloaded it.
// Dependencies: content-gate-core, serde, sha2
// ============================================================================

//! ## Overview
//! The manifest carries the purchaser identity plus a SHA-256 fingerprint
//! over the identity fields, so a leaked copy can be traced and a tampered
//! manifest detected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use content_gate_core::PersonalizationMeta;
use content_gate_core::Timestamp;
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Manifest schema version.
pub const MANIFEST_VERSION: u32 = 1;

/// Purchase manifest stored inside a personalized container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseManifest {
    /// Schema version.
    pub version: u32,
    /// Purchaser email.
    pub email: String,
    /// Purchaser name.
    pub name: String,
    /// Purchase identifier.
    pub purchase_id: String,
    /// Purchase date, RFC 3339.
    pub purchase_date: String,
    /// Download token.
    pub download_token: String,
    /// Lowercase hex SHA-256 over the identity fields.
    pub fingerprint: String,
    /// Generation time, RFC 3339.
    pub generated_at: String,
}

impl PurchaseManifest {
    /// Builds a manifest for `meta` generated at `now`.
    #[must_use]
    pub fn new(meta: &PersonalizationMeta, now: Timestamp) -> Self {
        let purchase_date = meta.purchase_date.to_string();
        Self {
            version: MANIFEST_VERSION,
            email: meta.email.clone(),
            name: meta.name.clone(),
            purchase_id: meta.purchase_id.to_string(),
            fingerprint: fingerprint(meta),
            purchase_date,
            download_token: meta.download_token.to_string(),
            generated_at: now.to_string(),
        }
    }

    /// Returns true when the fingerprint matches the identity fields.
    #[must_use]
    pub fn verify(&self) -> bool {
        let expected = fingerprint_fields(&[
            &self.email,
            &self.name,
            &self.purchase_id,
            &self.purchase_date,
            &self.download_token,
        ]);
        expected == self.fingerprint
    }
}

// ============================================================================
// SECTION: Fingerprint
// ============================================================================

/// Computes the identity fingerprint for `meta`.
#[must_use]
pub fn fingerprint(meta: &PersonalizationMeta) -> String {
    fingerprint_fields(&[
        &meta.email,
        &meta.name,
        meta.purchase_id.as_str(),
        &meta.purchase_date.to_string(),
        meta.download_token.as_str(),
    ])
}

/// Hashes newline-joined fields.
fn fingerprint_fields(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, field) in fields.iter().enumerate() {
        if index > 0 {
            hasher.update(b"\n");
        }
        hasher.update(field.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    /// Lowercase hex digits.
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
