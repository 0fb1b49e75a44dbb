// content-gate-core/src/core/artifact.rs
// ============================================================================
// Module: Content Gate Artifacts
// Description: Stored artifact bytes, formats, and personalization metadata.
// Purpose: Describe what the delivery pipeline fetches and what it embeds.
// Dependencies: bytes, serde
// ============================================================================

//! ## Overview
//! Artifacts are the purchasable files. Zip-based formats (EPUB, plain ZIP)
//! can be personalized; other formats are served as stored. Signatures here
//! back the structural check performed before any bytes leave the service.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bytes::Bytes;
use serde::Deserialize;
use serde::Serialize;

use crate::core::entitlement::EntitlementRecord;
use crate::core::identifiers::DownloadToken;
use crate::core::identifiers::PurchaseId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Signatures
// ============================================================================

/// ZIP local file header signature (`PK\x03\x04`).
pub const ZIP_LOCAL_HEADER_SIGNATURE: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// PDF header prefix.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Artifact container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactFormat {
    /// EPUB e-book (ZIP container).
    Epub,
    /// Generic ZIP archive.
    Zip,
    /// PDF document.
    Pdf,
    /// Any other binary.
    Other,
}

impl ArtifactFormat {
    /// Returns the HTTP content type served for this format.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Epub => "application/epub+zip",
            Self::Zip => "application/zip",
            Self::Pdf => "application/pdf",
            Self::Other => "application/octet-stream",
        }
    }

    /// Returns true when the format is a ZIP container and can be personalized.
    #[must_use]
    pub const fn is_zip_based(self) -> bool {
        matches!(self, Self::Epub | Self::Zip)
    }

    /// Infers a format from a file name extension.
    #[must_use]
    pub fn from_filename(filename: &str) -> Self {
        let extension = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("epub") => Self::Epub,
            Some("zip") => Self::Zip,
            Some("pdf") => Self::Pdf,
            _ => Self::Other,
        }
    }

    /// Checks the leading bytes against the format's container signature.
    ///
    /// Returns a description of the mismatch when the check fails.
    pub fn check_signature(self, bytes: &[u8]) -> Result<(), String> {
        if bytes.is_empty() {
            return Err("artifact is empty".to_string());
        }
        if self.is_zip_based() && !bytes.starts_with(&ZIP_LOCAL_HEADER_SIGNATURE) {
            return Err("artifact is missing the zip local header signature".to_string());
        }
        if self == Self::Pdf && !bytes.starts_with(PDF_SIGNATURE) {
            return Err("artifact is missing the pdf header".to_string());
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Stored Artifacts
// ============================================================================

/// Artifact bytes as returned by an artifact store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    /// Raw file bytes.
    pub bytes: Bytes,
    /// File name offered to the purchaser.
    pub filename: String,
    /// Container format.
    pub format: ArtifactFormat,
}

// ============================================================================
// SECTION: Personalization Metadata
// ============================================================================

/// Purchaser identity embedded into a personalized copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonalizationMeta {
    /// Purchaser email.
    pub email: String,
    /// Purchaser display name.
    pub name: String,
    /// Purchase identifier.
    pub purchase_id: PurchaseId,
    /// Purchase date (payment confirmation time, else record creation).
    pub purchase_date: Timestamp,
    /// Download token bound to the purchase.
    pub download_token: DownloadToken,
}

impl PersonalizationMeta {
    /// Builds personalization metadata from a paid entitlement record.
    ///
    /// Returns `None` when the record has no token (never paid).
    #[must_use]
    pub fn from_record(record: &EntitlementRecord) -> Option<Self> {
        let token = record.download_token.clone()?;
        Some(Self {
            email: record.purchaser_email.clone(),
            name: record.purchaser_name.clone(),
            purchase_id: record.purchase_id.clone(),
            purchase_date: record.paid_at.unwrap_or(record.created_at),
            download_token: token,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ArtifactFormat;

    #[test]
    fn format_inference_is_case_insensitive() {
        assert_eq!(ArtifactFormat::from_filename("Guide.EPUB"), ArtifactFormat::Epub);
        assert_eq!(ArtifactFormat::from_filename("bundle.zip"), ArtifactFormat::Zip);
        assert_eq!(ArtifactFormat::from_filename("notes.pdf"), ArtifactFormat::Pdf);
        assert_eq!(ArtifactFormat::from_filename("README"), ArtifactFormat::Other);
    }

    #[test]
    fn signature_check_rejects_mismatched_containers() {
        assert!(ArtifactFormat::Epub.check_signature(b"PK\x03\x04rest").is_ok());
        assert!(ArtifactFormat::Epub.check_signature(b"%PDF-1.7").is_err());
        assert!(ArtifactFormat::Pdf.check_signature(b"%PDF-1.7").is_ok());
        assert!(ArtifactFormat::Pdf.check_signature(b"PK\x03\x04").is_err());
        assert!(ArtifactFormat::Other.check_signature(b"anything").is_ok());
        assert!(ArtifactFormat::Other.check_signature(b"").is_err());
    }
}
