// content-gate-watermark/src/zip_container.rs
// ============================================================================
// Module: ZIP Container Watermarker
// Description: Purchase manifest injection into ZIP-based containers.
// Purpose: Personalize EPUB/ZIP downloads while keeping every reader happy.
// Dependencies: content-gate-core, serde_json, zip
// ============================================================================

//! ## Overview
//! The watermarker reopens the source archive, raw-copies every entry in its
//! original order (compressed bytes, CRC, and method untouched), drops any
//! previous manifest, and appends a fresh manifest entry. The writer rebuilds
//! the central directory, and the result is reopened once as a structural
//! check before it is returned.
//!
//! EPUB readers require `mimetype` to be the first entry; order preservation
//! keeps it there.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;
use std::io::Write;
use std::sync::Arc;

use content_gate_core::Clock;
use content_gate_core::PersonalizationMeta;
use content_gate_core::SystemClock;
use content_gate_core::WatermarkError;
use content_gate_core::Watermarker;
use content_gate_core::ZIP_LOCAL_HEADER_SIGNATURE;
use zip::CompressionMethod;
use zip::DateTime;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::manifest::PurchaseManifest;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default manifest entry path.
pub const DEFAULT_MANIFEST_PATH: &str = "META-INF/purchase.json";

/// Extra capacity reserved for the manifest and central directory growth.
const OUTPUT_HEADROOM: usize = 4 * 1024;

// ============================================================================
// SECTION: Watermarker
// ============================================================================

/// ZIP container watermarker.
#[derive(Clone)]
pub struct ZipWatermarker {
    /// Manifest entry path inside the archive.
    manifest_path: String,
    /// Source of `generated_at`.
    clock: Arc<dyn Clock>,
}

impl Default for ZipWatermarker {
    fn default() -> Self {
        Self::new(DEFAULT_MANIFEST_PATH)
    }
}

impl ZipWatermarker {
    /// Creates a watermarker writing its manifest at `manifest_path`.
    #[must_use]
    pub fn new(manifest_path: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used for `generated_at`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the manifest entry path.
    #[must_use]
    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }
}

impl Watermarker for ZipWatermarker {
    fn personalize(&self, raw: &[u8], meta: &PersonalizationMeta) -> Result<Vec<u8>, WatermarkError> {
        if !raw.starts_with(&ZIP_LOCAL_HEADER_SIGNATURE) {
            return Err(WatermarkError::InvalidContainer(
                "missing zip local header signature".to_string(),
            ));
        }
        let mut archive = ZipArchive::new(Cursor::new(raw))
            .map_err(|err| WatermarkError::InvalidContainer(err.to_string()))?;

        let manifest = PurchaseManifest::new(meta, self.clock.now());
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|err| WatermarkError::Encode(err.to_string()))?;

        let buffer = Vec::with_capacity(raw.len() + manifest_bytes.len() + OUTPUT_HEADROOM);
        let mut writer = ZipWriter::new(Cursor::new(buffer));
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|err| WatermarkError::InvalidContainer(err.to_string()))?;
            if entry.name() == self.manifest_path {
                continue;
            }
            writer.raw_copy_file(entry).map_err(|err| WatermarkError::Archive(err.to_string()))?;
        }

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default());
        writer
            .start_file(self.manifest_path.as_str(), options)
            .map_err(|err| WatermarkError::Archive(err.to_string()))?;
        writer.write_all(&manifest_bytes).map_err(|err| WatermarkError::Archive(err.to_string()))?;
        let output = writer
            .finish()
            .map_err(|err| WatermarkError::Archive(err.to_string()))?
            .into_inner();

        ZipArchive::new(Cursor::new(output.as_slice()))
            .map_err(|err| WatermarkError::Archive(format!("rewritten archive unreadable: {err}")))?;
        Ok(output)
    }
}
