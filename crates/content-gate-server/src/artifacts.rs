// content-gate-server/src/artifacts.rs
// ============================================================================
// Module: File Artifact Store
// Description: Directory-backed ArtifactStore for declared resources.
// Purpose: Serve purchased files without letting a declaration escape its root.
// Dependencies: content-gate-core, content-gate-config, tokio
// ============================================================================

//! ## Overview
//! Only resources declared in `[[delivery.resources]]` are served. Each
//! declared path is resolved against the artifacts root at fetch time and
//! the canonical result must stay under the canonical root, so a symlink
//! planted inside the root cannot expose files outside it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use content_gate_config::DeliveryConfig;
use content_gate_core::ArtifactError;
use content_gate_core::ArtifactFormat;
use content_gate_core::ArtifactStore;
use content_gate_core::ResourceId;
use content_gate_core::StoredArtifact;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest artifact served from disk.
pub const MAX_ARTIFACT_BYTES: u64 = 512 * 1024 * 1024;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Declared artifact entry.
#[derive(Debug, Clone)]
struct ArtifactEntry {
    /// Path relative to the root.
    path: PathBuf,
    /// File name offered to the purchaser.
    filename: String,
    /// Container format.
    format: ArtifactFormat,
}

/// Directory-backed artifact store.
///
/// # Invariants
/// - Every entry path is relative and free of `..` components.
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    /// Artifacts directory.
    root: PathBuf,
    /// Declared resources.
    resources: BTreeMap<ResourceId, ArtifactEntry>,
}

impl FileArtifactStore {
    /// Creates an empty store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            resources: BTreeMap::new(),
        }
    }

    /// Declares a resource.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Invalid`] when `path` is absolute or climbs
    /// out of the root, or when `resource_id` is already declared.
    pub fn with_resource(
        mut self,
        resource_id: ResourceId,
        path: impl Into<PathBuf>,
        filename: impl Into<String>,
        format: ArtifactFormat,
    ) -> Result<Self, ArtifactError> {
        let path = path.into();
        ensure_contained(&path)?;
        if self.resources.contains_key(&resource_id) {
            return Err(ArtifactError::Invalid(format!("duplicate resource: {resource_id}")));
        }
        self.resources.insert(
            resource_id,
            ArtifactEntry {
                path,
                filename: filename.into(),
                format,
            },
        );
        Ok(self)
    }

    /// Builds a store from `[delivery]` configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ArtifactError::Invalid`] when a declaration is unsafe.
    pub fn from_config(config: &DeliveryConfig) -> Result<Self, ArtifactError> {
        config.resources.iter().try_fold(Self::new(&config.artifacts_root), |store, resource| {
            store.with_resource(
                ResourceId::new(resource.id.clone()),
                resource.path.clone(),
                resource.download_filename(),
                resource.resolved_format(),
            )
        })
    }

    /// Returns the declared resource identifiers.
    #[must_use]
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.keys().cloned().collect()
    }
}

#[async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn fetch(&self, resource_id: &ResourceId) -> Result<StoredArtifact, ArtifactError> {
        let entry = self
            .resources
            .get(resource_id)
            .ok_or_else(|| ArtifactError::UnknownResource(resource_id.to_string()))?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|err| ArtifactError::Io(format!("artifacts root unavailable: {err}")))?;
        let path = tokio::fs::canonicalize(root.join(&entry.path))
            .await
            .map_err(|err| ArtifactError::Io(format!("artifact unavailable: {err}")))?;
        if !path.starts_with(&root) {
            return Err(ArtifactError::Invalid("artifact path escapes the artifacts root".to_string()));
        }
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|err| ArtifactError::Io(format!("artifact unavailable: {err}")))?;
        if !metadata.is_file() {
            return Err(ArtifactError::Invalid("artifact is not a regular file".to_string()));
        }
        if metadata.len() > MAX_ARTIFACT_BYTES {
            return Err(ArtifactError::Invalid("artifact exceeds size limit".to_string()));
        }
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|err| ArtifactError::Io(format!("artifact read failed: {err}")))?;
        Ok(StoredArtifact {
            bytes: Bytes::from(bytes),
            filename: entry.filename.clone(),
            format: entry.format,
        })
    }
}

/// Rejects absolute paths and parent components.
fn ensure_contained(path: &Path) -> Result<(), ArtifactError> {
    if path.as_os_str().is_empty() {
        return Err(ArtifactError::Invalid("resource path is empty".to_string()));
    }
    let contained = path.components().all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if contained {
        Ok(())
    } else {
        Err(ArtifactError::Invalid("resource path must be relative without parent components".to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use content_gate_core::ArtifactError;
    use content_gate_core::ArtifactFormat;
    use content_gate_core::ArtifactStore;
    use content_gate_core::ResourceId;

    use super::FileArtifactStore;

    #[tokio::test]
    async fn fetches_declared_resources_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("books")).unwrap();
        std::fs::write(dir.path().join("books/guide.pdf"), b"%PDF-1.7 body").unwrap();
        let store = FileArtifactStore::new(dir.path())
            .with_resource(ResourceId::new("guide"), "books/guide.pdf", "Guide.pdf", ArtifactFormat::Pdf)
            .unwrap();

        let artifact = store.fetch(&ResourceId::new("guide")).await.unwrap();
        assert_eq!(artifact.filename, "Guide.pdf");
        assert_eq!(artifact.format, ArtifactFormat::Pdf);
        assert_eq!(&artifact.bytes[..5], b"%PDF-");

        let missing = store.fetch(&ResourceId::new("other")).await;
        assert!(matches!(missing, Err(ArtifactError::UnknownResource(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path())
            .with_resource(ResourceId::new("ebook"), "ebook.epub", "ebook.epub", ArtifactFormat::Epub)
            .unwrap();
        let result = store.fetch(&ResourceId::new("ebook")).await;
        assert!(matches!(result, Err(ArtifactError::Io(_))));
    }

    #[test]
    fn escaping_declarations_are_rejected() {
        for path in ["../secret", "/etc/passwd", "a/../../b", ""] {
            let result =
                FileArtifactStore::new("root").with_resource(ResourceId::new("x"), path, "x", ArtifactFormat::Other);
            assert!(matches!(result, Err(ArtifactError::Invalid(_))), "{path}");
        }
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let result = FileArtifactStore::new("root")
            .with_resource(ResourceId::new("x"), "a", "a", ArtifactFormat::Other)
            .and_then(|store| store.with_resource(ResourceId::new("x"), "b", "b", ArtifactFormat::Other));
        assert!(matches!(result, Err(ArtifactError::Invalid(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_out_of_the_root_are_refused() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.pdf"), b"%PDF-secret").unwrap();
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.pdf"), root.path().join("link.pdf")).unwrap();
        let store = FileArtifactStore::new(root.path())
            .with_resource(ResourceId::new("link"), "link.pdf", "link.pdf", ArtifactFormat::Pdf)
            .unwrap();
        let result = store.fetch(&ResourceId::new("link")).await;
        assert!(matches!(result, Err(ArtifactError::Invalid(_))));
    }
}
