//! Source recovery from built images.
//!
//! A retrieve instantiates a container from the image purely to expose its
//! filesystem, copies the application root out to a staging directory,
//! packages it, and removes the container. The container is removed on
//! every path once it exists; a removal failure is logged and never
//! replaces the error that made the extraction fail.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::archive;
use crate::error::{BuildError, Result};
use crate::toolchain::ImageToolchain;

/// Path inside built images where the runtime descriptors place the
/// application source.
pub const APP_ROOT: &str = "/app";

/// A packaged source archive ready to send to the caller.
#[derive(Debug)]
pub struct RetrievedArchive {
    pub file_name: String,
    pub bytes: Bytes,
}

pub struct CodeExtractor {
    toolchain: Arc<dyn ImageToolchain>,
    registry_host: String,
}

impl CodeExtractor {
    pub fn new(toolchain: Arc<dyn ImageToolchain>, registry_host: String) -> Self {
        Self {
            toolchain,
            registry_host,
        }
    }

    /// Recover the source archive for a previously built function.
    pub async fn retrieve(&self, function_name: &str) -> Result<RetrievedArchive> {
        let image = format!("{}/{}:latest", self.registry_host, function_name);

        // Step 1: nothing is allocated yet, so failures need no cleanup.
        let container_id = self.toolchain.create_container(&image).await?;
        info!(container = %container_id, image = %image, "created ephemeral container");

        let result = self.extract_and_pack(&container_id, function_name).await;

        // The container is removed whether extraction succeeded or not.
        // A failed removal must not mask the extraction's own outcome.
        if let Err(remove_err) = self.toolchain.remove_container(&container_id).await {
            warn!(
                container = %container_id,
                error = %remove_err,
                "failed to remove ephemeral container"
            );
        } else {
            info!(container = %container_id, "removed ephemeral container");
        }

        result
    }

    async fn extract_and_pack(
        &self,
        container_id: &str,
        function_name: &str,
    ) -> Result<RetrievedArchive> {
        let staging = tempfile::Builder::new()
            .prefix("forge-retrieve-")
            .tempdir()
            .map_err(|e| BuildError::Extraction {
                detail: e.to_string(),
            })?;

        let container_path = format!("{APP_ROOT}/.");
        self.toolchain
            .copy_from_container(container_id, &container_path, staging.path())
            .await?;

        let file_name = format!("{function_name}.zip");
        let archive_path = staging.path().join(&file_name);
        archive::pack_directory(staging.path(), &archive_path).map_err(|e| {
            BuildError::Extraction {
                detail: format!("{e:#}"),
            }
        })?;

        let bytes = read_archive(&archive_path)?;
        Ok(RetrievedArchive {
            file_name,
            bytes,
        })
    }
}

fn read_archive(path: &Path) -> Result<Bytes> {
    std::fs::read(path)
        .map(Bytes::from)
        .map_err(|e| BuildError::Extraction {
            detail: format!("failed to read packaged archive: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::testing::StubToolchain;

    fn extractor(stub: Arc<StubToolchain>) -> CodeExtractor {
        CodeExtractor::new(stub, "registry.example.com:5000".to_string())
    }

    #[tokio::test]
    async fn test_retrieve_packages_container_source() {
        let stub = Arc::new(StubToolchain::new().with_container_file("app.py", "print('hello')"));
        let archive = extractor(stub.clone()).retrieve("hello").await.unwrap();

        assert_eq!(archive.file_name, "hello.zip");
        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes.to_vec())).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"app.py".to_string()));

        // The ephemeral container was created and then removed.
        let calls = stub.calls();
        assert!(calls.iter().any(|c| c.starts_with("create ")));
        assert!(calls.iter().any(|c| c.starts_with("rm ")));
    }

    #[tokio::test]
    async fn test_copy_failure_still_removes_container() {
        let stub = Arc::new(StubToolchain::new().failing_copy());
        let err = extractor(stub.clone()).retrieve("hello").await.unwrap_err();

        assert!(matches!(err, BuildError::Extraction { .. }));
        let calls = stub.calls();
        assert!(calls.iter().any(|c| c.starts_with("rm ")));
    }

    #[tokio::test]
    async fn test_missing_image_needs_no_cleanup() {
        let stub = Arc::new(StubToolchain::new().missing_image());
        let err = extractor(stub.clone()).retrieve("hello").await.unwrap_err();

        assert!(matches!(err, BuildError::ImageNotFound { .. }));
        let calls = stub.calls();
        assert!(!calls.iter().any(|c| c.starts_with("rm ")));
    }

    #[tokio::test]
    async fn test_remove_failure_does_not_mask_success() {
        let stub = Arc::new(
            StubToolchain::new()
                .with_container_file("app.py", "x = 1")
                .failing_remove(),
        );
        let archive = extractor(stub).retrieve("hello").await.unwrap();
        assert_eq!(archive.file_name, "hello.zip");
    }

    #[tokio::test]
    async fn test_remove_failure_does_not_mask_extraction_error() {
        let stub = Arc::new(StubToolchain::new().failing_copy().failing_remove());
        let err = extractor(stub).retrieve("hello").await.unwrap_err();
        // The copy failure is reported, not the removal failure.
        assert!(matches!(err, BuildError::Extraction { .. }));
    }
}
