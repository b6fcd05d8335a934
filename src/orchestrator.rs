//! End-to-end build and retrieve flows.
//!
//! A build turns an uploaded archive into a pushed image: extract into a
//! fresh private workspace, classify the runtime, merge scaffolding, then
//! hand the context to the image builder. The workspace is removed when the
//! request finishes, whatever the outcome. Retrieve delegates to the code
//! extractor after validating the function name.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tracing::{info, warn};
use uuid::Uuid;

use crate::archive;
use crate::code_extractor::{CodeExtractor, RetrievedArchive};
use crate::error::{BuildError, Result};
use crate::image_builder::ImageBuilder;
use crate::runtime::RuntimeCatalog;
use crate::scaffold;

/// Result of a successful build, the tuple handed to the metadata catalog.
#[derive(Debug)]
pub struct BuildOutcome {
    pub name: String,
    pub image: String,
    pub runtime: String,
}

/// Private working directory for one build request.
///
/// The directory is removed when the workspace drops, on every exit path.
struct BuildWorkspace {
    temp: TempDir,
}

impl BuildWorkspace {
    fn allocate() -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("forge-build-")
            .tempdir()
            .map_err(|e| BuildError::BundleIo {
                path: std::env::temp_dir(),
                source: e,
            })?;
        Ok(Self { temp })
    }

    fn bundle_root(&self) -> PathBuf {
        self.temp.path().join("src")
    }
}

pub struct Orchestrator {
    catalog: Arc<RuntimeCatalog>,
    builder: ImageBuilder,
    extractor: CodeExtractor,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<RuntimeCatalog>,
        builder: ImageBuilder,
        extractor: CodeExtractor,
    ) -> Self {
        Self {
            catalog,
            builder,
            extractor,
        }
    }

    /// Run the build flow for one uploaded bundle.
    pub async fn build(&self, name: &str, archive_bytes: &[u8]) -> Result<BuildOutcome> {
        validate_function_name(name)?;

        let build_id = Uuid::new_v4();
        info!(function = %name, build_id = %build_id, "starting build");

        let workspace = BuildWorkspace::allocate()?;
        let bundle_root = workspace.bundle_root();

        archive::extract_archive(archive_bytes, &bundle_root)?;

        let detection = self.catalog.detect(&top_level_names(&bundle_root)?);
        if detection.fell_back {
            warn!(
                function = %name,
                build_id = %build_id,
                runtime = %detection.runtime,
                "no runtime markers matched, falling back to default"
            );
        } else {
            info!(
                function = %name,
                build_id = %build_id,
                runtime = %detection.runtime,
                "detected runtime"
            );
        }

        let report = scaffold::merge_scaffold(
            &self.catalog.scaffold_dir(&detection.runtime),
            &bundle_root,
        )?;
        info!(
            function = %name,
            build_id = %build_id,
            copied = report.copied,
            skipped = report.skipped,
            "merged runtime scaffold"
        );

        let image = self
            .builder
            .build_and_push(&bundle_root, name, &detection.runtime)
            .await?;

        info!(function = %name, build_id = %build_id, image = %image, "build complete");
        Ok(BuildOutcome {
            name: name.to_string(),
            image,
            runtime: detection.runtime,
        })
        // workspace drops here; the temp directory is removed on all paths
    }

    /// Run the retrieve flow for a previously built function.
    pub async fn retrieve(&self, name: &str) -> Result<RetrievedArchive> {
        validate_function_name(name)?;
        self.extractor.retrieve(name).await
    }
}

/// Check that `name` is usable as an image repository component: lowercase
/// alphanumerics plus `-`, `_` and `.`, starting and ending alphanumeric.
///
/// Runs before any filesystem or process work.
pub fn validate_function_name(name: &str) -> Result<()> {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let valid = !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| alnum(c) || matches!(c, '-' | '_' | '.'))
        && name.chars().next().is_some_and(alnum)
        && name.chars().next_back().is_some_and(alnum);
    if valid {
        Ok(())
    } else {
        Err(BuildError::InvalidName(name.to_string()))
    }
}

fn top_level_names(bundle_root: &std::path::Path) -> Result<HashSet<String>> {
    let entries = fs::read_dir(bundle_root).map_err(|e| BuildError::BundleIo {
        path: bundle_root.to_path_buf(),
        source: e,
    })?;
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|e| BuildError::BundleIo {
            path: bundle_root.to_path_buf(),
            source: e,
        })?;
        names.insert(entry.file_name().to_string_lossy().to_string());
    }
    Ok(names)
}
