//! Image build sequencing: descriptor materialization, then build → tag →
//! push against the toolchain, each step gated on the previous one.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::RegistryConfig;
use crate::error::{BuildError, Result};
use crate::runtime::RuntimeCatalog;
use crate::toolchain::ImageToolchain;

pub struct ImageBuilder {
    toolchain: Arc<dyn ImageToolchain>,
    catalog: Arc<RuntimeCatalog>,
    registry: RegistryConfig,
}

impl ImageBuilder {
    pub fn new(
        toolchain: Arc<dyn ImageToolchain>,
        catalog: Arc<RuntimeCatalog>,
        registry: RegistryConfig,
    ) -> Self {
        Self {
            toolchain,
            catalog,
            registry,
        }
    }

    /// Build the context into an image and push it.
    ///
    /// The image is built under the local registry name, re-tagged under the
    /// externally-addressable name when the two differ, and pushed under the
    /// external name. A failure at any step terminates the attempt; nothing
    /// is retried. Returns the externally-addressable reference.
    pub async fn build_and_push(
        &self,
        context: &Path,
        function_name: &str,
        runtime: &str,
    ) -> Result<String> {
        let descriptor = self.catalog.descriptor_path(runtime);
        if !descriptor.is_file() {
            return Err(BuildError::DescriptorMissing {
                runtime: runtime.to_string(),
            });
        }

        // Materialize the build recipe into the context root.
        let context_dockerfile = context.join("Dockerfile");
        fs::copy(&descriptor, &context_dockerfile).map_err(|e| BuildError::BundleIo {
            path: context_dockerfile,
            source: e,
        })?;

        let local_ref = format!(
            "{}/{}:latest",
            self.registry.local_host, function_name
        );
        info!(image = %local_ref, context = %context.display(), "building image");
        self.toolchain.build(context, &local_ref).await?;

        let external_ref = format!(
            "{}/{}:latest",
            self.registry.external_host, function_name
        );
        if external_ref != local_ref {
            info!(source = %local_ref, target = %external_ref, "tagging image for registry");
            self.toolchain.tag(&local_ref, &external_ref).await?;
        }

        info!(image = %external_ref, "pushing image");
        self.toolchain.push(&external_ref).await?;

        Ok(external_ref)
    }
}
