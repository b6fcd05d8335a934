//! The external image toolchain boundary.
//!
//! Everything the service knows about images goes through [`ImageToolchain`]:
//! a synchronous-per-call, fallible black box that builds, tags, and pushes
//! images and can expose a built image's filesystem through a created (never
//! started) container. The production implementation shells out to the
//! `docker` binary; tests substitute a recording stub.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{BuildError, BuildStep, Result};

#[async_trait]
pub trait ImageToolchain: Send + Sync {
    /// Build `image` from the Dockerfile in `context`.
    async fn build(&self, context: &Path, image: &str) -> Result<()>;

    /// Apply an additional name to an existing local image.
    async fn tag(&self, source: &str, target: &str) -> Result<()>;

    /// Push `image` to its registry.
    async fn push(&self, image: &str) -> Result<()>;

    /// Create (without starting) a container from `image`; returns its id.
    async fn create_container(&self, image: &str) -> Result<String>;

    /// Copy `container_path` out of the container's filesystem into `dest`.
    async fn copy_from_container(
        &self,
        container_id: &str,
        container_path: &str,
        dest: &Path,
    ) -> Result<()>;

    /// Remove a created container.
    async fn remove_container(&self, container_id: &str) -> Result<()>;
}

/// `docker` CLI implementation of the toolchain boundary.
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    /// Use a different binary, e.g. `podman`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> std::io::Result<std::process::Output> {
        debug!(binary = %self.binary, args = ?args, "invoking toolchain");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn run_step(&self, step: BuildStep, args: &[&str]) -> Result<()> {
        let output = self.run(args).await.map_err(|e| BuildError::Toolchain {
            step,
            detail: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(BuildError::Toolchain {
                step,
                detail: diagnostics(&output),
            });
        }
        Ok(())
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

/// Combined stderr/stdout of a failed invocation, surfaced verbatim.
fn diagnostics(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut detail = stderr.trim().to_string();
    if detail.is_empty() {
        detail = stdout.trim().to_string();
    }
    if detail.is_empty() {
        detail = format!("exited with {}", output.status);
    }
    detail
}

#[async_trait]
impl ImageToolchain for DockerCli {
    async fn build(&self, context: &Path, image: &str) -> Result<()> {
        let context = context.to_string_lossy();
        self.run_step(BuildStep::Build, &["build", "-t", image, context.as_ref()])
            .await
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.run_step(BuildStep::Tag, &["tag", source, target]).await
    }

    async fn push(&self, image: &str) -> Result<()> {
        self.run_step(BuildStep::Push, &["push", image]).await
    }

    async fn create_container(&self, image: &str) -> Result<String> {
        let output = self
            .run(&["create", image])
            .await
            .map_err(|e| BuildError::ContainerCreate {
                detail: e.to_string(),
            })?;
        if !output.status.success() {
            let detail = diagnostics(&output);
            if is_missing_image(&detail) {
                return Err(BuildError::ImageNotFound {
                    image: image.to_string(),
                });
            }
            return Err(BuildError::ContainerCreate { detail });
        }

        // The id is the last non-empty stdout line; pull progress may
        // precede it when the image had to be fetched.
        let stdout = String::from_utf8_lossy(&output.stdout);
        stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| BuildError::ContainerCreate {
                detail: "toolchain returned no container id".to_string(),
            })
    }

    async fn copy_from_container(
        &self,
        container_id: &str,
        container_path: &str,
        dest: &Path,
    ) -> Result<()> {
        let source = format!("{container_id}:{container_path}");
        let dest = dest.to_string_lossy();
        let output = self
            .run(&["cp", &source, dest.as_ref()])
            .await
            .map_err(|e| BuildError::Extraction {
                detail: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(BuildError::Extraction {
                detail: diagnostics(&output),
            });
        }
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        let output = self
            .run(&["rm", container_id])
            .await
            .map_err(|e| BuildError::ContainerRemove {
                detail: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(BuildError::ContainerRemove {
                detail: diagnostics(&output),
            });
        }
        Ok(())
    }
}

fn is_missing_image(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("no such image")
        || lower.contains("unable to find image")
        || lower.contains("not found")
        || lower.contains("manifest unknown")
}
