//! Test doubles and fixtures shared across module tests.

use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::{BuildError, BuildStep, Result};
use crate::toolchain::ImageToolchain;

/// Build an in-memory zip from (name, content) pairs.
pub(crate) fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Recording stand-in for the docker toolchain.
///
/// Records every invocation in order, optionally fails individual
/// operations, and serves a configurable set of files when a container
/// filesystem is copied out.
pub(crate) struct StubToolchain {
    calls: Mutex<Vec<String>>,
    context_files: Mutex<Vec<String>>,
    container_files: Vec<(String, String)>,
    fail_build: bool,
    fail_tag: bool,
    fail_push: bool,
    fail_create: bool,
    fail_copy: bool,
    fail_remove: bool,
    missing_image: bool,
}

impl StubToolchain {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            context_files: Mutex::new(Vec::new()),
            container_files: Vec::new(),
            fail_build: false,
            fail_tag: false,
            fail_push: false,
            fail_create: false,
            fail_copy: false,
            fail_remove: false,
            missing_image: false,
        }
    }

    pub fn with_container_file(mut self, name: &str, content: &str) -> Self {
        self.container_files
            .push((name.to_string(), content.to_string()));
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    pub fn failing_tag(mut self) -> Self {
        self.fail_tag = true;
        self
    }

    pub fn failing_copy(mut self) -> Self {
        self.fail_copy = true;
        self
    }

    pub fn failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    pub fn missing_image(mut self) -> Self {
        self.missing_image = true;
        self
    }

    /// Invocations seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Top-level names of the build context captured at build time.
    pub fn context_files(&self) -> Vec<String> {
        self.context_files.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ImageToolchain for StubToolchain {
    async fn build(&self, context: &Path, image: &str) -> Result<()> {
        self.record(format!("build {image}"));
        let mut names: Vec<String> = std::fs::read_dir(context)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        *self.context_files.lock().unwrap() = names;
        if self.fail_build {
            return Err(BuildError::Toolchain {
                step: BuildStep::Build,
                detail: "stub build failure".to_string(),
            });
        }
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<()> {
        self.record(format!("tag {source} {target}"));
        if self.fail_tag {
            return Err(BuildError::Toolchain {
                step: BuildStep::Tag,
                detail: "stub tag failure".to_string(),
            });
        }
        Ok(())
    }

    async fn push(&self, image: &str) -> Result<()> {
        self.record(format!("push {image}"));
        if self.fail_push {
            return Err(BuildError::Toolchain {
                step: BuildStep::Push,
                detail: "stub push failure".to_string(),
            });
        }
        Ok(())
    }

    async fn create_container(&self, image: &str) -> Result<String> {
        if self.missing_image {
            return Err(BuildError::ImageNotFound {
                image: image.to_string(),
            });
        }
        if self.fail_create {
            return Err(BuildError::ContainerCreate {
                detail: "stub create failure".to_string(),
            });
        }
        self.record(format!("create {image}"));
        Ok("stub-container".to_string())
    }

    async fn copy_from_container(
        &self,
        container_id: &str,
        container_path: &str,
        dest: &Path,
    ) -> Result<()> {
        self.record(format!("cp {container_id}:{container_path}"));
        if self.fail_copy {
            return Err(BuildError::Extraction {
                detail: "stub copy failure".to_string(),
            });
        }
        for (name, content) in &self.container_files {
            let path = dest.join(name);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(path, content).unwrap();
        }
        Ok(())
    }

    async fn remove_container(&self, container_id: &str) -> Result<()> {
        self.record(format!("rm {container_id}"));
        if self.fail_remove {
            return Err(BuildError::ContainerRemove {
                detail: "stub remove failure".to_string(),
            });
        }
        Ok(())
    }
}
