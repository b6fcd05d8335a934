//! Error types for the build and retrieve pipelines.
//!
//! Every failure carries enough identity for the caller to know which stage
//! of the pipeline gave up: input validation, bundle extraction, scaffold
//! merge, the image toolchain, or source retrieval.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The three externally-visible steps of the image build sequence.
///
/// The sequence is strictly ordered: a step only runs once every earlier
/// step has succeeded, and a failed step terminates the build attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStep {
    Build,
    Tag,
    Push,
}

impl fmt::Display for BuildStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStep::Build => write!(f, "build"),
            BuildStep::Tag => write!(f, "tag"),
            BuildStep::Push => write!(f, "push"),
        }
    }
}

/// Main error type for build and retrieve operations.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("invalid function name {0:?}: must be a lowercase image repository token")]
    InvalidName(String),

    #[error("missing multipart field: {0}")]
    MissingField(&'static str),

    #[error("could not read uploaded archive: {0}")]
    Archive(String),

    #[error("archive entry escapes the bundle root: {0}")]
    PathEscape(String),

    #[error("bundle I/O error at {path}: {source}")]
    BundleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scaffold merge failed at {path}: {source}")]
    Merge {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no build descriptor for runtime {runtime}")]
    DescriptorMissing { runtime: String },

    #[error("toolchain {step} failed: {detail}")]
    Toolchain { step: BuildStep, detail: String },

    #[error("image not found: {image}")]
    ImageNotFound { image: String },

    #[error("container create failed: {detail}")]
    ContainerCreate { detail: String },

    #[error("container remove failed: {detail}")]
    ContainerRemove { detail: String },

    #[error("source extraction failed: {detail}")]
    Extraction { detail: String },
}

impl BuildError {
    /// The pipeline stage this error belongs to, as reported to callers.
    ///
    /// `detection` is reserved in the wire vocabulary but never produced:
    /// runtime classification is a heuristic with a default fallback and
    /// cannot fail.
    pub fn stage(&self) -> &'static str {
        match self {
            BuildError::InvalidName(_) | BuildError::MissingField(_) => "input",
            BuildError::Archive(_) | BuildError::PathEscape(_) | BuildError::BundleIo { .. } => {
                "extraction"
            }
            BuildError::Merge { .. } => "merge",
            BuildError::DescriptorMissing { .. } | BuildError::Toolchain { .. } => "toolchain",
            BuildError::ImageNotFound { .. }
            | BuildError::ContainerCreate { .. }
            | BuildError::ContainerRemove { .. }
            | BuildError::Extraction { .. } => "retrieve",
        }
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tags() {
        assert_eq!(BuildError::InvalidName("X".into()).stage(), "input");
        assert_eq!(BuildError::Archive("bad".into()).stage(), "extraction");
        assert_eq!(BuildError::PathEscape("../x".into()).stage(), "extraction");
        assert_eq!(
            BuildError::DescriptorMissing {
                runtime: "go".into()
            }
            .stage(),
            "toolchain"
        );
        assert_eq!(
            BuildError::Toolchain {
                step: BuildStep::Push,
                detail: "denied".into()
            }
            .stage(),
            "toolchain"
        );
        assert_eq!(
            BuildError::ImageNotFound {
                image: "reg/fn:latest".into()
            }
            .stage(),
            "retrieve"
        );
    }

    #[test]
    fn test_toolchain_error_names_the_step() {
        let err = BuildError::Toolchain {
            step: BuildStep::Tag,
            detail: "no such image".into(),
        };
        assert_eq!(err.to_string(), "toolchain tag failed: no such image");
    }
}
