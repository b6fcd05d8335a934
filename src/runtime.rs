//! Runtime classification for uploaded source bundles.
//!
//! A bundle is mapped to a runtime by checking its top-level file names
//! against each profile's marker files. Profiles are evaluated in
//! declaration order and the first profile with any marker present wins,
//! so the order of the catalog is the precedence order. Classification
//! never fails: bundles matching no profile fall back to the default
//! runtime, and the fallback is signalled to the caller instead of raised
//! as an error.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A runtime identifier plus the marker file names that select it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeProfile {
    pub name: String,
    pub markers: Vec<String>,
}

/// Outcome of classifying a bundle.
#[derive(Debug, Clone)]
pub struct Detection {
    pub runtime: String,
    /// True when no profile matched and the default runtime was used.
    pub fell_back: bool,
}

/// Process-wide, read-only set of runtime profiles.
///
/// Built once at startup and never mutated afterwards. Holds the ordered
/// profile list, the default runtime name, and the root directory under
/// which each runtime's scaffold and build descriptor live.
#[derive(Debug, Clone)]
pub struct RuntimeCatalog {
    profiles: Vec<RuntimeProfile>,
    default_runtime: String,
    runtimes_dir: PathBuf,
}

impl RuntimeCatalog {
    pub fn new(
        profiles: Vec<RuntimeProfile>,
        default_runtime: String,
        runtimes_dir: PathBuf,
    ) -> Self {
        Self {
            profiles,
            default_runtime,
            runtimes_dir,
        }
    }

    /// The built-in profiles, in precedence order: python-flask, nodejs, go.
    ///
    /// A bundle carrying markers for more than one runtime resolves to the
    /// earliest profile in this list.
    pub fn default_profiles() -> Vec<RuntimeProfile> {
        vec![
            RuntimeProfile {
                name: "python-flask".to_string(),
                markers: vec![
                    "requirements.txt".to_string(),
                    "app.py".to_string(),
                    "wsgi.py".to_string(),
                ],
            },
            RuntimeProfile {
                name: "nodejs".to_string(),
                markers: vec![
                    "package.json".to_string(),
                    "index.js".to_string(),
                    "server.js".to_string(),
                ],
            },
            RuntimeProfile {
                name: "go".to_string(),
                markers: vec!["go.mod".to_string(), "main.go".to_string()],
            },
        ]
    }

    /// Classify a bundle by its set of top-level file names.
    pub fn detect(&self, top_level: &HashSet<String>) -> Detection {
        for profile in &self.profiles {
            if profile.markers.iter().any(|m| top_level.contains(m)) {
                return Detection {
                    runtime: profile.name.clone(),
                    fell_back: false,
                };
            }
        }
        Detection {
            runtime: self.default_runtime.clone(),
            fell_back: true,
        }
    }

    /// Directory holding the runtime's scaffold files. May not exist, in
    /// which case the scaffold merge is a no-op.
    pub fn scaffold_dir(&self, runtime: &str) -> PathBuf {
        self.runtimes_dir.join(runtime)
    }

    /// Path of the runtime's build descriptor.
    pub fn descriptor_path(&self, runtime: &str) -> PathBuf {
        self.runtimes_dir.join(runtime).join("Dockerfile")
    }
}
