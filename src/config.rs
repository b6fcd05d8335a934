use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::Result;
use figment::{
    providers::{Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::runtime::{RuntimeCatalog, RuntimeProfile};

const LOCAL_ENV: &str = "local";

/// Registry addressing.
///
/// Images are built under `local_host` and pushed under `external_host`,
/// the name at which consumers outside the builder's network reach them.
/// When the two are equal the re-tag step is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub local_host: String,
    pub external_host: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            local_host: "localhost:5001".to_string(),
            external_host: "localhost:5001".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Environment name (e.g., "local", "staging", "production").
    pub env: String,
    pub listen_addr: String,
    pub registry: RegistryConfig,
    /// Root directory holding one subdirectory per runtime with its build
    /// descriptor and scaffold files.
    pub runtimes_dir: String,
    /// Ordered runtime profiles; order is detection precedence. When unset,
    /// the built-in profiles are used.
    #[serde(default)]
    pub runtimes: Option<Vec<RuntimeProfile>>,
    /// Runtime used when no profile matches a bundle.
    pub default_runtime: String,
    /// Image toolchain binary (e.g. "podman"). Defaults to "docker".
    #[serde(default)]
    pub toolchain_binary: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let runtimes_dir = env::current_dir()
            .map(|d| d.join("runtimes"))
            .unwrap_or_else(|_| PathBuf::from("./runtimes"));
        ServerConfig {
            env: LOCAL_ENV.to_string(),
            listen_addr: "0.0.0.0:8082".to_string(),
            registry: RegistryConfig::default(),
            runtimes_dir: runtimes_dir.to_string_lossy().to_string(),
            runtimes: None,
            default_runtime: "python-flask".to_string(),
            toolchain_binary: None,
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&config_str)
    }

    fn from_yaml_str(config_str: &str) -> Result<ServerConfig> {
        let config: ServerConfig = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Yaml::string(config_str))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        if self.registry.local_host.is_empty() || self.registry.external_host.is_empty() {
            return Err(anyhow::anyhow!("registry hosts must not be empty"));
        }
        let profiles = self.profiles();
        if !profiles.iter().any(|p| p.name == self.default_runtime) {
            return Err(anyhow::anyhow!(
                "default runtime {} is not a declared runtime profile",
                self.default_runtime
            ));
        }
        Ok(())
    }

    pub fn structured_logging(&self) -> bool {
        self.env != LOCAL_ENV
    }

    fn profiles(&self) -> Vec<RuntimeProfile> {
        self.runtimes
            .clone()
            .unwrap_or_else(RuntimeCatalog::default_profiles)
    }

    /// The immutable runtime catalog for this process.
    pub fn runtime_catalog(&self) -> RuntimeCatalog {
        RuntimeCatalog::new(
            self.profiles(),
            self.default_runtime.clone(),
            PathBuf::from(&self.runtimes_dir),
        )
    }
}
