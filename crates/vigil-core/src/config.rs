//! vigil config file parser.
//!
//! The config file is TOML with one `[registry]` section and any number
//! of `[services.<name>]` sections:
//!
//! ```toml
//! [registry]
//! server = "localhost:2181"
//! user = "op"
//! password = "secret"
//!
//! [services.memcache]
//! command = "pgrep memcached"
//! refresh = 30
//! port = 11211
//! path = "/services/prod-uswest1-mc"
//! metadata = { region = "uswest1" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::definition::{local_hostname, ServiceDefinition};
use crate::error::{ConfigError, ConfigResult};

/// Top-level config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

/// The `[registry]` section — coordination service address and credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrySettings {
    pub server: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// One `[services.<name>]` section, as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Health probe command, tokenized on whitespace (no shell).
    pub command: String,
    /// Seconds between probes.
    pub refresh: u32,
    /// Port the service listens on.
    pub port: u16,
    /// Registration path prefix in the coordination service.
    pub path: String,
    /// Hostname to register under; defaults to the local hostname.
    pub hostname: Option<String>,
    #[serde(default)]
    pub metadata: MetadataSpec,
}

/// Metadata attached to a registration entry.
///
/// The structured table form is canonical. A plain string is accepted as
/// a compatibility fallback and parsed as a JSON object first, then as
/// comma-separated `key=value` pairs (pairs without exactly one `=` are
/// dropped).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MetadataSpec {
    Map(BTreeMap<String, String>),
    Text(String),
}

impl Default for MetadataSpec {
    fn default() -> Self {
        MetadataSpec::Map(BTreeMap::new())
    }
}

impl MetadataSpec {
    /// Resolve either encoding into the canonical mapping.
    pub fn resolve(&self) -> BTreeMap<String, String> {
        match self {
            MetadataSpec::Map(map) => map.clone(),
            MetadataSpec::Text(text) => {
                if let Ok(map) = serde_json::from_str::<BTreeMap<String, String>>(text) {
                    return map;
                }
                let mut map = BTreeMap::new();
                for pair in text.split(',') {
                    let parts: Vec<&str> = pair.split('=').collect();
                    if let [key, value] = parts[..] {
                        map.insert(key.trim().to_string(), value.trim().to_string());
                    }
                }
                map
            }
        }
    }
}

impl ConfigFile {
    /// Load and parse a config file from disk.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&content)
    }

    /// Parse config from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve every service section into a validated [`ServiceDefinition`].
    ///
    /// One malformed section never blocks the rest — each entry carries its
    /// own result, and the caller decides how to report failures.
    pub fn definitions(&self) -> Vec<ConfigResult<ServiceDefinition>> {
        let default_hostname = local_hostname();
        self.services
            .iter()
            .map(|(name, service)| {
                ServiceDefinition::resolve(name, service, default_hostname.as_deref())
            })
            .collect()
    }
}
