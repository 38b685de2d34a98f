//! Resolved service definitions.
//!
//! A [`ServiceDefinition`] is the validated form of one `[services.<name>]`
//! config section. The `(path, hostname, port)` triple is the definition's
//! registration identity: a watcher must be destroyed and recreated when
//! any of them change, while `command`, `refresh`, and `metadata` can be
//! swapped on a live watcher.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::ServiceConfig;
use crate::error::{ConfigError, ConfigResult};

/// A validated service definition, the unit of reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    /// Unique key, also the logging identity.
    pub name: String,
    /// Health probe command, tokenized on whitespace.
    pub command: String,
    /// Seconds between probes (>= 1).
    pub refresh: u32,
    /// Registration path prefix.
    pub path: String,
    /// Hostname this registration advertises.
    pub hostname: String,
    /// Port this registration advertises.
    pub port: u16,
    /// Key/value data attached to the registration entry.
    pub metadata: BTreeMap<String, String>,
}

impl ServiceDefinition {
    /// Validate a config section into a definition.
    ///
    /// `default_hostname` is the local hostname, used when the section
    /// does not pin one explicitly.
    pub fn resolve(
        name: &str,
        config: &ServiceConfig,
        default_hostname: Option<&str>,
    ) -> ConfigResult<Self> {
        if config.command.split_whitespace().next().is_none() {
            return Err(ConfigError::invalid(name, "command is empty"));
        }
        if config.refresh < 1 {
            return Err(ConfigError::invalid(name, "refresh must be >= 1 second"));
        }
        if config.port == 0 {
            return Err(ConfigError::invalid(name, "port must be nonzero"));
        }
        if !config.path.starts_with('/') {
            return Err(ConfigError::invalid(name, "path must start with '/'"));
        }

        let hostname = match config.hostname.as_deref().or(default_hostname) {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => {
                return Err(ConfigError::invalid(
                    name,
                    "no hostname configured and local hostname unavailable",
                ));
            }
        };

        Ok(ServiceDefinition {
            name: name.to_string(),
            command: config.command.clone(),
            refresh: config.refresh,
            path: config.path.trim_end_matches('/').to_string(),
            hostname,
            port: config.port,
            metadata: config.metadata.resolve(),
        })
    }

    /// The registration entry key: `{path}/{hostname}:{port}`.
    pub fn full_path(&self) -> String {
        format!("{}/{}:{}", self.path, self.hostname, self.port)
    }

    /// Whether two definitions share the same registration identity.
    ///
    /// Definitions with the same identity can be hot-reconfigured; a
    /// changed identity forces a stop-and-recreate.
    pub fn same_identity(&self, other: &ServiceDefinition) -> bool {
        self.path == other.path && self.hostname == other.hostname && self.port == other.port
    }

    /// Probe cadence as a `Duration`.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh))
    }
}

/// The local hostname, if the OS can report one.
pub fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}
