//! vigil-core — configuration model for the vigil daemon.
//!
//! Parses the TOML config file into typed settings and resolves each
//! `[services.*]` section into a validated [`ServiceDefinition`], the
//! unit of work the watcher supervisor reconciles against.
//!
//! Service metadata supports a structured table (canonical) plus two
//! legacy textual encodings kept for compatibility with older configs:
//! a JSON object string and comma-separated `key=value` pairs.

pub mod config;
pub mod definition;
pub mod error;

pub use config::{ConfigFile, MetadataSpec, RegistrySettings, ServiceConfig};
pub use definition::{local_hostname, ServiceDefinition};
pub use error::{ConfigError, ConfigResult};
