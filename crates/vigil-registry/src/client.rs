//! The `Registry` trait — what watchers report through.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::RegistryResult;

/// Credential pair for the coordination service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(user: Option<String>, password: Option<String>) -> Self {
        Self { user, password }
    }
}

/// Client for ephemeral registration entries.
///
/// Each watcher is the sole writer for its own path, so implementations
/// need no cross-path coordination. `set_node` is idempotent: repeating a
/// call with identical arguments leaves the registry unchanged.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Create or update the entry at `path` with the given data and
    /// liveness flag.
    async fn set_node(
        &self,
        path: &str,
        data: &BTreeMap<String, String>,
        alive: bool,
    ) -> RegistryResult<()>;

    /// Remove the entry at `path`. Removing an absent entry succeeds.
    async fn unset_node(&self, path: &str) -> RegistryResult<()>;

    /// Swap credentials in place without invalidating the connection.
    ///
    /// Callers holding a reference to this client keep using it; requests
    /// issued after this call carry the new credentials.
    async fn update_credentials(&self, credentials: Credentials);
}
