//! Watcher supervisor — reconciles definitions against live watchers.
//!
//! The supervisor owns the registry handle and the full set of
//! `ServiceWatcher`s, keyed by service name. `reconcile` diffs a fresh
//! configuration snapshot against that set and applies the minimal change:
//! create what is new, hot-reconfigure what matches, stop-and-recreate
//! what changed identity, and remove what disappeared.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vigil_core::{ConfigResult, ServiceDefinition};
use vigil_registry::{Credentials, Registry};

use crate::watcher::{ServiceWatcher, Timing};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub removed: usize,
}

/// Owns the live watcher set and the shared registry handle.
pub struct Supervisor {
    registry: Arc<dyn Registry>,
    timing: Timing,
    /// Live watchers by service name. The mutex serializes reconciliation
    /// passes; steady-state watcher ticks never touch it.
    watchers: Mutex<HashMap<String, ServiceWatcher>>,
}

impl Supervisor {
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self::with_timing(registry, Timing::default())
    }

    /// Custom watcher timing (for testing).
    pub fn with_timing(registry: Arc<dyn Registry>, timing: Timing) -> Self {
        Self {
            registry,
            timing,
            watchers: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile from raw config-resolution results.
    ///
    /// Invalid definitions are skipped with a diagnostic; one bad service
    /// never blocks the rest.
    pub async fn reconcile_config(
        &self,
        results: Vec<ConfigResult<ServiceDefinition>>,
    ) -> ReconcileSummary {
        let mut definitions = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(definition) => definitions.push(definition),
                Err(e) => warn!(error = %e, "skipping invalid service definition"),
            }
        }
        self.reconcile(definitions).await
    }

    /// Diff `definitions` against the live watcher set and apply changes.
    ///
    /// Existence is keyed by name; a changed registration identity
    /// (`path`, `hostname`, `port`) forces a stop-and-recreate so the old
    /// entry is removed before the new one appears.
    pub async fn reconcile(&self, definitions: Vec<ServiceDefinition>) -> ReconcileSummary {
        let mut watchers = self.watchers.lock().await;
        let mut summary = ReconcileSummary::default();

        for definition in &definitions {
            match watchers.get(&definition.name) {
                Some(watcher) if watcher.same_identity(definition) => {
                    watcher.reconfigure(definition);
                    summary.updated += 1;
                }
                Some(_) => {
                    // Identity changed: the old registration must be gone
                    // before the replacement registers its own path.
                    let old = watchers
                        .remove(&definition.name)
                        .expect("watcher present in branch guard");
                    info!(service = %definition.name, "registration identity changed, recreating watcher");
                    old.stop().await;

                    watchers.insert(
                        definition.name.clone(),
                        ServiceWatcher::spawn(definition, self.registry.clone(), self.timing),
                    );
                    summary.recreated += 1;
                }
                None => {
                    info!(service = %definition.name, path = %definition.full_path(), "watcher created");
                    watchers.insert(
                        definition.name.clone(),
                        ServiceWatcher::spawn(definition, self.registry.clone(), self.timing),
                    );
                    summary.created += 1;
                }
            }
        }

        // Snapshot the stale names first, then remove — never mutate the
        // map while iterating it.
        let desired: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
        let stale: Vec<String> = watchers
            .keys()
            .filter(|name| !desired.contains(name.as_str()))
            .cloned()
            .collect();
        for name in stale {
            if let Some(watcher) = watchers.remove(&name) {
                info!(service = %name, path = %watcher.full_path(), "service removed from config, stopping watcher");
                watcher.stop().await;
                summary.removed += 1;
            }
        }

        info!(
            created = summary.created,
            updated = summary.updated,
            recreated = summary.recreated,
            removed = summary.removed,
            watching = watchers.len(),
            "reconciliation complete"
        );
        summary
    }

    /// Swap registry credentials in place.
    ///
    /// Live watchers keep their handle to the same client; no watcher
    /// state is lost and no reconnection happens.
    pub async fn update_credentials(&self, credentials: Credentials) {
        self.registry.update_credentials(credentials).await;
    }

    /// Stop every watcher, waiting for each final de-registration.
    ///
    /// After this returns the caller may release the registry connection:
    /// no registration entry owned by this process remains.
    pub async fn shutdown(&self) {
        let mut watchers = self.watchers.lock().await;
        let stopping: Vec<(String, ServiceWatcher)> = watchers.drain().collect();
        for (name, watcher) in stopping {
            watcher.stop().await;
            debug!(service = %name, "watcher stopped");
        }
        info!("all watchers stopped");
    }

    /// Names of currently-watched services, sorted.
    pub async fn watched_services(&self) -> Vec<String> {
        let watchers = self.watchers.lock().await;
        let mut names: Vec<String> = watchers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a watcher exists for `name`.
    pub async fn is_watching(&self, name: &str) -> bool {
        self.watchers.lock().await.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use vigil_core::ConfigError;
    use vigil_registry::{MemoryRegistry, RegistryOp};

    fn definition(name: &str, port: u16) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            command: "true".to_string(),
            refresh: 3600,
            path: format!("/services/{name}"),
            hostname: "host1".to_string(),
            port,
            metadata: BTreeMap::new(),
        }
    }

    fn supervisor(registry: &Arc<MemoryRegistry>) -> Supervisor {
        Supervisor::with_timing(registry.clone() as Arc<dyn Registry>, Timing::fast())
    }

    async fn wait_for_node(registry: &MemoryRegistry, path: &str) {
        for _ in 0..500 {
            if registry.node(path).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for registration of {path}");
    }

    #[tokio::test]
    async fn reconcile_creates_one_watcher_per_definition() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        let summary = supervisor
            .reconcile(vec![definition("memcache", 11211), definition("mysql", 3306)])
            .await;
        assert_eq!(summary.created, 2);
        assert_eq!(
            supervisor.watched_services().await,
            vec!["memcache", "mysql"]
        );

        wait_for_node(&registry, "/services/memcache/host1:11211").await;
        wait_for_node(&registry, "/services/mysql/host1:3306").await;

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn second_reconcile_leaves_exactly_the_new_set() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor
            .reconcile(vec![definition("memcache", 11211), definition("mysql", 3306)])
            .await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;
        wait_for_node(&registry, "/services/mysql/host1:3306").await;

        let summary = supervisor
            .reconcile(vec![definition("mysql", 3306), definition("redis", 6379)])
            .await;
        assert_eq!(summary.created, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.removed, 1);

        assert_eq!(supervisor.watched_services().await, vec!["mysql", "redis"]);
        // The dropped service left no registration entry behind.
        assert!(registry.node("/services/memcache/host1:11211").is_none());
        assert_eq!(registry.unset_count("/services/memcache/host1:11211"), 1);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn unchanged_identity_reconfigures_without_churn() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor.reconcile(vec![definition("memcache", 11211)]).await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;

        let mut changed = definition("memcache", 11211);
        changed.command = "false".to_string();
        changed.refresh = 30;
        let summary = supervisor.reconcile(vec![changed]).await;

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.recreated, 0);
        // No unset between the two reconciles — the registration held.
        assert_eq!(registry.unset_count("/services/memcache/host1:11211"), 0);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn changed_identity_recreates_the_watcher() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor.reconcile(vec![definition("memcache", 11211)]).await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;

        let summary = supervisor
            .reconcile(vec![definition("memcache", 11212)])
            .await;
        assert_eq!(summary.recreated, 1);

        wait_for_node(&registry, "/services/memcache/host1:11212").await;
        // Exactly one removal of the old path, and it never coexists with
        // the new path: the unset is ordered before the new path's set.
        assert!(registry.node("/services/memcache/host1:11211").is_none());
        assert_eq!(registry.unset_count("/services/memcache/host1:11211"), 1);

        let ops = registry.ops();
        let unset_old = ops
            .iter()
            .position(|op| {
                matches!(op, RegistryOp::Unset { path } if path == "/services/memcache/host1:11211")
            })
            .unwrap();
        let set_new = ops
            .iter()
            .position(|op| {
                matches!(op, RegistryOp::Set { path, .. } if path == "/services/memcache/host1:11212")
            })
            .unwrap();
        assert!(unset_old < set_new);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_definitions_are_skipped() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        let summary = supervisor
            .reconcile_config(vec![
                Ok(definition("memcache", 11211)),
                Err(ConfigError::invalid("bad", "command is empty")),
            ])
            .await;

        assert_eq!(summary.created, 1);
        assert!(supervisor.is_watching("memcache").await);
        assert!(!supervisor.is_watching("bad").await);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_deregisters_everything() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor
            .reconcile(vec![definition("memcache", 11211), definition("mysql", 3306)])
            .await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;
        wait_for_node(&registry, "/services/mysql/host1:3306").await;

        supervisor.shutdown().await;

        assert!(registry.nodes().is_empty());
        assert!(supervisor.watched_services().await.is_empty());
    }

    #[tokio::test]
    async fn credential_swap_reaches_the_shared_client() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor.reconcile(vec![definition("memcache", 11211)]).await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;

        supervisor
            .update_credentials(Credentials::new(Some("op".to_string()), None))
            .await;

        assert!(registry.ops().iter().any(|op| matches!(
            op,
            RegistryOp::Credentials { user: Some(u) } if u == "op"
        )));
        // Watchers are untouched by a credential swap.
        assert!(supervisor.is_watching("memcache").await);

        supervisor.shutdown().await;
    }

    #[tokio::test]
    async fn reconcile_of_empty_set_removes_all() {
        let registry = Arc::new(MemoryRegistry::new());
        let supervisor = supervisor(&registry);

        supervisor.reconcile(vec![definition("memcache", 11211)]).await;
        wait_for_node(&registry, "/services/memcache/host1:11211").await;

        let summary = supervisor.reconcile(Vec::new()).await;
        assert_eq!(summary.removed, 1);
        assert!(registry.nodes().is_empty());

        supervisor.shutdown().await;
    }
}
