//! Per-service watcher task.
//!
//! Each `ServiceWatcher` owns one service definition and one registration
//! path. Its task loop ticks on a short fixed cadence, runs the probe when
//! the service's own refresh interval has elapsed, and reports the result
//! to the registry. Stop is cooperative: the loop observes the shutdown
//! signal at the top of each tick, then de-registers before exiting.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vigil_core::ServiceDefinition;
use vigil_registry::Registry;

use crate::probe;

/// Mutable watcher configuration, swappable on a live watcher.
///
/// The registration identity (`path`, `hostname`, `port`) is deliberately
/// absent: changing it requires destroying the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub command: String,
    pub refresh: Duration,
    pub metadata: BTreeMap<String, String>,
}

impl From<&ServiceDefinition> for WatchConfig {
    fn from(definition: &ServiceDefinition) -> Self {
        Self {
            command: definition.command.clone(),
            refresh: definition.refresh_interval(),
            metadata: definition.metadata.clone(),
        }
    }
}

/// Timing knobs shared by every watcher a supervisor spawns.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Scheduling tick — how often each watcher re-evaluates its schedule.
    pub tick: Duration,
    /// Hard deadline for a single probe.
    pub probe_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            probe_timeout: probe::PROBE_TIMEOUT,
        }
    }
}

impl Timing {
    /// Fast timing for tests.
    pub fn fast() -> Self {
        Self {
            tick: Duration::from_millis(10),
            probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Handle to one running watcher task.
pub struct ServiceWatcher {
    name: String,
    path: String,
    hostname: String,
    port: u16,
    full_path: String,
    config_tx: watch::Sender<WatchConfig>,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ServiceWatcher {
    /// Spawn a watcher task for `definition`.
    ///
    /// The first probe runs on the first tick — a fresh watcher never
    /// waits out a full refresh interval before checking.
    pub fn spawn(
        definition: &ServiceDefinition,
        registry: Arc<dyn Registry>,
        timing: Timing,
    ) -> Self {
        let full_path = definition.full_path();
        let (config_tx, config_rx) = watch::channel(WatchConfig::from(definition));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_watch_loop(
            definition.name.clone(),
            full_path.clone(),
            registry,
            timing,
            config_rx,
            shutdown_rx,
        ));

        Self {
            name: definition.name.clone(),
            path: definition.path.clone(),
            hostname: definition.hostname.clone(),
            port: definition.port,
            full_path,
            config_tx,
            shutdown_tx,
            handle,
        }
    }

    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Whether this watcher's registration identity matches `definition`.
    pub fn same_identity(&self, definition: &ServiceDefinition) -> bool {
        self.path == definition.path
            && self.hostname == definition.hostname
            && self.port == definition.port
    }

    /// Swap the mutable configuration on the live watcher.
    ///
    /// The in-flight refresh countdown is preserved — the next probe fires
    /// when it would have fired under the old config's schedule, using the
    /// new command. The caller must not use this to change the
    /// registration identity; [`same_identity`](Self::same_identity) gates
    /// that on the supervisor side.
    pub fn reconfigure(&self, definition: &ServiceDefinition) {
        let _ = self.config_tx.send(WatchConfig::from(definition));
        debug!(service = %self.name, "watcher reconfigured");
    }

    /// Stop the watcher and wait for its final de-registration.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!(service = %self.name, error = %e, "watcher task did not stop cleanly");
        }
    }
}

/// The scheduling loop for a single service.
async fn run_watch_loop(
    name: String,
    full_path: String,
    registry: Arc<dyn Registry>,
    timing: Timing,
    config_rx: watch::Receiver<WatchConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    // None forces the first scheduling decision to probe immediately.
    let mut last_checked: Option<Instant> = None;
    // Last propagated health state, for transition logging.
    let mut last_healthy: Option<bool> = None;

    debug!(service = %name, %full_path, "watch loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(timing.tick) => {
                let config = config_rx.borrow().clone();
                let due = last_checked.is_none_or(|at| at.elapsed() > config.refresh);
                if !due {
                    continue;
                }

                let status = probe::run_probe(&config.command, timing.probe_timeout).await;
                let alive = status == 0;
                if !alive {
                    warn!(service = %name, command = %config.command, status, "probe failed");
                } else if last_healthy != Some(true) {
                    info!(service = %name, command = %config.command, "probe succeeded");
                } else {
                    debug!(service = %name, command = %config.command, "probe succeeded");
                }
                last_healthy = Some(alive);

                report(&name, registry.as_ref(), &full_path, &config.metadata, alive).await;
                last_checked = Some(Instant::now());
            }
            _ = shutdown.changed() => {
                debug!(service = %name, "watch loop stopping");
                break;
            }
        }
    }

    // The registration entry must not outlive its watcher: report dead,
    // then remove the entry entirely.
    let config = config_rx.borrow().clone();
    report(&name, registry.as_ref(), &full_path, &config.metadata, false).await;
    if let Err(e) = registry.unset_node(&full_path).await {
        warn!(service = %name, %full_path, error = %e, "failed to remove registration entry");
    }
    debug!(service = %name, "watch loop stopped");
}

/// Push one health state to the registry; unavailability is not fatal.
async fn report(
    name: &str,
    registry: &dyn Registry,
    full_path: &str,
    metadata: &BTreeMap<String, String>,
    alive: bool,
) {
    match registry.set_node(full_path, metadata, alive).await {
        Ok(()) => debug!(service = %name, %full_path, alive, "registration updated"),
        Err(e) => warn!(
            service = %name,
            %full_path,
            alive,
            error = %e,
            "failed to update registration, will retry on next check"
        ),
    }
}
