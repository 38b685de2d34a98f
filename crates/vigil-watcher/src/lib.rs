//! vigil-watcher — the watcher reconciliation engine.
//!
//! Turns a declarative set of service definitions into a live set of
//! concurrently-running health-check workers, and keeps the coordination
//! service's registration entries in step with what those workers observe.
//!
//! # Architecture
//!
//! ```text
//! Supervisor
//!   ├── reconcile(definitions) — diff against live watchers
//!   │     create / reconfigure / stop-and-recreate / remove
//!   └── Per-service ServiceWatcher task
//!         ├── 1s scheduling tick, probe when refresh elapses
//!         ├── run_probe() — external command under a hard deadline
//!         └── Registry::set_node(full_path, metadata, alive)
//! ```
//!
//! Each watcher owns exactly one registration path and is its sole
//! writer. Probes for a single service never overlap; across services
//! nothing is ordered. A hung probe blocks only its own watcher — the
//! command runner kills the child when the 90 s deadline elapses.

pub mod probe;
pub mod supervisor;
pub mod watcher;

pub use probe::{run_probe, FAILURE_STATUS, PROBE_TIMEOUT};
pub use supervisor::{ReconcileSummary, Supervisor};
pub use watcher::{ServiceWatcher, Timing, WatchConfig};
