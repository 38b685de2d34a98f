//! vigild — the vigil daemon.
//!
//! Monitors a set of locally-defined services on their own schedules and
//! reflects their health as ephemeral registration entries in the
//! coordination service. Reload the config with SIGHUP; SIGTERM or
//! Ctrl-C de-registers everything and exits.
//!
//! # Usage
//!
//! ```text
//! vigild --config /etc/vigil/config.toml --server zk1.prod:2181
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info};

use vigil_core::ConfigFile;
use vigil_registry::{Credentials, HttpRegistry, Registry};
use vigil_watcher::Supervisor;

const DEFAULT_SERVER: &str = "localhost:2181";

#[derive(Debug, Parser)]
#[command(name = "vigild", about = "Service health watcher and registration daemon")]
struct Cli {
    /// Path to the config file.
    #[arg(short, long, default_value = "/etc/vigil/config.toml")]
    config: PathBuf,

    /// Coordination service address (overrides [registry].server).
    #[arg(short, long)]
    server: Option<String>,

    /// Enable debug logging for the vigil crates.
    #[arg(short, long)]
    verbose: bool,
}

/// Control messages consumed by the daemon's own loop.
///
/// Signals are translated into these and queued, so neither reload nor
/// shutdown work ever runs concurrently with an in-progress
/// reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlMessage {
    /// Re-read the config file and reconcile watchers against it.
    Reload,
    /// Stop all watchers, de-register every entry, and exit.
    Shutdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,vigild=debug,vigil_watcher=debug,vigil_registry=debug,vigil_core=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().unwrap()),
        )
        .init();

    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!(config = ?cli.config, "vigild starting");

    // Startup failures here are fatal: a daemon that cannot read its
    // config or address the registry has nothing to watch over.
    let config = ConfigFile::load(&cli.config)?;
    let server = cli
        .server
        .clone()
        .or_else(|| config.registry.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let registry = Arc::new(HttpRegistry::connect(&server, credentials_of(&config))?);
    info!(%server, "registry client ready");

    let supervisor = Supervisor::new(registry.clone() as Arc<dyn Registry>);
    supervisor.reconcile_config(config.definitions()).await;

    let (control_tx, mut control_rx) = mpsc::channel(8);
    spawn_signal_listener(control_tx)?;

    while let Some(message) = control_rx.recv().await {
        match message {
            ControlMessage::Reload => reload(&cli, &supervisor).await,
            ControlMessage::Shutdown => break,
        }
    }

    info!("shutting down, de-registering all services");
    supervisor.shutdown().await;
    info!("vigild stopped");
    Ok(())
}

/// Translate SIGHUP into `Reload` and SIGTERM / Ctrl-C into `Shutdown`.
fn spawn_signal_listener(control_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = hangup.recv() => ControlMessage::Reload,
                _ = terminate.recv() => ControlMessage::Shutdown,
                _ = tokio::signal::ctrl_c() => ControlMessage::Shutdown,
            };
            info!(?message, "received signal");
            let done = message == ControlMessage::Shutdown;
            if control_tx.send(message).await.is_err() || done {
                break;
            }
        }
    });
    Ok(())
}

/// Re-read the config and bring the watcher set up to date.
///
/// A config that no longer parses is logged and ignored — the previous
/// definition set stays live rather than tearing down healthy watchers.
async fn reload(cli: &Cli, supervisor: &Supervisor) {
    info!(config = ?cli.config, "reloading config");
    let config = match ConfigFile::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "reload failed, keeping previous configuration");
            return;
        }
    };

    // Credentials swap in place first, so watchers reporting mid-reload
    // already carry the new pair; then the watcher set catches up.
    supervisor.update_credentials(credentials_of(&config)).await;
    supervisor.reconcile_config(config.definitions()).await;
}

fn credentials_of(config: &ConfigFile) -> Credentials {
    Credentials::new(
        config.registry.user.clone(),
        config.registry.password.clone(),
    )
}
