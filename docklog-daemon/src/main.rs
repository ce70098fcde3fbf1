use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

use docklog_container_watch::{BollardDockerClient, DockerClient, EventNotifier, NameFilter};
use docklog_daemon::cli::{DaemonCli, load_config};
use docklog_daemon::logging::init_tracing;
use docklog_daemon::metrics_server;
use docklog_daemon::orchestrator::Orchestrator;
use docklog_daemon::sinks::ConfiguredSinks;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "docklog-daemon starting");

    let start_time = Instant::now();
    let background = CancellationToken::new();
    let uptime_task = if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
        Some(metrics_server::spawn_uptime_updater(start_time, background.clone()))
    } else {
        None
    };

    // Signal handlers go in before any container is tracked
    let signals = ShutdownSignals::install()?;

    let docker = Arc::new(
        BollardDockerClient::connect(&config.docker.host)
            .map_err(|e| anyhow::anyhow!("failed to create docker client: {}", e))?,
    );
    docker
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("docker daemon unreachable: {}", e))?;
    tracing::info!(host = %config.docker.host, "connected to docker");

    let events = EventNotifier::new(Arc::clone(&docker), NameFilter::from_core(&config.filter))
        .with_capacity(config.docker.event_channel_capacity)
        .subscribe()
        .await
        .map_err(|e| anyhow::anyhow!("failed to subscribe to container events: {}", e))?;

    let mut orchestrator = Orchestrator::new(docker, ConfiguredSinks::from_config(&config));
    let result = orchestrator
        .run(events, async move {
            let name = signals.recv().await;
            tracing::info!(signal = name, "shutdown signal received");
        })
        .await;

    background.cancel();
    if let Some(task) = uptime_task {
        let _ = task.await;
    }

    match &result {
        Ok(()) => tracing::info!("docklog-daemon shut down"),
        Err(e) => tracing::error!(error = %e, "docklog-daemon stopped"),
    }
    result
}

/// SIGTERM / SIGINT listeners.
struct ShutdownSignals {
    sigterm: Signal,
    sigint: Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Resolve with the name of the first signal received.
    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        }
    }
}
