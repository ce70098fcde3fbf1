//! Container lifecycle dispatch.
//!
//! The [`Orchestrator`] is the single owner of the container-id to
//! [`ActiveStream`] map. It consumes [`ContainerEvent`]s from the
//! notifier channel, builds sinks and workers on start, and tears them
//! down on stop.
//!
//! # Teardown order (per container)
//!
//! 1. Close the worker and wait until its pull loop has exited
//! 2. Close the primary sink
//! 3. Close the error sink (skipped when it is the primary)
//!
//! Closing the worker first guarantees no write races a closed sink.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use docklog_container_watch::{DockerClient, StreamWorker, WorkerConfig, WorkerHandle};
use docklog_core::event::ContainerEvent;
use docklog_core::metrics as m;
use docklog_core::sink::SharedSink;

use crate::sinks::{SinkPair, SinkProvider};

/// A tracked container: its worker and the sinks it writes to.
pub struct ActiveStream {
    name: String,
    worker: WorkerHandle,
    sinks: SinkPair,
}

impl ActiveStream {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Event-driven owner of every running log stream.
pub struct Orchestrator<D: DockerClient, P: SinkProvider> {
    worker: StreamWorker<D>,
    provider: P,
    streams: HashMap<String, ActiveStream>,
    root: CancellationToken,
}

impl<D: DockerClient, P: SinkProvider> Orchestrator<D, P> {
    pub fn new(docker: Arc<D>, provider: P) -> Self {
        Self::with_worker_config(docker, provider, WorkerConfig::default())
    }

    pub fn with_worker_config(docker: Arc<D>, provider: P, config: WorkerConfig) -> Self {
        Self {
            worker: StreamWorker::with_config(docker, config),
            provider,
            streams: HashMap::new(),
            root: CancellationToken::new(),
        }
    }

    /// Number of containers currently tracked.
    pub fn active_count(&self) -> usize {
        self.streams.len()
    }

    /// Whether `container_id` has a running stream.
    pub fn is_tracking(&self, container_id: &str) -> bool {
        self.streams.contains_key(container_id)
    }

    /// Root token; every worker observes it through a child token.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.root
    }

    /// Dispatch events until `shutdown` resolves or the notifier goes away.
    ///
    /// On either exit path every remaining stream is closed first.
    ///
    /// # Errors
    ///
    /// Returns an error when the event channel closes, which means the
    /// notifier lost its Docker subscription.
    pub async fn run<F>(&mut self, mut events: mpsc::Receiver<ContainerEvent>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("entering main event loop");

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.shutdown().await;
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::error!("container event notifier stopped");
                        self.shutdown().await;
                        return Err(anyhow::anyhow!("container event notifier stopped unexpectedly"));
                    }
                },
            }
        }
    }

    /// Apply one lifecycle event.
    pub async fn handle_event(&mut self, event: ContainerEvent) {
        tracing::debug!(event = %event, "container event");
        if event.started {
            self.start_stream(event).await;
        } else {
            self.stop_stream(&event.container_id).await;
        }
        #[allow(clippy::cast_precision_loss)]
        metrics::gauge!(m::DAEMON_ACTIVE_STREAMS).set(self.streams.len() as f64);
    }

    async fn start_stream(&mut self, event: ContainerEvent) {
        if self.streams.contains_key(&event.container_id) {
            tracing::info!(
                container_id = %event.container_id,
                container = %event.container_name,
                "container already tracked, ignoring start"
            );
            return;
        }

        let Some(sinks) = self
            .provider
            .make_sinks(&event.container_name, &event.group)
            .await
        else {
            return;
        };

        let worker = self.worker.activate(
            &event.container_id,
            Arc::clone(&sinks.primary),
            Arc::clone(&sinks.error),
            &self.root,
        );
        tracing::info!(
            container_id = %event.container_id,
            container = %event.container_name,
            group = %event.group,
            "tracking container"
        );
        self.streams.insert(
            event.container_id,
            ActiveStream {
                name: event.container_name,
                worker,
                sinks,
            },
        );
    }

    async fn stop_stream(&mut self, container_id: &str) {
        let Some(stream) = self.streams.remove(container_id) else {
            tracing::debug!(container_id, "stop for untracked container, ignoring");
            return;
        };
        close_stream(container_id, stream).await;
    }

    /// Close every tracked stream.
    pub async fn shutdown(&mut self) {
        tracing::info!(active = self.streams.len(), "closing all log streams");
        self.root.cancel();
        for (container_id, stream) in self.streams.drain() {
            close_stream(&container_id, stream).await;
        }
        metrics::gauge!(m::DAEMON_ACTIVE_STREAMS).set(0.0);
    }
}

async fn close_stream(container_id: &str, stream: ActiveStream) {
    let outcome = stream.worker.close().await;
    tracing::info!(
        container_id,
        container = %stream.name,
        outcome = outcome.as_str(),
        "log stream closed"
    );

    close_sink(container_id, "primary", &stream.sinks.primary).await;
    if !stream.sinks.is_shared() {
        close_sink(container_id, "error", &stream.sinks.error).await;
    }
}

async fn close_sink(container_id: &str, role: &str, sink: &SharedSink) {
    if let Err(e) = sink.close().await {
        tracing::warn!(container_id, role, sink = sink.name(), error = %e, "failed to close sink");
    }
}
