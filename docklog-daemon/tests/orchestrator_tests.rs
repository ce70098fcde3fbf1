//! Orchestrator integration tests.
//!
//! Drives the orchestrator with hand-built container events, a scripted
//! Docker client and in-memory sinks. No Docker daemon is needed.

use std::time::{Duration, SystemTime};

use docklog_core::event::ContainerEvent;
use docklog_daemon::orchestrator::Orchestrator;
use tokio::sync::mpsc;

use mock::{Journal, MemoryProvider, ScriptedDocker};

mod mock {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;
    use docklog_container_watch::{
        ContainerWatchError, DockerClient, LogChunk, LogRequest, RuntimeEvent,
    };
    use docklog_core::error::SinkError;
    use docklog_core::sink::LogSink;
    use docklog_core::types::ContainerInfo;
    use docklog_daemon::sinks::{SinkPair, SinkProvider};
    use futures_util::StreamExt;
    use futures_util::stream::{self, BoxStream};

    /// Ordered record of teardown steps shared by docker mock and sinks.
    #[derive(Clone, Default)]
    pub struct Journal(Arc<Mutex<Vec<String>>>);

    impl Journal {
        pub fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        pub fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    /// Records its drop into the journal.
    struct DropGuard {
        journal: Journal,
        label: String,
    }

    impl Drop for DropGuard {
        fn drop(&mut self) {
            self.journal.push(format!("{} stream dropped", self.label));
        }
    }

    /// Docker client whose log streams emit scripted chunks and then hang.
    pub struct ScriptedDocker {
        logs: HashMap<String, Vec<LogChunk>>,
        journal: Journal,
    }

    impl ScriptedDocker {
        pub fn new(journal: Journal) -> Self {
            Self {
                logs: HashMap::new(),
                journal,
            }
        }

        pub fn with_stdout(mut self, id: &str, line: &'static str) -> Self {
            self.logs
                .entry(id.to_owned())
                .or_default()
                .push(LogChunk::stdout(Bytes::from_static(line.as_bytes())));
            self
        }

        pub fn with_stderr(mut self, id: &str, line: &'static str) -> Self {
            self.logs
                .entry(id.to_owned())
                .or_default()
                .push(LogChunk::stderr(Bytes::from_static(line.as_bytes())));
            self
        }
    }

    impl DockerClient for ScriptedDocker {
        async fn list_containers(&self) -> Result<Vec<ContainerInfo>, ContainerWatchError> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<(), ContainerWatchError> {
            Ok(())
        }

        fn events(&self) -> BoxStream<'static, Result<RuntimeEvent, ContainerWatchError>> {
            stream::pending().boxed()
        }

        fn logs(
            &self,
            container_id: &str,
            _request: LogRequest,
        ) -> BoxStream<'static, Result<LogChunk, ContainerWatchError>> {
            let chunks = self.logs.get(container_id).cloned().unwrap_or_default();
            let guard = DropGuard {
                journal: self.journal.clone(),
                label: container_id.to_owned(),
            };
            let hang = stream::unfold(guard, |guard| async move {
                let _held = guard;
                std::future::pending::<Option<(Result<LogChunk, ContainerWatchError>, DropGuard)>>()
                    .await
            });
            stream::iter(chunks.into_iter().map(Ok)).chain(hang).boxed()
        }
    }

    /// In-memory sink that journals its close.
    pub struct MemorySink {
        name: String,
        journal: Journal,
        pub data: Mutex<Vec<u8>>,
        pub closes: Mutex<usize>,
    }

    impl MemorySink {
        fn new(name: String, journal: Journal) -> Self {
            Self {
                name,
                journal,
                data: Mutex::new(Vec::new()),
                closes: Mutex::new(0),
            }
        }

        pub fn contents(&self) -> String {
            String::from_utf8(self.data.lock().unwrap().clone()).unwrap()
        }

        pub fn close_count(&self) -> usize {
            *self.closes.lock().unwrap()
        }
    }

    impl LogSink for MemorySink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
            if *self.closes.lock().unwrap() > 0 {
                return Err(SinkError::Closed(self.name.clone()));
            }
            self.data.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        async fn close(&self) -> Result<(), SinkError> {
            *self.closes.lock().unwrap() += 1;
            self.journal.push(format!("{} closed", self.name));
            Ok(())
        }
    }

    #[derive(Default)]
    struct ProviderState {
        calls: Vec<(String, String)>,
        sinks: HashMap<String, (Arc<MemorySink>, Arc<MemorySink>)>,
    }

    /// Sink provider handing out memory sinks; clones share state.
    #[derive(Clone, Default)]
    pub struct MemoryProvider {
        journal: Journal,
        shared_error: bool,
        refuse: Vec<String>,
        state: Arc<Mutex<ProviderState>>,
    }

    impl MemoryProvider {
        pub fn new(journal: Journal) -> Self {
            Self {
                journal,
                ..Self::default()
            }
        }

        pub fn with_shared_error(mut self) -> Self {
            self.shared_error = true;
            self
        }

        pub fn refusing(mut self, name: &str) -> Self {
            self.refuse.push(name.to_owned());
            self
        }

        pub fn calls(&self) -> Vec<(String, String)> {
            self.state.lock().unwrap().calls.clone()
        }

        pub fn sinks_for(&self, name: &str) -> (Arc<MemorySink>, Arc<MemorySink>) {
            self.state.lock().unwrap().sinks[name].clone()
        }
    }

    impl SinkProvider for MemoryProvider {
        async fn make_sinks(&self, name: &str, group: &str) -> Option<SinkPair> {
            let mut state = self.state.lock().unwrap();
            state.calls.push((name.to_owned(), group.to_owned()));
            if self.refuse.iter().any(|r| r == name) {
                return None;
            }

            let primary = Arc::new(MemorySink::new(format!("{name}.primary"), self.journal.clone()));
            let error = if self.shared_error {
                Arc::clone(&primary)
            } else {
                Arc::new(MemorySink::new(format!("{name}.error"), self.journal.clone()))
            };
            state
                .sinks
                .insert(name.to_owned(), (Arc::clone(&primary), Arc::clone(&error)));

            Some(SinkPair {
                primary,
                error,
            })
        }
    }
}

fn start(id: &str, name: &str, group: &str) -> ContainerEvent {
    ContainerEvent::start(id, name, group, SystemTime::now())
}

fn stop(id: &str, name: &str) -> ContainerEvent {
    ContainerEvent::stop(id, name, "", SystemTime::now())
}

async fn wait_for(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn test_start_streams_stdout_and_stderr_to_their_sinks() {
    // Given
    let journal = Journal::default();
    let docker = ScriptedDocker::new(journal.clone())
        .with_stdout("c1", "GET / 200\n")
        .with_stderr("c1", "warning: slow\n");
    let provider = MemoryProvider::new(journal.clone());
    let mut orchestrator = Orchestrator::new(std::sync::Arc::new(docker), provider.clone());

    // When
    orchestrator.handle_event(start("c1", "web", "acme")).await;

    // Then
    assert!(orchestrator.is_tracking("c1"));
    assert_eq!(provider.calls(), vec![("web".to_owned(), "acme".to_owned())]);
    let (primary, error) = provider.sinks_for("web");
    wait_for(|| primary.contents() == "GET / 200\n" && error.contents() == "warning: slow\n").await;

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_double_start_keeps_existing_stream() {
    // Given
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone());
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());
    orchestrator.handle_event(start("c1", "web", "")).await;

    // When
    orchestrator.handle_event(start("c1", "web", "")).await;

    // Then
    assert_eq!(orchestrator.active_count(), 1);
    assert_eq!(provider.calls().len(), 1, "no second set of sinks");
    assert!(journal.entries().is_empty(), "existing stream left running");

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_stop_for_untracked_container_is_ignored() {
    let journal = Journal::default();
    let mut orchestrator = Orchestrator::new(
        std::sync::Arc::new(ScriptedDocker::new(journal.clone())),
        MemoryProvider::new(journal.clone()),
    );

    orchestrator.handle_event(stop("ghost", "ghost")).await;

    assert_eq!(orchestrator.active_count(), 0);
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_stop_closes_worker_before_sinks() {
    // Given
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone());
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());
    orchestrator.handle_event(start("c1", "web", "")).await;

    // When
    orchestrator.handle_event(stop("c1", "web")).await;

    // Then
    assert!(!orchestrator.is_tracking("c1"));
    assert_eq!(
        journal.entries(),
        vec!["c1 stream dropped", "web.primary closed", "web.error closed"]
    );
}

#[tokio::test]
async fn test_shared_error_sink_is_closed_once() {
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone()).with_shared_error();
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());

    orchestrator.handle_event(start("c1", "web", "")).await;
    orchestrator.handle_event(stop("c1", "web")).await;

    let (primary, _) = provider.sinks_for("web");
    assert_eq!(primary.close_count(), 1);
}

#[tokio::test]
async fn test_container_without_sinks_is_not_tracked() {
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone()).refusing("db");
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());

    orchestrator.handle_event(start("c2", "db", "")).await;

    assert!(!orchestrator.is_tracking("c2"));
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn test_run_returns_ok_on_shutdown_and_closes_everything() {
    // Given: two running containers
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone());
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());
    let (tx, rx) = mpsc::channel(8);
    tx.send(start("c1", "web", "")).await.unwrap();
    tx.send(start("c2", "db", "")).await.unwrap();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(async move {
        let result = orchestrator
            .run(rx, async move {
                let _ = shutdown_rx.await;
            })
            .await;
        (result, orchestrator.active_count())
    });

    wait_for(|| provider.calls().len() == 2).await;

    // When
    shutdown_tx.send(()).unwrap();
    let (result, remaining) = tokio::time::timeout(Duration::from_secs(2), run)
        .await
        .unwrap()
        .unwrap();

    // Then
    assert!(result.is_ok());
    assert_eq!(remaining, 0);
    for name in ["web", "db"] {
        let (primary, error) = provider.sinks_for(name);
        assert_eq!(primary.close_count(), 1, "{name} primary");
        assert_eq!(error.close_count(), 1, "{name} error");
    }
    drop(tx);
}

#[tokio::test]
async fn test_run_fails_when_notifier_channel_closes() {
    // Given
    let journal = Journal::default();
    let provider = MemoryProvider::new(journal.clone());
    let mut orchestrator =
        Orchestrator::new(std::sync::Arc::new(ScriptedDocker::new(journal.clone())), provider.clone());
    let (tx, rx) = mpsc::channel(8);
    tx.send(start("c1", "web", "")).await.unwrap();

    // When: the notifier goes away
    drop(tx);
    let result = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.run(rx, std::future::pending::<()>()),
    )
    .await
    .unwrap();

    // Then
    let err = result.unwrap_err();
    assert!(err.to_string().contains("notifier stopped"));
    assert_eq!(orchestrator.active_count(), 0);
    let (primary, error) = provider.sinks_for("web");
    assert_eq!(primary.close_count(), 1);
    assert_eq!(error.close_count(), 1);
}
