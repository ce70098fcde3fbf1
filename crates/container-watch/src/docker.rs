//! Docker API abstraction for container discovery and log streaming.
//!
//! The [`DockerClient`] trait abstracts the bollard Docker API, allowing
//! production code to use [`BollardDockerClient`] while tests use `MockDockerClient`.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐   ┌──────────────┐
//! │ EventNotifier │   │ StreamWorker │
//! └───────┬───────┘   └──────┬───────┘
//!         └────────┬─────────┘
//!                  ▼
//!           ┌─────────────┐
//!           │DockerClient │ (trait)
//!           └─────────────┘
//!              │       │
//!              ▼       ▼
//!        ┌───────┐ ┌──────┐
//!        │Bollard│ │ Mock │
//!        └───┬───┘ └──────┘
//!            ▼
//!      Docker Daemon
//! ```
//!
//! Streaming calls (`events`, `logs`) return `'static` boxed streams so callers can
//! drive them from their own tasks and drop them to cancel the underlying request.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use docklog_core::types::{ContainerInfo, StreamKind};

use crate::error::ContainerWatchError;

/// Connection timeout passed to bollard, in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 120;

/// A raw lifecycle event from the runtime, before status mapping and filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    /// Event type (`container`, `network`, `image`, ...).
    pub kind: String,
    /// Status/action string (`start`, `die`, `exec_create: sh`, ...).
    pub status: String,
    /// Actor id (the container id for container events).
    pub actor_id: String,
    /// Raw `name` attribute of the actor, possibly with a leading `/`.
    pub name: String,
    /// Image reference the container was created from.
    pub image: String,
    /// When the runtime recorded the event.
    pub time: SystemTime,
}

/// Parameters of a log pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRequest {
    /// Number of pre-existing lines to replay; `None` means no tail limit.
    pub tail: Option<usize>,
    /// Keep the stream open and follow new output.
    pub follow: bool,
}

impl LogRequest {
    /// Value for the Docker `tail` query parameter.
    pub fn tail_param(&self) -> String {
        self.tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_owned())
    }
}

/// One demultiplexed frame of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogChunk {
    /// Which stream the frame came from.
    pub stream: StreamKind,
    /// Raw frame bytes.
    pub message: Bytes,
}

impl LogChunk {
    /// Builds a stdout chunk.
    pub fn stdout(message: impl Into<Bytes>) -> Self {
        Self {
            stream: StreamKind::Stdout,
            message: message.into(),
        }
    }

    /// Builds a stderr chunk.
    pub fn stderr(message: impl Into<Bytes>) -> Self {
        Self {
            stream: StreamKind::Stderr,
            message: message.into(),
        }
    }
}

/// Trait abstracting Docker API operations.
///
/// All Docker API calls go through this trait, enabling testability via mocking.
/// The trait is `Send + Sync + 'static`, allowing safe sharing across async contexts.
///
/// # Implementations
///
/// - [`BollardDockerClient`]: Production implementation using the `bollard` library
/// - `MockDockerClient`: Test implementation with scripted responses (available in tests only)
pub trait DockerClient: Send + Sync + 'static {
    /// Lists running containers.
    ///
    /// Exited containers are not returned. Names have their leading `/` trimmed.
    ///
    /// # Errors
    ///
    /// Returns `ContainerWatchError::DockerApi` if the Docker API call fails.
    fn list_containers(
        &self,
    ) -> impl Future<Output = Result<Vec<ContainerInfo>, ContainerWatchError>> + Send;

    /// Checks Docker daemon connectivity.
    ///
    /// # Errors
    ///
    /// Returns `ContainerWatchError::DockerConnection` if the daemon is unreachable.
    fn ping(&self) -> impl Future<Output = Result<(), ContainerWatchError>> + Send;

    /// Subscribes to the runtime's live event feed.
    ///
    /// The stream ends or yields an error when the subscription dies.
    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent, ContainerWatchError>>;

    /// Pulls the combined stdout/stderr output of a container.
    ///
    /// With `follow` set the stream stays open until the container stops or the
    /// stream is dropped. No inactivity timeout is applied.
    fn logs(
        &self,
        container_id: &str,
        request: LogRequest,
    ) -> BoxStream<'static, Result<LogChunk, ContainerWatchError>>;
}

/// Production Docker client implementation using `bollard`.
///
/// Internally uses `Arc<bollard::Docker>` for safe sharing across async tasks.
pub struct BollardDockerClient {
    docker: Arc<bollard::Docker>,
}

impl BollardDockerClient {
    /// Connects using a Docker host URL.
    ///
    /// - empty: platform defaults (`DOCKER_HOST` or the local socket)
    /// - `unix:///path`: Unix socket
    /// - `tcp://host:port` or `http://host:port`: plain HTTP
    ///
    /// # Errors
    ///
    /// Returns `ContainerWatchError::DockerConnection` if the client cannot be built.
    pub fn connect(host: &str) -> Result<Self, ContainerWatchError> {
        if host.is_empty() {
            Self::connect_local()
        } else if host.starts_with("unix://") {
            Self::connect_with_socket(host)
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            let addr = host.replacen("tcp://", "http://", 1);
            let docker = bollard::Docker::connect_with_http(
                &addr,
                CONNECT_TIMEOUT_SECS,
                bollard::API_DEFAULT_VERSION,
            )
            .map_err(|e| {
                ContainerWatchError::DockerConnection(format!(
                    "failed to connect to docker at {host}: {e}"
                ))
            })?;
            Ok(Self {
                docker: Arc::new(docker),
            })
        } else {
            Err(ContainerWatchError::DockerConnection(format!(
                "unsupported docker host '{host}': expected unix://, tcp:// or http://"
            )))
        }
    }

    /// Connects to Docker using the default local socket.
    ///
    /// # Errors
    ///
    /// Returns `ContainerWatchError::DockerConnection` if the connection fails.
    pub fn connect_local() -> Result<Self, ContainerWatchError> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            ContainerWatchError::DockerConnection(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// Connects to Docker using a specific socket path.
    ///
    /// # Errors
    ///
    /// Returns `ContainerWatchError::DockerConnection` if the connection fails.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, ContainerWatchError> {
        let docker = bollard::Docker::connect_with_socket(
            socket_path,
            CONNECT_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )
        .map_err(|e| {
            ContainerWatchError::DockerConnection(format!(
                "failed to connect to docker at {socket_path}: {e}"
            ))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

impl DockerClient for BollardDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, ContainerWatchError> {
        use bollard::container::ListContainersOptions;

        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| ContainerWatchError::DockerApi(format!("list containers failed: {e}")))?;

        let mut result = Vec::with_capacity(containers.len());
        for container in containers {
            let id = container.id.unwrap_or_default();
            let name = container
                .names
                .unwrap_or_default()
                .first()
                .map(|n| n.trim_start_matches('/').to_owned())
                .unwrap_or_default();
            let image = container.image.unwrap_or_default();
            let created = container.created.unwrap_or_default();
            let created_at = SystemTime::UNIX_EPOCH
                + Duration::from_secs(u64::try_from(created).unwrap_or(0));

            result.push(ContainerInfo {
                id,
                name,
                image,
                created_at,
            });
        }

        Ok(result)
    }

    async fn ping(&self) -> Result<(), ContainerWatchError> {
        self.docker
            .ping()
            .await
            .map_err(|e| ContainerWatchError::DockerConnection(format!("ping failed: {e}")))?;
        Ok(())
    }

    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent, ContainerWatchError>> {
        use std::collections::HashMap;

        use bollard::system::EventsOptions;

        let mut filters = HashMap::new();
        filters.insert("type".to_owned(), vec!["container".to_owned()]);
        let options = EventsOptions::<String> {
            filters,
            ..Default::default()
        };

        self.docker
            .events(Some(options))
            .map(|item| {
                item.map(runtime_event_from)
                    .map_err(|e| ContainerWatchError::EventStream(e.to_string()))
            })
            .boxed()
    }

    fn logs(
        &self,
        container_id: &str,
        request: LogRequest,
    ) -> BoxStream<'static, Result<LogChunk, ContainerWatchError>> {
        use bollard::container::{LogOutput, LogsOptions};

        let options = LogsOptions::<String> {
            follow: request.follow,
            stdout: true,
            stderr: true,
            tail: request.tail_param(),
            ..Default::default()
        };

        let id = container_id.to_owned();
        self.docker
            .logs(container_id, Some(options))
            .filter_map(move |item| {
                let mapped = match item {
                    Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                        Some(Ok(LogChunk::stdout(message)))
                    }
                    Ok(LogOutput::StdErr { message }) => Some(Ok(LogChunk::stderr(message))),
                    Ok(LogOutput::StdIn { .. }) => None,
                    Err(e) => Some(Err(ContainerWatchError::LogStream {
                        container_id: id.clone(),
                        reason: e.to_string(),
                    })),
                };
                std::future::ready(mapped)
            })
            .boxed()
    }
}

fn runtime_event_from(msg: bollard::models::EventMessage) -> RuntimeEvent {
    use bollard::models::EventMessageTypeEnum;

    let kind = match msg.typ {
        Some(EventMessageTypeEnum::CONTAINER) => "container".to_owned(),
        Some(other) => format!("{other:?}").to_lowercase(),
        None => String::new(),
    };
    let (actor_id, attributes) = msg
        .actor
        .map(|a| (a.id.unwrap_or_default(), a.attributes.unwrap_or_default()))
        .unwrap_or_default();
    let time = match (msg.time_nano, msg.time) {
        (Some(nanos), _) if nanos > 0 => {
            SystemTime::UNIX_EPOCH + Duration::from_nanos(u64::try_from(nanos).unwrap_or(0))
        }
        (_, Some(secs)) => {
            SystemTime::UNIX_EPOCH + Duration::from_secs(u64::try_from(secs).unwrap_or(0))
        }
        _ => SystemTime::now(),
    };

    RuntimeEvent {
        kind,
        status: msg.action.unwrap_or_default(),
        actor_id,
        name: attributes.get("name").cloned().unwrap_or_default(),
        image: attributes.get("image").cloned().unwrap_or_default(),
        time,
    }
}

/// 테스트용 Mock Docker 클라이언트
///
/// 스크립트된 이벤트/로그 응답을 반환하여 Docker 없이도 테스트할 수 있습니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockDockerClient {
    /// list_containers 호출 시 반환할 컨테이너 목록
    pub containers: Vec<ContainerInfo>,
    /// list_containers 호출 시 실패를 시뮬레이션할지 여부
    pub fail_list: bool,
    /// events 스트림 항목 (소진 후 `events_then_pending`이면 대기)
    pub events: std::sync::Mutex<Vec<Result<RuntimeEvent, ContainerWatchError>>>,
    /// events 항목 소진 후 스트림을 열어둘지 여부
    pub events_then_pending: bool,
    /// logs 호출마다 하나씩 꺼내 쓰는 스크립트
    pub log_scripts: std::sync::Mutex<std::collections::VecDeque<MockLogScript>>,
    /// logs 호출 기록
    pub log_requests: std::sync::Mutex<Vec<LogRequest>>,
}

/// logs 호출 한 번에 대한 응답 스크립트
#[cfg(test)]
pub struct MockLogScript {
    /// 순서대로 방출할 항목
    pub items: Vec<Result<LogChunk, ContainerWatchError>>,
    /// 항목 소진 후 스트림을 열어둘지 여부
    pub then_pending: bool,
}

#[cfg(test)]
impl MockDockerClient {
    /// 빈 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트용 컨테이너를 추가합니다.
    pub fn with_containers(mut self, containers: Vec<ContainerInfo>) -> Self {
        self.containers = containers;
        self
    }

    /// list_containers 호출이 실패하도록 설정합니다.
    pub fn with_failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// 이벤트 스트림 내용을 설정합니다.
    pub fn with_events(
        mut self,
        events: Vec<Result<RuntimeEvent, ContainerWatchError>>,
        then_pending: bool,
    ) -> Self {
        self.events = std::sync::Mutex::new(events);
        self.events_then_pending = then_pending;
        self
    }

    /// logs 호출 스크립트를 추가합니다.
    pub fn with_log_script(
        self,
        items: Vec<Result<LogChunk, ContainerWatchError>>,
        then_pending: bool,
    ) -> Self {
        self.log_scripts
            .lock()
            .unwrap()
            .push_back(MockLogScript {
                items,
                then_pending,
            });
        self
    }

    /// 지금까지 기록된 logs 요청
    pub fn requests(&self) -> Vec<LogRequest> {
        self.log_requests.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl DockerClient for MockDockerClient {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, ContainerWatchError> {
        if self.fail_list {
            return Err(ContainerWatchError::DockerApi("mock list failure".to_owned()));
        }
        Ok(self.containers.clone())
    }

    async fn ping(&self) -> Result<(), ContainerWatchError> {
        Ok(())
    }

    fn events(&self) -> BoxStream<'static, Result<RuntimeEvent, ContainerWatchError>> {
        let items = std::mem::take(&mut *self.events.lock().unwrap());
        let head = futures_util::stream::iter(items);
        if self.events_then_pending {
            head.chain(futures_util::stream::pending()).boxed()
        } else {
            head.boxed()
        }
    }

    fn logs(
        &self,
        _container_id: &str,
        request: LogRequest,
    ) -> BoxStream<'static, Result<LogChunk, ContainerWatchError>> {
        self.log_requests.lock().unwrap().push(request);
        let script = self.log_scripts.lock().unwrap().pop_front();
        match script {
            Some(MockLogScript {
                items,
                then_pending: true,
            }) => futures_util::stream::iter(items)
                .chain(futures_util::stream::pending())
                .boxed(),
            Some(MockLogScript { items, .. }) => futures_util::stream::iter(items).boxed(),
            None => futures_util::stream::empty().boxed(),
        }
    }
}
