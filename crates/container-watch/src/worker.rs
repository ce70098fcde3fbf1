//! 컨테이너별 로그 스트림 워커
//!
//! [`StreamWorker`]는 컨테이너의 stdout/stderr를 follow 모드로 pull하여
//! primary/error 싱크로 흘려보냅니다.
//!
//! # 재시도
//! 데몬의 빈 로그 경합("Error grabbing logs: EOF")은 [`is_empty_log_race`]로 판별하며,
//! tail을 비우고 재시도 지연 후 다시 pull합니다. 재시도 횟수 상한은 없으며
//! 취소 또는 다른 종료 사유로만 끝납니다.
//!
//! # 취소
//! [`WorkerHandle::close`]는 워커를 취소하고 pull 루프가 완전히 끝날 때까지 기다립니다.
//! 반환 이후에는 싱크를 안전하게 닫을 수 있습니다.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use docklog_core::metrics as m;
use docklog_core::sink::SharedSink;
use docklog_core::types::StreamKind;

use crate::docker::{DockerClient, LogRequest};
use crate::error::ContainerWatchError;

/// 빈 로그 스트림 경합을 나타내는 데몬 에러 메시지
const EMPTY_LOG_RACE_MARKER: &str = "Error grabbing logs: EOF";

/// 에러 메시지가 데몬의 빈 로그 스트림 경합인지 판별합니다.
pub fn is_empty_log_race(message: &str) -> bool {
    message.contains(EMPTY_LOG_RACE_MARKER)
}

/// 워커 설정
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 최초 pull 시 요청할 기존 줄 수
    pub initial_tail: usize,
    /// 경합 재시도 전 대기 시간
    pub retry_delay: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            initial_tail: 10,
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// 워커 종료 사유
#[derive(Debug)]
pub enum WorkerOutcome {
    /// 스트림 정상 종료 (컨테이너 종료/삭제)
    Ended,
    /// 취소됨
    Cancelled,
    /// 그 외 종료 에러
    Failed(ContainerWatchError),
}

impl WorkerOutcome {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
            Self::Failed(_) => "failed",
        }
    }
}

/// 로그 스트림 워커 팩토리
pub struct StreamWorker<D: DockerClient> {
    docker: Arc<D>,
    config: WorkerConfig,
}

impl<D: DockerClient> StreamWorker<D> {
    /// 기본 설정으로 생성합니다.
    pub fn new(docker: Arc<D>) -> Self {
        Self::with_config(docker, WorkerConfig::default())
    }

    /// 지정한 설정으로 생성합니다.
    pub fn with_config(docker: Arc<D>, config: WorkerConfig) -> Self {
        Self { docker, config }
    }

    /// 컨테이너 로그 pull을 시작합니다.
    ///
    /// stdout 프레임은 `primary`, stderr 프레임은 `error` 싱크로 기록됩니다.
    /// `parent`가 취소되면 워커도 함께 취소됩니다.
    pub fn activate(
        &self,
        container_id: &str,
        primary: SharedSink,
        error: SharedSink,
        parent: &CancellationToken,
    ) -> WorkerHandle {
        let cancel = parent.child_token();
        let task = tokio::spawn(pull_loop(
            Arc::clone(&self.docker),
            self.config.clone(),
            container_id.to_owned(),
            primary,
            error,
            cancel.clone(),
        ));
        info!(container_id, "log streamer started");
        WorkerHandle {
            container_id: container_id.to_owned(),
            cancel,
            task,
        }
    }
}

/// 실행 중인 워커 핸들
pub struct WorkerHandle {
    container_id: String,
    cancel: CancellationToken,
    task: JoinHandle<WorkerOutcome>,
}

impl WorkerHandle {
    /// 워커가 담당하는 컨테이너 ID
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// pull 루프가 이미 끝났는지 여부
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 워커를 취소하고 pull 루프가 끝날 때까지 기다립니다.
    pub async fn close(self) -> WorkerOutcome {
        self.cancel.cancel();
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(container_id = %self.container_id, error = %e, "log streamer task panicked");
                WorkerOutcome::Failed(ContainerWatchError::LogStream {
                    container_id: self.container_id,
                    reason: e.to_string(),
                })
            }
        }
    }
}

enum Attempt {
    Done(WorkerOutcome),
    Retry,
}

async fn pull_loop<D: DockerClient>(
    docker: Arc<D>,
    config: WorkerConfig,
    container_id: String,
    primary: SharedSink,
    error: SharedSink,
    cancel: CancellationToken,
) -> WorkerOutcome {
    let mut request = LogRequest {
        tail: Some(config.initial_tail),
        follow: true,
    };

    let outcome = loop {
        match pull_once(&*docker, &container_id, request, &primary, &error, &cancel).await {
            Attempt::Done(outcome) => break outcome,
            Attempt::Retry => {
                debug!(container_id = %container_id, "empty log stream race, retrying");
                metrics::counter!(m::WATCH_STREAM_RETRIES_TOTAL).increment(1);
                request.tail = None;
                tokio::select! {
                    _ = cancel.cancelled() => break WorkerOutcome::Cancelled,
                    _ = tokio::time::sleep(config.retry_delay) => {}
                }
            }
        }
    };

    match &outcome {
        WorkerOutcome::Ended => info!(container_id = %container_id, "log stream ended"),
        WorkerOutcome::Cancelled => info!(container_id = %container_id, "log streamer cancelled"),
        WorkerOutcome::Failed(e) => {
            warn!(container_id = %container_id, error = %e, "log stream terminated")
        }
    }
    metrics::counter!(m::WATCH_WORKERS_FINISHED_TOTAL, m::LABEL_OUTCOME => outcome.as_str())
        .increment(1);
    outcome
}

async fn pull_once<D: DockerClient>(
    docker: &D,
    container_id: &str,
    request: LogRequest,
    primary: &SharedSink,
    error: &SharedSink,
    cancel: &CancellationToken,
) -> Attempt {
    let mut stream = docker.logs(container_id, request);
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return Attempt::Done(WorkerOutcome::Cancelled),
            item = stream.next() => item,
        };

        match item {
            None => return Attempt::Done(WorkerOutcome::Ended),
            Some(Ok(chunk)) => {
                let sink = match chunk.stream {
                    StreamKind::Stdout => primary,
                    StreamKind::Stderr => error,
                };
                metrics::counter!(m::WATCH_STREAM_BYTES_TOTAL, m::LABEL_STREAM => chunk.stream.as_str())
                    .increment(chunk.message.len() as u64);
                if let Err(e) = sink.write(&chunk.message).await {
                    warn!(container_id, stream = %chunk.stream, error = %e, "log write failed");
                }
            }
            Some(Err(e)) => {
                let race = match &e {
                    ContainerWatchError::LogStream { reason, .. } => is_empty_log_race(reason),
                    other => is_empty_log_race(&other.to_string()),
                };
                if race {
                    return Attempt::Retry;
                }
                return Attempt::Done(WorkerOutcome::Failed(e));
            }
        }
    }
}
