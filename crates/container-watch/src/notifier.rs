//! 컨테이너 생명주기 이벤트 알리미
//!
//! [`EventNotifier`]는 현재 실행 중인 컨테이너를 시작 이벤트로 방출한 뒤,
//! Docker 실시간 이벤트를 구독하여 start/stop 이벤트로 정규화합니다.
//!
//! # 흐름
//! ```text
//! subscribe() ── list_containers() 실패 ──> Err (백그라운드 작업 없음)
//!      │
//!      └─ spawn ─> 실행 중 컨테이너 start 이벤트
//!                     └─> events() 구독 ─> 상태 매핑 + 필터 ─> mpsc (bounded)
//! ```
//!
//! # 종료 신호
//! 이벤트 구독이 에러로 끝나거나 닫히면 태스크는 에러 로그를 남기고 종료하며,
//! 송신자가 drop되어 수신 채널이 닫힙니다. 닫힌 채널이 곧 "알리미 종료" 신호이며
//! 재연결은 시도하지 않습니다.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use docklog_core::event::ContainerEvent;
use docklog_core::metrics as m;

use crate::docker::{DockerClient, RuntimeEvent};
use crate::error::ContainerWatchError;
use crate::filter::NameFilter;
use crate::group::extract_group;

/// 기본 이벤트 채널 용량
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// 시작으로 매핑되는 상태
pub const UP_STATUSES: [&str; 2] = ["start", "restart"];

/// 정지로 매핑되는 상태
pub const DOWN_STATUSES: [&str; 4] = ["die", "destroy", "stop", "pause"];

/// 컨테이너 생명주기 이벤트 알리미
pub struct EventNotifier<D: DockerClient> {
    docker: Arc<D>,
    filter: NameFilter,
    capacity: usize,
}

impl<D: DockerClient> EventNotifier<D> {
    /// 새 알리미를 생성합니다.
    pub fn new(docker: Arc<D>, filter: NameFilter) -> Self {
        Self {
            docker,
            filter,
            capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// 이벤트 채널 용량을 설정합니다 (최소 1).
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// 구독을 시작하고 이벤트 수신 채널을 반환합니다.
    ///
    /// 실행 중인 컨테이너 목록 조회는 호출 시점에 수행되며,
    /// 실패하면 백그라운드 작업 없이 에러를 반환합니다.
    /// 채널이 가득 차면 생산자는 대기합니다 (이벤트를 버리지 않음).
    pub async fn subscribe(self) -> Result<mpsc::Receiver<ContainerEvent>, ContainerWatchError> {
        let containers = self.docker.list_containers().await?;
        debug!(total = containers.len(), "listed running containers");

        let (tx, rx) = mpsc::channel(self.capacity);
        let running = containers
            .into_iter()
            .filter_map(|c| {
                if !self.filter.allows(&c.name) {
                    info!(container = %c.name, "container excluded");
                    return None;
                }
                let group = extract_group(&c.image);
                Some(ContainerEvent::start(c.id, c.name, group, c.created_at))
            })
            .collect::<Vec<_>>();

        tokio::spawn(run_notifier(self.docker, self.filter, running, tx));
        Ok(rx)
    }
}

/// 런타임 이벤트를 정규화합니다.
///
/// 컨테이너 이벤트가 아니거나, 관심 없는 상태이거나, 필터에 걸리면 `None`을 반환합니다.
pub fn normalize(raw: &RuntimeEvent, filter: &NameFilter) -> Option<ContainerEvent> {
    if raw.kind != "container" {
        return None;
    }
    let status = raw.status.as_str();
    let started = UP_STATUSES.contains(&status);
    if !started && !DOWN_STATUSES.contains(&status) {
        return None;
    }

    let name = raw.name.trim_start_matches('/');
    if !filter.allows(name) {
        info!(container = name, "container excluded");
        return None;
    }

    Some(ContainerEvent {
        container_id: raw.actor_id.clone(),
        container_name: name.to_owned(),
        group: extract_group(&raw.image),
        timestamp: raw.time,
        started,
    })
}

async fn run_notifier<D: DockerClient>(
    docker: Arc<D>,
    filter: NameFilter,
    running: Vec<ContainerEvent>,
    tx: mpsc::Sender<ContainerEvent>,
) {
    for event in running {
        debug!(%event, "running container added");
        if !deliver(&tx, event).await {
            return;
        }
    }
    debug!("completed initial emit");

    let mut events = docker.events();
    loop {
        let item = tokio::select! {
            _ = tx.closed() => {
                debug!("event receiver dropped, notifier stopping");
                return;
            }
            item = events.next() => item,
        };

        match item {
            Some(Ok(raw)) => {
                if let Some(event) = normalize(&raw, &filter) {
                    info!(%event, "new event");
                    if !deliver(&tx, event).await {
                        return;
                    }
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "event subscription failed");
                return;
            }
            None => {
                error!("event subscription closed unexpectedly");
                return;
            }
        }
    }
}

/// 이벤트를 전달합니다. 수신자가 사라졌으면 `false`를 반환합니다.
async fn deliver(tx: &mpsc::Sender<ContainerEvent>, event: ContainerEvent) -> bool {
    let kind = event.kind();
    if tx.send(event).await.is_err() {
        debug!("event receiver dropped, notifier stopping");
        return false;
    }
    metrics::counter!(m::WATCH_EVENTS_TOTAL, m::LABEL_KIND => kind).increment(1);
    true
}
