//! 컨테이너 생명주기 이벤트
//!
//! [`ContainerEvent`]는 이벤트 알리미가 생성하고 오케스트레이터가 한 번 소비합니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 정규화된 컨테이너 시작/정지 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEvent {
    /// 컨테이너 ID
    pub container_id: String,
    /// 컨테이너 이름
    pub container_name: String,
    /// 이미지 참조에서 추출한 그룹 (없으면 빈 문자열)
    pub group: String,
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// `true`면 시작, `false`면 정지
    pub started: bool,
}

impl ContainerEvent {
    /// 시작 이벤트를 생성합니다.
    pub fn start(
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        group: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            container_id: container_id.into(),
            container_name: container_name.into(),
            group: group.into(),
            timestamp,
            started: true,
        }
    }

    /// 정지 이벤트를 생성합니다.
    pub fn stop(
        container_id: impl Into<String>,
        container_name: impl Into<String>,
        group: impl Into<String>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            started: false,
            ..Self::start(container_id, container_name, group, timestamp)
        }
    }

    /// 이벤트 종류 문자열 (`start` / `stop`)
    pub fn kind(&self) -> &'static str {
        if self.started { "start" } else { "stop" }
    }
}

impl fmt::Display for ContainerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({}) group={:?}",
            self.kind(),
            self.container_name,
            self.container_id,
            self.group
        )
    }
}
