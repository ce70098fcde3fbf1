//! 컨테이너 감시 에러 타입
//!
//! [`ContainerWatchError`]는 컨테이너 감시 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<ContainerWatchError> for DocklogError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use docklog_core::error::{ContainerError, DocklogError};

/// 컨테이너 감시 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum ContainerWatchError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// Docker 연결 실패
    #[error("docker connection error: {0}")]
    DockerConnection(String),

    /// 이벤트 스트림 에러
    #[error("event stream error: {0}")]
    EventStream(String),

    /// 로그 스트림 에러
    #[error("log stream error for container '{container_id}': {reason}")]
    LogStream {
        /// 대상 컨테이너 ID
        container_id: String,
        /// 실패 사유 (데몬 에러 메시지)
        reason: String,
    },
}

impl From<ContainerWatchError> for DocklogError {
    fn from(err: ContainerWatchError) -> Self {
        match err {
            ContainerWatchError::DockerApi(msg) | ContainerWatchError::DockerConnection(msg) => {
                DocklogError::Container(ContainerError::DockerApi(msg))
            }
            ContainerWatchError::EventStream(msg) => {
                DocklogError::Container(ContainerError::EventStream(msg))
            }
            ContainerWatchError::LogStream {
                container_id,
                reason,
            } => DocklogError::Container(ContainerError::LogStream {
                container_id,
                reason,
            }),
        }
    }
}
