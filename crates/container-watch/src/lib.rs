//! # docklog-container-watch
//!
//! Docker 컨테이너 생명주기를 감시하고 컨테이너별 로그 스트림을 싱크로 흘려보냅니다.
//!
//! # 아키텍처
//!
//! ```text
//! Docker Events ──> EventNotifier ──(ContainerEvent, mpsc)──> Orchestrator
//!                                                                  │ activate
//!                                                                  v
//! Docker Logs ───────────────────────────────> StreamWorker ──> primary / error sink
//! ```
//!
//! # 주요 컴포넌트
//!
//! - [`EventNotifier`]: 실행 중 컨테이너 목록 + 실시간 이벤트를 start/stop 이벤트로 정규화
//! - [`StreamWorker`]: 컨테이너 로그 스트림 pull, 빈 로그 경합 재시도, 취소 처리
//! - [`NameFilter`]: include/exclude 이름 필터
//! - [`DockerClient`]: Docker API 추상화 (테스트 용이성)

pub mod docker;
pub mod error;
pub mod filter;
pub mod group;
pub mod notifier;
pub mod worker;

pub use docker::{BollardDockerClient, DockerClient, LogChunk, LogRequest, RuntimeEvent};
pub use error::ContainerWatchError;
pub use filter::NameFilter;
pub use group::extract_group;
pub use notifier::{EventNotifier, DOWN_STATUSES, UP_STATUSES};
pub use worker::{StreamWorker, WorkerConfig, WorkerHandle, WorkerOutcome, is_empty_log_race};
