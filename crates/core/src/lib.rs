//! docklog 공통 크레이트
//!
//! 컨테이너 로그 수집 데몬의 모든 크레이트가 공유하는 도메인 타입,
//! 싱크 trait, 에러 계층, 설정 구조체, 메트릭 이름을 정의합니다.

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod sink;
pub mod types;

// --- 주요 타입 re-export ---

// 에러
pub use error::{ConfigError, ContainerError, DocklogError, SinkError};

// 설정
pub use config::DocklogConfig;

// 이벤트
pub use event::ContainerEvent;

// 싱크 trait
pub use sink::{BoxFuture, DynLogSink, LogSink, SharedSink};

// 도메인 타입
pub use types::{ContainerInfo, StreamKind};
