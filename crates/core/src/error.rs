//! 에러 타입 -- 도메인별 에러 정의

/// docklog 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DocklogError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 컨테이너 런타임 에러
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// 로그 싱크 에러
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 컨테이너 런타임 에러
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Docker API 호출 실패
    #[error("docker api error: {0}")]
    DockerApi(String),

    /// 이벤트 구독 종료
    #[error("event subscription closed: {0}")]
    EventStream(String),

    /// 로그 스트림 실패
    #[error("log stream failed for container '{container_id}': {reason}")]
    LogStream {
        container_id: String,
        reason: String,
    },
}

/// 로그 싱크 에러
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// 이미 닫힌 싱크에 쓰기 시도
    #[error("sink '{0}' is closed")]
    Closed(String),

    /// 쓰기 실패
    #[error("write to '{sink}' failed: {reason}")]
    Write { sink: String, reason: String },

    /// 팬아웃 그룹의 모든 싱크가 실패
    #[error("all {failed} sinks failed")]
    AllFailed { failed: usize },

    /// 엔벨로프 직렬화 실패
    #[error("envelope encoding failed: {0}")]
    Envelope(String),

    /// 원격 수집기 연결 실패
    #[error("dial '{addr}' failed: {reason}")]
    Dial { addr: String, reason: String },

    /// 여러 싱크 close 에러 묶음
    #[error("{}", .0.join("; "))]
    Multiple(Vec<String>),
}
