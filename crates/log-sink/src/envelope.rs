//! JSON 엔벨로프 -- 원시 로그 바이트를 컨테이너 메타데이터와 함께 감싸는 레코드
//!
//! 출력은 한 줄짜리 JSON 객체 + `\n` 입니다:
//!
//! ```json
//! {"msg":"...","container":"web","group":"acme","ts":"2024-05-01T12:00:00.123+09:00","host":"node-1"}
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use docklog_core::error::SinkError;

/// 호스트 이름을 알 수 없을 때 사용하는 값
pub const UNKNOWN_HOST: &str = "unknown";

/// 엔벨로프 레코드
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// 원본 바이트 (손실 허용 UTF-8 변환, 줄바꿈 포함 그대로)
    pub msg: String,
    /// 컨테이너 이름
    pub container: String,
    /// 컨테이너 그룹 (없으면 빈 문자열)
    pub group: String,
    /// 기록 시각 (로컬 시간대)
    pub ts: DateTime<Local>,
    /// 데몬이 실행 중인 호스트
    pub host: String,
}

/// 팬아웃 하나에 고정된 엔벨로프 메타데이터
#[derive(Debug, Clone)]
pub struct EnvelopeContext {
    container: String,
    group: String,
    host: String,
}

impl EnvelopeContext {
    /// 현재 호스트 이름으로 컨텍스트를 생성합니다.
    pub fn new(container: impl Into<String>, group: impl Into<String>) -> Self {
        Self::with_host(container, group, local_hostname())
    }

    /// 호스트 이름을 직접 지정합니다.
    pub fn with_host(
        container: impl Into<String>,
        group: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            group: group.into(),
            host: host.into(),
        }
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// 현재 시각으로 레코드를 만듭니다.
    pub fn envelope(&self, data: &[u8]) -> Envelope {
        Envelope {
            msg: String::from_utf8_lossy(data).into_owned(),
            container: self.container.clone(),
            group: self.group.clone(),
            ts: Local::now(),
            host: self.host.clone(),
        }
    }

    /// 레코드를 JSON 한 줄로 직렬화합니다.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, SinkError> {
        let mut out = serde_json::to_vec(&self.envelope(data))
            .map_err(|e| SinkError::Envelope(e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}

/// 시스템 호스트 이름, 실패 시 [`UNKNOWN_HOST`]
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_owned())
}
