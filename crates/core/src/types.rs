//! 도메인 타입 -- 크레이트 간 공유되는 공통 타입

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// 실행 중인 컨테이너 정보
///
/// 런타임 목록 조회 결과를 표현합니다. 이름에서 선행 `/`는 제거된 상태입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// 컨테이너 ID
    pub id: String,
    /// 컨테이너 이름
    pub name: String,
    /// 이미지 참조 (예: `registry:5000/team/app:1.0`)
    pub image: String,
    /// 생성 시각
    pub created_at: SystemTime,
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}) image={}", self.name, self.id, self.image)
    }
}

/// 컨테이너 출력 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// 표준 출력
    Stdout,
    /// 표준 에러
    Stderr,
}

impl StreamKind {
    /// 메트릭 레이블 값
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
