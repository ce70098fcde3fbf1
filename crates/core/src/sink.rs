//! 로그 싱크 trait -- 바이트 단위 로그 목적지 추상화
//!
//! [`LogSink`]는 회전 파일, 원격 수집기, 팬아웃 그룹이 모두 구현하는
//! 확장 포인트입니다. RPITIT를 사용하므로 `dyn LogSink`는 불가하며,
//! 이종 싱크 목록은 [`DynLogSink`]를 통해 다룹니다.
//!
//! # 공유
//! 하나의 싱크가 stdout/stderr 팬아웃 양쪽에 동시에 들어갈 수 있으므로
//! 모든 메서드는 `&self`를 받습니다. 같은 싱크를 두 번 닫아도 안전해야 합니다.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::SinkError;

/// `Send` boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 여러 소유자가 공유하는 동적 싱크 핸들
pub type SharedSink = Arc<dyn DynLogSink>;

/// 로그 싱크 trait
///
/// `write`의 성공은 "수락됨"을 의미하며 디스크 영속화를 보장하지 않습니다.
pub trait LogSink: Send + Sync {
    /// 싱크 이름 (로그/에러 메시지용)
    fn name(&self) -> &str;

    /// 바이트를 기록하고 수락한 바이트 수를 반환합니다.
    fn write(&self, data: &[u8]) -> impl Future<Output = Result<usize, SinkError>> + Send;

    /// 싱크를 닫습니다. 이후 쓰기는 [`SinkError::Closed`]를 반환합니다.
    fn close(&self) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// dyn-compatible 싱크 trait
///
/// `LogSink`를 구현한 타입은 자동으로 `DynLogSink`도 구현됩니다.
pub trait DynLogSink: Send + Sync {
    /// 싱크 이름
    fn name(&self) -> &str;

    /// 바이트를 기록합니다.
    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<usize, SinkError>>;

    /// 싱크를 닫습니다.
    fn close(&self) -> BoxFuture<'_, Result<(), SinkError>>;
}

impl<T: LogSink> DynLogSink for T {
    fn name(&self) -> &str {
        LogSink::name(self)
    }

    fn write<'a>(&'a self, data: &'a [u8]) -> BoxFuture<'a, Result<usize, SinkError>> {
        Box::pin(LogSink::write(self, data))
    }

    fn close(&self) -> BoxFuture<'_, Result<(), SinkError>> {
        Box::pin(LogSink::close(self))
    }
}
