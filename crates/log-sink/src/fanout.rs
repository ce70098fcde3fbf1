//! 팬아웃 싱크 -- 하나의 쓰기를 여러 싱크로 복제합니다.
//!
//! 일부 싱크가 실패해도 하나라도 성공하면 쓰기는 성공입니다.
//! 모든 싱크가 실패하거나 싱크가 하나도 없으면 [`SinkError::AllFailed`]를 반환합니다.
//! 엔벨로프가 설정되면 원본 바이트 대신 JSON 레코드를 모든 싱크에 씁니다.

use tracing::{debug, warn};

use docklog_core::error::SinkError;
use docklog_core::metrics as m;
use docklog_core::sink::{LogSink, SharedSink};

use crate::envelope::EnvelopeContext;

/// 여러 싱크에 대한 복제 쓰기
pub struct FanoutWriter {
    name: String,
    sinks: Vec<SharedSink>,
    envelope: Option<EnvelopeContext>,
}

impl FanoutWriter {
    pub fn new(name: impl Into<String>, sinks: Vec<SharedSink>) -> Self {
        Self {
            name: name.into(),
            sinks,
            envelope: None,
        }
    }

    /// 모든 쓰기를 JSON 엔벨로프로 감쌉니다.
    pub fn with_envelope(mut self, context: EnvelopeContext) -> Self {
        self.envelope = Some(context);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// 모든 싱크에 씁니다.
    ///
    /// 성공 시 (엔벨로프 여부와 무관하게) 입력 길이를 반환합니다.
    pub async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        let encoded;
        let payload = match &self.envelope {
            Some(ctx) => {
                encoded = ctx.encode(data)?;
                encoded.as_slice()
            }
            None => data,
        };

        let mut failed = 0;
        for sink in &self.sinks {
            if let Err(e) = sink.write(payload).await {
                failed += 1;
                debug!(fanout = %self.name, sink = sink.name(), error = %e, "sink write failed");
            }
        }

        if failed == self.sinks.len() {
            warn!(fanout = %self.name, failed, "all sinks failed");
            metrics::counter!(m::SINK_FANOUT_FAILURES_TOTAL).increment(1);
            return Err(SinkError::AllFailed { failed });
        }

        Ok(data.len())
    }

    /// 모든 싱크를 닫고 실패를 모아 반환합니다.
    pub async fn close(&self) -> Result<(), SinkError> {
        let mut errors = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.close().await {
                errors.push(format!("{}: {e}", sink.name()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SinkError::Multiple(errors))
        }
    }
}

impl LogSink for FanoutWriter {
    fn name(&self) -> &str {
        FanoutWriter::name(self)
    }

    async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        FanoutWriter::write(self, data).await
    }

    async fn close(&self) -> Result<(), SinkError> {
        FanoutWriter::close(self).await
    }
}
