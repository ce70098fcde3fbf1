//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `docklog_`
//! - 컴포넌트명: `watch_`, `sink_`, `daemon_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! metrics::counter!(docklog_core::metrics::SINK_ROTATIONS_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 종류 레이블 키 (start, stop)
pub const LABEL_KIND: &str = "kind";

/// 스트림 레이블 키 (stdout, stderr)
pub const LABEL_STREAM: &str = "stream";

/// 종료 사유 레이블 키 (ended, cancelled, failed)
pub const LABEL_OUTCOME: &str = "outcome";

// ─── Container Watch 메트릭 ─────────────────────────────────────────

/// Watch: 전달된 생명주기 이벤트 수 (counter, label: kind)
pub const WATCH_EVENTS_TOTAL: &str = "docklog_watch_events_total";

/// Watch: 로그 스트림으로 수신한 바이트 수 (counter, label: stream)
pub const WATCH_STREAM_BYTES_TOTAL: &str = "docklog_watch_stream_bytes_total";

/// Watch: 빈 로그 스트림 경합으로 인한 재시도 수 (counter)
pub const WATCH_STREAM_RETRIES_TOTAL: &str = "docklog_watch_stream_retries_total";

/// Watch: 종료된 워커 수 (counter, label: outcome)
pub const WATCH_WORKERS_FINISHED_TOTAL: &str = "docklog_watch_workers_finished_total";

// ─── Log Sink 메트릭 ────────────────────────────────────────────────

/// Sink: 모든 싱크가 실패한 팬아웃 쓰기 수 (counter)
pub const SINK_FANOUT_FAILURES_TOTAL: &str = "docklog_sink_fanout_failures_total";

/// Sink: 파일 회전 수 (counter)
pub const SINK_ROTATIONS_TOTAL: &str = "docklog_sink_rotations_total";

/// Sink: 흡수된 파일 I/O 에러 수 (counter)
pub const SINK_IO_ERRORS_TOTAL: &str = "docklog_sink_io_errors_total";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 현재 추적 중인 컨테이너 스트림 수 (gauge)
pub const DAEMON_ACTIVE_STREAMS: &str = "docklog_daemon_active_streams";

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "docklog_daemon_uptime_seconds";

/// Daemon: 빌드 정보 (gauge, 항상 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "docklog_daemon_build_info";

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    // Container Watch
    describe_counter!(
        WATCH_EVENTS_TOTAL,
        "Container lifecycle events delivered to the orchestrator"
    );
    describe_counter!(
        WATCH_STREAM_BYTES_TOTAL,
        "Bytes received from container log streams"
    );
    describe_counter!(
        WATCH_STREAM_RETRIES_TOTAL,
        "Log stream retries caused by the empty log stream race"
    );
    describe_counter!(
        WATCH_WORKERS_FINISHED_TOTAL,
        "Stream workers that finished, by outcome"
    );

    // Log Sink
    describe_counter!(
        SINK_FANOUT_FAILURES_TOTAL,
        "Fan-out writes where every sink failed"
    );
    describe_counter!(SINK_ROTATIONS_TOTAL, "Log file rotations performed");
    describe_counter!(
        SINK_IO_ERRORS_TOTAL,
        "File I/O errors absorbed by rotating writers"
    );

    // Daemon
    describe_gauge!(
        DAEMON_ACTIVE_STREAMS,
        "Containers currently being streamed"
    );
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1)");
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        WATCH_EVENTS_TOTAL,
        WATCH_STREAM_BYTES_TOTAL,
        WATCH_STREAM_RETRIES_TOTAL,
        WATCH_WORKERS_FINISHED_TOTAL,
        SINK_FANOUT_FAILURES_TOTAL,
        SINK_ROTATIONS_TOTAL,
        SINK_IO_ERRORS_TOTAL,
        DAEMON_ACTIVE_STREAMS,
        DAEMON_UPTIME_SECONDS,
        DAEMON_BUILD_INFO,
    ];

    #[test]
    fn all_metrics_start_with_docklog_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("docklog_"),
                "Metric '{}' does not start with 'docklog_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        let counters = &ALL_METRIC_NAMES[..7];
        for name in counters {
            assert!(name.ends_with("_total"), "Counter '{}' should end with _total", name);
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // describe_all() should not panic even without a recorder installed
        describe_all();
    }
}
