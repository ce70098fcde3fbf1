//! 팬아웃 벤치마크
//!
//! 원시 바이트 복제와 JSON 엔벨로프 인코딩 비용을 비교합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use docklog_core::error::SinkError;
use docklog_core::sink::{LogSink, SharedSink};
use docklog_log_sink::{EnvelopeContext, FanoutWriter};

/// 짧은 접근 로그 한 줄
const SHORT_LINE: &[u8] = b"172.17.0.1 - - [15/Jan/2024:12:00:00 +0000] \"GET / HTTP/1.1\" 200 612\n";

/// 긴 애플리케이션 로그 한 줄
const LONG_LINE: &[u8] = br#"2024-01-15T12:00:00.123456Z INFO api-gateway request completed request_id=550e8400-e29b-41d4-a716-446655440000 method=POST path=/api/v1/users/create status=201 duration_ms=245 user_agent="Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36" region=us-east-1
"#;

/// 쓰기를 버리는 싱크
struct NullSink;

impl LogSink for NullSink {
    fn name(&self) -> &str {
        "null"
    }

    async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        Ok(black_box(data).len())
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

fn sinks(n: usize) -> Vec<SharedSink> {
    (0..n).map(|_| Arc::new(NullSink) as SharedSink).collect()
}

fn bench_fanout(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("fanout");
    group.throughput(Throughput::Elements(1));

    for n in [1usize, 3] {
        let raw = FanoutWriter::new("bench", sinks(n));
        group.bench_with_input(BenchmarkId::new("raw_short", n), &n, |b, _| {
            b.iter(|| rt.block_on(raw.write(black_box(SHORT_LINE))).unwrap())
        });

        let enveloped = FanoutWriter::new("bench", sinks(n))
            .with_envelope(EnvelopeContext::with_host("web", "acme", "bench-host"));
        group.bench_with_input(BenchmarkId::new("envelope_short", n), &n, |b, _| {
            b.iter(|| rt.block_on(enveloped.write(black_box(SHORT_LINE))).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("envelope_long", n), &n, |b, _| {
            b.iter(|| rt.block_on(enveloped.write(black_box(LONG_LINE))).unwrap())
        });
    }

    group.finish();
}

fn bench_envelope_encode(c: &mut Criterion) {
    let ctx = EnvelopeContext::with_host("web", "acme", "bench-host");

    let mut group = c.benchmark_group("envelope_encode");
    group.throughput(Throughput::Bytes(LONG_LINE.len() as u64));
    group.bench_function("long", |b| b.iter(|| ctx.encode(black_box(LONG_LINE)).unwrap()));
    group.finish();
}

criterion_group!(benches, bench_fanout, bench_envelope_encode);
criterion_main!(benches);
