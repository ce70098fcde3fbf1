//! 원격 syslog 싱크 (UDP)
//!
//! 쓰기 하나가 데이터그램 하나가 됩니다. 프레임 형식 (BSD 스타일):
//!
//! ```text
//! <PRI>May  1 12:00:00 node-1 docker/web[4242]: message
//! ```
//!
//! PRI = facility * 8 + severity. 기본값은 daemon(3) / warning(4) → `<28>`.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use tokio::net::UdpSocket;
use tracing::debug;

use docklog_core::config::{self as core_config, facility_code, severity_code};
use docklog_core::error::SinkError;
use docklog_core::sink::LogSink;

use crate::envelope::local_hostname;

/// daemon facility
const DEFAULT_FACILITY: u8 = 3;
/// warning severity
const DEFAULT_SEVERITY: u8 = 4;

/// syslog 싱크 설정 (컨테이너별)
#[derive(Debug, Clone)]
pub struct SyslogConfig {
    /// 수집기 주소 (예: "127.0.0.1:514")
    pub addr: String,
    /// 메시지 태그 (예: "docker/web")
    pub tag: String,
    pub facility: u8,
    pub severity: u8,
}

impl SyslogConfig {
    /// 코어 설정과 컨테이너 이름으로 생성합니다. 태그 = 접두어 + 이름.
    ///
    /// 알 수 없는 facility/severity 이름은 기본값으로 대체됩니다
    /// (설정 검증 단계에서 이미 걸러집니다).
    pub fn from_core(core: &core_config::SyslogConfig, container_name: &str) -> Self {
        Self {
            addr: core.host.clone(),
            tag: format!("{}{}", core.prefix, container_name),
            facility: facility_code(&core.facility).unwrap_or(DEFAULT_FACILITY),
            severity: severity_code(&core.severity).unwrap_or(DEFAULT_SEVERITY),
        }
    }

    /// PRI 값
    pub fn priority(&self) -> u16 {
        u16::from(self.facility) * 8 + u16::from(self.severity)
    }
}

/// UDP syslog 싱크
pub struct SyslogWriter {
    name: String,
    config: SyslogConfig,
    host: String,
    pid: u32,
    socket: UdpSocket,
    closed: AtomicBool,
}

impl SyslogWriter {
    /// IPv4 UDP 소켓을 만들고 수집기 주소에 연결합니다.
    pub async fn dial(config: SyslogConfig) -> Result<Self, SinkError> {
        let dial_err = |e: std::io::Error| SinkError::Dial {
            addr: config.addr.clone(),
            reason: e.to_string(),
        };

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(dial_err)?;
        socket
            .connect(config.addr.as_str())
            .await
            .map_err(dial_err)?;

        debug!(addr = %config.addr, tag = %config.tag, "syslog writer connected");
        Ok(Self {
            name: format!("syslog://{}", config.addr),
            host: local_hostname(),
            pid: std::process::id(),
            config,
            socket,
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.config.tag
    }

    /// 데이터그램 페이로드를 만듭니다. 메시지 끝의 줄바꿈은 하나로 정규화됩니다.
    pub fn frame(&self, data: &[u8]) -> Vec<u8> {
        let header = format!(
            "<{}>{} {} {}[{}]: ",
            self.config.priority(),
            Local::now().format("%b %e %H:%M:%S"),
            self.host,
            self.config.tag,
            self.pid,
        );

        let mut body = data;
        while let [rest @ .., b'\n'] = body {
            body = rest;
        }

        let mut out = Vec::with_capacity(header.len() + body.len() + 1);
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(body);
        out.push(b'\n');
        out
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed(self.name.clone()));
        }

        self.socket
            .send(&self.frame(data))
            .await
            .map_err(|e| SinkError::Write {
                sink: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(data.len())
    }

    /// 이후 쓰기를 거부합니다. 소켓은 drop 시 해제됩니다.
    pub async fn close(&self) -> Result<(), SinkError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(addr = %self.config.addr, tag = %self.config.tag, "syslog writer closed");
        }
        Ok(())
    }
}

impl LogSink for SyslogWriter {
    fn name(&self) -> &str {
        SyslogWriter::name(self)
    }

    async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        SyslogWriter::write(self, data).await
    }

    async fn close(&self) -> Result<(), SinkError> {
        SyslogWriter::close(self).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn collector() -> (UdpSocket, String) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap().to_string();
        (socket, addr)
    }

    async fn recv(socket: &UdpSocket) -> String {
        let mut buf = vec![0u8; 65535];
        let n = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf))
            .await
            .expect("datagram timeout")
            .unwrap();
        String::from_utf8(buf[..n].to_vec()).unwrap()
    }

    fn config(addr: &str) -> SyslogConfig {
        SyslogConfig {
            addr: addr.to_owned(),
            tag: "docker/web".to_owned(),
            facility: 3,
            severity: 4,
        }
    }

    #[test]
    fn from_core_builds_tag_and_codes() {
        let core = core_config::SyslogConfig {
            host: "10.0.0.1:514".to_owned(),
            prefix: "ctr/".to_owned(),
            facility: "local0".to_owned(),
            severity: "err".to_owned(),
            ..Default::default()
        };
        let config = SyslogConfig::from_core(&core, "api");

        assert_eq!(config.addr, "10.0.0.1:514");
        assert_eq!(config.tag, "ctr/api");
        assert_eq!(config.priority(), 16 * 8 + 3);
    }

    #[test]
    fn default_priority_is_daemon_warning() {
        let config = SyslogConfig::from_core(&core_config::SyslogConfig::default(), "web");
        assert_eq!(config.priority(), 28);
        assert_eq!(config.tag, "docker/web");
    }

    #[tokio::test]
    async fn write_sends_framed_datagram() {
        let (server, addr) = collector().await;
        let writer = SyslogWriter::dial(config(&addr)).await.unwrap();

        assert_eq!(writer.write(b"hello world\n").await.unwrap(), 12);

        let msg = recv(&server).await;
        assert!(msg.starts_with("<28>"), "got {msg:?}");
        assert!(
            msg.contains(&format!(" docker/web[{}]: hello world", std::process::id())),
            "got {msg:?}"
        );
        assert!(msg.ends_with("hello world\n"));
        assert!(!msg.ends_with("\n\n"));
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let (_server, addr) = collector().await;
        let writer = SyslogWriter::dial(config(&addr)).await.unwrap();

        writer.close().await.unwrap();
        writer.close().await.unwrap();

        let err = writer.write(b"late").await.unwrap_err();
        assert!(matches!(err, SinkError::Closed(_)));
    }

    #[tokio::test]
    async fn dial_unresolvable_host_fails() {
        let err = SyslogWriter::dial(config("no-such-host.invalid:514"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SinkError::Dial { .. }));
    }

    #[tokio::test]
    async fn frame_without_trailing_newline_gets_one() {
        let (_server, addr) = collector().await;
        let writer = SyslogWriter::dial(config(&addr)).await.unwrap();

        let frame = writer.frame(b"abc");
        assert!(frame.ends_with(b"]: abc\n"));
    }
}
