//! # docklog-log-sink
//!
//! 컨테이너 로그를 받아 영속화하는 싱크 구현 모음입니다.
//!
//! # 아키텍처
//!
//! ```text
//!                     ┌──> RotatingWriter (name.log) ──> name.log.N.gz
//! FanoutWriter ───────┼──> RotatingWriter (name.err)
//!  (envelope 옵션)    └──> SyslogWriter (UDP)
//! ```
//!
//! # 주요 컴포넌트
//!
//! - [`RotatingWriter`]: 단일 소비자 액터가 파일 핸들을 독점하는 버퍼링/회전/압축 파일 싱크
//! - [`FanoutWriter`]: 여러 싱크로 복제 쓰기, 일부 실패 허용, JSON 엔벨로프 옵션
//! - [`SyslogWriter`]: 원격 syslog 수집기로 UDP 데이터그램 전송

pub mod envelope;
pub mod fanout;
pub mod rotating;
pub mod syslog;

pub use envelope::{Envelope, EnvelopeContext};
pub use fanout::FanoutWriter;
pub use rotating::{RotatingWriter, RotationConfig};
pub use syslog::{SyslogConfig, SyslogWriter};
