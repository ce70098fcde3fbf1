//! 설정 관리 -- docklog.toml 파싱 및 런타임 설정
//!
//! [`DocklogConfig`]는 한 번 로드된 뒤 불변 값으로 각 컴포넌트 생성 시점에 주입됩니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOCKLOG_FILES_MAX_SIZE_MB=20` 형식)
//! 3. 설정 파일 (`docklog.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), docklog_core::error::DocklogError> {
//! use docklog_core::config::DocklogConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DocklogConfig::load("docklog.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DocklogConfig::parse("[files]\nmax_files = 3")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DocklogError};

/// docklog 통합 설정
///
/// `docklog.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocklogConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// Docker 연결 설정
    #[serde(default)]
    pub docker: DockerConfig,
    /// 회전 파일 싱크 설정
    #[serde(default)]
    pub files: FilesConfig,
    /// 원격 syslog 싱크 설정
    #[serde(default)]
    pub syslog: SyslogConfig,
    /// 컨테이너 이름 필터
    #[serde(default)]
    pub filter: FilterConfig,
    /// JSON 엔벨로프 설정
    #[serde(default)]
    pub envelope: EnvelopeConfig,
    /// Prometheus 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl DocklogConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DocklogError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DocklogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DocklogError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DocklogError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DocklogError> {
        toml::from_str(toml_str).map_err(|e| {
            DocklogError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOCKLOG_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOCKLOG_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOCKLOG_GENERAL_LOG_FORMAT");

        // Docker
        override_string(&mut self.docker.host, "DOCKLOG_DOCKER_HOST");
        override_usize(
            &mut self.docker.event_channel_capacity,
            "DOCKLOG_DOCKER_EVENT_CHANNEL_CAPACITY",
        );

        // Files
        override_bool(&mut self.files.enabled, "DOCKLOG_FILES_ENABLED");
        override_string(&mut self.files.location, "DOCKLOG_FILES_LOCATION");
        override_u64(&mut self.files.max_size_mb, "DOCKLOG_FILES_MAX_SIZE_MB");
        override_usize(&mut self.files.max_files, "DOCKLOG_FILES_MAX_FILES");
        override_u64(&mut self.files.max_age_days, "DOCKLOG_FILES_MAX_AGE_DAYS");
        override_usize(&mut self.files.buffer_lines, "DOCKLOG_FILES_BUFFER_LINES");
        override_u64(
            &mut self.files.flush_interval_ms,
            "DOCKLOG_FILES_FLUSH_INTERVAL_MS",
        );
        override_bool(
            &mut self.files.midnight_rotation,
            "DOCKLOG_FILES_MIDNIGHT_ROTATION",
        );
        override_bool(&mut self.files.mix_err, "DOCKLOG_FILES_MIX_ERR");

        // Syslog
        override_bool(&mut self.syslog.enabled, "DOCKLOG_SYSLOG_ENABLED");
        override_string(&mut self.syslog.host, "DOCKLOG_SYSLOG_HOST");
        override_string(&mut self.syslog.prefix, "DOCKLOG_SYSLOG_PREFIX");
        override_string(&mut self.syslog.facility, "DOCKLOG_SYSLOG_FACILITY");
        override_string(&mut self.syslog.severity, "DOCKLOG_SYSLOG_SEVERITY");

        // Filter
        override_csv(&mut self.filter.includes, "DOCKLOG_FILTER_INCLUDES");
        override_csv(&mut self.filter.excludes, "DOCKLOG_FILTER_EXCLUDES");

        // Envelope
        override_bool(&mut self.envelope.enabled, "DOCKLOG_ENVELOPE_ENABLED");

        // Metrics
        override_bool(&mut self.metrics.enabled, "DOCKLOG_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "DOCKLOG_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "DOCKLOG_METRICS_PORT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DocklogError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.docker.event_channel_capacity == 0 {
            return Err(invalid(
                "docker.event_channel_capacity",
                "must be at least 1".to_owned(),
            ));
        }

        if !self.files.enabled && !self.syslog.enabled {
            return Err(invalid(
                "files.enabled",
                "at least one of files or syslog destinations must be enabled".to_owned(),
            ));
        }

        if self.files.enabled {
            if self.files.location.is_empty() {
                return Err(invalid(
                    "files.location",
                    "location must not be empty when files are enabled".to_owned(),
                ));
            }
            if self.files.max_files == 0 {
                return Err(invalid("files.max_files", "must be at least 1".to_owned()));
            }
            if self.files.buffer_lines == 0 {
                return Err(invalid("files.buffer_lines", "must be at least 1".to_owned()));
            }
        }

        if self.syslog.enabled {
            if self.syslog.host.is_empty() {
                return Err(invalid(
                    "syslog.host",
                    "host must not be empty when syslog is enabled".to_owned(),
                ));
            }
            if facility_code(&self.syslog.facility).is_none() {
                return Err(invalid(
                    "syslog.facility",
                    format!("unknown facility '{}'", self.syslog.facility),
                ));
            }
            if severity_code(&self.syslog.severity).is_none() {
                return Err(invalid(
                    "syslog.severity",
                    format!("unknown severity '{}'", self.syslog.severity),
                ));
            }
        }

        if !self.filter.includes.is_empty() && !self.filter.excludes.is_empty() {
            return Err(invalid(
                "filter",
                "includes and excludes are mutually exclusive".to_owned(),
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> DocklogError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
        }
    }
}

/// Docker 연결 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker 호스트 (`unix:///var/run/docker.sock`, `tcp://host:2375`, 빈 값이면 로컬 기본값)
    pub host: String,
    /// 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: "unix:///var/run/docker.sock".to_owned(),
            event_channel_capacity: 100,
        }
    }
}

/// 회전 파일 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 로그 파일 기본 디렉토리
    pub location: String,
    /// 회전 기준 크기 (MB, 0이면 크기 기반 회전 비활성화)
    pub max_size_mb: u64,
    /// 보존할 압축 세대 수
    pub max_files: usize,
    /// 압축 세대 최대 보존 기간 (일, 0이면 기간 기반 삭제 비활성화)
    pub max_age_days: u64,
    /// 강제 플러시 전 버퍼링할 줄 수
    pub buffer_lines: usize,
    /// 버퍼 최대 체류 시간 (밀리초)
    pub flush_interval_ms: u64,
    /// 자정 회전 여부
    pub midnight_rotation: bool,
    /// stderr도 `.log` 파일에 기록 (`.err` 파일 없음)
    pub mix_err: bool,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            location: "logs".to_owned(),
            max_size_mb: 10,
            max_files: 5,
            max_age_days: 30,
            buffer_lines: 1,
            flush_interval_ms: 500,
            midnight_rotation: false,
            mix_err: false,
        }
    }
}

impl FilesConfig {
    /// 회전 기준 크기 (바이트)
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    /// 압축 세대 최대 보존 기간 (`None`이면 무제한)
    pub fn max_age(&self) -> Option<Duration> {
        (self.max_age_days > 0)
            .then(|| Duration::from_secs(self.max_age_days.saturating_mul(86_400)))
    }
}

/// 원격 syslog 싱크 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수집기 주소 (UDP)
    pub host: String,
    /// 태그 접두어 (태그 = 접두어 + 컨테이너 이름)
    pub prefix: String,
    /// facility 이름 (daemon, user, local0..local7 등)
    pub facility: String,
    /// severity 이름 (emerg..debug)
    pub severity: String,
}

impl Default for SyslogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1:514".to_owned(),
            prefix: "docker/".to_owned(),
            facility: "daemon".to_owned(),
            severity: "warning".to_owned(),
        }
    }
}

/// 컨테이너 이름 필터 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// 비어 있지 않으면 이 이름들만 수집
    pub includes: Vec<String>,
    /// 수집에서 제외할 이름
    pub excludes: Vec<String>,
}

/// JSON 엔벨로프 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// 각 줄을 `{msg, container, group, ts, host}`로 감쌀지 여부
    pub enabled: bool,
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
        }
    }
}

/// syslog facility 이름을 코드로 변환합니다.
pub fn facility_code(name: &str) -> Option<u8> {
    let code = match name {
        "kern" => 0,
        "user" => 1,
        "mail" => 2,
        "daemon" => 3,
        "auth" => 4,
        "syslog" => 5,
        "lpr" => 6,
        "news" => 7,
        "uucp" => 8,
        "cron" => 9,
        "authpriv" => 10,
        "ftp" => 11,
        "local0" => 16,
        "local1" => 17,
        "local2" => 18,
        "local3" => 19,
        "local4" => 20,
        "local5" => 21,
        "local6" => 22,
        "local7" => 23,
        _ => return None,
    };
    Some(code)
}

/// syslog severity 이름을 코드로 변환합니다.
pub fn severity_code(name: &str) -> Option<u8> {
    let code = match name {
        "emerg" => 0,
        "alert" => 1,
        "crit" => 2,
        "err" | "error" => 3,
        "warning" | "warn" => 4,
        "notice" => 5,
        "info" => 6,
        "debug" => 7,
        _ => return None,
    };
    Some(code)
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = DocklogConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.docker.host, "unix:///var/run/docker.sock");
        assert_eq!(config.docker.event_channel_capacity, 100);
        assert!(config.files.enabled);
        assert_eq!(config.files.location, "logs");
        assert_eq!(config.files.max_files, 5);
        assert!(!config.syslog.enabled);
        assert_eq!(config.syslog.prefix, "docker/");
        assert!(!config.envelope.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        DocklogConfig::default().validate().unwrap();
    }

    #[test]
    fn max_size_bytes_converts_megabytes() {
        let files = FilesConfig {
            max_size_mb: 3,
            ..FilesConfig::default()
        };
        assert_eq!(files.max_size_bytes(), 3 * 1024 * 1024);
    }

    #[test]
    fn max_age_defaults_to_thirty_days_and_zero_disables() {
        let files = FilesConfig::default();
        assert_eq!(files.max_age_days, 30);
        assert_eq!(files.max_age(), Some(Duration::from_secs(30 * 86_400)));

        let files = FilesConfig {
            max_age_days: 0,
            ..FilesConfig::default()
        };
        assert_eq!(files.max_age(), None);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[files]
location = "/var/log/docker"
mix_err = true

[syslog]
enabled = true
"#;
        let config = DocklogConfig::parse(toml).unwrap();
        assert_eq!(config.files.location, "/var/log/docker");
        assert!(config.files.mix_err);
        // 나머지는 기본값 유지
        assert_eq!(config.files.max_size_mb, 10);
        assert!(config.syslog.enabled);
        assert_eq!(config.syslog.host, "127.0.0.1:514");
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let err = DocklogConfig::parse("invalid = [[[toml").unwrap_err();
        assert!(matches!(
            err,
            DocklogError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = DocklogConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_no_destinations() {
        let mut config = DocklogConfig::default();
        config.files.enabled = false;
        config.syslog.enabled = false;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn validate_accepts_syslog_only() {
        let mut config = DocklogConfig::default();
        config.files.enabled = false;
        config.syslog.enabled = true;
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_zero_generations_when_files_enabled() {
        let mut config = DocklogConfig::default();
        config.files.max_files = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_files"));
    }

    #[test]
    fn validate_rejects_unknown_facility() {
        let mut config = DocklogConfig::default();
        config.syslog.enabled = true;
        config.syslog.facility = "kitchen".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("syslog.facility"));
    }

    #[test]
    fn validate_rejects_includes_with_excludes() {
        let mut config = DocklogConfig::default();
        config.filter.includes = vec!["web".to_owned()];
        config.filter.excludes = vec!["db".to_owned()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn facility_and_severity_codes() {
        assert_eq!(facility_code("daemon"), Some(3));
        assert_eq!(facility_code("local7"), Some(23));
        assert_eq!(severity_code("warning"), Some(4));
        assert_eq!(severity_code("warn"), Some(4));
        assert_eq!(severity_code("loud"), None);
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("TEST_DOCKLOG_STR", "overridden") };
        override_string(&mut val, "TEST_DOCKLOG_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_DOCKLOG_STR") };
    }

    #[test]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("TEST_DOCKLOG_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_DOCKLOG_BOOL_BAD");
        assert!(!val);
        unsafe { std::env::remove_var("TEST_DOCKLOG_BOOL_BAD") };
    }

    #[test]
    fn env_override_csv_skips_blank_entries() {
        let mut val = vec!["a".to_owned()];
        // SAFETY: 고유한 키를 사용하므로 다른 테스트와 경합하지 않습니다.
        unsafe { std::env::set_var("TEST_DOCKLOG_CSV", "web, db,, cache ") };
        override_csv(&mut val, "TEST_DOCKLOG_CSV");
        assert_eq!(val, vec!["web", "db", "cache"]);
        unsafe { std::env::remove_var("TEST_DOCKLOG_CSV") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = 42usize;
        override_usize(&mut val, "TEST_DOCKLOG_NONEXISTENT_12345");
        assert_eq!(val, 42);
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = DocklogConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = DocklogConfig::parse(&toml_str).unwrap();
        assert_eq!(config.files.location, parsed.files.location);
        assert_eq!(config.syslog.prefix, parsed.syslog.prefix);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let err = DocklogConfig::from_file("/nonexistent/path/docklog.toml")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DocklogError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
