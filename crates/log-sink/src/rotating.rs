//! 회전 압축 파일 싱크
//!
//! [`RotatingWriter`]는 파일 하나를 소유하는 단일 소비자 액터입니다.
//! 쓰기는 bounded 채널로 전달되고, 백그라운드 태스크만 파일 핸들을 만지므로
//! 파일 I/O에 락이 필요 없습니다.
//!
//! # 동작
//! - 쓰기마다 줄바꿈을 보정해 메모리 버퍼에 추가, `buffer_lines`에 도달하면 즉시 플러시
//! - 주기 틱마다: 버퍼가 `flush_interval`보다 오래 머물렀으면 플러시,
//!   파일 크기 ≥ `max_size_bytes` 또는 (자정 회전 시) 날짜 변경이면 회전
//! - 회전: 현재 파일을 `<path>.1.gz.tmp`로 먼저 압축, `<path>.<n>.gz` 세대를 1부터
//!   첫 빈 번호까지 탐색, 보존 기간/한도 초과분 삭제, 높은 번호부터 n → n+1 이동,
//!   임시 파일을 `<path>.1.gz`로 rename, 원본을 비워서 다시 엶
//! - 회전이 실패하면 원본은 비우지 않고 추가 모드로 다시 엶
//!
//! I/O 에러는 로그로 남기고 흡수하며 호출자에게 전파하지 않습니다.
//! `write`의 성공은 "영속화를 위해 수락됨"을 의미합니다.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use chrono::{Local, NaiveDate};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

use docklog_core::config::FilesConfig;
use docklog_core::error::SinkError;
use docklog_core::metrics as m;
use docklog_core::sink::LogSink;

/// 기본 입력 채널 용량
const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// 회전 파일 설정
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// 회전 기준 크기 (바이트, 0이면 크기 기반 회전 비활성화)
    pub max_size_bytes: u64,
    /// 보존할 압축 세대 수 (최소 1)
    pub max_generations: usize,
    /// 압축 세대 최대 보존 기간 (`None`이면 무제한)
    pub max_age: Option<Duration>,
    /// 강제 플러시 전 버퍼링할 줄 수
    pub buffer_lines: usize,
    /// 버퍼 최대 체류 시간
    pub flush_interval: Duration,
    /// 날짜 변경 시 회전
    pub midnight_rotation: bool,
    /// 입력 채널 용량
    pub channel_capacity: usize,
    /// 플러시/회전 점검 주기
    pub tick_interval: Duration,
    /// 자정 회전 판단에 쓰는 오늘 날짜
    pub today: fn() -> NaiveDate,
}

/// 로컬 시간대 기준 오늘 날짜
pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 10_000_000,
            max_generations: 10,
            max_age: None,
            buffer_lines: 1,
            flush_interval: Duration::from_millis(500),
            midnight_rotation: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            tick_interval: Duration::from_secs(1),
            today: local_today,
        }
    }
}

impl RotationConfig {
    /// 코어 설정에서 회전 설정을 생성합니다.
    pub fn from_core(core: &FilesConfig) -> Self {
        Self {
            max_size_bytes: core.max_size_bytes(),
            max_generations: core.max_files,
            max_age: core.max_age(),
            buffer_lines: core.buffer_lines,
            flush_interval: Duration::from_millis(core.flush_interval_ms),
            midnight_rotation: core.midnight_rotation,
            ..Self::default()
        }
    }
}

enum Command {
    Write(Vec<u8>),
    Close,
}

/// 버퍼링, 회전, 압축을 수행하는 파일 싱크
pub struct RotatingWriter {
    name: String,
    tx: mpsc::Sender<Command>,
    closed: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RotatingWriter {
    /// 파일을 (추가 모드로) 열고 백그라운드 태스크를 시작합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub async fn open(path: impl Into<PathBuf>, config: RotationConfig) -> Result<Self, SinkError> {
        let path = path.into();
        let name = path.display().to_string();

        let file = open_append(&path).await.map_err(|e| SinkError::Write {
            sink: name.clone(),
            reason: format!("open failed: {e}"),
        })?;

        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let state = RotationState::new(path, config, file);
        let task = tokio::spawn(state.run(rx));
        debug!(path = %name, "rotating writer opened");

        Ok(Self {
            name,
            tx,
            closed: AtomicBool::new(false),
            task: Mutex::new(Some(task)),
        })
    }

    /// 대상 파일 경로 문자열
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 바이트를 버퍼에 수락합니다. 빈 입력은 무시됩니다.
    pub async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed(self.name.clone()));
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut line = Vec::with_capacity(data.len() + 1);
        line.extend_from_slice(data);
        if line.last() != Some(&b'\n') {
            line.push(b'\n');
        }

        self.tx
            .send(Command::Write(line))
            .await
            .map_err(|_| SinkError::Closed(self.name.clone()))?;
        Ok(data.len())
    }

    /// 최종 플러시 후 백그라운드 태스크를 멈춥니다. 여러 번 호출해도 안전합니다.
    pub async fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // 태스크가 이미 끝났으면 전송 실패는 무시
        let _ = self.tx.send(Command::Close).await;

        let task = self.task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.await.map_err(|e| SinkError::Write {
                sink: self.name.clone(),
                reason: format!("writer task failed: {e}"),
            })?;
        }
        debug!(path = %self.name, "rotating writer closed");
        Ok(())
    }
}

impl LogSink for RotatingWriter {
    fn name(&self) -> &str {
        RotatingWriter::name(self)
    }

    async fn write(&self, data: &[u8]) -> Result<usize, SinkError> {
        RotatingWriter::write(self, data).await
    }

    async fn close(&self) -> Result<(), SinkError> {
        RotatingWriter::close(self).await
    }
}

/// 백그라운드 태스크 전용 상태
struct RotationState {
    path: PathBuf,
    config: RotationConfig,
    file: Option<File>,
    buffer: Vec<u8>,
    buffered_lines: usize,
    last_flush: Instant,
    trigger: RotationTrigger,
}

/// 회전 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Size(u64),
    DayChanged,
}

/// 틱마다 회전 여부를 판단합니다.
///
/// 어떤 사유로든 회전을 알리면 기준 날짜도 갱신하므로, 크기와 날짜 조건이
/// 같은 틱에 겹쳐도 회전은 한 번입니다.
struct RotationTrigger {
    max_size_bytes: u64,
    midnight_rotation: bool,
    today: fn() -> NaiveDate,
    day: NaiveDate,
}

impl RotationTrigger {
    fn new(config: &RotationConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            midnight_rotation: config.midnight_rotation,
            today: config.today,
            day: (config.today)(),
        }
    }

    /// `size`는 현재 파일 크기 (stat 실패 시 `None`)
    fn check(&mut self, size: Option<u64>) -> Option<Trigger> {
        let today = (self.today)();
        let day_changed = self.midnight_rotation && today != self.day;

        let trigger = match size {
            Some(size) if self.max_size_bytes > 0 && size >= self.max_size_bytes => {
                Some(Trigger::Size(size))
            }
            _ if day_changed => Some(Trigger::DayChanged),
            _ => None,
        };
        if trigger.is_some() {
            self.day = today;
        }
        trigger
    }
}

impl RotationState {
    fn new(path: PathBuf, config: RotationConfig, file: File) -> Self {
        Self {
            trigger: RotationTrigger::new(&config),
            path,
            config,
            file: Some(file),
            buffer: Vec::new(),
            buffered_lines: 0,
            last_flush: Instant::now(),
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        let period = self.config.tick_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(Command::Write(line)) => self.append(line).await,
                    Some(Command::Close) | None => {
                        // 닫힘 이전에 큐에 들어온 쓰기까지 반영
                        rx.close();
                        while let Some(cmd) = rx.recv().await {
                            if let Command::Write(line) = cmd {
                                self.buffer.extend_from_slice(&line);
                            }
                        }
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => self.on_tick().await,
            }
        }
        debug!(path = %self.path.display(), "rotating writer task finished");
    }

    async fn append(&mut self, line: Vec<u8>) {
        self.buffer.extend_from_slice(&line);
        self.buffered_lines += 1;
        if self.buffered_lines >= self.config.buffer_lines {
            self.flush().await;
        }
    }

    async fn on_tick(&mut self) {
        if !self.buffer.is_empty() && self.last_flush.elapsed() > self.config.flush_interval {
            self.flush().await;
        }

        let size = if self.config.max_size_bytes > 0 {
            match tokio::fs::metadata(&self.path).await {
                Ok(meta) => Some(meta.len()),
                Err(e) => {
                    debug!(path = %self.path.display(), error = %e, "stat failed");
                    None
                }
            }
        } else {
            None
        };

        match self.trigger.check(size) {
            Some(Trigger::Size(size)) => {
                debug!(
                    path = %self.path.display(),
                    size,
                    max_size = self.config.max_size_bytes,
                    "max size reached, rotation triggered"
                );
                self.rotate().await;
            }
            Some(Trigger::DayChanged) => {
                debug!(path = %self.path.display(), "day changed, rotation triggered");
                self.rotate().await;
            }
            None => {}
        }
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        if self.file.is_none() {
            match open_append(&self.path).await {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    self.io_error("reopen", &e);
                    self.discard_buffer();
                    return;
                }
            }
        }

        if let Some(file) = self.file.as_mut() {
            if let Err(e) = write_out(file, &self.buffer).await {
                self.io_error("flush", &e);
            }
        }
        self.discard_buffer();
        self.last_flush = Instant::now();
    }

    fn discard_buffer(&mut self) {
        self.buffer.clear();
        self.buffered_lines = 0;
    }

    async fn rotate(&mut self) {
        self.flush().await;
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all().await {
                self.io_error("sync", &e);
            }
        }

        let rotated = rotate_generations(
            &self.path,
            self.config.max_generations,
            self.config.max_age,
        )
        .await;

        // 압축본이 없으면 원본을 비우지 않음
        let reopened = match rotated {
            Ok(()) => {
                metrics::counter!(m::SINK_ROTATIONS_TOTAL).increment(1);
                debug!(path = %self.path.display(), "rotation completed");
                open_truncate(&self.path).await
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to rotate, keeping active file"
                );
                metrics::counter!(m::SINK_IO_ERRORS_TOTAL).increment(1);
                open_append(&self.path).await
            }
        };

        match reopened {
            Ok(file) => self.file = Some(file),
            Err(e) => self.io_error("reopen", &e),
        }
    }

    fn io_error(&self, op: &str, e: &std::io::Error) {
        warn!(path = %self.path.display(), op, error = %e, "file i/o failed");
        metrics::counter!(m::SINK_IO_ERRORS_TOTAL).increment(1);
    }
}

async fn write_out(file: &mut File, data: &[u8]) -> std::io::Result<()> {
    file.write_all(data).await?;
    file.flush().await
}

/// `<path>.<n>.gz` 경로를 만듭니다.
pub fn generation_path(path: &Path, n: usize) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(format!(".{n}.gz"));
    PathBuf::from(s)
}

/// 1부터 첫 빈 번호 직전까지 존재하는 세대 수를 셉니다.
async fn count_generations(path: &Path) -> std::io::Result<usize> {
    let mut n = 0;
    loop {
        match tokio::fs::symlink_metadata(generation_path(path, n + 1)).await {
            Ok(_) => n += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(n),
            Err(e) => return Err(e),
        }
    }
}

async fn rotate_generations(
    path: &Path,
    max_generations: usize,
    max_age: Option<Duration>,
) -> std::io::Result<()> {
    let src = path.to_path_buf();
    let tmp = tmp_path(&generation_path(path, 1));
    let staged = tmp.clone();
    tokio::task::spawn_blocking(move || compress(&src, &staged))
        .await
        .map_err(std::io::Error::other)??;

    let max = max_generations.max(1);
    let mut highest = count_generations(path).await?;

    if let Some(max_age) = max_age {
        highest = prune_expired(path, highest, max_age).await?;
    }

    // 이동 후 max를 넘게 될 세대 삭제
    while highest >= max {
        remove_if_exists(&generation_path(path, highest)).await?;
        highest -= 1;
    }

    for n in (1..=highest).rev() {
        match tokio::fs::rename(generation_path(path, n), generation_path(path, n + 1)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    tokio::fs::rename(&tmp, generation_path(path, 1)).await
}

/// 보존 기간이 지난 첫 세대부터 끝까지 삭제하고 남은 세대 수를 돌려줍니다.
///
/// 번호가 높을수록 오래된 세대이므로 뒤쪽만 잘라 번호 사이에 빈 곳이 생기지 않습니다.
async fn prune_expired(path: &Path, highest: usize, max_age: Duration) -> std::io::Result<usize> {
    let Some(cutoff) = SystemTime::now().checked_sub(max_age) else {
        return Ok(highest);
    };

    let mut first_expired = None;
    for n in 1..=highest {
        let modified = tokio::fs::symlink_metadata(generation_path(path, n))
            .await?
            .modified()?;
        if modified < cutoff {
            first_expired = Some(n);
            break;
        }
    }

    let Some(first) = first_expired else {
        return Ok(highest);
    };
    for n in (first..=highest).rev() {
        remove_if_exists(&generation_path(path, n)).await?;
    }
    debug!(path = %path.display(), removed = highest - first + 1, "expired generations pruned");
    Ok(first - 1)
}

fn tmp_path(dst: &Path) -> PathBuf {
    let mut tmp = OsString::from(dst.as_os_str());
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// `src`를 gzip으로 `dst`에 씁니다. 실패하면 일부만 쓰인 `dst`를 지웁니다.
fn compress(src: &Path, dst: &Path) -> std::io::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let mut input = std::fs::File::open(src)?;
    let output = std_create_private(dst)?;
    let written = (|| {
        let mut encoder = GzEncoder::new(output, Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        encoder.finish()?.sync_all()
    })();
    if written.is_err() {
        let _ = std::fs::remove_file(dst);
    }
    written
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

async fn open_append(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).append(true);
    #[cfg(unix)]
    opts.mode(0o600);
    opts.open(path).await
}

async fn open_truncate(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);
    opts.open(path).await
}

fn std_create_private(path: &Path) -> std::io::Result<std::fs::File> {
    let mut opts = std::fs::OpenOptions::new();
    opts.create(true).write(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}
