//! Per-container sink assembly.
//!
//! For every tracked container the daemon builds two write targets: a
//! primary sink for stdout and an error sink for stderr. Each is a
//! [`FanoutWriter`] over the enabled destinations.
//!
//! # Layout
//!
//! ```text
//! <location>[/<group>]/<name>.log   stdout (and stderr when mixed)
//! <location>[/<group>]/<name>.err   stderr
//! syslog://<host>                   both streams, tag = <prefix><name>
//! ```
//!
//! When there is no dedicated `.err` file (mixed mode, files disabled, or the
//! open failed) the error sink is the primary sink itself.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, warn};

use docklog_core::config::{DocklogConfig, FilesConfig, SyslogConfig as CoreSyslogConfig};
use docklog_core::sink::SharedSink;
use docklog_log_sink::{
    EnvelopeContext, FanoutWriter, RotatingWriter, RotationConfig, SyslogConfig, SyslogWriter,
};

/// Write targets for one container.
#[derive(Clone)]
pub struct SinkPair {
    /// stdout target.
    pub primary: SharedSink,
    /// stderr target. May be the same instance as `primary`.
    pub error: SharedSink,
}

impl SinkPair {
    /// Whether stderr shares the stdout sink.
    pub fn is_shared(&self) -> bool {
        Arc::ptr_eq(&self.primary, &self.error)
    }
}

/// Builds the sinks for a newly started container.
///
/// Returns `None` when no destination could be created; the container is
/// then left untracked.
pub trait SinkProvider: Send + Sync {
    fn make_sinks(&self, name: &str, group: &str) -> impl Future<Output = Option<SinkPair>> + Send;
}

/// Sink provider driven by the `[files]`, `[syslog]` and `[envelope]` sections.
#[derive(Debug, Clone)]
pub struct ConfiguredSinks {
    files: FilesConfig,
    syslog: CoreSyslogConfig,
    envelope: bool,
}

impl ConfiguredSinks {
    pub fn new(files: FilesConfig, syslog: CoreSyslogConfig, envelope: bool) -> Self {
        Self {
            files,
            syslog,
            envelope,
        }
    }

    pub fn from_config(config: &DocklogConfig) -> Self {
        Self::new(
            config.files.clone(),
            config.syslog.clone(),
            config.envelope.enabled,
        )
    }

    /// Directory holding a container's files: `location[/group]`.
    pub fn log_dir(&self, group: &str) -> PathBuf {
        let base = Path::new(&self.files.location);
        if group.is_empty() {
            base.to_path_buf()
        } else {
            base.join(group)
        }
    }

    async fn open_files(&self, name: &str, group: &str) -> (Option<SharedSink>, Option<SharedSink>) {
        let dir = self.log_dir(group);
        if let Err(e) = create_log_dir(&dir).await {
            error!(path = %dir.display(), error = %e, "failed to create log directory");
            return (None, None);
        }

        let rotation = RotationConfig::from_core(&self.files);
        let log = open_rotating(dir.join(format!("{name}.log")), rotation.clone()).await;
        let err = if self.files.mix_err {
            None
        } else {
            open_rotating(dir.join(format!("{name}.err")), rotation).await
        };
        (log, err)
    }

    async fn dial_syslog(&self, name: &str) -> Option<SharedSink> {
        let config = SyslogConfig::from_core(&self.syslog, name);
        match SyslogWriter::dial(config).await {
            Ok(writer) => Some(Arc::new(writer)),
            Err(e) => {
                warn!(container = name, error = %e, "syslog unavailable, continuing without it");
                None
            }
        }
    }

    fn fanout(&self, label: String, sinks: Vec<SharedSink>, name: &str, group: &str) -> SharedSink {
        let mut fanout = FanoutWriter::new(label, sinks);
        if self.envelope {
            fanout = fanout.with_envelope(EnvelopeContext::new(name, group));
        }
        Arc::new(fanout)
    }
}

impl SinkProvider for ConfiguredSinks {
    async fn make_sinks(&self, name: &str, group: &str) -> Option<SinkPair> {
        let (log_file, err_file) = if self.files.enabled {
            self.open_files(name, group).await
        } else {
            (None, None)
        };
        let syslog = if self.syslog.enabled {
            self.dial_syslog(name).await
        } else {
            None
        };

        let primary_sinks: Vec<SharedSink> =
            log_file.into_iter().chain(syslog.clone()).collect();
        if primary_sinks.is_empty() {
            error!(container = name, "no log destination available, container not tracked");
            if let Some(err_file) = err_file {
                if let Err(e) = err_file.close().await {
                    warn!(container = name, error = %e, "failed to close orphaned error file");
                }
            }
            return None;
        }

        let primary = self.fanout(name.to_owned(), primary_sinks, name, group);
        let error = match err_file {
            Some(err_file) => {
                let sinks = std::iter::once(err_file).chain(syslog).collect();
                self.fanout(format!("{name}.err"), sinks, name, group)
            }
            None => Arc::clone(&primary),
        };

        debug!(container = name, group, shared = Arc::ptr_eq(&primary, &error), "sinks created");
        Some(SinkPair { primary, error })
    }
}

async fn open_rotating(path: PathBuf, config: RotationConfig) -> Option<SharedSink> {
    match RotatingWriter::open(&path, config).await {
        Ok(writer) => Some(Arc::new(writer)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open log file");
            None
        }
    }
}

async fn create_log_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder.create(dir).await
}
