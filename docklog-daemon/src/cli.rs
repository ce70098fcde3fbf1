//! CLI argument definitions for docklog-daemon.
//!
//! Uses `clap` v4 derive macros. Every flag also reads an environment
//! variable; explicitly given flags take precedence over the config file
//! and the `DOCKLOG_*` overrides it already applied.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use docklog_core::config::DocklogConfig;

/// Docker container log capture daemon.
///
/// Follows every running container's stdout/stderr and writes it to
/// rotating files and/or a remote syslog collector.
#[derive(Parser, Debug, Default)]
#[command(name = "docklog-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to docklog.toml. Built-in defaults are used when omitted.
    #[arg(short, long, env = "DOCKLOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Docker host (unix:///var/run/docker.sock, tcp://host:2375).
    #[arg(short = 'd', long = "docker", env = "DOCKLOG_DOCKER_HOST")]
    pub docker_host: Option<String>,

    /// Syslog collector address (host:port).
    #[arg(long, env = "DOCKLOG_SYSLOG_HOST")]
    pub syslog_host: Option<String>,

    /// Syslog tag prefix; the tag is prefix + container name.
    #[arg(long, env = "DOCKLOG_SYSLOG_PREFIX")]
    pub syslog_prefix: Option<String>,

    /// Enable or disable rotating file output (`--files` alone enables).
    #[arg(
        long,
        env = "DOCKLOG_FILES_ENABLED",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub files: Option<bool>,

    /// Enable or disable syslog output (`--syslog` alone enables).
    #[arg(
        long,
        env = "DOCKLOG_SYSLOG_ENABLED",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    pub syslog: Option<bool>,

    /// Base directory for log files.
    #[arg(long, env = "DOCKLOG_FILES_LOCATION")]
    pub loc: Option<String>,

    /// Rotation size in megabytes (0 disables size rotation).
    #[arg(long, env = "DOCKLOG_FILES_MAX_SIZE_MB")]
    pub max_size: Option<u64>,

    /// Number of compressed generations to keep.
    #[arg(long, env = "DOCKLOG_FILES_MAX_FILES")]
    pub max_files: Option<usize>,

    /// Days to keep compressed generations (0 disables age pruning).
    #[arg(long, env = "DOCKLOG_FILES_MAX_AGE_DAYS")]
    pub max_age: Option<u64>,

    /// Write stderr into the .log file instead of a separate .err file.
    #[arg(long, env = "DOCKLOG_FILES_MIX_ERR")]
    pub mix_err: bool,

    /// Container names to skip (comma separated).
    #[arg(short = 'x', long, value_delimiter = ',')]
    pub exclude: Vec<String>,

    /// Only capture these container names (comma separated).
    #[arg(short = 'i', long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Wrap every line in a JSON envelope.
    #[arg(short = 'j', long, env = "DOCKLOG_ENVELOPE_ENABLED")]
    pub json: bool,

    /// Debug logging (same as --log-level debug).
    #[arg(long)]
    pub dbg: bool,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Copy explicitly given flags into `config`.
    pub fn apply(&self, config: &mut DocklogConfig) {
        if let Some(host) = &self.docker_host {
            config.docker.host.clone_from(host);
        }
        if let Some(host) = &self.syslog_host {
            config.syslog.host.clone_from(host);
        }
        if let Some(prefix) = &self.syslog_prefix {
            config.syslog.prefix.clone_from(prefix);
        }
        if let Some(enabled) = self.files {
            config.files.enabled = enabled;
        }
        if let Some(enabled) = self.syslog {
            config.syslog.enabled = enabled;
        }
        if let Some(loc) = &self.loc {
            config.files.location.clone_from(loc);
        }
        if let Some(mb) = self.max_size {
            config.files.max_size_mb = mb;
        }
        if let Some(n) = self.max_files {
            config.files.max_files = n;
        }
        if let Some(days) = self.max_age {
            config.files.max_age_days = days;
        }
        if self.mix_err {
            config.files.mix_err = true;
        }
        if !self.exclude.is_empty() {
            config.filter.excludes = clean_names(&self.exclude);
        }
        if !self.include.is_empty() {
            config.filter.includes = clean_names(&self.include);
        }
        if self.json {
            config.envelope.enabled = true;
        }
        if let Some(level) = &self.log_level {
            config.general.log_level.clone_from(level);
        }
        if self.dbg {
            config.general.log_level = "debug".to_owned();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format.clone_from(format);
        }
    }
}

fn clean_names(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Build the effective configuration: file (or defaults), then env, then flags.
///
/// # Errors
///
/// Fails if the given file cannot be read or parsed, or the result is invalid.
pub async fn load_config(cli: &DaemonCli) -> Result<DocklogConfig> {
    let mut config = match &cli.config {
        Some(path) => DocklogConfig::from_file(path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?,
        None => DocklogConfig::default(),
    };
    config.apply_env_overrides();
    cli.apply(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    Ok(config)
}
