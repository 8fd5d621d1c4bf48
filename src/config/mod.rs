mod file_config;

pub use file_config::FileConfig;

use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3033;
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
#[cfg(windows)]
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 120;
#[cfg(not(windows))]
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 60;

const STORAGE_DIR_NAME: &str = ".print-agent";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub storage_dir: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub reconcile_interval_secs: u64,
    pub submit_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub sumatra_path: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            port: DEFAULT_PORT,
            logging_level: RequestsLoggingLevel::default(),
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            submit_timeout_secs: DEFAULT_SUBMIT_TIMEOUT_SECS,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            sumatra_path: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage_dir: PathBuf,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub reconcile_interval: Duration,
    pub submit_timeout: Duration,
    pub download_timeout: Duration,
    pub sumatra_path: Option<PathBuf>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let storage_dir = match file
            .storage_dir
            .map(PathBuf::from)
            .or_else(|| cli.storage_dir.clone())
        {
            Some(dir) => dir,
            None => default_storage_dir()?,
        };

        if storage_dir.exists() && !storage_dir.is_dir() {
            bail!("storage_dir is not a directory: {:?}", storage_dir);
        }

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let reconcile_interval_secs = file
            .reconcile_interval_secs
            .unwrap_or(cli.reconcile_interval_secs);
        let submit_timeout_secs = file.submit_timeout_secs.unwrap_or(cli.submit_timeout_secs);
        let download_timeout_secs = file
            .download_timeout_secs
            .unwrap_or(cli.download_timeout_secs);

        for (name, value) in [
            ("reconcile_interval_secs", reconcile_interval_secs),
            ("submit_timeout_secs", submit_timeout_secs),
            ("download_timeout_secs", download_timeout_secs),
        ] {
            if value == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        let sumatra_path = file
            .sumatra_path
            .map(PathBuf::from)
            .or_else(|| cli.sumatra_path.clone());

        Ok(Self {
            storage_dir,
            port,
            logging_level,
            reconcile_interval: Duration::from_secs(reconcile_interval_secs),
            submit_timeout: Duration::from_secs(submit_timeout_secs),
            download_timeout: Duration::from_secs(download_timeout_secs),
            sumatra_path,
        })
    }

    pub fn jobs_file_path(&self) -> PathBuf {
        self.storage_dir.join("jobs.json")
    }

    pub fn job_files_dir(&self) -> PathBuf {
        self.storage_dir.join("print_jobs")
    }

    /// Create the storage directory tree if missing.
    pub fn ensure_storage_dirs(&self) -> Result<()> {
        let dir = self.job_files_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {:?}", dir))
    }
}

/// `~/.print-agent`, from `HOME` (or `USERPROFILE` on Windows).
fn default_storage_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|h| !h.is_empty())
        .context("Cannot determine home directory, pass --storage-dir")?;
    Ok(PathBuf::from(home).join(STORAGE_DIR_NAME))
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
