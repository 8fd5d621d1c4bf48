//! Printer backends.
//!
//! A [`PrinterBackend`] is the only way the rest of the agent talks to the
//! operating system's print spooler. One implementation exists per OS family;
//! [`default_backend`] picks the one matching the build target.

mod command;
mod cups;
mod viewer;
mod windows;

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub use cups::CupsBackend;
pub use viewer::{FileViewer, SystemViewer};
pub use windows::WindowsBackend;

/// Errors returned by printer backends and the file viewer.
#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("no file to print")]
    EmptyPath,

    #[error("failed to run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {output}")]
    CommandFailed {
        program: String,
        status: String,
        output: String,
    },

    #[error("{program} timed out after {}s", after.as_secs())]
    Timeout { program: String, after: Duration },
}

impl PrinterError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, PrinterError::Timeout { .. })
    }
}

/// What the spooler currently considers outstanding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolerQueue {
    /// The backend cannot observe the spooler; nothing should be reconciled.
    Unmonitored,
    /// Spooler ids of the jobs still in the queue.
    Active(HashSet<String>),
}

/// Capability interface over the OS print spooler.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait PrinterBackend: Send + Sync {
    /// Submit a file to `printer` (empty means system default).
    ///
    /// Returns the spooler job id, or `None` when the backend has no
    /// addressable id for what it submitted.
    async fn submit(&self, file: &Path, printer: &str) -> Result<Option<String>, PrinterError>;

    /// Names of the printers known to the system.
    async fn list_printers(&self) -> Result<Vec<String>, PrinterError>;

    /// Jobs the spooler still has outstanding.
    async fn active_job_ids(&self) -> Result<SpoolerQueue, PrinterError>;

    /// Best-effort cancellation of a spooler job.
    async fn cancel(&self, os_job_id: &str) -> Result<(), PrinterError>;

    /// Deadline applied to a single [`PrinterBackend::submit`] call.
    fn submit_timeout(&self) -> Duration;
}

/// Build the backend for the current platform.
#[cfg(not(windows))]
pub fn default_backend(submit_timeout: Duration, _sumatra_path: Option<PathBuf>) -> CupsBackend {
    CupsBackend::new(submit_timeout)
}

/// Build the backend for the current platform.
#[cfg(windows)]
pub fn default_backend(submit_timeout: Duration, sumatra_path: Option<PathBuf>) -> WindowsBackend {
    WindowsBackend::new(submit_timeout, sumatra_path)
}
