//! Windows backend.
//!
//! Prints through SumatraPDF when the helper is available, which prints
//! without any UI, and falls back to the shell `Print`/`PrintTo` verbs via
//! PowerShell. Windows exposes no spooler id for either route, so every
//! submission is fire-and-forget and monitoring is reported as unsupported.

use super::command::run;
use super::{PrinterBackend, PrinterError, SpoolerQueue};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

const SUMATRA_EXE: &str = "SumatraPDF.exe";
const QUERY_TIMEOUT: Duration = Duration::from_secs(15);

pub struct WindowsBackend {
    submit_timeout: Duration,
    sumatra_path: Option<PathBuf>,
}

impl WindowsBackend {
    pub fn new(submit_timeout: Duration, sumatra_path: Option<PathBuf>) -> Self {
        Self {
            submit_timeout,
            sumatra_path,
        }
    }

    /// Configured helper if it exists, otherwise one next to our executable.
    fn locate_sumatra(&self) -> Option<PathBuf> {
        if let Some(path) = &self.sumatra_path {
            if path.is_file() {
                return Some(path.clone());
            }
            warn!("Configured SumatraPDF not found at {}", path.display());
        }
        let exe = std::env::current_exe().ok()?;
        let candidate = exe.parent()?.join(SUMATRA_EXE);
        candidate.is_file().then_some(candidate)
    }
}

pub(crate) fn sumatra_args(file: &Path, printer: &str) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::new();
    if printer.is_empty() {
        args.push("-print-to-default".into());
    } else {
        args.push("-print-to".into());
        args.push(printer.into());
    }
    args.push("-silent".into());
    args.push(file.as_os_str().to_owned());
    args
}

/// Single-quoted PowerShell literal.
pub(crate) fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn powershell_print_script(file: &Path, printer: &str) -> String {
    let file = ps_quote(&file.to_string_lossy());
    if printer.is_empty() {
        format!("Start-Process -FilePath {file} -Verb Print -WindowStyle Hidden -Wait")
    } else {
        format!(
            "Start-Process -FilePath {file} -Verb PrintTo -ArgumentList {} -WindowStyle Hidden -Wait",
            ps_quote(printer)
        )
    }
}

pub(crate) fn parse_printer_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl PrinterBackend for WindowsBackend {
    async fn submit(&self, file: &Path, printer: &str) -> Result<Option<String>, PrinterError> {
        if file.as_os_str().is_empty() {
            return Err(PrinterError::EmptyPath);
        }

        if let Some(sumatra) = self.locate_sumatra() {
            let program = sumatra.to_string_lossy().into_owned();
            match run(&program, sumatra_args(file, printer), self.submit_timeout).await {
                Ok(_) => return Ok(None),
                Err(e) if e.is_timeout() => return Err(e),
                Err(e) => warn!("SumatraPDF failed, falling back to PowerShell: {}", e),
            }
        } else {
            debug!("SumatraPDF not available, using PowerShell");
        }

        let script = powershell_print_script(file, printer);
        run(
            "powershell",
            ["-NoProfile", "-Command", script.as_str()],
            self.submit_timeout,
        )
        .await?;
        Ok(None)
    }

    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        let out = run(
            "powershell",
            [
                "-NoProfile",
                "-Command",
                "Get-Printer | Select-Object -ExpandProperty Name",
            ],
            QUERY_TIMEOUT,
        )
        .await?;
        Ok(parse_printer_lines(&out.stdout))
    }

    async fn active_job_ids(&self) -> Result<SpoolerQueue, PrinterError> {
        Ok(SpoolerQueue::Unmonitored)
    }

    async fn cancel(&self, _os_job_id: &str) -> Result<(), PrinterError> {
        Ok(())
    }

    fn submit_timeout(&self) -> Duration {
        self.submit_timeout
    }
}
