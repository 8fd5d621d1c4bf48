//! CUPS backend (`lp`, `lpstat`, `cancel`) for Linux and macOS.

use super::command::run;
use super::{PrinterBackend, PrinterError, SpoolerQueue};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// Deadline for the short query commands (`lpstat`, `cancel`).
const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    static ref REQUEST_ID_RE: Regex = Regex::new(r"request id is (\S+)").unwrap();
}

pub struct CupsBackend {
    submit_timeout: Duration,
}

impl CupsBackend {
    pub fn new(submit_timeout: Duration) -> Self {
        Self { submit_timeout }
    }
}

/// Extract the spooler id from `lp` output such as
/// `request id is Office-12 (1 file(s))`.
pub(crate) fn parse_request_id(output: &str) -> Option<String> {
    REQUEST_ID_RE
        .captures(output)
        .map(|caps| caps[1].to_string())
}

/// First whitespace-separated field of every non-empty line.
/// Matches the layout of both `lpstat -a` and `lpstat -o`.
pub(crate) fn first_fields(output: &str) -> impl Iterator<Item = &str> {
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
}

#[async_trait]
impl PrinterBackend for CupsBackend {
    async fn submit(&self, file: &Path, printer: &str) -> Result<Option<String>, PrinterError> {
        if file.as_os_str().is_empty() {
            return Err(PrinterError::EmptyPath);
        }
        let mut args: Vec<OsString> = Vec::new();
        if !printer.is_empty() {
            args.push("-d".into());
            args.push(printer.into());
        }
        args.push(file.as_os_str().to_owned());

        let out = run("lp", args, self.submit_timeout).await?;
        Ok(parse_request_id(&out.combined()))
    }

    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        let out = run("lpstat", ["-a"], QUERY_TIMEOUT).await?;
        Ok(first_fields(&out.stdout).map(str::to_string).collect())
    }

    async fn active_job_ids(&self) -> Result<SpoolerQueue, PrinterError> {
        let out = run("lpstat", ["-o"], QUERY_TIMEOUT).await?;
        let ids: HashSet<String> = first_fields(&out.stdout).map(str::to_string).collect();
        Ok(SpoolerQueue::Active(ids))
    }

    async fn cancel(&self, os_job_id: &str) -> Result<(), PrinterError> {
        if os_job_id.is_empty() {
            return Ok(());
        }
        run("cancel", [os_job_id], QUERY_TIMEOUT).await.map(|_| ())
    }

    fn submit_timeout(&self) -> Duration {
        self.submit_timeout
    }
}
