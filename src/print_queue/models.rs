//! Data models for the print queue.
//!
//! Defines print jobs and their lifecycle statuses. The JSON shape of
//! [`PrintJob`] is the on-disk snapshot format and the notification payload.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Format used for [`PrintJob::created_at`].
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Error stored on a Failed job when the caller supplied no message.
pub const UNKNOWN_FAILURE: &str = "Unknown failure";

/// Status of a print job.
///
/// ```text
/// Pending -> Printing -> Queued -> Completed
///    |          |
///    +----------+-----> Failed -> (retry) Printing
/// ```
///
/// Completed is never retained: a job reaching it leaves the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Printing,
    Queued,
    Completed, // terminal, ephemeral
    Failed,    // terminal, retained
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Printing => "printing",
            JobStatus::Queued => "queued",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied metadata for a job about to be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewJob {
    pub file_name: String,
    pub hospital_no: String,
    pub user_name: String,
    pub printer: String,
}

/// A single print job tracked by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintJob {
    /// Unique identifier (UUID)
    pub id: String,
    /// Display name of the source (URL or synthetic name)
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub hospital_no: String,
    #[serde(default)]
    pub user_name: String,
    /// Target printer; empty means the system default
    #[serde(default)]
    pub printer: String,
    pub status: JobStatus,
    /// Spooler-assigned id, only meaningful while Queued
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_job_id: Option<String>,
    /// Last failure reason, present only while Failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub created_at: String,
    /// Durable copy of the print source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl PrintJob {
    /// Create a new Pending job with a fresh id.
    pub fn new(
        file_name: impl Into<String>,
        hospital_no: impl Into<String>,
        user_name: impl Into<String>,
        printer: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_name: file_name.into(),
            hospital_no: hospital_no.into(),
            user_name: user_name.into(),
            printer: printer.into(),
            status: JobStatus::Pending,
            os_job_id: None,
            error: None,
            created_at: chrono::Local::now().format(CREATED_AT_FORMAT).to_string(),
            file_path: None,
        }
    }

    pub fn from_request(request: NewJob) -> Self {
        Self::new(
            request.file_name,
            request.hospital_no,
            request.user_name,
            request.printer,
        )
    }

    /// Apply a status change, keeping `error` and `os_job_id` coherent with it.
    pub(crate) fn set_status(&mut self, status: JobStatus, error: Option<&str>) {
        self.status = status;
        self.error = match status {
            JobStatus::Failed => Some(
                error
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .unwrap_or(UNKNOWN_FAILURE)
                    .to_string(),
            ),
            _ => None,
        };
        if status == JobStatus::Printing {
            self.os_job_id = None;
        }
    }

    pub(crate) fn fail(&mut self, error: &str) {
        self.set_status(JobStatus::Failed, Some(error));
    }

    /// Repair records that break the Failed <=> error invariant.
    /// Returns true if anything changed.
    pub(crate) fn normalize(&mut self) -> bool {
        let has_error = self.error.as_deref().is_some_and(|e| !e.trim().is_empty());
        match (self.status, has_error) {
            (JobStatus::Failed, false) => {
                self.error = Some(UNKNOWN_FAILURE.to_string());
                true
            }
            (JobStatus::Failed, true) => false,
            (_, _) if self.error.is_some() => {
                self.error = None;
                true
            }
            _ => false,
        }
    }
}
