//! Per-job print pipeline.
//!
//! Each submitted job gets its own task: acquire the source, persist it,
//! then either open it in a viewer (preview) or hand it to the spooler.
//! A failing step moves the job straight to Failed with a message naming
//! the step. Nothing is retried automatically.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::models::{JobStatus, NewJob, PrintJob};
use super::store::{JobStore, RetryRejected};
use crate::acquisition::{FileFetcher, FileSource};
use crate::printer::{FileViewer, PrinterError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("job {0} not found")]
    NotFound(String),

    #[error("job {id} is {status}, only failed jobs can be retried")]
    NotRetryable { id: String, status: JobStatus },

    #[error("file for job {0} is missing")]
    MissingFile(String),

    #[error("failed to open viewer: {0}")]
    Viewer(#[from] PrinterError),
}

/// What to do with a source once it is on disk.
#[derive(Debug, Clone)]
pub struct PrintRequest {
    pub source: FileSource,
    pub printer: String,
    pub preview: bool,
    pub hospital_no: String,
    pub user_name: String,
}

#[derive(Clone)]
pub struct PrintPipeline {
    store: Arc<JobStore>,
    fetcher: Arc<dyn FileFetcher>,
    viewer: Arc<dyn FileViewer>,
}

impl PrintPipeline {
    pub fn new(
        store: Arc<JobStore>,
        fetcher: Arc<dyn FileFetcher>,
        viewer: Arc<dyn FileViewer>,
    ) -> Self {
        Self {
            store,
            fetcher,
            viewer,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Create a Pending job and start its worker.
    pub fn submit(&self, request: PrintRequest) -> (PrintJob, JoinHandle<()>) {
        let job = self.store.create(NewJob {
            file_name: request.source.display_name(),
            hospital_no: request.hospital_no.clone(),
            user_name: request.user_name.clone(),
            printer: request.printer.clone(),
        });
        info!("Accepted print job {} ({})", job.id, job.file_name);

        let pipeline = self.clone();
        let job_id = job.id.clone();
        let handle = tokio::spawn(async move { pipeline.process(&job_id, request).await });
        (job, handle)
    }

    async fn process(&self, job_id: &str, request: PrintRequest) {
        let temp = match self.fetcher.fetch(&request.source).await {
            Ok(temp) => temp,
            Err(e) => {
                warn!("File preparation failed for job {}: {}", job_id, e);
                self.store.update_status(
                    job_id,
                    JobStatus::Failed,
                    Some(&format!("Preparation failed: {e}")),
                );
                return;
            }
        };

        let persisted = self.store.persist_file(job_id, &temp).await;
        drop(temp);

        let Some(job) = persisted else {
            debug!("Job {} was removed before its file was stored", job_id);
            return;
        };
        let Some(path) = job.file_path.as_deref() else {
            // persist_file already recorded the failure
            return;
        };

        if request.preview {
            self.preview(job_id, path);
        } else if self
            .store
            .update_status(job_id, JobStatus::Printing, None)
            .is_some()
        {
            self.send_to_spooler(job_id, path, &job.printer).await;
        }
    }

    fn preview(&self, job_id: &str, path: &Path) {
        match self.viewer.open(path) {
            Ok(()) => {
                self.store
                    .update_status(job_id, JobStatus::Completed, None);
            }
            Err(e) => {
                warn!("Preview failed for job {}: {}", job_id, e);
                self.store.update_status(
                    job_id,
                    JobStatus::Failed,
                    Some(&format!("Preview failed: {e}")),
                );
            }
        }
    }

    /// Submit a job already in Printing and record the outcome.
    async fn send_to_spooler(&self, job_id: &str, path: &Path, printer: &str) {
        let backend = self.store.backend();
        let deadline = backend.submit_timeout();

        let result = match tokio::time::timeout(deadline, backend.submit(path, printer)).await {
            Ok(result) => result,
            Err(_) => Err(PrinterError::Timeout {
                program: "print submission".to_string(),
                after: deadline,
            }),
        };

        match result {
            Ok(Some(os_job_id)) => {
                info!("Job {} spooled as {}", job_id, os_job_id);
                self.store.update_os_job_id(job_id, &os_job_id);
                self.store.update_status(job_id, JobStatus::Queued, None);
            }
            Ok(None) => {
                info!("Job {} handed to the system without a spooler id", job_id);
                self.store
                    .update_status(job_id, JobStatus::Completed, None);
            }
            Err(PrinterError::Timeout { after, .. }) => {
                warn!("Print timed out for job {}", job_id);
                self.store.update_status(
                    job_id,
                    JobStatus::Failed,
                    Some(&format!("Print timed out after {}s", after.as_secs())),
                );
            }
            Err(e) => {
                warn!("Print failed for job {}: {}", job_id, e);
                self.store.update_status(
                    job_id,
                    JobStatus::Failed,
                    Some(&format!("Print failed: {e}")),
                );
            }
        }
    }

    /// Re-submit a Failed job from its persisted file.
    pub fn retry(&self, job_id: &str) -> Result<JoinHandle<()>, PipelineError> {
        let job = self
            .store
            .claim_for_retry(job_id)
            .map_err(|rejected| match rejected {
                RetryRejected::NotFound => PipelineError::NotFound(job_id.to_string()),
                RetryRejected::NotFailed(status) => PipelineError::NotRetryable {
                    id: job_id.to_string(),
                    status,
                },
                RetryRejected::MissingFile => PipelineError::MissingFile(job_id.to_string()),
            })?;
        info!("Retrying job {}", job.id);

        let pipeline = self.clone();
        Ok(tokio::spawn(async move {
            if let Some(path) = job.file_path.as_deref() {
                pipeline.send_to_spooler(&job.id, path, &job.printer).await;
            }
        }))
    }

    /// Open the persisted file of a job without touching its state.
    pub fn view(&self, job_id: &str) -> Result<(), PipelineError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PipelineError::NotFound(job_id.to_string()))?;
        let path = job
            .file_path
            .filter(|p| p.exists())
            .ok_or_else(|| PipelineError::MissingFile(job_id.to_string()))?;
        self.viewer.open(&path)?;
        Ok(())
    }
}
