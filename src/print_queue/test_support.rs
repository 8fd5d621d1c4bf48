//! Scripted printer backend for unit tests.

use crate::printer::{PrinterBackend, PrinterError, SpoolerQueue};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) enum SubmitOutcome {
    Id(&'static str),
    NoId,
    Fail(&'static str),
    Timeout,
}

pub(crate) struct FakePrinter {
    outcomes: Mutex<VecDeque<SubmitOutcome>>,
    queue: Mutex<Result<SpoolerQueue, String>>,
    pub submitted: Mutex<Vec<(PathBuf, String)>>,
    pub cancelled: Mutex<Vec<String>>,
}

impl FakePrinter {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            queue: Mutex::new(Ok(SpoolerQueue::Active(HashSet::new()))),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn push_outcome(&self, outcome: SubmitOutcome) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_active(&self, ids: &[&str]) {
        let ids = ids.iter().map(|s| s.to_string()).collect();
        *self.queue.lock().unwrap() = Ok(SpoolerQueue::Active(ids));
    }

    pub fn set_unmonitored(&self) {
        *self.queue.lock().unwrap() = Ok(SpoolerQueue::Unmonitored);
    }

    pub fn set_queue_error(&self, message: &str) {
        *self.queue.lock().unwrap() = Err(message.to_string());
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(PathBuf, String)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl PrinterBackend for FakePrinter {
    async fn submit(&self, file: &Path, printer: &str) -> Result<Option<String>, PrinterError> {
        self.submitted
            .lock()
            .unwrap()
            .push((file.to_path_buf(), printer.to_string()));
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SubmitOutcome::NoId);
        match outcome {
            SubmitOutcome::Id(id) => Ok(Some(id.to_string())),
            SubmitOutcome::NoId => Ok(None),
            SubmitOutcome::Fail(msg) => Err(PrinterError::CommandFailed {
                program: "lp".to_string(),
                status: "exit status: 1".to_string(),
                output: msg.to_string(),
            }),
            SubmitOutcome::Timeout => Err(PrinterError::Timeout {
                program: "lp".to_string(),
                after: self.submit_timeout(),
            }),
        }
    }

    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        Ok(vec!["Office".to_string(), "Front_Desk".to_string()])
    }

    async fn active_job_ids(&self) -> Result<SpoolerQueue, PrinterError> {
        self.queue
            .lock()
            .unwrap()
            .clone()
            .map_err(|output| PrinterError::CommandFailed {
                program: "lpstat".to_string(),
                status: "exit status: 1".to_string(),
                output,
            })
    }

    async fn cancel(&self, os_job_id: &str) -> Result<(), PrinterError> {
        self.cancelled.lock().unwrap().push(os_job_id.to_string());
        Ok(())
    }

    fn submit_timeout(&self) -> Duration {
        Duration::from_secs(60)
    }
}
