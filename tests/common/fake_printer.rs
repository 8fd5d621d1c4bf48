//! Test doubles for the OS-facing collaborators.

use async_trait::async_trait;
use print_agent::printer::{FileViewer, PrinterBackend, PrinterError, SpoolerQueue};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// What the next `submit` call returns.
#[allow(dead_code)]
pub enum Submit {
    Spooled(&'static str),
    NoId,
    Fail(&'static str),
}

/// Printer backend scripted by the test.
pub struct FakePrinter {
    outcomes: Mutex<VecDeque<Submit>>,
    active: Mutex<SpoolerQueue>,
    submitted: Mutex<Vec<(PathBuf, String)>>,
    cancelled: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl FakePrinter {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            active: Mutex::new(SpoolerQueue::Active(HashSet::new())),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn next_submit(&self, outcome: Submit) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn set_active(&self, ids: &[&str]) {
        *self.active.lock().unwrap() =
            SpoolerQueue::Active(ids.iter().map(|id| id.to_string()).collect());
    }

    pub fn submitted(&self) -> Vec<(PathBuf, String)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
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
            .unwrap_or(Submit::NoId);
        match outcome {
            Submit::Spooled(id) => Ok(Some(id.to_string())),
            Submit::NoId => Ok(None),
            Submit::Fail(output) => Err(PrinterError::CommandFailed {
                program: "lp".to_string(),
                status: "exit status: 1".to_string(),
                output: output.to_string(),
            }),
        }
    }

    async fn list_printers(&self) -> Result<Vec<String>, PrinterError> {
        Ok(vec!["Ward_A".to_string(), "Pharmacy".to_string()])
    }

    async fn active_job_ids(&self) -> Result<SpoolerQueue, PrinterError> {
        Ok(self.active.lock().unwrap().clone())
    }

    async fn cancel(&self, os_job_id: &str) -> Result<(), PrinterError> {
        self.cancelled.lock().unwrap().push(os_job_id.to_string());
        Ok(())
    }

    fn submit_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }
}

/// Viewer that only remembers what it was asked to open.
#[derive(Default)]
pub struct RecordingViewer {
    opened: Mutex<Vec<PathBuf>>,
}

#[allow(dead_code)]
impl RecordingViewer {
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl FileViewer for RecordingViewer {
    fn open(&self, file: &Path) -> Result<(), PrinterError> {
        self.opened.lock().unwrap().push(file.to_path_buf());
        Ok(())
    }
}
