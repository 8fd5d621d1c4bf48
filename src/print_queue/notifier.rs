//! Change notification sink for the job store.
//!
//! The store calls its notifier once per logical state change, after the
//! lock is released, with the full ordered list of current jobs. Fan-out to
//! subscribers is the implementor's job.

use super::models::PrintJob;
use std::sync::Mutex;

pub trait ChangeNotifier: Send + Sync {
    fn jobs_changed(&self, jobs: &[PrintJob]);
}

/// Keeps every snapshot it receives. Used by tests and diagnostics.
#[derive(Default)]
pub struct RecordingNotifier {
    snapshots: Mutex<Vec<Vec<PrintJob>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<Vec<PrintJob>> {
        self.snapshots
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn last(&self) -> Option<Vec<PrintJob>> {
        self.snapshots.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl ChangeNotifier for RecordingNotifier {
    fn jobs_changed(&self, jobs: &[PrintJob]) {
        if let Ok(mut snapshots) = self.snapshots.lock() {
            snapshots.push(jobs.to_vec());
        }
    }
}
