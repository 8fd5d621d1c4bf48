//! The job store.
//!
//! Owns the in-memory job list and its JSON snapshot on disk. Every public
//! operation first checks whether the snapshot was rewritten by another
//! process (newer mtime) or deleted, and adopts the disk state if so. The
//! lock is held only for in-memory work and the snapshot write; file copies,
//! file deletions and spooler cancellations run after it is released.
//!
//! Cross-process sync is last-writer-wins on whole snapshots. Two writers
//! landing within the same mtime tick can lose one update.

use super::file_storage::JobFileStorage;
use super::models::{JobStatus, NewJob, PrintJob};
use super::notifier::ChangeNotifier;
use super::snapshot_file::{SnapshotFile, SnapshotRead};
use crate::printer::PrinterBackend;
use crate::metrics;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};
use std::time::SystemTime;
use tracing::{debug, error, info, warn};

pub const MSG_RESTARTED: &str = "Agent restarted during print";
pub const MSG_FILE_MISSING: &str = "Source file missing";
pub const MSG_NO_FILE: &str = "Job data corrupted (no file)";

/// Why a job could not be claimed for a retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryRejected {
    NotFound,
    NotFailed(JobStatus),
    MissingFile,
}

struct StoreState {
    jobs: Vec<PrintJob>,
    /// Snapshot mtime as of our last read or write.
    last_sync: Option<SystemTime>,
}

/// What startup recovery had to repair.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryReport {
    pub loaded: usize,
    pub reset_corrupt: bool,
    pub interrupted: usize,
    pub missing_file: usize,
    pub no_file: usize,
    pub normalized: usize,
    pub duplicates: usize,
    pub orphans_removed: usize,
}

impl RecoveryReport {
    pub fn changed(&self) -> bool {
        self.reset_corrupt
            || self.interrupted > 0
            || self.missing_file > 0
            || self.no_file > 0
            || self.normalized > 0
            || self.duplicates > 0
    }
}

pub struct JobStore {
    state: RwLock<StoreState>,
    snapshot: SnapshotFile,
    files: JobFileStorage,
    backend: Arc<dyn PrinterBackend>,
    notifier: RwLock<Option<Arc<dyn ChangeNotifier>>>,
}

impl JobStore {
    /// Create a store over `snapshot_path` and `files_dir`.
    ///
    /// Nothing is read from disk until [`JobStore::recover`] is called.
    pub fn new(
        snapshot_path: PathBuf,
        files_dir: PathBuf,
        backend: Arc<dyn PrinterBackend>,
    ) -> Self {
        Self {
            state: RwLock::new(StoreState {
                jobs: Vec::new(),
                last_sync: None,
            }),
            snapshot: SnapshotFile::new(snapshot_path),
            files: JobFileStorage::new(files_dir),
            backend,
            notifier: RwLock::new(None),
        }
    }

    /// Register the single change callback, replacing any previous one.
    pub fn set_notifier(&self, notifier: Arc<dyn ChangeNotifier>) {
        *self
            .notifier
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(notifier);
    }

    pub fn files(&self) -> &JobFileStorage {
        &self.files
    }

    pub fn backend(&self) -> &Arc<dyn PrinterBackend> {
        &self.backend
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, jobs: &[PrintJob]) {
        let notifier = self
            .notifier
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(notifier) = notifier {
            notifier.jobs_changed(jobs);
        }
    }

    /// Write the snapshot and return a copy of the jobs for notification.
    /// A failed write is logged and otherwise ignored.
    fn commit_locked(&self, state: &mut StoreState) -> Vec<PrintJob> {
        match self.snapshot.write(&state.jobs) {
            Ok(modified) => state.last_sync = Some(modified),
            Err(e) => error!("Failed to save jobs: {:#}", e),
        }
        metrics::set_tracked_jobs(state.jobs.len());
        state.jobs.clone()
    }

    /// Adopt the disk state if another process changed it.
    /// Returns true if the in-memory list was replaced.
    fn sync_with_disk_locked(&self, state: &mut StoreState) -> bool {
        let Some(modified) = self.snapshot.modified() else {
            state.last_sync = None;
            if state.jobs.is_empty() {
                return false;
            }
            info!("jobs.json disappeared, clearing {} in-memory jobs", state.jobs.len());
            state.jobs.clear();
            metrics::set_tracked_jobs(0);
            return true;
        };

        if state.last_sync.is_some_and(|last| modified <= last) {
            return false;
        }

        match self.snapshot.read() {
            SnapshotRead::Loaded { mut jobs, modified } => {
                info!("Detected newer jobs.json on disk, reloading");
                dedupe_ids(&mut jobs);
                state.jobs = jobs;
                state.last_sync = Some(modified);
                metrics::set_tracked_jobs(state.jobs.len());
                true
            }
            SnapshotRead::Corrupt { modified, error } => {
                warn!("Ignoring unreadable jobs.json: {}", error);
                state.last_sync = Some(modified);
                false
            }
            SnapshotRead::Missing => false,
        }
    }

    /// Flip jobs whose durable file vanished to Failed. Returns true if any changed.
    fn validate_files_locked(state: &mut StoreState) -> bool {
        let mut changed = false;
        for job in state.jobs.iter_mut() {
            if job.status == JobStatus::Failed {
                continue;
            }
            let Some(path) = &job.file_path else {
                continue;
            };
            if !path.exists() {
                warn!("Job {} lost its file {}", job.id, path.display());
                job.fail(MSG_FILE_MISSING);
                job.file_path = None;
                metrics::record_job_transition(JobStatus::Failed);
                changed = true;
            }
        }
        changed
    }

    /// Load the snapshot and repair whatever cannot be trusted after a restart.
    /// Must run once before the store serves anything, and only in the
    /// instance that owns the agent port: it fails in-flight jobs and sweeps
    /// files that any other live instance is still working on.
    pub fn recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();
        let mut state = self.write_state();

        match self.snapshot.read() {
            SnapshotRead::Missing => {
                state.jobs.clear();
                state.last_sync = None;
            }
            SnapshotRead::Loaded { jobs, modified } => {
                state.jobs = jobs;
                state.last_sync = Some(modified);
            }
            SnapshotRead::Corrupt { modified, error } => {
                warn!("Failed to parse jobs.json, resetting job list: {}", error);
                state.jobs.clear();
                state.last_sync = Some(modified);
                report.reset_corrupt = true;
            }
        }
        report.loaded = state.jobs.len();
        report.duplicates = dedupe_ids(&mut state.jobs);

        for job in state.jobs.iter_mut() {
            if job.status == JobStatus::Printing {
                job.fail(MSG_RESTARTED);
                report.interrupted += 1;
            }

            match &job.file_path {
                Some(path) if !path.exists() => {
                    warn!("Job {} file missing: {}", job.id, path.display());
                    job.fail(MSG_FILE_MISSING);
                    job.file_path = None;
                    report.missing_file += 1;
                }
                Some(_) => {}
                None if job.status == JobStatus::Pending => {
                    job.fail(MSG_NO_FILE);
                    report.no_file += 1;
                }
                None => {}
            }

            if job.normalize() {
                report.normalized += 1;
            }
        }

        let snapshot = report.changed().then(|| self.commit_locked(&mut state));
        metrics::set_tracked_jobs(state.jobs.len());
        let claimed: HashSet<PathBuf> = state
            .jobs
            .iter()
            .filter_map(|job| job.file_path.clone())
            .collect();
        drop(state);

        if let Some(jobs) = snapshot {
            info!(
                "Recovered job list: {} interrupted, {} missing files, {} without file",
                report.interrupted, report.missing_file, report.no_file
            );
            self.notify(&jobs);
        }

        report.orphans_removed = self.files.sweep_orphans(&claimed);
        report
    }

    /// Add a new Pending job and return a copy of it.
    pub fn create(&self, request: NewJob) -> PrintJob {
        let job = PrintJob::from_request(request);
        let mut state = self.write_state();
        self.sync_with_disk_locked(&mut state);
        state.jobs.push(job.clone());
        let snapshot = self.commit_locked(&mut state);
        drop(state);

        metrics::record_job_transition(JobStatus::Pending);
        debug!("Created job {} for {}", job.id, job.file_name);
        self.notify(&snapshot);
        job
    }

    /// Copy `temp_path` into durable storage and attach it to job `id`.
    ///
    /// A failed copy moves the job to Failed. Returns the updated job, or
    /// `None` if the job does not exist (before or after the copy).
    pub async fn persist_file(&self, id: &str, temp_path: &Path) -> Option<PrintJob> {
        {
            let mut state = self.write_state();
            let reloaded = self.sync_with_disk_locked(&mut state);
            let exists = state.jobs.iter().any(|j| j.id == id);
            let snapshot = reloaded.then(|| state.jobs.clone());
            drop(state);
            if let Some(jobs) = snapshot {
                self.notify(&jobs);
            }
            if !exists {
                return None;
            }
        }

        let copied = self.files.copy_in(id, temp_path).await;

        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);
        let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) else {
            let snapshot = reloaded.then(|| state.jobs.clone());
            drop(state);
            if let Ok(path) = copied {
                debug!("Job {} vanished during copy, dropping its file", id);
                self.files.remove(&path);
            }
            if let Some(jobs) = snapshot {
                self.notify(&jobs);
            }
            return None;
        };

        match copied {
            Ok(path) => job.file_path = Some(path),
            Err(e) => {
                error!("Failed to persist job file for {}: {}", id, e);
                job.fail(&format!("Storage failed: {e}"));
                metrics::record_job_transition(JobStatus::Failed);
            }
        }
        let updated = job.clone();
        let snapshot = self.commit_locked(&mut state);
        drop(state);

        self.notify(&snapshot);
        Some(updated)
    }

    /// Set the status (and failure reason) of job `id`.
    ///
    /// Completed removes the job and deletes its file. Returns the job as of
    /// the transition, or `None` if no such job exists.
    pub fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<&str>,
    ) -> Option<PrintJob> {
        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);
        let Some(idx) = state.jobs.iter().position(|j| j.id == id) else {
            let snapshot = reloaded.then(|| state.jobs.clone());
            drop(state);
            if let Some(jobs) = snapshot {
                self.notify(&jobs);
            }
            return None;
        };

        state.jobs[idx].set_status(status, error);
        let (updated, file_to_delete) = if status == JobStatus::Completed {
            let job = state.jobs.remove(idx);
            let file = job.file_path.clone();
            (job, file)
        } else {
            (state.jobs[idx].clone(), None)
        };
        let snapshot = self.commit_locked(&mut state);
        drop(state);

        metrics::record_job_transition(status);
        if let Some(path) = file_to_delete {
            self.files.remove(&path);
        }
        self.notify(&snapshot);
        Some(updated)
    }

    /// Record the spooler id of job `id`. Returns false if no such job exists.
    pub fn update_os_job_id(&self, id: &str, os_job_id: &str) -> bool {
        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);
        let Some(job) = state.jobs.iter_mut().find(|j| j.id == id) else {
            let snapshot = reloaded.then(|| state.jobs.clone());
            drop(state);
            if let Some(jobs) = snapshot {
                self.notify(&jobs);
            }
            return false;
        };

        job.os_job_id = Some(os_job_id.to_string()).filter(|s| !s.is_empty());
        let snapshot = self.commit_locked(&mut state);
        drop(state);

        self.notify(&snapshot);
        true
    }

    /// Atomically move a Failed job with an intact file back to Printing.
    pub fn claim_for_retry(&self, id: &str) -> Result<PrintJob, RetryRejected> {
        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);
        let outcome = match state.jobs.iter_mut().find(|j| j.id == id) {
            None => Err(RetryRejected::NotFound),
            Some(job) if job.status != JobStatus::Failed => {
                Err(RetryRejected::NotFailed(job.status))
            }
            Some(job) if !job.file_path.as_deref().is_some_and(Path::exists) => {
                Err(RetryRejected::MissingFile)
            }
            Some(job) => {
                job.set_status(JobStatus::Printing, None);
                Ok(job.clone())
            }
        };
        let snapshot = if outcome.is_ok() {
            Some(self.commit_locked(&mut state))
        } else {
            reloaded.then(|| state.jobs.clone())
        };
        drop(state);

        if outcome.is_ok() {
            metrics::record_job_transition(JobStatus::Printing);
        }
        if let Some(jobs) = snapshot {
            self.notify(&jobs);
        }
        outcome
    }

    /// Run the staleness check and the missing-file check, then call `f` on the jobs.
    fn read_validated<R>(&self, f: impl FnOnce(&[PrintJob]) -> R) -> R {
        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);
        let flipped = Self::validate_files_locked(&mut state);
        let snapshot = if flipped {
            Some(self.commit_locked(&mut state))
        } else {
            reloaded.then(|| state.jobs.clone())
        };
        let result = f(&state.jobs);
        drop(state);

        if let Some(jobs) = snapshot {
            self.notify(&jobs);
        }
        result
    }

    /// Copy of all jobs, in creation order.
    pub fn list(&self) -> Vec<PrintJob> {
        self.read_validated(|jobs| jobs.to_vec())
    }

    pub fn get(&self, id: &str) -> Option<PrintJob> {
        self.read_validated(|jobs| jobs.iter().find(|j| j.id == id).cloned())
    }

    /// Delete job `id`, cancelling its spooler job and deleting its file.
    /// Returns false if there was nothing to remove.
    pub async fn remove(&self, id: &str) -> bool {
        let (removed, snapshot) = {
            let mut state = self.write_state();
            let reloaded = self.sync_with_disk_locked(&mut state);
            match state.jobs.iter().position(|j| j.id == id) {
                Some(idx) => {
                    let removed = state.jobs.remove(idx);
                    (Some(removed), Some(self.commit_locked(&mut state)))
                }
                None => (None, reloaded.then(|| state.jobs.clone())),
            }
        };

        let Some(removed) = removed else {
            if let Some(jobs) = snapshot {
                self.notify(&jobs);
            }
            return false;
        };

        if let Some(os_job_id) = &removed.os_job_id {
            if let Err(e) = self.backend.cancel(os_job_id).await {
                debug!("Cancel of spooler job {} failed: {}", os_job_id, e);
            }
        }
        if let Some(path) = &removed.file_path {
            self.files.remove(path);
        }
        info!("Removed job {}", removed.id);
        if let Some(jobs) = snapshot {
            self.notify(&jobs);
        }
        true
    }

    /// Drop every job, cancel their spooler jobs, wipe the storage directory
    /// and delete the snapshot.
    pub async fn clear_all(&self) {
        let os_job_ids: Vec<String> = {
            let mut state = self.write_state();
            self.sync_with_disk_locked(&mut state);
            let ids = state
                .jobs
                .iter()
                .filter_map(|j| j.os_job_id.clone())
                .collect();
            state.jobs.clear();
            if let Err(e) = self.snapshot.remove() {
                error!("Failed to delete jobs.json: {:#}", e);
            }
            state.last_sync = None;
            ids
        };
        metrics::set_tracked_jobs(0);

        for os_job_id in &os_job_ids {
            if let Err(e) = self.backend.cancel(os_job_id).await {
                debug!("Cancel of spooler job {} failed: {}", os_job_id, e);
            }
        }
        let wiped = self.files.clear();
        info!(
            "Cleared job queue ({} spooler jobs cancelled, {} files removed)",
            os_job_ids.len(),
            wiped
        );
        self.notify(&[]);
    }

    /// Complete every Queued job whose spooler id is not in `active`.
    /// Returns the jobs that were completed.
    pub fn complete_finished(&self, active: &HashSet<String>) -> Vec<PrintJob> {
        let mut state = self.write_state();
        let reloaded = self.sync_with_disk_locked(&mut state);

        let (finished, kept): (Vec<PrintJob>, Vec<PrintJob>) =
            std::mem::take(&mut state.jobs).into_iter().partition(|job| {
                job.status == JobStatus::Queued
                    && job
                        .os_job_id
                        .as_deref()
                        .is_some_and(|os_id| !active.contains(os_id))
            });
        state.jobs = kept;

        let snapshot = if !finished.is_empty() {
            Some(self.commit_locked(&mut state))
        } else {
            reloaded.then(|| state.jobs.clone())
        };
        drop(state);

        for job in &finished {
            info!(
                "Spooler job {} finished, job {} completed",
                job.os_job_id.as_deref().unwrap_or_default(),
                job.id
            );
            metrics::record_job_transition(JobStatus::Completed);
            if let Some(path) = &job.file_path {
                self.files.remove(path);
            }
        }
        if let Some(jobs) = snapshot {
            self.notify(&jobs);
        }

        finished
            .into_iter()
            .map(|mut job| {
                job.set_status(JobStatus::Completed, None);
                job
            })
            .collect()
    }
}

/// Keep the first job for each id. Returns how many were dropped.
fn dedupe_ids(jobs: &mut Vec<PrintJob>) -> usize {
    let before = jobs.len();
    let mut seen = HashSet::new();
    jobs.retain(|job| seen.insert(job.id.clone()));
    before - jobs.len()
}
