//! On-disk JSON snapshot of the job list.
//!
//! The whole list is rewritten on every mutation. Writes land in a sibling
//! temp file that is renamed over the snapshot, so a reader in another
//! process sees either the old or the new document, never a partial one.

use super::models::PrintJob;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Outcome of reading the snapshot file.
#[derive(Debug)]
pub enum SnapshotRead {
    Missing,
    Loaded {
        jobs: Vec<PrintJob>,
        modified: SystemTime,
    },
    /// Present but unparsable.
    Corrupt {
        modified: SystemTime,
        error: String,
    },
}

pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the snapshot, `None` if it does not exist.
    pub fn modified(&self) -> Option<SystemTime> {
        std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
    }

    pub fn read(&self) -> SnapshotRead {
        let Some(modified) = self.modified() else {
            return SnapshotRead::Missing;
        };
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SnapshotRead::Missing,
            Err(e) => {
                return SnapshotRead::Corrupt {
                    modified,
                    error: e.to_string(),
                }
            }
        };
        match serde_json::from_slice::<Option<Vec<PrintJob>>>(&content) {
            Ok(jobs) => SnapshotRead::Loaded {
                jobs: jobs.unwrap_or_default(),
                modified,
            },
            Err(e) => SnapshotRead::Corrupt {
                modified,
                error: e.to_string(),
            },
        }
    }

    /// Replace the snapshot with `jobs`. Returns the new modification time.
    pub fn write(&self, jobs: &[PrintJob]) -> Result<SystemTime> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".jobs-")
            .suffix(".tmp")
            .tempfile_in(dir)
            .context("Failed to create temporary snapshot file")?;
        serde_json::to_writer_pretty(&mut tmp, jobs).context("Failed to serialize jobs")?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        self.modified()
            .context("Snapshot vanished right after being written")
    }

    /// Delete the snapshot. A missing file is not an error.
    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
