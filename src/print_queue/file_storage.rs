//! Durable per-job copies of print sources, one `<job id>.pdf` per job.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const JOB_FILE_EXTENSION: &str = "pdf";

pub struct JobFileStorage {
    dir: PathBuf,
}

impl JobFileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, job_id: &str) -> PathBuf {
        self.dir.join(format!("{job_id}.{JOB_FILE_EXTENSION}"))
    }

    /// Copy `source` into the durable slot of `job_id`.
    pub async fn copy_in(&self, job_id: &str, source: &Path) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.path_for(job_id);
        tokio::fs::copy(source, &target).await?;
        debug!("Persisted {} to {}", source.display(), target.display());
        Ok(target)
    }

    /// Best-effort delete of a job file.
    pub fn remove(&self, path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed job file {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove job file {}: {}", path.display(), e),
        }
    }

    fn files(&self) -> impl Iterator<Item = PathBuf> {
        WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
    }

    /// Delete every file in the storage directory not listed in `claimed`.
    /// Returns how many files were removed.
    pub fn sweep_orphans(&self, claimed: &HashSet<PathBuf>) -> usize {
        let mut removed = 0;
        for path in self.files() {
            if claimed.contains(&path) {
                continue;
            }
            info!("Removing orphan print file: {}", path.display());
            self.remove(&path);
            removed += 1;
        }
        removed
    }

    /// Delete every file in the storage directory.
    pub fn clear(&self) -> usize {
        self.sweep_orphans(&HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn storage(dir: &TempDir) -> JobFileStorage {
        JobFileStorage::new(dir.path().join("print_jobs"))
    }

    #[test]
    fn test_path_for() {
        let storage = JobFileStorage::new(PathBuf::from("/data/print_jobs"));
        assert_eq!(
            storage.path_for("abc"),
            PathBuf::from("/data/print_jobs/abc.pdf")
        );
    }

    #[tokio::test]
    async fn test_copy_in_creates_dir_and_copies() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let source = dir.path().join("upload.bin");
        std::fs::write(&source, b"%PDF-1.4").unwrap();

        let target = storage.copy_in("job-1", &source).await.unwrap();
        assert_eq!(target, storage.path_for("job-1"));
        assert_eq!(std::fs::read(&target).unwrap(), b"%PDF-1.4");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_copy_in_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        let result = storage.copy_in("job-1", &dir.path().join("nope")).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_orphans_keeps_claimed() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        std::fs::create_dir_all(storage.dir()).unwrap();
        let kept = storage.path_for("kept");
        let orphan = storage.path_for("orphan");
        std::fs::write(&kept, b"k").unwrap();
        std::fs::write(&orphan, b"o").unwrap();

        let claimed: HashSet<PathBuf> = [kept.clone()].into_iter().collect();
        assert_eq!(storage.sweep_orphans(&claimed), 1);
        assert!(kept.exists());
        assert!(!orphan.exists());
    }

    #[test]
    fn test_clear_and_missing_dir() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        assert_eq!(storage.clear(), 0);

        std::fs::create_dir_all(storage.dir()).unwrap();
        std::fs::write(storage.path_for("a"), b"a").unwrap();
        std::fs::write(storage.dir().join("stray.txt"), b"x").unwrap();
        assert_eq!(storage.clear(), 2);
        assert!(storage.dir().exists());
    }

    #[test]
    fn test_remove_missing_is_silent() {
        let dir = TempDir::new().unwrap();
        let storage = storage(&dir);
        storage.remove(&storage.path_for("ghost"));
    }
}
