//! Opening files with the desktop's default application.

use super::command::spawn_detached;
use super::PrinterError;
use std::path::Path;

/// Opens a file for the user to look at.
#[cfg_attr(feature = "mock", mockall::automock)]
pub trait FileViewer: Send + Sync {
    fn open(&self, file: &Path) -> Result<(), PrinterError>;
}

/// Launches the platform opener and returns without waiting for it.
/// Needs a tokio runtime to reap the opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemViewer;

impl FileViewer for SystemViewer {
    fn open(&self, file: &Path) -> Result<(), PrinterError> {
        if file.as_os_str().is_empty() {
            return Err(PrinterError::EmptyPath);
        }
        let (program, args) = opener_command(file);
        spawn_detached(program, args).map(|_| ())
    }
}

#[cfg(target_os = "windows")]
fn opener_command(file: &Path) -> (&'static str, Vec<String>) {
    let literal = super::windows::ps_quote(&file.to_string_lossy());
    (
        "powershell",
        vec![
            "-NoProfile".to_string(),
            "-Command".to_string(),
            format!("Start-Process {literal}"),
        ],
    )
}

#[cfg(target_os = "macos")]
fn opener_command(file: &Path) -> (&'static str, Vec<String>) {
    ("open", vec![file.to_string_lossy().into_owned()])
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener_command(file: &Path) -> (&'static str, Vec<String>) {
    ("xdg-open", vec![file.to_string_lossy().into_owned()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_path_rejected() {
        let err = SystemViewer.open(Path::new("")).unwrap_err();
        assert!(matches!(err, PrinterError::EmptyPath));
    }

    #[test]
    fn test_opener_receives_file() {
        let (_, args) = opener_command(Path::new("/tmp/report.pdf"));
        assert!(args.last().unwrap().contains("report.pdf"));
    }
}
