//! Print job lifecycle: the job store, its on-disk state, the per-job
//! pipeline and the spooler reconciliation loop.

mod file_storage;
pub mod models;
mod notifier;
mod pipeline;
mod reconciler;
mod snapshot_file;
mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use file_storage::JobFileStorage;
pub use models::{JobStatus, NewJob, PrintJob};
pub use notifier::{ChangeNotifier, RecordingNotifier};
pub use pipeline::{PipelineError, PrintPipeline, PrintRequest};
pub use reconciler::{Reconciler, TickOutcome};
pub use store::{
    JobStore, RecoveryReport, RetryRejected, MSG_FILE_MISSING, MSG_NO_FILE, MSG_RESTARTED,
};
