//! Print Agent Library
//!
//! Local print agent: accepts print jobs over HTTP, tracks their lifecycle
//! on disk and follows them through the OS spooler. The modules are exposed
//! for the binary and for end-to-end tests.

pub mod acquisition;
pub mod config;
pub mod metrics;
pub mod print_queue;
pub mod printer;
pub mod server;

// Re-export commonly used types for convenience
pub use print_queue::{JobStatus, JobStore, PrintJob, PrintPipeline};
pub use server::{make_app, run_server, RequestsLoggingLevel};
