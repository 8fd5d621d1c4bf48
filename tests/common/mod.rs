//! Common test infrastructure
//!
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_queue_starts_empty() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::new(server.base_url.clone());
//!     assert!(client.queue().await.is_empty());
//! }
//! ```

mod client;
mod constants;
mod fake_printer;
mod server;

pub use client::TestClient;
pub use constants::*;
pub use fake_printer::{FakePrinter, RecordingViewer, Submit};
pub use server::{FileHost, TestServer};
