//! Shared test constants

/// Tiny PDF header, enough for the agent (it never parses the document).
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%test\n";

/// `PDF_BYTES` as base64.
pub const PDF_BASE64: &str = "JVBERi0xLjQKJXRlc3QK";

/// Same payload as a data URL, the way browsers hand it over.
pub const PDF_DATA_URL: &str = "data:application/pdf;base64,JVBERi0xLjQKJXRlc3QK";

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// How long tests wait for a background job to reach a state.
pub const JOB_SETTLE_TIMEOUT_MS: u64 = 5000;
