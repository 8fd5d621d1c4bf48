//! Turning an inbound print source into a local temporary file.

use async_trait::async_trait;
use base64::Engine;
use std::io::Write;
use std::time::Duration;
use tempfile::TempPath;
use thiserror::Error;
use tracing::debug;

/// Display name used for jobs whose source is inline base64 data.
pub const BASE64_FILE_NAME: &str = "base64_data.pdf";

const USER_AGENT: &str = concat!("Print-Agent/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("failed to decode base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bad status: {0}")]
    BadStatus(reqwest::StatusCode),

    #[error("failed to write temporary file: {0}")]
    Io(#[from] std::io::Error),
}

/// Where the bytes of a print job come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Url(String),
    /// Base64 payload, optionally prefixed with a `data:` URL header.
    Base64(String),
}

impl FileSource {
    pub fn display_name(&self) -> String {
        match self {
            FileSource::Url(url) => url.clone(),
            FileSource::Base64(_) => BASE64_FILE_NAME.to_string(),
        }
    }
}

/// Fetches a [`FileSource`] into a temporary file that is deleted on drop.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    async fn fetch(&self, source: &FileSource) -> Result<TempPath, AcquireError>;
}

/// Strip a `data:...;base64,` header and decode the rest.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, AcquireError> {
    let data = match payload.find(',') {
        Some(idx) => &payload[idx + 1..],
        None => payload,
    };
    let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(data)?)
}

fn write_temp(bytes: &[u8]) -> Result<TempPath, AcquireError> {
    let mut file = tempfile::Builder::new()
        .prefix("agent-print-")
        .suffix(".pdf")
        .tempfile()?;
    file.write_all(bytes)?;
    file.flush()?;
    Ok(file.into_temp_path())
}

/// Downloads URLs over HTTP and decodes inline base64.
pub struct HttpFileFetcher {
    client: reqwest::Client,
}

impl HttpFileFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<TempPath, AcquireError> {
        debug!("Downloading print source {}", url);
        let response = self.client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(AcquireError::BadStatus(response.status()));
        }
        let bytes = response.bytes().await?;
        write_temp(&bytes)
    }
}

#[async_trait]
impl FileFetcher for HttpFileFetcher {
    async fn fetch(&self, source: &FileSource) -> Result<TempPath, AcquireError> {
        match source {
            FileSource::Url(url) => self.download(url).await,
            FileSource::Base64(payload) => {
                let bytes = decode_base64(payload)?;
                write_temp(&bytes)
            }
        }
    }
}
