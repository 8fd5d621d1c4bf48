use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub storage_dir: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,

    // Print queue tuning
    pub reconcile_interval_secs: Option<u64>,
    pub submit_timeout_secs: Option<u64>,
    pub download_timeout_secs: Option<u64>,

    /// Windows only: SumatraPDF executable used for silent printing.
    pub sumatra_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
