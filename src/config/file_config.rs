use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Remote index (can override CLI and environment)
    pub app_id: Option<String>,
    pub search_api_key: Option<String>,
    pub index_name: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_sec: Option<u64>,

    // Local cache
    pub cache_db_path: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
