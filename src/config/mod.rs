mod file_config;

pub use file_config::FileConfig;

use crate::cache::SqliteCacheStore;
use crate::remote::{AlgoliaConfig, AlgoliaIndexClient, ReadCredential};
use crate::sync::{CatalogSyncService, CredentialProvider};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_INDEX_NAME: &str = "irish_music_songs";
pub const DEFAULT_REQUEST_TIMEOUT_SEC: u64 = 10;
pub const DEFAULT_CACHE_DB_PATH: &str = "session-chords.db";

/// Environment variables read when neither the CLI nor its `env` binding
/// supplied a value.
const FALLBACK_APP_ID_VAR: &str = "VITE_ALGOLIA_APP_ID";
const FALLBACK_SEARCH_KEY_VAR: &str = "VITE_ALGOLIA_SEARCH_API_KEY";
const FALLBACK_INDEX_NAME_VAR: &str = "VITE_ALGOLIA_INDEX_NAME";

/// CLI arguments that can be used for config resolution.
/// Values bound to `ALGOLIA_*` environment variables arrive here through clap.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub app_id: Option<String>,
    pub search_api_key: Option<String>,
    pub index_name: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_sec: Option<u64>,
    pub cache_db_path: Option<PathBuf>,
}

impl CliConfig {
    /// Fill unset remote settings from the `VITE_`-prefixed variables.
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks(|name| std::env::var(name).ok())
    }

    fn with_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if self.app_id.is_none() {
            self.app_id = lookup(FALLBACK_APP_ID_VAR);
        }
        if self.search_api_key.is_none() {
            self.search_api_key = lookup(FALLBACK_SEARCH_KEY_VAR);
        }
        if self.index_name.is_none() {
            self.index_name = lookup(FALLBACK_INDEX_NAME_VAR);
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Empty when not configured. The service then starts offline.
    pub app_id: String,
    pub search_api_key: String,
    pub index_name: String,
    pub base_url: Option<String>,
    pub request_timeout: Duration,
    pub cache_db_path: PathBuf,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let app_id = file
            .app_id
            .or_else(|| cli.app_id.clone())
            .unwrap_or_default()
            .trim()
            .to_string();
        let search_api_key = file
            .search_api_key
            .or_else(|| cli.search_api_key.clone())
            .unwrap_or_default()
            .trim()
            .to_string();

        let index_name = file
            .index_name
            .or_else(|| cli.index_name.clone())
            .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());
        if index_name.trim().is_empty() {
            bail!("index_name must not be empty");
        }

        let base_url = file.base_url.or_else(|| cli.base_url.clone());
        if let Some(url) = &base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                bail!("base_url must be an http(s) URL: {}", url);
            }
        }

        let request_timeout_sec = file
            .request_timeout_sec
            .or(cli.request_timeout_sec)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SEC);
        if request_timeout_sec == 0 {
            bail!("request_timeout_sec must be greater than zero");
        }

        let cache_db_path = file
            .cache_db_path
            .map(PathBuf::from)
            .or_else(|| cli.cache_db_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DB_PATH));
        if cache_db_path.is_dir() {
            bail!("cache_db_path is a directory: {:?}", cache_db_path);
        }

        Ok(Self {
            app_id,
            search_api_key,
            index_name,
            base_url,
            request_timeout: Duration::from_secs(request_timeout_sec),
            cache_db_path,
        })
    }

    pub fn algolia_config(&self) -> AlgoliaConfig {
        AlgoliaConfig {
            app_id: self.app_id.clone(),
            index_name: self.index_name.clone(),
            base_url: self.base_url.clone(),
            timeout: self.request_timeout,
        }
    }

    pub fn read_credential(&self) -> ReadCredential {
        ReadCredential::new(self.search_api_key.clone())
    }

    pub fn remote_configured(&self) -> bool {
        !self.app_id.is_empty() && !self.search_api_key.is_empty()
    }

    /// Open the cache and build an uninitialized service over the
    /// configured index.
    pub fn build_service(
        &self,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<CatalogSyncService> {
        info!("Opening local cache at {:?}...", self.cache_db_path);
        let cache = SqliteCacheStore::new(&self.cache_db_path)
            .with_context(|| format!("Failed to open cache at {:?}", self.cache_db_path))?;
        let remote = AlgoliaIndexClient::new(self.algolia_config())
            .context("Failed to create remote index client")?;
        Ok(
            CatalogSyncService::new(Arc::new(remote), Arc::new(cache), self.read_credential())
                .with_credential_provider(credentials),
        )
    }
}
