//! Test catalog setup
//!
//! Builds the service exactly as the binaries do, from resolved
//! configuration, with a temporary SQLite cache.

use super::constants::{ADMIN_KEY, APP_ID, INDEX_NAME, SEARCH_KEY};
use super::server::FakeIndexServer;
use session_chords::config::{AppConfig, CliConfig};
use session_chords::sync::{CatalogSyncService, StaticCredentialProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestCatalog {
    pub service: CatalogSyncService,
    pub credentials: Arc<StaticCredentialProvider>,
    pub cache_db_path: PathBuf,
    _cache_dir: TempDir,
}

impl TestCatalog {
    /// Connected to `server`, granting the admin key on request.
    pub async fn online(server: &FakeIndexServer) -> Self {
        Self::connect(
            &server.base_url,
            StaticCredentialProvider::granting(ADMIN_KEY),
        )
        .await
    }

    /// Built and initialized against `base_url` with a fresh cache.
    pub async fn connect(base_url: &str, credentials: StaticCredentialProvider) -> Self {
        let cache_dir = TempDir::new().expect("Failed to create temp dir");
        let cache_db_path = cache_dir.path().join("cache.db");
        let catalog = Self::build(base_url, credentials, cache_dir, cache_db_path);
        catalog.service.initialize().await;
        catalog
    }

    /// Rebuild over the same cache file, as a restarted client would.
    pub async fn reopen(self, base_url: &str, credentials: StaticCredentialProvider) -> Self {
        let TestCatalog {
            service,
            cache_db_path,
            _cache_dir,
            ..
        } = self;
        drop(service);
        let catalog = Self::build(base_url, credentials, _cache_dir, cache_db_path);
        catalog.service.initialize().await;
        catalog
    }

    fn build(
        base_url: &str,
        credentials: StaticCredentialProvider,
        cache_dir: TempDir,
        cache_db_path: PathBuf,
    ) -> Self {
        let cli = CliConfig {
            app_id: Some(APP_ID.to_string()),
            search_api_key: Some(SEARCH_KEY.to_string()),
            index_name: Some(INDEX_NAME.to_string()),
            base_url: Some(base_url.to_string()),
            request_timeout_sec: Some(2),
            cache_db_path: Some(cache_db_path.clone()),
        };
        let config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");
        let credentials = Arc::new(credentials);
        let service = config
            .build_service(credentials.clone())
            .expect("Failed to build service");
        Self {
            service,
            credentials,
            cache_db_path,
            _cache_dir: cache_dir,
        }
    }
}
