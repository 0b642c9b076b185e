//! Catalog Import Tool
//!
//! Loads the bundled seed songs, or a legacy title-keyed JSON file, into the
//! remote index and the local cache in one batch, then verifies the result.

use anyhow::{bail, Context, Result};
use clap::Parser;
use session_chords::cli_prompt::PromptCredentialProvider;
use session_chords::config::{AppConfig, CliConfig, FileConfig};
use session_chords::migration::{load_seed_file, LogLevel, MigrationImporter};
use session_chords::sync::{CredentialProvider, StaticCredentialProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "catalog-import")]
#[command(about = "Import the seed song catalog into the remote index and local cache")]
struct Args {
    /// Legacy catalog to import instead of the bundled seed songs.
    #[arg(long, value_name = "FILE")]
    seed_file: Option<PathBuf>,

    /// Write the migration log to this file.
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, env = "ALGOLIA_APP_ID")]
    app_id: Option<String>,

    #[arg(long, env = "ALGOLIA_SEARCH_API_KEY", hide_env_values = true)]
    search_api_key: Option<String>,

    #[arg(long, env = "ALGOLIA_INDEX_NAME")]
    index_name: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    cache_db: Option<PathBuf>,

    /// Admin API key. Prompted for when not given.
    #[arg(long = "admin-key", env = "ALGOLIA_ADMIN_API_KEY", hide_env_values = true)]
    admin_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = Args::parse();

    info!("Catalog Import Tool");
    info!("===================");

    let file_config = match &args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let cli_config = CliConfig {
        app_id: args.app_id.clone(),
        search_api_key: args.search_api_key.clone(),
        index_name: args.index_name.clone(),
        base_url: args.base_url.clone(),
        request_timeout_sec: None,
        cache_db_path: args.cache_db.clone(),
    }
    .with_env_fallbacks();
    let config = AppConfig::resolve(&cli_config, file_config)?;
    info!("Index: {}", config.index_name);
    info!("Local cache: {}", config.cache_db_path.display());

    let credentials: Arc<dyn CredentialProvider> = match args.admin_api_key.take() {
        Some(key) if !key.trim().is_empty() => Arc::new(StaticCredentialProvider::granting(key)),
        _ => Arc::new(PromptCredentialProvider),
    };

    let service = config.build_service(credentials)?;
    let status = service.initialize().await;
    if !status.connected {
        warn!("Remote index unavailable, only the local cache will be updated");
    }

    let importer = match &args.seed_file {
        Some(path) => {
            info!("Loading seed file {}", path.display());
            MigrationImporter::with_seed(&service, load_seed_file(path)?)
        }
        None => MigrationImporter::new(&service).context("Bundled seed data is invalid")?,
    };
    let report = importer.run().await;

    if let Some(path) = &args.log_file {
        report
            .write_log(path)
            .with_context(|| format!("Failed to write log to {}", path.display()))?;
        info!("Log written to {}", path.display());
    }

    info!("");
    info!("Import Summary");
    info!("==============");
    info!("Songs imported: {}", report.records_count);
    info!("Charts in catalog: {}", service.connection_status().cache_size);
    let warnings = report.count(LogLevel::Warning);
    if warnings > 0 {
        warn!("Warnings: {}", warnings);
    }

    if !report.success {
        let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
        error!("Import failed: {}", reason);
        bail!("Import failed: {}", reason);
    }

    info!("");
    info!("Import completed successfully!");
    Ok(())
}
