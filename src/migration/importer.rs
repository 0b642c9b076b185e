use super::report::{MigrationLog, MigrationReport};
use super::seed::seed_catalog;
use crate::catalog::{
    now_millis, validate_record, CatalogRecord, LegacyCatalog, LegacySong, ValidationResult,
};
use crate::sync::{Backend, CatalogError, CatalogSyncService};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
enum MigrationError {
    #[error("Data validation failed with {0} error(s)")]
    Validation(usize),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Verification failed: {0}")]
    Verification(String),
}

/// Loads a legacy catalog into the service in one batch.
///
/// The importer is an ordinary client: elevation, cache mirroring and the
/// offline fallback are handled by the service.
pub struct MigrationImporter<'a> {
    service: &'a CatalogSyncService,
    seed: LegacyCatalog,
    log: MigrationLog,
}

impl<'a> MigrationImporter<'a> {
    /// Importer for the bundled seed catalog.
    pub fn new(service: &'a CatalogSyncService) -> ValidationResult<Self> {
        Ok(Self::with_seed(service, seed_catalog()?))
    }

    pub fn with_seed(service: &'a CatalogSyncService, seed: LegacyCatalog) -> Self {
        Self {
            service,
            seed,
            log: MigrationLog::new(),
        }
    }

    pub async fn run(mut self) -> MigrationReport {
        self.log.info("Starting catalog migration");
        match self.migrate().await {
            Ok(records_count) => {
                self.log.info("Migration completed successfully");
                MigrationReport {
                    success: true,
                    records_count,
                    error: None,
                    log: self.log.into_entries(),
                }
            }
            Err(e) => {
                self.log.error(format!("Migration failed: {}", e));
                MigrationReport {
                    success: false,
                    records_count: 0,
                    error: Some(e.to_string()),
                    log: self.log.into_entries(),
                }
            }
        }
    }

    async fn migrate(&mut self) -> Result<usize, MigrationError> {
        let status = self.service.connection_status();
        if status.connected {
            self.log.info("Connected to the remote index");
        } else {
            self.log.warning(
                "Remote index unreachable, migration will only update the local cache",
            );
        }

        self.log.info("Converting seed data");
        let entries = std::mem::take(&mut self.seed.0);
        let songs: Vec<LegacySong> = entries.iter().map(|(_, song)| song.clone()).collect();
        let records = LegacyCatalog(entries).into_records(now_millis());
        self.log.info(format!("Converted {} songs", records.len()));

        self.log.info("Validating converted data");
        let errors = self.check(&songs, &records);
        if !errors.is_empty() {
            let count = errors.len();
            for error in errors {
                self.log.error(error);
            }
            return Err(MigrationError::Validation(count));
        }

        self.log.info("Uploading songs");
        let count = records.len();
        let outcome = self.service.batch_save(records).await?;
        for warning in &outcome.warnings {
            self.log.warning(warning.to_string());
        }
        self.log.info(format!(
            "Migrated {} songs ({})",
            count,
            outcome.applied_to.as_str()
        ));
        if outcome.applied_to == Backend::Remote {
            self.log.info("Elevated session released");
        }

        self.log.info("Verifying migration");
        self.verify().await?;
        Ok(count)
    }

    /// Returns the blocking errors. Warnings go straight to the log.
    fn check(&mut self, songs: &[LegacySong], records: &[CatalogRecord]) -> Vec<String> {
        let mut errors = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();

        for (index, (song, record)) in songs.iter().zip(records).enumerate() {
            if let Err(e) = validate_record(record) {
                errors.push(format!("Song {}: {}", index, e));
            }
            if song.key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                self.log.warning(format!("Song {}: Missing key", index));
            }
            if song.style_type.as_deref().map_or(true, |t| t.trim().is_empty()) {
                self.log.warning(format!("Song {}: Missing type", index));
            }
            *seen.entry(record.id.as_str()).or_default() += 1;
        }

        let mut duplicates: Vec<&str> = seen
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(id, _)| id)
            .collect();
        duplicates.sort_unstable();
        for id in duplicates {
            errors.push(format!("Duplicate id found: {}", id));
        }
        errors
    }

    async fn verify(&mut self) -> Result<(), MigrationError> {
        let listing = self.service.list(false).await;
        let Some(first) = listing.first() else {
            return Err(MigrationError::Verification(
                "no songs found after migration".to_string(),
            ));
        };

        let jigs = self.service.search("jig").await;
        self.log
            .info(format!("Search test: found {} jigs", jigs.len()));

        if self.service.get(&first.id).await.is_err() {
            return Err(MigrationError::Verification(format!(
                "failed to retrieve '{}'",
                first.id
            )));
        }
        self.log.info("All verification checks passed");
        Ok(())
    }
}
