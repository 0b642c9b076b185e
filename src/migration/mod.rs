//! Bulk import of a legacy song catalog through the sync service.

mod importer;
mod report;
mod seed;

pub use importer::MigrationImporter;
pub use report::{LogEntry, LogLevel, MigrationLog, MigrationReport};
pub use seed::{load_seed_file, seed_catalog, SEED_SONGS_JSON};
