//! The bundled seed catalog and loading of external seed files.

use crate::catalog::{parse_legacy_catalog, LegacyCatalog, ValidationResult};
use anyhow::{Context, Result};
use std::path::Path;

/// Twelve Irish session tunes in the title-keyed legacy format.
pub const SEED_SONGS_JSON: &str = include_str!("../../data/seed_songs.json");

pub fn seed_catalog() -> ValidationResult<LegacyCatalog> {
    parse_legacy_catalog(SEED_SONGS_JSON)
}

/// Load a legacy catalog from disk. The file may be plain JSON or the
/// `const irishSongs = {...};` export.
pub fn load_seed_file(path: &Path) -> Result<LegacyCatalog> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    let catalog = parse_legacy_catalog(&text)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
    Ok(catalog)
}
