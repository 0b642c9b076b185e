mod export;
mod id;
mod models;
mod validation;

pub use export::{
    export_records, parse_catalog_text, parse_legacy_catalog, LegacyCatalog, LegacySong,
    LEGACY_STAGGER_MS,
};
pub use id::{derive_id, MAX_ID_LEN};
pub use models::*;
pub use validation::{
    check_id_collision, validate_batch, validate_record, ValidationError, ValidationResult,
};
