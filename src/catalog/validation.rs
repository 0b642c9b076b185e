//! Validation for catalog records.
//!
//! Runs at the write boundary, before any remote or cache call is made.

use super::id::derive_id;
use super::models::CatalogRecord;
use std::collections::HashSet;
use thiserror::Error;

/// Validation error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Title is required but was empty")]
    EmptyTitle,

    #[error("Record id is empty (title '{title}' has no id characters)")]
    EmptyId { title: String },

    #[error("Record id '{id}' does not match its title (expected '{expected}')")]
    IdMismatch { id: String, expected: String },

    #[error("Record '{id}' has no chord sections")]
    NoSections { id: String },

    #[error("Record '{id}' has an empty section '{section}'")]
    EmptySection { id: String, section: String },

    #[error("Id '{id}' already belongs to '{existing_title}'")]
    IdCollision { id: String, existing_title: String },

    #[error("Duplicate id '{id}' in batch")]
    DuplicateId { id: String },

    #[error("Could not parse catalog text: {0}")]
    Parse(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a single record.
pub fn validate_record(record: &CatalogRecord) -> ValidationResult<()> {
    if record.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if record.id.trim().is_empty() {
        return Err(ValidationError::EmptyId {
            title: record.title.clone(),
        });
    }
    let expected = derive_id(&record.title);
    if record.id != expected {
        return Err(ValidationError::IdMismatch {
            id: record.id.clone(),
            expected,
        });
    }
    if record.sections.is_empty() {
        return Err(ValidationError::NoSections {
            id: record.id.clone(),
        });
    }
    if let Some((name, _)) = record
        .sections
        .iter()
        .find(|(name, progression)| name.trim().is_empty() || progression.trim().is_empty())
    {
        return Err(ValidationError::EmptySection {
            id: record.id.clone(),
            section: name.to_string(),
        });
    }
    Ok(())
}

/// Validate every record of a batch and reject repeated ids.
pub fn validate_batch(records: &[CatalogRecord]) -> ValidationResult<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        validate_record(record)?;
        if !seen.insert(record.id.as_str()) {
            return Err(ValidationError::DuplicateId {
                id: record.id.clone(),
            });
        }
    }
    Ok(())
}

/// Reject a new record whose id is already taken by a different title.
///
/// A record with the same title is the same tune and is overwritten.
pub fn check_id_collision(
    candidate: &CatalogRecord,
    existing: Option<&CatalogRecord>,
) -> ValidationResult<()> {
    match existing {
        Some(existing) if existing.title.trim() != candidate.title.trim() => {
            Err(ValidationError::IdCollision {
                id: candidate.id.clone(),
                existing_title: existing.title.clone(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::{RecordDraft, Sections};

    fn make_valid_record(title: &str) -> CatalogRecord {
        CatalogRecord::from_draft(
            RecordDraft::new(title).with_section("A Part", "G | C | D | G"),
            1_000,
        )
    }

    #[test]
    fn test_validate_record_valid() {
        assert!(validate_record(&make_valid_record("The Kesh Jig")).is_ok());
    }

    #[test]
    fn test_validate_record_empty_title() {
        let mut record = make_valid_record("The Kesh Jig");
        record.title = "  ".to_string();
        assert_eq!(validate_record(&record), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_validate_record_empty_id() {
        let record = make_valid_record("???");
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::EmptyId { .. })
        ));
    }

    #[test]
    fn test_validate_record_id_must_follow_title() {
        let mut record = make_valid_record("Danny Boy");
        record.id = "tune-17".to_string();
        assert_eq!(
            validate_record(&record),
            Err(ValidationError::IdMismatch {
                id: "tune-17".to_string(),
                expected: "danny-boy".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_record_zero_sections() {
        let mut record = make_valid_record("The Kesh Jig");
        record.sections = Sections::new();
        assert_eq!(
            validate_record(&record),
            Err(ValidationError::NoSections {
                id: "the-kesh-jig".to_string()
            })
        );
    }

    #[test]
    fn test_validate_record_blank_section() {
        let mut record = make_valid_record("The Kesh Jig");
        record.sections.insert("B Part", " ");
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::EmptySection { section, .. }) if section == "B Part"
        ));
    }

    #[test]
    fn test_validate_batch_duplicate_ids() {
        let records = vec![
            make_valid_record("The Kesh Jig"),
            make_valid_record("Cooley's Reel"),
            make_valid_record("the kesh jig!"),
        ];
        assert_eq!(
            validate_batch(&records),
            Err(ValidationError::DuplicateId {
                id: "the-kesh-jig".to_string()
            })
        );
    }

    #[test]
    fn test_check_id_collision() {
        let existing = make_valid_record("The Kesh Jig");
        let same_tune = make_valid_record("The Kesh Jig");
        let other_title = make_valid_record("the kesh jig!");

        assert!(check_id_collision(&same_tune, Some(&existing)).is_ok());
        assert!(check_id_collision(&other_title, None).is_ok());
        assert!(matches!(
            check_id_collision(&other_title, Some(&existing)),
            Err(ValidationError::IdCollision { existing_title, .. }) if existing_title == "The Kesh Jig"
        ));
    }
}
