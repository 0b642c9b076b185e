//! Text format for catalog export and import.
//!
//! Exports are a pretty-printed JSON array of records using the index wire
//! names. Imports also accept the older title-keyed object, optionally
//! wrapped as `const irishSongs = {...};`.

use super::models::{CatalogRecord, RecordDraft, Sections};
use super::validation::{ValidationError, ValidationResult};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use std::fmt;

const LEGACY_PREFIX: &str = "const irishSongs =";

/// Spacing between staggered creation timestamps of converted legacy entries.
pub const LEGACY_STAGGER_MS: i64 = 1000;

/// One entry of the title-keyed legacy format.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct LegacySong {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(rename = "type", default)]
    pub style_type: Option<String>,
    #[serde(default)]
    pub chords: Sections,
    #[serde(default)]
    pub hidden: bool,
}

impl LegacySong {
    pub fn into_draft(self, title: impl Into<String>) -> RecordDraft {
        RecordDraft {
            title: title.into(),
            key: self.key,
            time_signature: self.time,
            style_type: self.style_type,
            sections: self.chords,
            hidden: self.hidden,
        }
    }
}

/// Title-keyed legacy catalog in file order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LegacyCatalog(pub Vec<(String, LegacySong)>);

struct LegacyCatalogVisitor;

impl<'de> Visitor<'de> for LegacyCatalogVisitor {
    type Value = LegacyCatalog;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of song titles to songs")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<LegacyCatalog, A::Error> {
        let mut entries = Vec::new();
        while let Some((title, song)) = access.next_entry::<String, LegacySong>()? {
            entries.push((title, song));
        }
        Ok(LegacyCatalog(entries))
    }
}

impl<'de> Deserialize<'de> for LegacyCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(LegacyCatalogVisitor)
    }
}

impl LegacyCatalog {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to records. Each entry is created `LEGACY_STAGGER_MS` before
    /// the previous one, so no two share a creation time.
    pub fn into_records(self, now_ms: i64) -> Vec<CatalogRecord> {
        self.0
            .into_iter()
            .enumerate()
            .map(|(index, (title, song))| {
                let created = now_ms - index as i64 * LEGACY_STAGGER_MS;
                let mut record = CatalogRecord::from_draft(song.into_draft(title), created);
                record.modified_at = now_ms;
                record
            })
            .collect()
    }
}

/// Serialize records to the export text format.
pub fn export_records(records: &[CatalogRecord]) -> ValidationResult<String> {
    serde_json::to_string_pretty(records).map_err(|e| ValidationError::Parse(e.to_string()))
}

/// Remove the `const irishSongs = ...;` wrapper if present.
fn unwrap_legacy_text(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix(LEGACY_PREFIX) {
        Some(rest) => rest.trim().trim_end_matches(';').trim_end(),
        None => trimmed,
    }
}

/// Parse a title-keyed legacy catalog.
pub fn parse_legacy_catalog(text: &str) -> ValidationResult<LegacyCatalog> {
    serde_json::from_str(unwrap_legacy_text(text)).map_err(|e| ValidationError::Parse(e.to_string()))
}

/// Parse any accepted catalog text into records.
///
/// Records from the array form keep their ids and timestamps. Legacy
/// entries become new records created at `now_ms`. Derived search text is
/// always recomputed.
pub fn parse_catalog_text(text: &str, now_ms: i64) -> ValidationResult<Vec<CatalogRecord>> {
    let body = unwrap_legacy_text(text);
    if body.starts_with('[') {
        let mut records: Vec<CatalogRecord> =
            serde_json::from_str(body).map_err(|e| ValidationError::Parse(e.to_string()))?;
        for record in &mut records {
            record.refresh_searchable_text();
        }
        Ok(records)
    } else if body.starts_with('{') {
        Ok(parse_legacy_catalog(body)?.into_records(now_ms))
    } else {
        Err(ValidationError::Parse(
            "expected a JSON array of records or a title-keyed object".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY_TEXT: &str = r#"const irishSongs = {
  "The Kesh Jig": {
    "key": "G",
    "time": "6/8",
    "type": "Jig",
    "chords": {
      "B Part": "Em | Em | D | D",
      "A Part": ["G", "|", "G", "|", "C", "|", "G"]
    }
  },
  "Danny Boy": {
    "chords": { "Verse": "C | C7 | F | C" }
  }
};"#;

    #[test]
    fn test_parse_legacy_wrapped_text() {
        let catalog = parse_legacy_catalog(LEGACY_TEXT).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.0[0].0, "The Kesh Jig");
        assert_eq!(catalog.0[1].1.key, None);

        let records = catalog.into_records(10_000);
        let kesh = &records[0];
        assert_eq!(kesh.id, "the-kesh-jig");
        assert_eq!(
            kesh.sections.names().collect::<Vec<_>>(),
            vec!["B Part", "A Part"]
        );
        assert_eq!(kesh.sections.get("A Part"), Some("G | G | C | G"));
        assert_eq!(records[1].created_at, 9_000);
        assert_eq!(records[1].key, "Unknown");
    }

    #[test]
    fn test_export_then_parse_preserves_fields() {
        let mut records = parse_catalog_text(LEGACY_TEXT, 0).unwrap();
        records[1].hidden = true;

        let text = export_records(&records).unwrap();
        assert!(text.starts_with('['));

        let parsed = parse_catalog_text(&text, 99).unwrap();
        assert_eq!(parsed.len(), records.len());
        for (before, after) in records.iter().zip(&parsed) {
            assert_eq!(before.id, after.id);
            assert_eq!(before.title, after.title);
            assert_eq!(before.key, after.key);
            assert_eq!(before.time_signature, after.time_signature);
            assert_eq!(before.style_type, after.style_type);
            assert_eq!(before.sections, after.sections);
            assert_eq!(before.hidden, after.hidden);
        }
    }

    #[test]
    fn test_parse_recomputes_searchable_text() {
        let text = r#"[{"objectID": "danny-boy", "title": "Danny Boy",
            "chords": {"Verse": "C | F"}, "searchableText": "bogus"}]"#;
        let records = parse_catalog_text(text, 0).unwrap();
        assert_eq!(records[0].searchable_text, "Danny Boy Unknown Traditional C | F");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_catalog_text("not a catalog", 0),
            Err(ValidationError::Parse(_))
        ));
        assert!(matches!(
            parse_catalog_text("[{\"title\": 3}]", 0),
            Err(ValidationError::Parse(_))
        ));
    }
}
