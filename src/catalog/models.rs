//! Catalog record models.
//!
//! The serialized field names follow the hosted index object layout
//! (`objectID`, `time`, `type`, `chords`, ...) so the same structs are used
//! for the remote index, the local cache snapshot and the export format.

use super::id::derive_id;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const DEFAULT_KEY: &str = "Unknown";
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";
pub const DEFAULT_STYLE_TYPE: &str = "Traditional";

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

fn default_time_signature() -> String {
    DEFAULT_TIME_SIGNATURE.to_string()
}

fn default_style_type() -> String {
    DEFAULT_STYLE_TYPE.to_string()
}

fn or_default(value: Option<String>, default: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => default.to_string(),
    }
}

// =============================================================================
// Sections
// =============================================================================

/// Ordered mapping from section name ("A Part", "Chorus", ...) to a
/// measure-delimited progression string such as `"G | C | D G"`.
///
/// Serialized as a JSON object whose key order is the section order. On
/// input a section may also be given as a list of tokens, which is joined
/// with single spaces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sections(Vec<(String, String)>);

impl Sections {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Insert a section, replacing the progression in place if the name is
    /// already present.
    pub fn insert(&mut self, name: impl Into<String>, progression: impl Into<String>) {
        let name = name.into();
        let progression = progression.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = progression,
            None => self.0.push((name, progression)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, p)| (n.as_str(), p.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trim names and progressions and drop sections left empty.
    fn normalized(self) -> Self {
        self.0
            .into_iter()
            .map(|(n, p)| (n.trim().to_string(), p.trim().to_string()))
            .filter(|(n, p)| !n.is_empty() && !p.is_empty())
            .collect()
    }
}

impl<N: Into<String>, P: Into<String>> FromIterator<(N, P)> for Sections {
    fn from_iter<I: IntoIterator<Item = (N, P)>>(iter: I) -> Self {
        let mut sections = Sections::new();
        for (name, progression) in iter {
            sections.insert(name, progression);
        }
        sections
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, progression) in &self.0 {
            map.serialize_entry(name, progression)?;
        }
        map.end()
    }
}

/// A section progression as found in stored data: either the delimited
/// string or the older list-of-tokens form.
#[derive(Deserialize)]
#[serde(untagged)]
enum SectionInput {
    Text(String),
    Tokens(Vec<String>),
}

impl From<SectionInput> for String {
    fn from(input: SectionInput) -> Self {
        match input {
            SectionInput::Text(text) => text,
            SectionInput::Tokens(tokens) => tokens.join(" "),
        }
    }
}

struct SectionsVisitor;

impl<'de> Visitor<'de> for SectionsVisitor {
    type Value = Sections;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of section names to chord progressions")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Sections, A::Error> {
        let mut sections = Sections::new();
        while let Some((name, progression)) = access.next_entry::<String, SectionInput>()? {
            sections.insert(name, String::from(progression));
        }
        Ok(sections)
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SectionsVisitor)
    }
}

// =============================================================================
// Catalog Record
// =============================================================================

/// One chord-chart entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    #[serde(rename = "objectID")]
    pub id: String,
    pub title: String,
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(rename = "time", default = "default_time_signature")]
    pub time_signature: String,
    #[serde(rename = "type", default = "default_style_type")]
    pub style_type: String,
    #[serde(rename = "chords", default)]
    pub sections: Sections,
    #[serde(default)]
    pub hidden: bool,
    #[serde(rename = "dateCreated", default)]
    pub created_at: i64,
    #[serde(rename = "dateModified", default)]
    pub modified_at: i64,
    /// Derived from the other fields on every write.
    #[serde(rename = "searchableText", default)]
    pub searchable_text: String,
    /// Owned by the remote backend; carried through untouched.
    #[serde(default)]
    pub popularity: i64,
}

impl CatalogRecord {
    /// Build a fresh record from a draft. Both timestamps are set to `now_ms`.
    pub fn from_draft(draft: RecordDraft, now_ms: i64) -> Self {
        let title = draft.title.trim().to_string();
        let mut record = CatalogRecord {
            id: derive_id(&title),
            title,
            key: or_default(draft.key, DEFAULT_KEY),
            time_signature: or_default(draft.time_signature, DEFAULT_TIME_SIGNATURE),
            style_type: or_default(draft.style_type, DEFAULT_STYLE_TYPE),
            sections: draft.sections.normalized(),
            hidden: draft.hidden,
            created_at: now_ms,
            modified_at: now_ms,
            searchable_text: String::new(),
            popularity: 0,
        };
        record.refresh_searchable_text();
        record
    }

    /// Apply a draft on top of an existing record with the same id.
    ///
    /// Keeps `created_at` and `popularity`, advances `modified_at`.
    pub fn apply_draft(&self, draft: RecordDraft, now_ms: i64) -> Self {
        let mut updated = CatalogRecord::from_draft(draft, now_ms);
        updated.created_at = self.created_at;
        updated.popularity = self.popularity;
        updated.modified_at = self.modified_at.max(self.created_at).max(now_ms);
        updated
    }

    /// Prepare a record for a write: recompute derived text and bump
    /// `modified_at` without ever moving it backwards.
    pub fn touch(&mut self, now_ms: i64) {
        if self.created_at == 0 {
            self.created_at = now_ms;
        }
        self.modified_at = self.modified_at.max(self.created_at).max(now_ms);
        self.refresh_searchable_text();
    }

    pub fn refresh_searchable_text(&mut self) {
        self.searchable_text =
            build_searchable_text(&self.title, &self.key, &self.style_type, &self.sections);
    }

    /// Case-insensitive substring match used when searching the cache.
    pub fn matches_query(&self, lowercase_query: &str) -> bool {
        lowercase_query.is_empty()
            || self.title.to_lowercase().contains(lowercase_query)
            || self.key.to_lowercase().contains(lowercase_query)
            || self.style_type.to_lowercase().contains(lowercase_query)
    }
}

pub fn build_searchable_text(title: &str, key: &str, style_type: &str, sections: &Sections) -> String {
    let chord_text = sections
        .iter()
        .map(|(_, progression)| progression)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {} {} {}", title, key, style_type, chord_text)
}

// =============================================================================
// Record Draft
// =============================================================================

/// Collaborator-supplied content for a save.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    pub title: String,
    pub key: Option<String>,
    pub time_signature: Option<String>,
    pub style_type: Option<String>,
    #[serde(default)]
    pub sections: Sections,
    #[serde(default)]
    pub hidden: bool,
}

impl RecordDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_time_signature(mut self, time_signature: impl Into<String>) -> Self {
        self.time_signature = Some(time_signature.into());
        self
    }

    pub fn with_style_type(mut self, style_type: impl Into<String>) -> Self {
        self.style_type = Some(style_type.into());
        self
    }

    pub fn with_section(mut self, name: impl Into<String>, progression: impl Into<String>) -> Self {
        self.sections.insert(name, progression);
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    /// The id this draft will be stored under.
    pub fn derived_id(&self) -> String {
        derive_id(&self.title)
    }
}

impl From<&CatalogRecord> for RecordDraft {
    fn from(record: &CatalogRecord) -> Self {
        RecordDraft {
            title: record.title.clone(),
            key: Some(record.key.clone()),
            time_signature: Some(record.time_signature.clone()),
            style_type: Some(record.style_type.clone()),
            sections: record.sections.clone(),
            hidden: record.hidden,
        }
    }
}
