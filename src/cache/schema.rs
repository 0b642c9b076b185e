//! SQLite schema for the local cache database.
//!
//! A single key-value table. The catalog snapshot lives under
//! [`SNAPSHOT_KEY`] as a JSON array of records.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};
use anyhow::Result;
use rusqlite::Connection;

/// Well-known key of the catalog snapshot.
pub const SNAPSHOT_KEY: &str = "irish_songs_cache";

const KV_STORE_TABLE_V0: Table = Table {
    name: "kv_store",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
    ],
};

/// V1 adds the last-write time (epoch seconds) of each entry.
const KV_STORE_TABLE_V1: Table = Table {
    name: "kv_store",
    columns: &[
        sqlite_column!("key", &SqlType::Text, is_primary_key = true),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!(
            "updated_at",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
};

fn migrate_v0_to_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "ALTER TABLE kv_store ADD COLUMN updated_at INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

pub const CACHE_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[KV_STORE_TABLE_V0],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[KV_STORE_TABLE_V1],
        migration: Some(migrate_v0_to_v1),
    },
];
