//! End-to-end tests for catalog synchronization
//!
//! Runs the sync service with the HTTP client and the SQLite cache against
//! a fake index server.

mod common;

use common::{FakeIndexServer, TestCatalog, ADMIN_KEY};
use serde_json::{json, Value};
use session_chords::catalog::RecordDraft;
use session_chords::sync::{Backend, CatalogError, CatalogEvent, ChangeReason, StaticCredentialProvider};

fn remote_record(id: &str, title: &str, style_type: &str, hidden: bool) -> Value {
    json!({
        "objectID": id,
        "title": title,
        "key": "G",
        "time": "6/8",
        "type": style_type,
        "chords": {"A Part": "G | D | G | D"},
        "hidden": hidden,
        "dateCreated": 1_000,
        "dateModified": 2_000,
        "searchableText": format!("{} G {} G | D | G | D", title, style_type),
        "popularity": 7
    })
}

fn kesh_jig() -> RecordDraft {
    RecordDraft::new("The Kesh Jig")
        .with_key("G")
        .with_time_signature("6/8")
        .with_style_type("Jig")
        .with_section("A Part", "G | G | G | D")
        .with_section("B Part", "G | C | G | D")
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_initialize_loads_remote_listing() {
    let server = FakeIndexServer::spawn_with(vec![
        remote_record("danny-boy", "Danny Boy", "Ballad", false),
        remote_record("the-parting-glass", "The Parting Glass", "Song", true),
    ])
    .await;
    let catalog = TestCatalog::online(&server).await;

    assert!(catalog.service.is_remote_available());
    assert_eq!(catalog.service.list(false).await.len(), 1);
    assert_eq!(catalog.service.list(true).await.len(), 2);

    let hidden = catalog.service.get("the-parting-glass").await.unwrap();
    assert!(hidden.hidden);
    assert_eq!(hidden.popularity, 7);
}

#[tokio::test]
async fn test_search_excludes_hidden_records() {
    let server = FakeIndexServer::spawn_with(vec![
        remote_record("morrisons-jig", "Morrison's Jig", "Jig", false),
        remote_record("the-kesh-jig", "The Kesh Jig", "Jig", true),
        remote_record("danny-boy", "Danny Boy", "Ballad", false),
    ])
    .await;
    let catalog = TestCatalog::online(&server).await;

    let hits = catalog.service.search("jig").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "morrisons-jig");
}

#[tokio::test]
async fn test_missing_record_is_not_found_and_stays_online() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;

    let result = catalog.service.get("no-such-tune").await;

    assert!(matches!(result, Err(CatalogError::NotFound(_))));
    assert!(catalog.service.is_remote_available());
}

#[tokio::test]
async fn test_unreachable_index_starts_offline() {
    let url = FakeIndexServer::closed_url().await;
    let catalog = TestCatalog::connect(&url, StaticCredentialProvider::granting(ADMIN_KEY)).await;

    let status = catalog.service.connection_status();
    assert!(!status.connected);
    assert!(!status.has_cache);
    assert!(catalog.service.list(true).await.is_empty());
}

// =============================================================================
// Elevated writes
// =============================================================================

#[tokio::test]
async fn test_save_elevates_with_admin_key() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;

    let outcome = catalog.service.save(kesh_jig(), None).await.unwrap();

    assert_eq!(outcome.applied_to, Backend::Remote);
    assert!(outcome.is_clean());
    assert_eq!(outcome.value.id, "the-kesh-jig");
    // First attempt with the search key, retry with the admin key.
    assert_eq!(server.rejected_writes(), 1);
    assert_eq!(server.accepted_writes(), 1);
    assert_eq!(catalog.credentials.requests(), 1);

    let stored = server.record("the-kesh-jig").unwrap();
    assert_eq!(stored["title"], "The Kesh Jig");
    assert_eq!(stored["time"], "6/8");
    assert_eq!(stored["chords"]["B Part"], "G | C | G | D");
    assert_eq!(stored["hidden"], false);
}

#[tokio::test]
async fn test_each_write_asks_for_a_new_credential() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;

    catalog.service.save(kesh_jig(), None).await.unwrap();
    catalog
        .service
        .save(kesh_jig().with_key("A"), Some("the-kesh-jig"))
        .await
        .unwrap();

    assert_eq!(catalog.credentials.requests(), 2);
    assert_eq!(server.rejected_writes(), 2);
    assert_eq!(server.record("the-kesh-jig").unwrap()["key"], "A");
}

#[tokio::test]
async fn test_declined_elevation_writes_nothing() {
    let server = FakeIndexServer::spawn().await;
    let catalog =
        TestCatalog::connect(&server.base_url, StaticCredentialProvider::declining()).await;

    let result = catalog.service.save(kesh_jig(), None).await;

    assert!(matches!(result, Err(CatalogError::ElevationDeclined { .. })));
    assert!(server.object_ids().is_empty());
    assert_eq!(server.accepted_writes(), 0);
    assert!(catalog.service.list(true).await.is_empty());
    assert!(catalog.service.is_remote_available());
}

#[tokio::test]
async fn test_wrong_admin_key_is_permission_denied() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::connect(
        &server.base_url,
        StaticCredentialProvider::granting("not-the-admin-key"),
    )
    .await;

    let result = catalog.service.save(kesh_jig(), None).await;

    assert!(matches!(result, Err(CatalogError::PermissionDenied(_))));
    assert_eq!(server.rejected_writes(), 2);
    assert!(server.object_ids().is_empty());
}

#[tokio::test]
async fn test_invalid_draft_never_reaches_the_index() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;

    let result = catalog
        .service
        .save(RecordDraft::new("Empty Tune"), None)
        .await;

    assert!(matches!(result, Err(CatalogError::ValidationFailed(_))));
    assert_eq!(server.rejected_writes(), 0);
    assert_eq!(catalog.credentials.requests(), 0);
}

// =============================================================================
// Rename, hide, delete
// =============================================================================

#[tokio::test]
async fn test_rename_moves_record_to_new_id() {
    let server = FakeIndexServer::spawn_with(vec![remote_record(
        "old-title",
        "Old Title",
        "Jig",
        false,
    )])
    .await;
    let catalog = TestCatalog::online(&server).await;
    let mut events = catalog.service.subscribe();

    let previous = catalog.service.get("old-title").await.unwrap();
    let mut draft = RecordDraft::from(&previous);
    draft.title = "New Title".to_string();
    let outcome = catalog.service.rename("old-title", draft).await.unwrap();

    assert_eq!(outcome.value.id, "new-title");
    assert_eq!(server.object_ids(), vec!["new-title".to_string()]);
    let stored = server.record("new-title").unwrap();
    assert_eq!(stored["dateCreated"], 1_000);
    assert_eq!(stored["popularity"], 7);
    // Delete and create share one elevated session.
    assert_eq!(catalog.credentials.requests(), 1);

    let CatalogEvent::CatalogChanged { records, reason } = events.recv().await.unwrap();
    assert_eq!(reason, ChangeReason::Renamed);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, "new-title");
}

#[tokio::test]
async fn test_hide_and_unhide() {
    let server = FakeIndexServer::spawn_with(vec![remote_record(
        "danny-boy",
        "Danny Boy",
        "Ballad",
        false,
    )])
    .await;
    let catalog = TestCatalog::online(&server).await;

    catalog.service.set_hidden("danny-boy", true).await.unwrap();
    assert_eq!(server.record("danny-boy").unwrap()["hidden"], true);
    assert!(catalog.service.list(false).await.is_empty());
    assert!(catalog.service.search("danny").await.is_empty());

    catalog.service.set_hidden("danny-boy", false).await.unwrap();
    assert_eq!(catalog.service.list(false).await.len(), 1);
}

#[tokio::test]
async fn test_delete_removes_from_index_and_cache() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;
    catalog.service.save(kesh_jig(), None).await.unwrap();

    let outcome = catalog.service.delete("the-kesh-jig").await.unwrap();

    assert_eq!(outcome.applied_to, Backend::Remote);
    assert!(server.object_ids().is_empty());
    assert_eq!(catalog.service.connection_status().cache_size, 0);
}

// =============================================================================
// Offline fallback and cache persistence
// =============================================================================

#[tokio::test]
async fn test_cache_serves_restarted_client_when_offline() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;
    catalog.service.save(kesh_jig(), None).await.unwrap();

    let url = FakeIndexServer::closed_url().await;
    let catalog = catalog
        .reopen(&url, StaticCredentialProvider::declining())
        .await;

    let status = catalog.service.connection_status();
    assert!(!status.connected);
    assert_eq!(status.cache_size, 1);
    let record = catalog.service.get("the-kesh-jig").await.unwrap();
    assert_eq!(record.sections.get("A Part"), Some("G | G | G | D"));
    assert_eq!(catalog.service.search("kesh").await.len(), 1);
}

#[tokio::test]
async fn test_offline_writes_go_to_cache_only() {
    let url = FakeIndexServer::closed_url().await;
    let catalog = TestCatalog::connect(&url, StaticCredentialProvider::declining()).await;

    let outcome = catalog.service.save(kesh_jig(), None).await.unwrap();

    assert_eq!(outcome.applied_to, Backend::CacheOnly);
    assert_eq!(catalog.credentials.requests(), 0);
    assert_eq!(catalog.service.connection_status().cache_size, 1);

    let deleted = catalog.service.delete("the-kesh-jig").await.unwrap();
    assert_eq!(deleted.applied_to, Backend::CacheOnly);
    assert_eq!(catalog.service.connection_status().cache_size, 0);
}

#[tokio::test]
async fn test_refresh_pulls_changes_made_elsewhere() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;
    catalog.service.save(kesh_jig(), None).await.unwrap();

    server.put_record(remote_record("danny-boy", "Danny Boy", "Ballad", false));
    let outcome = catalog.service.refresh().await.unwrap();

    assert_eq!(outcome.value.len(), 2);
    assert_eq!(catalog.service.connection_status().cache_size, 2);

    let url = FakeIndexServer::closed_url().await;
    let catalog = catalog
        .reopen(&url, StaticCredentialProvider::declining())
        .await;
    assert!(catalog.service.get("danny-boy").await.is_ok());
}

#[tokio::test]
async fn test_refresh_while_unreachable_fails() {
    let url = FakeIndexServer::closed_url().await;
    let catalog = TestCatalog::connect(&url, StaticCredentialProvider::declining()).await;

    let result = catalog.service.refresh().await;

    assert!(matches!(result, Err(CatalogError::RemoteUnavailable(_))));
    assert!(!catalog.service.is_remote_available());
}

// =============================================================================
// Import / export
// =============================================================================

#[tokio::test]
async fn test_import_legacy_catalog_as_one_batch() {
    let server = FakeIndexServer::spawn().await;
    let catalog = TestCatalog::online(&server).await;
    let legacy = json!({
        "Cooley's Reel": {
            "key": "Em",
            "time": "4/4",
            "type": "Reel",
            "chords": {"A Part": "Em | D | Em | D"}
        },
        "Danny Boy": {
            "key": "C",
            "time": "4/4",
            "type": "Ballad",
            "chords": {"Verse": "C | F | C | G"}
        }
    });

    let outcome = catalog
        .service
        .import_catalog(&legacy.to_string())
        .await
        .unwrap();

    assert_eq!(outcome.value.len(), 2);
    // Batches elevate up front, so the search key is never tried.
    assert_eq!(server.rejected_writes(), 0);
    assert_eq!(catalog.credentials.requests(), 1);
    assert_eq!(
        server.object_ids(),
        vec!["cooleys-reel".to_string(), "danny-boy".to_string()]
    );
    assert_eq!(catalog.service.connection_status().cache_size, 2);
}

#[tokio::test]
async fn test_export_includes_hidden_records() {
    let server = FakeIndexServer::spawn_with(vec![
        remote_record("danny-boy", "Danny Boy", "Ballad", false),
        remote_record("the-parting-glass", "The Parting Glass", "Song", true),
    ])
    .await;
    let catalog = TestCatalog::online(&server).await;

    let exported = catalog.service.export_catalog().await.unwrap();

    assert!(exported.contains("Danny Boy"));
    assert!(exported.contains("The Parting Glass"));
}
