// crates/fluxgate-store-sqlite/tests/sqlite_store_unit.rs
// ============================================================================
// Module: SQLite Tenancy Store Unit Tests
// Description: Repository contract tests for the SQLite tenancy store.
// Purpose: Validate path safety, schema versioning, not-found vs conflict
//          classification, cascades, paging, and persistence across reopen.
// ============================================================================

//! ## Overview
//! Unit-level tests for `SQLite` store invariants:
//! - Path safety checks (empty/overlong/directory rejection)
//! - Schema version validation
//! - Duplicate membership and group name conflicts
//! - Membership cascade on group removal
//! - Malformed stored roles fail closed

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;

use fluxgate_core::Group;
use fluxgate_core::GroupId;
use fluxgate_core::GroupMember;
use fluxgate_core::GroupRepository;
use fluxgate_core::GroupRoleRepository;
use fluxgate_core::MemberId;
use fluxgate_core::Metadata;
use fluxgate_core::OrgId;
use fluxgate_core::OrgMember;
use fluxgate_core::OrgRepository;
use fluxgate_core::Organization;
use fluxgate_core::PageMetadata;
use fluxgate_core::RepositoryError;
use fluxgate_core::Role;
use fluxgate_core::Timestamp;
use fluxgate_store_sqlite::SqliteStoreConfig;
use fluxgate_store_sqlite::SqliteStoreError;
use fluxgate_store_sqlite::SqliteTenancyStore;
use serde_json::json;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(path: &Path) -> SqliteTenancyStore {
    SqliteTenancyStore::new(&SqliteStoreConfig::new(path)).expect("open store")
}

fn group(id: &str, org: &str, name: &str) -> Group {
    let mut metadata = Metadata::new();
    metadata.insert("site".to_string(), json!("north"));
    Group {
        id: GroupId::new(id),
        org_id: OrgId::new(org),
        name: name.to_string(),
        description: "test group".to_string(),
        metadata,
        created_at: Timestamp::from_unix_millis(1_000),
        updated_at: Timestamp::from_unix_millis(1_000),
    }
}

fn membership(group: &str, member: &str, role: Role) -> GroupMember {
    GroupMember {
        group_id: GroupId::new(group),
        member_id: MemberId::new(member),
        role,
    }
}

// ============================================================================
// SECTION: Config and Schema
// ============================================================================

#[test]
fn rejects_empty_and_directory_paths() {
    let dir = tempfile::tempdir().unwrap();
    let empty = SqliteStoreConfig::new("");
    assert!(matches!(SqliteTenancyStore::new(&empty), Err(SqliteStoreError::Invalid(_))));
    let directory = SqliteStoreConfig::new(dir.path());
    assert!(matches!(SqliteTenancyStore::new(&directory), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn rejects_overlong_path_component() {
    let dir = tempfile::tempdir().unwrap();
    let config = SqliteStoreConfig::new(dir.path().join("a".repeat(300)));
    assert!(matches!(config.validate(), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn rejects_zero_busy_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SqliteStoreConfig::new(dir.path().join("store.db"));
    config.busy_timeout_ms = 0;
    assert!(matches!(config.validate(), Err(SqliteStoreError::Invalid(_))));
}

#[test]
fn rejects_unknown_schema_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    drop(open(&path));
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE store_meta SET version = 99", []).unwrap();
    drop(connection);
    let result = SqliteTenancyStore::new(&SqliteStoreConfig::new(&path));
    assert!(matches!(result, Err(SqliteStoreError::VersionMismatch(_))));
}

// ============================================================================
// SECTION: Groups
// ============================================================================

#[tokio::test]
async fn group_round_trip_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");
    {
        let store = open(&path);
        GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    }
    let store = open(&path);
    let stored = GroupRepository::retrieve_by_id(&store, &GroupId::new("g1")).await.unwrap();
    assert_eq!(stored, group("g1", "o1", "alpha"));
}

#[tokio::test]
async fn missing_group_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let err = GroupRepository::retrieve_by_id(&store, &GroupId::new("nope")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn duplicate_name_in_org_conflicts_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    let err = GroupRepository::save(&store, &[group("g2", "o1", "beta"), group("g3", "o1", "alpha")])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    let err = GroupRepository::retrieve_by_id(&store, &GroupId::new("g2")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn update_missing_group_is_not_found_and_keeps_org() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let err = GroupRepository::update(&store, &group("g9", "o1", "x")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));

    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    let mut changed = group("g1", "o2", "renamed");
    changed.updated_at = Timestamp::from_unix_millis(2_000);
    GroupRepository::update(&store, &changed).await.unwrap();
    let stored = GroupRepository::retrieve_by_id(&store, &GroupId::new("g1")).await.unwrap();
    assert_eq!(stored.org_id, OrgId::new("o1"));
    assert_eq!(stored.name, "renamed");
    assert_eq!(stored.updated_at, Timestamp::from_unix_millis(2_000));
}

#[tokio::test]
async fn admin_listing_filters_by_org_and_name_with_paging() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    GroupRepository::save(
        &store,
        &[
            group("g1", "o1", "Sensors East"),
            group("g2", "o1", "sensors west"),
            group("g3", "o1", "gateways"),
            group("g4", "o2", "sensors"),
        ],
    )
    .await
    .unwrap();
    let mut page = PageMetadata::new(0, 1);
    page.name = Some("SENSORS".to_string());
    let result =
        GroupRepository::retrieve_by_admin(&store, Some(&OrgId::new("o1")), &page).await.unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].id, GroupId::new("g1"));

    let all = GroupRepository::retrieve_by_admin(&store, None, &PageMetadata::default())
        .await
        .unwrap();
    assert_eq!(all.total, 4);
}

#[tokio::test]
async fn retrieve_by_ids_handles_empty_and_unknown_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    GroupRepository::save(&store, &[group("g1", "o1", "a"), group("g2", "o1", "b")])
        .await
        .unwrap();
    let empty = GroupRepository::retrieve_by_ids(&store, &[], &PageMetadata::default())
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
    let ids = [GroupId::new("g2"), GroupId::new("unknown")];
    let page = GroupRepository::retrieve_by_ids(&store, &ids, &PageMetadata::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, GroupId::new("g2"));
}

// ============================================================================
// SECTION: Memberships
// ============================================================================

#[tokio::test]
async fn duplicate_membership_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let g1 = GroupId::new("g1");
    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    store.save_roles_by_group(&g1, &[membership("g1", "m", Role::Editor)]).await.unwrap();
    let err = store
        .save_roles_by_group(&g1, &[membership("g1", "m", Role::Owner)])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    let role = GroupRoleRepository::retrieve_role(&store, &g1, &MemberId::new("m")).await.unwrap();
    assert_eq!(role, Role::Editor);
}

#[tokio::test]
async fn membership_for_missing_group_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let err = store
        .save_roles_by_group(&GroupId::new("ghost"), &[membership("ghost", "m", Role::Viewer)])
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn missing_role_is_not_found_not_storage() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let err = GroupRoleRepository::retrieve_role(&store, &GroupId::new("g1"), &MemberId::new("m"))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn removing_group_cascades_memberships() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let g1 = GroupId::new("g1");
    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    store.save_roles_by_group(&g1, &[membership("g1", "m", Role::Owner)]).await.unwrap();
    GroupRepository::remove(&store, std::slice::from_ref(&g1)).await.unwrap();
    let err = GroupRoleRepository::retrieve_role(&store, &g1, &MemberId::new("m")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    assert!(store.retrieve_group_ids_by_member(&MemberId::new("m")).await.unwrap().is_empty());
}

#[tokio::test]
async fn update_and_remove_memberships() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let g1 = GroupId::new("g1");
    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    store
        .save_roles_by_group(
            &g1,
            &[membership("g1", "a", Role::Viewer), membership("g1", "b", Role::Viewer)],
        )
        .await
        .unwrap();
    let err = store
        .update_roles_by_group(
            &g1,
            &[membership("g1", "a", Role::Admin), membership("g1", "zz", Role::Admin)],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
    let role = GroupRoleRepository::retrieve_role(&store, &g1, &MemberId::new("a")).await.unwrap();
    assert_eq!(role, Role::Viewer);

    store.update_roles_by_group(&g1, &[membership("g1", "a", Role::Admin)]).await.unwrap();
    store.remove_roles_by_group(&g1, &[MemberId::new("b")]).await.unwrap();
    let page = store.retrieve_roles_by_group(&g1, &PageMetadata::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].role, Role::Admin);
}

#[tokio::test]
async fn malformed_stored_role_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let store = open(&path);
    let g1 = GroupId::new("g1");
    GroupRepository::save(&store, &[group("g1", "o1", "alpha")]).await.unwrap();
    store.save_roles_by_group(&g1, &[membership("g1", "m", Role::Viewer)]).await.unwrap();
    drop(store);
    let connection = rusqlite::Connection::open(&path).unwrap();
    connection.execute("UPDATE group_roles SET role = 'superuser'", []).unwrap();
    drop(connection);
    let store = open(&path);
    let err = GroupRoleRepository::retrieve_role(&store, &g1, &MemberId::new("m")).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Malformed(_)));
}

// ============================================================================
// SECTION: Organizations
// ============================================================================

#[tokio::test]
async fn org_and_member_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("store.db"));
    let org = Organization {
        id: OrgId::new("o1"),
        owner_id: MemberId::new("owner"),
        name: "acme".to_string(),
        description: String::new(),
        metadata: Metadata::new(),
        created_at: Timestamp::from_unix_millis(5),
        updated_at: Timestamp::from_unix_millis(5),
    };
    OrgRepository::save(&store, &org).await.unwrap();
    let err = OrgRepository::save(&store, &org).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert_eq!(OrgRepository::retrieve_by_id(&store, &org.id).await.unwrap(), org);

    let member = OrgMember {
        org_id: OrgId::new("o1"),
        member_id: MemberId::new("m"),
        role: Role::Admin,
    };
    store.save_members(&[member]).await.unwrap();
    let role = OrgRepository::retrieve_role(&store, &org.id, &MemberId::new("m")).await.unwrap();
    assert_eq!(role, Role::Admin);

    let orphan = OrgMember {
        org_id: OrgId::new("missing"),
        member_id: MemberId::new("m"),
        role: Role::Viewer,
    };
    let err = store.save_members(&[orphan]).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}
