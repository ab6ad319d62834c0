// crates/fluxgate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Tenancy Store
// Description: Durable organization, group, and membership repositories.
// Purpose: Back the repository contracts with SQLite WAL storage.
// Dependencies: fluxgate-core, rusqlite, serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! This module implements [`GroupRepository`], [`GroupRoleRepository`], and
//! [`OrgRepository`] over one `SQLite` connection. Statements run on the
//! blocking pool so async callers never stall the runtime; the connection is
//! serialized through a mutex. Batch writes run in one transaction.
//!
//! Constraint failures are classified: a duplicate primary key or unique name
//! is a conflict, a missing parent row is not found. Stored role labels and
//! metadata are untrusted and fail closed as malformed when they do not parse.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fluxgate_core::Group;
use fluxgate_core::GroupId;
use fluxgate_core::GroupMember;
use fluxgate_core::GroupMembersPage;
use fluxgate_core::GroupPage;
use fluxgate_core::GroupRepository;
use fluxgate_core::GroupRoleRepository;
use fluxgate_core::MemberId;
use fluxgate_core::Metadata;
use fluxgate_core::OrgId;
use fluxgate_core::OrgMember;
use fluxgate_core::OrgRepository;
use fluxgate_core::Organization;
use fluxgate_core::Page;
use fluxgate_core::PageMetadata;
use fluxgate_core::RepositoryError;
use fluxgate_core::Role;
use fluxgate_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Largest accepted busy timeout (ms).
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Column list shared by every group query.
const GROUP_COLUMNS: &str = "id, org_id, name, description, metadata_json, created_at, updated_at";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` tenancy store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }

    /// Validates path safety and timeout bounds.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when a limit is violated.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        validate_store_path(&self.path)?;
        if self.busy_timeout_ms == 0 || self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(SqliteStoreError::Invalid(format!(
                "busy_timeout_ms out of range: {} (max {MAX_BUSY_TIMEOUT_MS})",
                self.busy_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid configuration or undecodable stored data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Requested row (or a referenced parent row) does not exist.
    #[error("sqlite store row not found: {0}")]
    NotFound(String),
    /// Primary key or uniqueness constraint violated.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
}

impl From<SqliteStoreError> for RepositoryError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::Invalid(message) => Self::Malformed(message),
            SqliteStoreError::Io(message)
            | SqliteStoreError::Db(message)
            | SqliteStoreError::VersionMismatch(message) => Self::Storage(message),
        }
    }
}

/// Maps a generic engine error.
fn db_error(err: &rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

/// Classifies write failures into conflict, missing parent, or engine error.
fn write_error(err: &rusqlite::Error, subject: &str) -> SqliteStoreError {
    match err {
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                SqliteStoreError::NotFound(format!("parent of {subject}"))
            } else {
                SqliteStoreError::Conflict(subject.to_string())
            }
        }
        other => db_error(other),
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed tenancy store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Group membership rows are deleted with their group.
#[derive(Clone)]
pub struct SqliteTenancyStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteTenancyStore {
    /// Opens (or creates) the store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn run<T, F>(&self, op: F) -> Result<T, SqliteStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, SqliteStoreError> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let mut guard = connection
                .lock()
                .map_err(|_| SqliteStoreError::Io("sqlite connection mutex poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|err| SqliteStoreError::Io(err.to_string()))?
    }
}

// ============================================================================
// SECTION: Group Repository
// ============================================================================

#[async_trait]
impl GroupRepository for SqliteTenancyStore {
    async fn save(&self, groups: &[Group]) -> Result<(), RepositoryError> {
        let groups = groups.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for group in &groups {
                let metadata = encode_metadata(&group.metadata)?;
                tx.execute(
                    "INSERT INTO groups (id, org_id, name, description, metadata_json, \
                     created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        group.id.as_str(),
                        group.org_id.as_str(),
                        group.name,
                        group.description,
                        metadata,
                        group.created_at.as_unix_millis(),
                        group.updated_at.as_unix_millis(),
                    ],
                )
                .map_err(|err| write_error(&err, &format!("group {}", group.id)))?;
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn update(&self, group: &Group) -> Result<(), RepositoryError> {
        let group = group.clone();
        self.run(move |connection| {
            let metadata = encode_metadata(&group.metadata)?;
            let changed = connection
                .execute(
                    "UPDATE groups SET name = ?1, description = ?2, metadata_json = ?3, \
                     updated_at = ?4 WHERE id = ?5",
                    params![
                        group.name,
                        group.description,
                        metadata,
                        group.updated_at.as_unix_millis(),
                        group.id.as_str(),
                    ],
                )
                .map_err(|err| write_error(&err, &format!("group name {}", group.name)))?;
            if changed == 0 {
                return Err(SqliteStoreError::NotFound(format!("group {}", group.id)));
            }
            Ok(())
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn remove(&self, ids: &[GroupId]) -> Result<(), RepositoryError> {
        let ids = ids.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for id in &ids {
                tx.execute("DELETE FROM groups WHERE id = ?1", params![id.as_str()])
                    .map_err(|err| db_error(&err))?;
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group, RepositoryError> {
        let id = id.clone();
        self.run(move |connection| {
            let row = connection
                .query_row(
                    &format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1"),
                    params![id.as_str()],
                    GroupRow::from_row,
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            row.ok_or_else(|| SqliteStoreError::NotFound(format!("group {id}")))?.into_group()
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_by_ids(
        &self,
        ids: &[GroupId],
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        if ids.is_empty() {
            return Ok(Page::empty(page));
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let filter = GroupFilter {
            clauses: vec![format!("id IN ({placeholders})")],
            args: ids.iter().map(|id| Value::Text(id.to_string())).collect(),
        };
        let page = page.clone();
        self.run(move |connection| query_group_page(connection, filter, &page))
            .await
            .map_err(RepositoryError::from)
    }

    async fn retrieve_by_admin(
        &self,
        org_id: Option<&OrgId>,
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        let filter = match org_id {
            Some(org_id) => GroupFilter {
                clauses: vec!["org_id = ?".to_string()],
                args: vec![Value::Text(org_id.to_string())],
            },
            None => GroupFilter::default(),
        };
        let page = page.clone();
        self.run(move |connection| query_group_page(connection, filter, &page))
            .await
            .map_err(RepositoryError::from)
    }
}

// ============================================================================
// SECTION: Group Role Repository
// ============================================================================

#[async_trait]
impl GroupRoleRepository for SqliteTenancyStore {
    async fn save_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        check_group(group_id, members)?;
        let members = members.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for member in &members {
                tx.execute(
                    "INSERT INTO group_roles (group_id, member_id, role) VALUES (?1, ?2, ?3)",
                    params![member.group_id.as_str(), member.member_id.as_str(), member.role.as_str()],
                )
                .map_err(|err| {
                    write_error(
                        &err,
                        &format!("member {} in group {}", member.member_id, member.group_id),
                    )
                })?;
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError> {
        let group_id = group_id.clone();
        let member_id = member_id.clone();
        self.run(move |connection| {
            let label: Option<String> = connection
                .query_row(
                    "SELECT role FROM group_roles WHERE group_id = ?1 AND member_id = ?2",
                    params![group_id.as_str(), member_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            let label = label.ok_or_else(|| {
                SqliteStoreError::NotFound(format!("member {member_id} in group {group_id}"))
            })?;
            parse_role(&label)
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_group_ids_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<GroupId>, RepositoryError> {
        let member_id = member_id.clone();
        self.run(move |connection| {
            let mut stmt = connection
                .prepare("SELECT group_id FROM group_roles WHERE member_id = ?1 ORDER BY group_id")
                .map_err(|err| db_error(&err))?;
            let rows = stmt
                .query_map(params![member_id.as_str()], |row| row.get::<_, String>(0))
                .map_err(|err| db_error(&err))?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(GroupId::new(row.map_err(|err| db_error(&err))?));
            }
            Ok(ids)
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_roles_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<GroupMembersPage, RepositoryError> {
        let group_id = group_id.clone();
        let page = page.clone();
        self.run(move |connection| {
            let total: i64 = connection
                .query_row(
                    "SELECT COUNT(*) FROM group_roles WHERE group_id = ?1",
                    params![group_id.as_str()],
                    |row| row.get(0),
                )
                .map_err(|err| db_error(&err))?;
            let mut stmt = connection
                .prepare(
                    "SELECT member_id, role FROM group_roles WHERE group_id = ?1 \
                     ORDER BY member_id LIMIT ?2 OFFSET ?3",
                )
                .map_err(|err| db_error(&err))?;
            let rows = stmt
                .query_map(
                    params![group_id.as_str(), sql_limit(&page), sql_offset(&page)],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .map_err(|err| db_error(&err))?;
            let mut items = Vec::new();
            for row in rows {
                let (member_id, label) = row.map_err(|err| db_error(&err))?;
                items.push(GroupMember {
                    group_id: group_id.clone(),
                    member_id: MemberId::new(member_id),
                    role: parse_role(&label)?,
                });
            }
            Ok(Page {
                total: u64::try_from(total).unwrap_or(0),
                offset: page.offset,
                limit: page.effective_limit(),
                items,
            })
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn update_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        check_group(group_id, members)?;
        let members = members.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for member in &members {
                let changed = tx
                    .execute(
                        "UPDATE group_roles SET role = ?1 WHERE group_id = ?2 AND member_id = ?3",
                        params![member.role.as_str(), member.group_id.as_str(), member.member_id.as_str()],
                    )
                    .map_err(|err| db_error(&err))?;
                if changed == 0 {
                    return Err(SqliteStoreError::NotFound(format!(
                        "member {} in group {}",
                        member.member_id, member.group_id
                    )));
                }
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn remove_roles_by_group(
        &self,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<(), RepositoryError> {
        let group_id = group_id.clone();
        let member_ids = member_ids.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for member_id in &member_ids {
                tx.execute(
                    "DELETE FROM group_roles WHERE group_id = ?1 AND member_id = ?2",
                    params![group_id.as_str(), member_id.as_str()],
                )
                .map_err(|err| db_error(&err))?;
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }
}

// ============================================================================
// SECTION: Org Repository
// ============================================================================

#[async_trait]
impl OrgRepository for SqliteTenancyStore {
    async fn save(&self, org: &Organization) -> Result<(), RepositoryError> {
        let org = org.clone();
        self.run(move |connection| {
            let metadata = encode_metadata(&org.metadata)?;
            connection
                .execute(
                    "INSERT INTO orgs (id, owner_id, name, description, metadata_json, \
                     created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        org.id.as_str(),
                        org.owner_id.as_str(),
                        org.name,
                        org.description,
                        metadata,
                        org.created_at.as_unix_millis(),
                        org.updated_at.as_unix_millis(),
                    ],
                )
                .map_err(|err| write_error(&err, &format!("org {}", org.id)))?;
            Ok(())
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_by_id(&self, id: &OrgId) -> Result<Organization, RepositoryError> {
        let id = id.clone();
        self.run(move |connection| {
            let row = connection
                .query_row(
                    "SELECT id, owner_id, name, description, metadata_json, created_at, \
                     updated_at FROM orgs WHERE id = ?1",
                    params![id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, i64>(5)?,
                            row.get::<_, i64>(6)?,
                        ))
                    },
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            let (org_id, owner_id, name, description, metadata, created_at, updated_at) =
                row.ok_or_else(|| SqliteStoreError::NotFound(format!("org {id}")))?;
            Ok(Organization {
                id: OrgId::new(org_id),
                owner_id: MemberId::new(owner_id),
                name,
                description,
                metadata: decode_metadata(&metadata)?,
                created_at: Timestamp::from_unix_millis(created_at),
                updated_at: Timestamp::from_unix_millis(updated_at),
            })
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn save_members(&self, members: &[OrgMember]) -> Result<(), RepositoryError> {
        let members = members.to_vec();
        self.run(move |connection| {
            let tx = connection.transaction().map_err(|err| db_error(&err))?;
            for member in &members {
                tx.execute(
                    "INSERT INTO org_members (org_id, member_id, role) VALUES (?1, ?2, ?3)",
                    params![member.org_id.as_str(), member.member_id.as_str(), member.role.as_str()],
                )
                .map_err(|err| {
                    write_error(&err, &format!("member {} in org {}", member.member_id, member.org_id))
                })?;
            }
            tx.commit().map_err(|err| db_error(&err))
        })
        .await
        .map_err(RepositoryError::from)
    }

    async fn retrieve_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError> {
        let org_id = org_id.clone();
        let member_id = member_id.clone();
        self.run(move |connection| {
            let label: Option<String> = connection
                .query_row(
                    "SELECT role FROM org_members WHERE org_id = ?1 AND member_id = ?2",
                    params![org_id.as_str(), member_id.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            let label = label.ok_or_else(|| {
                SqliteStoreError::NotFound(format!("member {member_id} in org {org_id}"))
            })?;
            parse_role(&label)
        })
        .await
        .map_err(RepositoryError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw group row as stored.
struct GroupRow {
    /// Group identifier.
    id: String,
    /// Owning organization.
    org_id: String,
    /// Display name.
    name: String,
    /// Description text.
    description: String,
    /// Metadata JSON object.
    metadata_json: String,
    /// Creation time (unix millis).
    created_at: i64,
    /// Update time (unix millis).
    updated_at: i64,
}

impl GroupRow {
    /// Reads a row selected with [`GROUP_COLUMNS`].
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            org_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            metadata_json: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Decodes the row into a [`Group`].
    fn into_group(self) -> Result<Group, SqliteStoreError> {
        Ok(Group {
            id: GroupId::new(self.id),
            org_id: OrgId::new(self.org_id),
            name: self.name,
            description: self.description,
            metadata: decode_metadata(&self.metadata_json)?,
            created_at: Timestamp::from_unix_millis(self.created_at),
            updated_at: Timestamp::from_unix_millis(self.updated_at),
        })
    }
}

/// SQL filter fragments for group listing.
#[derive(Default)]
struct GroupFilter {
    /// `WHERE` clauses joined with `AND`.
    clauses: Vec<String>,
    /// Positional arguments for `clauses`, in order.
    args: Vec<Value>,
}

/// Runs a filtered, paged group query ordered by id.
fn query_group_page(
    connection: &Connection,
    mut filter: GroupFilter,
    page: &PageMetadata,
) -> Result<GroupPage, SqliteStoreError> {
    if let Some(name) = &page.name {
        filter.clauses.push("instr(lower(name), lower(?)) > 0".to_string());
        filter.args.push(Value::Text(name.clone()));
    }
    let where_sql = if filter.clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", filter.clauses.join(" AND "))
    };
    let total: i64 = connection
        .query_row(
            &format!("SELECT COUNT(*) FROM groups{where_sql}"),
            params_from_iter(filter.args.iter()),
            |row| row.get(0),
        )
        .map_err(|err| db_error(&err))?;
    let mut args = filter.args;
    args.push(Value::Integer(sql_limit(page)));
    args.push(Value::Integer(sql_offset(page)));
    let mut stmt = connection
        .prepare(&format!(
            "SELECT {GROUP_COLUMNS} FROM groups{where_sql} ORDER BY id LIMIT ? OFFSET ?"
        ))
        .map_err(|err| db_error(&err))?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), GroupRow::from_row)
        .map_err(|err| db_error(&err))?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row.map_err(|err| db_error(&err))?.into_group()?);
    }
    Ok(Page {
        total: u64::try_from(total).unwrap_or(0),
        offset: page.offset,
        limit: page.effective_limit(),
        items,
    })
}

/// Returns the page limit as an SQL integer.
fn sql_limit(page: &PageMetadata) -> i64 {
    i64::try_from(page.effective_limit()).unwrap_or(i64::MAX)
}

/// Returns the page offset as an SQL integer.
fn sql_offset(page: &PageMetadata) -> i64 {
    i64::try_from(page.offset).unwrap_or(i64::MAX)
}

/// Parses a stored role label, failing closed on unknown values.
fn parse_role(label: &str) -> Result<Role, SqliteStoreError> {
    label.parse::<Role>().map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Serializes metadata for storage.
fn encode_metadata(metadata: &Metadata) -> Result<String, SqliteStoreError> {
    serde_json::to_string(metadata).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Decodes stored metadata.
fn decode_metadata(raw: &str) -> Result<Metadata, SqliteStoreError> {
    serde_json::from_str(raw)
        .map_err(|err| SqliteStoreError::Invalid(format!("metadata json: {err}")))
}

/// Rejects memberships whose group does not match the target group.
fn check_group(group_id: &GroupId, members: &[GroupMember]) -> Result<(), RepositoryError> {
    match members.iter().find(|m| &m.group_id != group_id) {
        Some(member) => Err(RepositoryError::Malformed(format!(
            "membership for {} targets group {}",
            member.member_id, member.group_id
        ))),
        None => Ok(()),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability and cascades.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS orgs (
                    id TEXT PRIMARY KEY,
                    owner_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    metadata_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS org_members (
                    org_id TEXT NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
                    member_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    PRIMARY KEY (org_id, member_id)
                );
                CREATE TABLE IF NOT EXISTS groups (
                    id TEXT PRIMARY KEY,
                    org_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    metadata_json TEXT NOT NULL,
                    created_at INTEGER NOT NULL,
                    updated_at INTEGER NOT NULL,
                    UNIQUE (org_id, name)
                );
                CREATE INDEX IF NOT EXISTS idx_groups_org ON groups (org_id, id);
                CREATE TABLE IF NOT EXISTS group_roles (
                    group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                    member_id TEXT NOT NULL,
                    role TEXT NOT NULL,
                    PRIMARY KEY (group_id, member_id)
                );
                CREATE INDEX IF NOT EXISTS idx_group_roles_member
                    ON group_roles (member_id, group_id);",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
