// crates/fluxgate-core/src/core/model.rs
// ============================================================================
// Module: Fluxgate Tenancy Model
// Description: Organizations, groups, memberships, and paged results.
// Purpose: Define the rows the repositories persist and services return.
// Dependencies: crate::core::{identifiers, role, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Organization`] is the tenant root. A [`Group`] is a namespace of
//! manageable resources (things, profiles) nested under exactly one
//! organization. Memberships bind a member to an organization or group with
//! exactly one [`Role`].
//!
//! ## Invariants
//! - `Group::org_id` is set once at creation and never mutated.
//! - At most one membership exists per (resource, member) pair.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::core::identifiers::GroupId;
use crate::core::identifiers::MemberId;
use crate::core::identifiers::OrgId;
use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ThingId;
use crate::core::role::Role;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Shared Types
// ============================================================================

/// Free-form entity metadata.
pub type Metadata = Map<String, Value>;

/// Caller identity resolved from a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Member identifier.
    pub id: MemberId,
    /// Contact email (informational).
    pub email: String,
}

// ============================================================================
// SECTION: Organizations
// ============================================================================

/// Tenant root owning zero or more groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrgId,
    /// Owning member; holds `Owner` on the organization implicitly.
    pub owner_id: MemberId,
    /// Display name.
    pub name: String,
    /// Description text.
    #[serde(default)]
    pub description: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

/// Organization membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMember {
    /// Organization identifier.
    pub org_id: OrgId,
    /// Member identifier.
    pub member_id: MemberId,
    /// Role held on the organization.
    pub role: Role,
}

// ============================================================================
// SECTION: Groups
// ============================================================================

/// Namespace of manageable resources nested under one organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier (assigned at creation).
    pub id: GroupId,
    /// Owning organization; immutable after creation.
    pub org_id: OrgId,
    /// Display name, unique within the organization.
    pub name: String,
    /// Description text.
    #[serde(default)]
    pub description: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last update time.
    pub updated_at: Timestamp,
}

/// Group membership row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Group identifier.
    pub group_id: GroupId,
    /// Member identifier.
    pub member_id: MemberId,
    /// Role held on the group.
    pub role: Role,
}

// ============================================================================
// SECTION: Group Resources
// ============================================================================

/// Device registered inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thing {
    /// Thing identifier.
    pub id: ThingId,
    /// Owning group.
    pub group_id: GroupId,
    /// Profile applied to the thing's messages.
    pub profile_id: ProfileId,
    /// Display name.
    pub name: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Message profile registered inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile identifier.
    pub id: ProfileId,
    /// Owning group.
    pub group_id: GroupId,
    /// Display name.
    pub name: String,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

// ============================================================================
// SECTION: Paging
// ============================================================================

/// Default page size when a caller passes zero.
pub const DEFAULT_PAGE_LIMIT: u64 = 10;
/// Largest page size a repository will return.
pub const MAX_PAGE_LIMIT: u64 = 200;

/// Page request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: u64,
    /// Maximum number of rows to return; zero selects the default.
    #[serde(default)]
    pub limit: u64,
    /// Optional case-insensitive name substring filter.
    #[serde(default)]
    pub name: Option<String>,
}

impl PageMetadata {
    /// Creates page parameters with an offset and limit.
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            name: None,
        }
    }

    /// Returns the limit clamped to `1..=MAX_PAGE_LIMIT`.
    #[must_use]
    pub const fn effective_limit(&self) -> u64 {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else if self.limit > MAX_PAGE_LIMIT {
            MAX_PAGE_LIMIT
        } else {
            self.limit
        }
    }

    /// Returns true when `name` passes the optional name filter.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.as_deref().is_none_or(|needle| {
            name.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
        })
    }

    /// Slices an already-filtered, ordered list into a page.
    #[must_use]
    pub fn paginate<T>(&self, rows: Vec<T>) -> Page<T> {
        let total = rows.len() as u64;
        let offset = usize::try_from(self.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.effective_limit()).unwrap_or(usize::MAX);
        let items = rows.into_iter().skip(offset).take(limit).collect();
        Page {
            total,
            offset: self.offset,
            limit: self.effective_limit(),
            items,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Total rows matching the query, across all pages.
    pub total: u64,
    /// Offset applied.
    pub offset: u64,
    /// Limit applied.
    pub limit: u64,
    /// Rows in this page.
    pub items: Vec<T>,
}

impl<T> Page<T> {
    /// Returns an empty page for the provided parameters.
    #[must_use]
    pub const fn empty(page: &PageMetadata) -> Self {
        Self {
            total: 0,
            offset: page.offset,
            limit: page.effective_limit(),
            items: Vec::new(),
        }
    }
}

/// Page of groups.
pub type GroupPage = Page<Group>;
/// Page of group memberships.
pub type GroupMembersPage = Page<GroupMember>;
/// Page of things.
pub type ThingsPage = Page<Thing>;
/// Page of profiles.
pub type ProfilesPage = Page<Profile>;
