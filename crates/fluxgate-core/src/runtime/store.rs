// crates/fluxgate-core/src/runtime/store.rs
// ============================================================================
// Module: Fluxgate In-Memory Repositories
// Description: Mutex-guarded map implementations of the repository contracts.
// Purpose: Provide storage for tests and single-process deployments.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Each repository keeps its rows in a `BTreeMap` behind a shared mutex, so
//! iteration order is deterministic (ordered by id) and clones share state.
//! Batch writes validate every row before inserting any, which makes them
//! atomic from the caller's perspective. Groups and their memberships share
//! one table set, so memberships reference live groups the way foreign keys
//! enforce it in a relational store. Lock poisoning surfaces as
//! [`RepositoryError::Storage`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;

use crate::core::Group;
use crate::core::GroupId;
use crate::core::GroupMember;
use crate::core::GroupMembersPage;
use crate::core::GroupPage;
use crate::core::MemberId;
use crate::core::OrgId;
use crate::core::OrgMember;
use crate::core::Organization;
use crate::core::PageMetadata;
use crate::core::Profile;
use crate::core::ProfileId;
use crate::core::ProfilesPage;
use crate::core::Role;
use crate::core::Thing;
use crate::core::ThingId;
use crate::core::ThingsPage;
use crate::interfaces::GroupRepository;
use crate::interfaces::GroupRoleRepository;
use crate::interfaces::OrgRepository;
use crate::interfaces::ProfileRepository;
use crate::interfaces::RepositoryError;
use crate::interfaces::ThingRepository;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Locks a repository table, mapping poisoning to a storage error.
fn lock<'a, T>(
    table: &'a Mutex<T>,
    name: &str,
) -> Result<MutexGuard<'a, T>, RepositoryError> {
    table.lock().map_err(|_| RepositoryError::Storage(format!("{name} mutex poisoned")))
}

// ============================================================================
// SECTION: Groups and Memberships
// ============================================================================

/// Rows behind [`InMemoryTenancyStore`].
#[derive(Debug, Default)]
struct TenancyTables {
    /// Groups keyed by id.
    groups: BTreeMap<GroupId, Group>,
    /// Roles keyed by (group, member).
    roles: BTreeMap<(GroupId, MemberId), Role>,
}

/// In-memory groups and group memberships over one shared table set.
///
/// Implements both [`GroupRepository`] and [`GroupRoleRepository`] so the
/// referential rules of a relational store hold here too.
///
/// # Invariants
/// - Group names are unique within an organization.
/// - `update` never changes `org_id` or `created_at`.
/// - At most one role per (group, member) pair.
/// - Every membership references an existing group; removing a group
///   removes its memberships.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTenancyStore {
    /// Groups and memberships under one lock.
    tables: Arc<Mutex<TenancyTables>>,
}

impl InMemoryTenancyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, TenancyTables>, RepositoryError> {
        lock(&self.tables, "tenancy store")
    }
}

#[async_trait]
impl GroupRepository for InMemoryTenancyStore {
    async fn save(&self, groups: &[Group]) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let mut names: BTreeSet<(OrgId, String)> =
            guard.groups.values().map(|g| (g.org_id.clone(), g.name.clone())).collect();
        let mut ids = BTreeSet::new();
        for group in groups {
            if guard.groups.contains_key(&group.id) || !ids.insert(group.id.clone()) {
                return Err(RepositoryError::Conflict(format!("group {}", group.id)));
            }
            if !names.insert((group.org_id.clone(), group.name.clone())) {
                return Err(RepositoryError::Conflict(format!("group name {}", group.name)));
            }
        }
        for group in groups {
            guard.groups.insert(group.id.clone(), group.clone());
        }
        drop(guard);
        Ok(())
    }

    async fn update(&self, group: &Group) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let org_id = guard
            .groups
            .get(&group.id)
            .map(|stored| stored.org_id.clone())
            .ok_or_else(|| RepositoryError::NotFound(format!("group {}", group.id)))?;
        let name_taken = guard
            .groups
            .values()
            .any(|other| other.id != group.id && other.org_id == org_id && other.name == group.name);
        if name_taken {
            return Err(RepositoryError::Conflict(format!("group name {}", group.name)));
        }
        if let Some(stored) = guard.groups.get_mut(&group.id) {
            stored.name.clone_from(&group.name);
            stored.description.clone_from(&group.description);
            stored.metadata.clone_from(&group.metadata);
            stored.updated_at = group.updated_at;
        }
        drop(guard);
        Ok(())
    }

    async fn remove(&self, ids: &[GroupId]) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let doomed: BTreeSet<&GroupId> = ids.iter().collect();
        for id in ids {
            guard.groups.remove(id);
        }
        guard.roles.retain(|(group_id, _), _| !doomed.contains(group_id));
        drop(guard);
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group, RepositoryError> {
        let guard = self.lock()?;
        guard.groups.get(id).cloned().ok_or_else(|| RepositoryError::NotFound(format!("group {id}")))
    }

    async fn retrieve_by_ids(
        &self,
        ids: &[GroupId],
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        let wanted: BTreeSet<&GroupId> = ids.iter().collect();
        let rows: Vec<Group> = {
            let guard = self.lock()?;
            guard
                .groups
                .values()
                .filter(|g| wanted.contains(&g.id) && page.matches_name(&g.name))
                .cloned()
                .collect()
        };
        Ok(page.paginate(rows))
    }

    async fn retrieve_by_admin(
        &self,
        org_id: Option<&OrgId>,
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        let rows: Vec<Group> = {
            let guard = self.lock()?;
            guard
                .groups
                .values()
                .filter(|g| org_id.is_none_or(|org| &g.org_id == org))
                .filter(|g| page.matches_name(&g.name))
                .cloned()
                .collect()
        };
        Ok(page.paginate(rows))
    }
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

#[async_trait]
impl GroupRoleRepository for InMemoryTenancyStore {
    async fn save_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        check_group(group_id, members)?;
        let mut guard = self.lock()?;
        if !guard.groups.contains_key(group_id) {
            return Err(RepositoryError::NotFound(format!("group {group_id}")));
        }
        let mut seen = BTreeSet::new();
        for member in members {
            let key = (group_id.clone(), member.member_id.clone());
            if guard.roles.contains_key(&key) || !seen.insert(key) {
                return Err(RepositoryError::Conflict(format!(
                    "member {} already in group {group_id}",
                    member.member_id
                )));
            }
        }
        for member in members {
            guard.roles.insert((group_id.clone(), member.member_id.clone()), member.role);
        }
        drop(guard);
        Ok(())
    }

    async fn retrieve_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError> {
        let guard = self.lock()?;
        guard.roles.get(&(group_id.clone(), member_id.clone())).copied().ok_or_else(|| {
            RepositoryError::NotFound(format!("member {member_id} in group {group_id}"))
        })
    }

    async fn retrieve_group_ids_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<GroupId>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.roles.keys().filter(|(_, m)| m == member_id).map(|(g, _)| g.clone()).collect())
    }

    async fn retrieve_roles_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<GroupMembersPage, RepositoryError> {
        let rows: Vec<GroupMember> = {
            let guard = self.lock()?;
            guard
                .roles
                .iter()
                .filter(|((g, _), _)| g == group_id)
                .map(|((g, m), role)| GroupMember {
                    group_id: g.clone(),
                    member_id: m.clone(),
                    role: *role,
                })
                .collect()
        };
        Ok(page.paginate(rows))
    }

    async fn update_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        check_group(group_id, members)?;
        let mut guard = self.lock()?;
        if let Some(missing) = members
            .iter()
            .find(|m| !guard.roles.contains_key(&(group_id.clone(), m.member_id.clone())))
        {
            return Err(RepositoryError::NotFound(format!(
                "member {} in group {group_id}",
                missing.member_id
            )));
        }
        for member in members {
            guard.roles.insert((group_id.clone(), member.member_id.clone()), member.role);
        }
        drop(guard);
        Ok(())
    }

    async fn remove_roles_by_group(
        &self,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        for member_id in member_ids {
            guard.roles.remove(&(group_id.clone(), member_id.clone()));
        }
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: Organizations
// ============================================================================

/// In-memory organization repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrgRepository {
    /// Organizations keyed by id.
    orgs: Arc<Mutex<BTreeMap<OrgId, Organization>>>,
    /// Organization roles keyed by (org, member).
    members: Arc<Mutex<BTreeMap<(OrgId, MemberId), Role>>>,
}

impl InMemoryOrgRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrgRepository for InMemoryOrgRepository {
    async fn save(&self, org: &Organization) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.orgs, "org store")?;
        if guard.contains_key(&org.id) {
            return Err(RepositoryError::Conflict(format!("org {}", org.id)));
        }
        guard.insert(org.id.clone(), org.clone());
        drop(guard);
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &OrgId) -> Result<Organization, RepositoryError> {
        let guard = lock(&self.orgs, "org store")?;
        guard.get(id).cloned().ok_or_else(|| RepositoryError::NotFound(format!("org {id}")))
    }

    async fn save_members(&self, members: &[OrgMember]) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.members, "org member store")?;
        let mut seen = BTreeSet::new();
        for member in members {
            let key = (member.org_id.clone(), member.member_id.clone());
            if guard.contains_key(&key) || !seen.insert(key) {
                return Err(RepositoryError::Conflict(format!(
                    "member {} already in org {}",
                    member.member_id, member.org_id
                )));
            }
        }
        for member in members {
            guard.insert((member.org_id.clone(), member.member_id.clone()), member.role);
        }
        drop(guard);
        Ok(())
    }

    async fn retrieve_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError> {
        let guard = lock(&self.members, "org member store")?;
        guard
            .get(&(org_id.clone(), member_id.clone()))
            .copied()
            .ok_or_else(|| RepositoryError::NotFound(format!("member {member_id} in org {org_id}")))
    }
}

// ============================================================================
// SECTION: Things and Profiles
// ============================================================================

/// In-memory thing repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryThingRepository {
    /// Things keyed by id.
    things: Arc<Mutex<BTreeMap<ThingId, Thing>>>,
}

impl InMemoryThingRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThingRepository for InMemoryThingRepository {
    async fn save(&self, things: &[Thing]) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.things, "thing store")?;
        if let Some(dup) = things.iter().find(|t| guard.contains_key(&t.id)) {
            return Err(RepositoryError::Conflict(format!("thing {}", dup.id)));
        }
        for thing in things {
            guard.insert(thing.id.clone(), thing.clone());
        }
        drop(guard);
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &ThingId) -> Result<Thing, RepositoryError> {
        let guard = lock(&self.things, "thing store")?;
        guard.get(id).cloned().ok_or_else(|| RepositoryError::NotFound(format!("thing {id}")))
    }

    async fn retrieve_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ThingsPage, RepositoryError> {
        let rows: Vec<Thing> = {
            let guard = lock(&self.things, "thing store")?;
            guard
                .values()
                .filter(|t| &t.group_id == group_id && page.matches_name(&t.name))
                .cloned()
                .collect()
        };
        Ok(page.paginate(rows))
    }
}

/// In-memory profile repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileRepository {
    /// Profiles keyed by id.
    profiles: Arc<Mutex<BTreeMap<ProfileId, Profile>>>,
}

impl InMemoryProfileRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn save(&self, profiles: &[Profile]) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.profiles, "profile store")?;
        if let Some(dup) = profiles.iter().find(|p| guard.contains_key(&p.id)) {
            return Err(RepositoryError::Conflict(format!("profile {}", dup.id)));
        }
        for profile in profiles {
            guard.insert(profile.id.clone(), profile.clone());
        }
        drop(guard);
        Ok(())
    }

    async fn retrieve_by_id(&self, id: &ProfileId) -> Result<Profile, RepositoryError> {
        let guard = lock(&self.profiles, "profile store")?;
        guard.get(id).cloned().ok_or_else(|| RepositoryError::NotFound(format!("profile {id}")))
    }

    async fn retrieve_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ProfilesPage, RepositoryError> {
        let rows: Vec<Profile> = {
            let guard = lock(&self.profiles, "profile store")?;
            guard
                .values()
                .filter(|p| &p.group_id == group_id && page.matches_name(&p.name))
                .cloned()
                .collect()
        };
        Ok(page.paginate(rows))
    }
}
