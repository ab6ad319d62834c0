// crates/fluxgate-authz/src/cache.rs
// ============================================================================
// Module: Membership Caches
// Description: In-memory and no-op group/org membership caches.
// Purpose: Shield the decision path from repeated repository round-trips.
// Dependencies: fluxgate-core, async-trait
// ============================================================================

//! ## Overview
//! [`InMemoryGroupCache`] projects two repository facts: group → organization
//! and (group, member) → role. [`InMemoryOrgCache`] holds (org, member) → role
//! in its own namespace so group and organization ids never alias.
//!
//! Both caches guard all state with one mutex per cache and never hold it
//! across an await point, so a slow repository call made by the engine cannot
//! block unrelated lookups. Each removal advances a per-key generation;
//! `fill_*` calls that present an older generation are dropped.
//!
//! Generations are never pruned. Group and organization ids are not reused,
//! so the table grows with the number of distinct keys ever invalidated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use fluxgate_core::CacheError;
use fluxgate_core::CacheLookup;
use fluxgate_core::Generation;
use fluxgate_core::GroupCache;
use fluxgate_core::GroupId;
use fluxgate_core::MemberId;
use fluxgate_core::OrgCache;
use fluxgate_core::OrgId;
use fluxgate_core::Role;

// ============================================================================
// SECTION: Group Cache
// ============================================================================

/// Mutable state behind [`InMemoryGroupCache`].
#[derive(Debug, Default)]
struct GroupCacheState {
    /// Group → owning organization.
    orgs: BTreeMap<GroupId, OrgId>,
    /// Group → member → role.
    roles: BTreeMap<GroupId, BTreeMap<MemberId, Role>>,
    /// Invalidation counters per group.
    ///
    /// Bounded by the number of distinct groups ever invalidated, one
    /// `Generation` each. Entries are never removed: a dropped entry reads
    /// as `Generation::default()` again, which a fill started before the
    /// first invalidation would still match.
    generations: BTreeMap<GroupId, Generation>,
}

impl GroupCacheState {
    /// Returns the current generation for `group_id`.
    fn generation(&self, group_id: &GroupId) -> Generation {
        self.generations.get(group_id).copied().unwrap_or_default()
    }

    /// Advances the generation for `group_id`.
    fn bump(&mut self, group_id: &GroupId) {
        let next = self.generation(group_id).next();
        self.generations.insert(group_id.clone(), next);
    }
}

/// Process-local group membership cache.
///
/// # Invariants
/// - Every trait call takes the state lock exactly once.
/// - `remove_org` drops the mapping and all roles for the group.
#[derive(Debug, Default)]
pub struct InMemoryGroupCache {
    /// Cache state.
    state: Mutex<GroupCacheState>,
}

impl InMemoryGroupCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of cached org mappings.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache state is poisoned.
    pub fn org_entries(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.orgs.len())
    }

    /// Returns the number of cached role entries across all groups.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache state is poisoned.
    pub fn role_entries(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.roles.values().map(BTreeMap::len).sum())
    }

    /// Returns the number of groups with an invalidation counter.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the cache state is poisoned.
    pub fn generation_entries(&self) -> Result<usize, CacheError> {
        Ok(self.lock()?.generations.len())
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<MutexGuard<'_, GroupCacheState>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::Unavailable("group cache mutex poisoned".to_string()))
    }
}

#[async_trait]
impl GroupCache for InMemoryGroupCache {
    async fn view_org(&self, group_id: &GroupId) -> Result<CacheLookup<OrgId>, CacheError> {
        let guard = self.lock()?;
        Ok(guard.orgs.get(group_id).map_or_else(
            || CacheLookup::Miss(guard.generation(group_id)),
            |org_id| CacheLookup::Hit(org_id.clone()),
        ))
    }

    async fn save_org(&self, group_id: &GroupId, org_id: &OrgId) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        guard.orgs.insert(group_id.clone(), org_id.clone());
        drop(guard);
        Ok(())
    }

    async fn fill_org(
        &self,
        group_id: &GroupId,
        org_id: &OrgId,
        generation: Generation,
    ) -> Result<bool, CacheError> {
        let mut guard = self.lock()?;
        if guard.generation(group_id) != generation {
            return Ok(false);
        }
        guard.orgs.insert(group_id.clone(), org_id.clone());
        drop(guard);
        Ok(true)
    }

    async fn remove_org(&self, group_id: &GroupId) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        guard.orgs.remove(group_id);
        guard.roles.remove(group_id);
        guard.bump(group_id);
        drop(guard);
        Ok(())
    }

    async fn view_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError> {
        let guard = self.lock()?;
        let cached = guard.roles.get(group_id).and_then(|members| members.get(member_id));
        Ok(cached.map_or_else(|| CacheLookup::Miss(guard.generation(group_id)), |role| {
            CacheLookup::Hit(*role)
        }))
    }

    async fn save_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role: Role,
    ) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        guard.roles.entry(group_id.clone()).or_default().insert(member_id.clone(), role);
        drop(guard);
        Ok(())
    }

    async fn fill_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role: Role,
        generation: Generation,
    ) -> Result<bool, CacheError> {
        let mut guard = self.lock()?;
        if guard.generation(group_id) != generation {
            return Ok(false);
        }
        guard.roles.entry(group_id.clone()).or_default().insert(member_id.clone(), role);
        drop(guard);
        Ok(true)
    }

    async fn remove_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        if let Some(members) = guard.roles.get_mut(group_id) {
            members.remove(member_id);
            if members.is_empty() {
                guard.roles.remove(group_id);
            }
        }
        guard.bump(group_id);
        drop(guard);
        Ok(())
    }

    async fn group_memberships(
        &self,
        member_id: &MemberId,
    ) -> Result<BTreeSet<GroupId>, CacheError> {
        let guard = self.lock()?;
        Ok(guard
            .roles
            .iter()
            .filter(|(_, members)| members.contains_key(member_id))
            .map(|(group_id, _)| group_id.clone())
            .collect())
    }
}

// ============================================================================
// SECTION: Org Cache
// ============================================================================

/// Mutable state behind [`InMemoryOrgCache`].
#[derive(Debug, Default)]
struct OrgCacheState {
    /// (org, member) → role.
    roles: BTreeMap<(OrgId, MemberId), Role>,
    /// Invalidation counters per organization. Bounded and never pruned
    /// for the same reason as the group table.
    generations: BTreeMap<OrgId, Generation>,
}

impl OrgCacheState {
    /// Returns the current generation for `org_id`.
    fn generation(&self, org_id: &OrgId) -> Generation {
        self.generations.get(org_id).copied().unwrap_or_default()
    }
}

/// Process-local organization role cache.
#[derive(Debug, Default)]
pub struct InMemoryOrgCache {
    /// Cache state.
    state: Mutex<OrgCacheState>,
}

impl InMemoryOrgCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the state lock.
    fn lock(&self) -> Result<MutexGuard<'_, OrgCacheState>, CacheError> {
        self.state
            .lock()
            .map_err(|_| CacheError::Unavailable("org cache mutex poisoned".to_string()))
    }
}

#[async_trait]
impl OrgCache for InMemoryOrgCache {
    async fn view_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError> {
        let guard = self.lock()?;
        let key = (org_id.clone(), member_id.clone());
        Ok(guard
            .roles
            .get(&key)
            .map_or_else(|| CacheLookup::Miss(guard.generation(org_id)), |role| {
                CacheLookup::Hit(*role)
            }))
    }

    async fn save_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
        role: Role,
    ) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        guard.roles.insert((org_id.clone(), member_id.clone()), role);
        drop(guard);
        Ok(())
    }

    async fn fill_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
        role: Role,
        generation: Generation,
    ) -> Result<bool, CacheError> {
        let mut guard = self.lock()?;
        if guard.generation(org_id) != generation {
            return Ok(false);
        }
        guard.roles.insert((org_id.clone(), member_id.clone()), role);
        drop(guard);
        Ok(true)
    }

    async fn remove_role(&self, org_id: &OrgId, member_id: &MemberId) -> Result<(), CacheError> {
        let mut guard = self.lock()?;
        guard.roles.remove(&(org_id.clone(), member_id.clone()));
        let next = guard.generation(org_id).next();
        guard.generations.insert(org_id.clone(), next);
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: No-op Caches
// ============================================================================

/// Group cache that stores nothing; every lookup misses.
///
/// # Invariants
/// - Fills are always rejected, so the engine always consults repositories.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGroupCache;

#[async_trait]
impl GroupCache for NoopGroupCache {
    async fn view_org(&self, _group_id: &GroupId) -> Result<CacheLookup<OrgId>, CacheError> {
        Ok(CacheLookup::Miss(Generation::default()))
    }

    async fn save_org(&self, _group_id: &GroupId, _org_id: &OrgId) -> Result<(), CacheError> {
        Ok(())
    }

    async fn fill_org(
        &self,
        _group_id: &GroupId,
        _org_id: &OrgId,
        _generation: Generation,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn remove_org(&self, _group_id: &GroupId) -> Result<(), CacheError> {
        Ok(())
    }

    async fn view_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError> {
        Ok(CacheLookup::Miss(Generation::default()))
    }

    async fn save_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
        _role: Role,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn fill_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
        _role: Role,
        _generation: Generation,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn remove_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn group_memberships(
        &self,
        _member_id: &MemberId,
    ) -> Result<BTreeSet<GroupId>, CacheError> {
        Ok(BTreeSet::new())
    }
}

/// Organization cache that stores nothing; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOrgCache;

#[async_trait]
impl OrgCache for NoopOrgCache {
    async fn view_role(
        &self,
        _org_id: &OrgId,
        _member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError> {
        Ok(CacheLookup::Miss(Generation::default()))
    }

    async fn save_role(
        &self,
        _org_id: &OrgId,
        _member_id: &MemberId,
        _role: Role,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    async fn fill_role(
        &self,
        _org_id: &OrgId,
        _member_id: &MemberId,
        _role: Role,
        _generation: Generation,
    ) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn remove_role(&self, _org_id: &OrgId, _member_id: &MemberId) -> Result<(), CacheError> {
        Ok(())
    }
}
