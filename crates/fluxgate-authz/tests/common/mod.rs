// crates/fluxgate-authz/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared tenancy fixtures and instrumented collaborators.
// Purpose: Build deterministic engines over counted, failable repositories.
// Dependencies: fluxgate-authz, fluxgate-core
// ============================================================================

//! ## Overview
//! [`World`] seeds organizations, groups, and memberships into one in-memory
//! tenancy store wrapped with call counters, and builds engines and services
//! over them. Tokens are `tok-<member>`; the global admin is `root`.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::unwrap_in_result,
    reason = "Test fixtures favor direct unwraps for setup clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use fluxgate_authz::AccessControl;
use fluxgate_authz::AccessControlBuilder;
use fluxgate_authz::AuthzAuditEvent;
use fluxgate_authz::AuthzAuditSink;
use fluxgate_authz::GroupRoleService;
use fluxgate_authz::GroupService;
use fluxgate_authz::InMemoryGroupCache;
use fluxgate_authz::InMemoryOrgCache;
use fluxgate_core::CacheError;
use fluxgate_core::CacheLookup;
use fluxgate_core::Generation;
use fluxgate_core::Group;
use fluxgate_core::GroupCache;
use fluxgate_core::GroupId;
use fluxgate_core::GroupMember;
use fluxgate_core::GroupMembersPage;
use fluxgate_core::GroupPage;
use fluxgate_core::GroupRepository;
use fluxgate_core::GroupRoleRepository;
use fluxgate_core::IdProvider;
use fluxgate_core::Identity;
use fluxgate_core::IdentityError;
use fluxgate_core::IdentityProvider;
use fluxgate_core::InMemoryOrgRepository;
use fluxgate_core::InMemoryProfileRepository;
use fluxgate_core::InMemoryTenancyStore;
use fluxgate_core::InMemoryThingRepository;
use fluxgate_core::MemberId;
use fluxgate_core::Metadata;
use fluxgate_core::OrgId;
use fluxgate_core::OrgRepository;
use fluxgate_core::Organization;
use fluxgate_core::PageMetadata;
use fluxgate_core::RepositoryError;
use fluxgate_core::Role;
use fluxgate_core::StaticIdentityProvider;
use fluxgate_core::Timestamp;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Members that get a token in every world.
pub const MEMBERS: &[&str] =
    &["root", "owner", "admin", "editor", "viewer", "outsider", "m", "creator"];

/// Returns the token for a fixture member.
pub fn token(member: &str) -> String {
    format!("tok-{member}")
}

/// Builds a group row.
pub fn group(id: &str, org: &str, name: &str) -> Group {
    Group {
        id: GroupId::new(id),
        org_id: OrgId::new(org),
        name: name.to_string(),
        description: String::new(),
        metadata: Metadata::new(),
        created_at: Timestamp::from_unix_millis(1),
        updated_at: Timestamp::from_unix_millis(1),
    }
}

/// Builds a membership row.
pub fn member(group: &str, member: &str, role: Role) -> GroupMember {
    GroupMember {
        group_id: GroupId::new(group),
        member_id: MemberId::new(member),
        role,
    }
}

// ============================================================================
// SECTION: Instrumented Collaborators
// ============================================================================

/// Group repository that counts lookups and can be switched to fail.
#[derive(Default)]
pub struct CountingGroupRepository {
    pub inner: Arc<InMemoryTenancyStore>,
    pub retrieve_by_id_calls: AtomicUsize,
    pub fail_storage: AtomicBool,
    pub fail_removes: AtomicBool,
}

impl CountingGroupRepository {
    pub fn over(inner: Arc<InMemoryTenancyStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), RepositoryError> {
        if self.fail_storage.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("disk on fire".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl GroupRepository for CountingGroupRepository {
    async fn save(&self, groups: &[Group]) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.save(groups).await
    }

    async fn update(&self, group: &Group) -> Result<(), RepositoryError> {
        self.check()?;
        self.inner.update(group).await
    }

    async fn remove(&self, ids: &[GroupId]) -> Result<(), RepositoryError> {
        self.check()?;
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("group table locked".to_string()));
        }
        self.inner.remove(ids).await
    }

    async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group, RepositoryError> {
        self.retrieve_by_id_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.retrieve_by_id(id).await
    }

    async fn retrieve_by_ids(
        &self,
        ids: &[GroupId],
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        self.check()?;
        self.inner.retrieve_by_ids(ids, page).await
    }

    async fn retrieve_by_admin(
        &self,
        org_id: Option<&OrgId>,
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError> {
        self.check()?;
        self.inner.retrieve_by_admin(org_id, page).await
    }
}

/// Role repository that counts role lookups and can reject membership writes.
#[derive(Default)]
pub struct CountingRoleRepository {
    pub inner: Arc<InMemoryTenancyStore>,
    pub retrieve_role_calls: AtomicUsize,
    pub fail_saves: AtomicBool,
}

impl CountingRoleRepository {
    pub fn over(inner: Arc<InMemoryTenancyStore>) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }
}

#[async_trait]
impl GroupRoleRepository for CountingRoleRepository {
    async fn save_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(RepositoryError::Storage("membership table offline".to_string()));
        }
        self.inner.save_roles_by_group(group_id, members).await
    }

    async fn retrieve_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError> {
        self.retrieve_role_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.retrieve_role(group_id, member_id).await
    }

    async fn retrieve_group_ids_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<GroupId>, RepositoryError> {
        self.inner.retrieve_group_ids_by_member(member_id).await
    }

    async fn retrieve_roles_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<GroupMembersPage, RepositoryError> {
        self.inner.retrieve_roles_by_group(group_id, page).await
    }

    async fn update_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError> {
        self.inner.update_roles_by_group(group_id, members).await
    }

    async fn remove_roles_by_group(
        &self,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<(), RepositoryError> {
        self.inner.remove_roles_by_group(group_id, member_ids).await
    }
}

/// Group cache whose backend is always down.
pub struct UnavailableGroupCache;

#[async_trait]
impl GroupCache for UnavailableGroupCache {
    async fn view_org(&self, _group_id: &GroupId) -> Result<CacheLookup<OrgId>, CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn save_org(&self, _group_id: &GroupId, _org_id: &OrgId) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn fill_org(
        &self,
        _group_id: &GroupId,
        _org_id: &OrgId,
        _generation: Generation,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn remove_org(&self, _group_id: &GroupId) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn view_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn save_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
        _role: Role,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn fill_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
        _role: Role,
        _generation: Generation,
    ) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn remove_role(
        &self,
        _group_id: &GroupId,
        _member_id: &MemberId,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }

    async fn group_memberships(
        &self,
        _member_id: &MemberId,
    ) -> Result<BTreeSet<GroupId>, CacheError> {
        Err(CacheError::Unavailable("down".to_string()))
    }
}

/// Identity provider that stalls before answering.
pub struct SlowIdentityProvider {
    pub delay: Duration,
    pub inner: StaticIdentityProvider,
}

#[async_trait]
impl IdentityProvider for SlowIdentityProvider {
    async fn identify(&self, token: &str) -> Result<Identity, IdentityError> {
        tokio::time::sleep(self.delay).await;
        self.inner.identify(token).await
    }
}

/// Audit sink that keeps every event.
#[derive(Default)]
pub struct RecordingAuditSink {
    pub events: Mutex<Vec<AuthzAuditEvent>>,
}

impl RecordingAuditSink {
    pub fn snapshot(&self) -> Vec<AuthzAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl AuthzAuditSink for RecordingAuditSink {
    fn record(&self, event: &AuthzAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Deterministic id source: `grp-1`, `grp-2`, ...
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicUsize,
}

impl IdProvider for SequentialIds {
    fn id(&self) -> String {
        format!("grp-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

// ============================================================================
// SECTION: World
// ============================================================================

/// Seeded tenancy state plus the collaborators an engine is built from.
pub struct World {
    pub identity: Arc<StaticIdentityProvider>,
    pub groups: Arc<CountingGroupRepository>,
    pub roles: Arc<CountingRoleRepository>,
    pub orgs: Arc<InMemoryOrgRepository>,
    pub things: Arc<InMemoryThingRepository>,
    pub profiles: Arc<InMemoryProfileRepository>,
    pub group_cache: Arc<InMemoryGroupCache>,
    pub org_cache: Arc<InMemoryOrgCache>,
    pub audit: Arc<RecordingAuditSink>,
}

impl World {
    /// Empty world with a token for every fixture member.
    pub fn new() -> Self {
        let identity = StaticIdentityProvider::new(MEMBERS.iter().map(|name| {
            (
                token(name),
                Identity {
                    id: MemberId::new(*name),
                    email: format!("{name}@example.com"),
                },
            )
        }));
        let tenancy = Arc::new(InMemoryTenancyStore::new());
        Self {
            identity: Arc::new(identity),
            groups: Arc::new(CountingGroupRepository::over(tenancy.clone())),
            roles: Arc::new(CountingRoleRepository::over(tenancy)),
            orgs: Arc::new(InMemoryOrgRepository::new()),
            things: Arc::new(InMemoryThingRepository::new()),
            profiles: Arc::new(InMemoryProfileRepository::new()),
            group_cache: Arc::new(InMemoryGroupCache::new()),
            org_cache: Arc::new(InMemoryOrgCache::new()),
            audit: Arc::new(RecordingAuditSink::default()),
        }
    }

    /// Standard tenancy: org `o1` owned by `owner`; groups `g1`, `g2` in
    /// `o1`; `editor` is Editor and `viewer` is Viewer of `g1`; `admin` is
    /// Admin of `g1`; org `o2` owned by `outsider` with group `g3`.
    pub async fn seeded() -> Self {
        let world = Self::new();
        world.add_org("o1", "owner").await;
        world.add_org("o2", "outsider").await;
        world.add_group("g1", "o1").await;
        world.add_group("g2", "o1").await;
        world.add_group("g3", "o2").await;
        world.add_member("g1", "editor", Role::Editor).await;
        world.add_member("g1", "viewer", Role::Viewer).await;
        world.add_member("g1", "admin", Role::Admin).await;
        world
    }

    pub async fn add_org(&self, id: &str, owner: &str) {
        self.orgs
            .save(&Organization {
                id: OrgId::new(id),
                owner_id: MemberId::new(owner),
                name: id.to_string(),
                description: String::new(),
                metadata: Metadata::new(),
                created_at: Timestamp::from_unix_millis(1),
                updated_at: Timestamp::from_unix_millis(1),
            })
            .await
            .unwrap();
    }

    pub async fn add_group(&self, id: &str, org: &str) {
        self.groups.inner.save(&[group(id, org, id)]).await.unwrap();
    }

    pub async fn add_member(&self, group_id: &str, member_id: &str, role: Role) {
        self.roles
            .inner
            .save_roles_by_group(&GroupId::new(group_id), &[member(group_id, member_id, role)])
            .await
            .unwrap();
    }

    /// Builder wired to this world's collaborators, global admin `root`.
    pub fn builder(&self) -> AccessControlBuilder {
        AccessControl::builder(
            self.identity.clone(),
            self.groups.clone(),
            self.roles.clone(),
            self.orgs.clone(),
        )
        .things(self.things.clone())
        .profiles(self.profiles.clone())
        .group_cache(self.group_cache.clone())
        .org_cache(self.org_cache.clone())
        .audit(self.audit.clone())
        .admin(Some(MemberId::new("root")))
    }

    pub fn engine(&self) -> Arc<AccessControl> {
        Arc::new(self.builder().build())
    }

    pub fn group_service(&self) -> GroupService {
        GroupService::new(self.engine(), Arc::new(SequentialIds::default()))
    }

    pub fn role_service(&self) -> GroupRoleService {
        GroupRoleService::new(self.engine())
    }

    pub fn group_lookups(&self) -> usize {
        self.groups.retrieve_by_id_calls.load(Ordering::SeqCst)
    }

    pub fn role_lookups(&self) -> usize {
        self.roles.retrieve_role_calls.load(Ordering::SeqCst)
    }
}
