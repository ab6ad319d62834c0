// crates/fluxgate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fluxgate Interfaces
// Description: Backend-agnostic contracts for identity, storage, caching, and
//              message transport.
// Purpose: Define every collaborator the decision engine and gateway call.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Fluxgate integrates with identity services,
//! repositories, membership caches, publish-config resolution, and message
//! brokers without embedding backend details. All collaborators are shared
//! across concurrent requests, so every trait is `Send + Sync`.
//!
//! Repositories distinguish "not found" from storage failure. Caches are never
//! authoritative: a miss (or a cache error) tells the caller to consult the
//! repository, never to decide.
//!
//! Security posture: implementations receive raw tokens and device keys and
//! must not echo them into error messages.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::Group;
use crate::core::GroupId;
use crate::core::GroupMember;
use crate::core::GroupMembersPage;
use crate::core::GroupPage;
use crate::core::Identity;
use crate::core::MemberId;
use crate::core::Message;
use crate::core::OrgId;
use crate::core::OrgMember;
use crate::core::Organization;
use crate::core::PageMetadata;
use crate::core::Profile;
use crate::core::ProfileId;
use crate::core::ProfilesPage;
use crate::core::PublishConfig;
use crate::core::Role;
use crate::core::Thing;
use crate::core::ThingId;
use crate::core::ThingsPage;

// ============================================================================
// SECTION: Identity
// ============================================================================

/// Identity resolution errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never contain the presented token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// No token was presented.
    #[error("missing token")]
    MissingToken,
    /// Token is unknown, expired, or revoked.
    #[error("invalid token")]
    InvalidToken,
    /// Identity service could not be reached.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

/// Resolves caller tokens to member identities.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the identity bound to `token`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when the token cannot be resolved.
    async fn identify(&self, token: &str) -> Result<Identity, IdentityError>;
}

/// Generates unique identifiers for new entities.
pub trait IdProvider: Send + Sync {
    /// Returns a fresh identifier.
    fn id(&self) -> String;
}

// ============================================================================
// SECTION: Repositories
// ============================================================================

/// Repository errors shared by every storage collaborator.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `NotFound` is distinct from `Storage`; callers rely on it for denials.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// Requested row does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Row already exists (duplicate id, name, or membership).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Stored data could not be decoded.
    #[error("malformed entity: {0}")]
    Malformed(String),
    /// Backing store failed.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Group persistence.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Persists new groups atomically; a duplicate name in an org conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when persistence fails.
    async fn save(&self, groups: &[Group]) -> Result<(), RepositoryError>;

    /// Updates a group's name, description, metadata, and update time.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the group is absent.
    async fn update(&self, group: &Group) -> Result<(), RepositoryError>;

    /// Removes groups by id; absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the delete fails.
    async fn remove(&self, ids: &[GroupId]) -> Result<(), RepositoryError>;

    /// Fetches one group.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the group is absent.
    async fn retrieve_by_id(&self, id: &GroupId) -> Result<Group, RepositoryError>;

    /// Fetches a page of the groups named by `ids`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_by_ids(
        &self,
        ids: &[GroupId],
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError>;

    /// Fetches a page of all groups, optionally restricted to one org.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_by_admin(
        &self,
        org_id: Option<&OrgId>,
        page: &PageMetadata,
    ) -> Result<GroupPage, RepositoryError>;
}

/// Group membership persistence.
#[async_trait]
pub trait GroupRoleRepository: Send + Sync {
    /// Persists memberships atomically; an existing (group, member) pair conflicts.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] on a duplicate membership.
    async fn save_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError>;

    /// Returns the role `member_id` holds on `group_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when no membership exists.
    async fn retrieve_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError>;

    /// Returns every group the member holds any role in.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_group_ids_by_member(
        &self,
        member_id: &MemberId,
    ) -> Result<Vec<GroupId>, RepositoryError>;

    /// Returns a page of memberships for a group, ordered by member id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_roles_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<GroupMembersPage, RepositoryError>;

    /// Replaces the roles of existing memberships atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when any membership is absent.
    async fn update_roles_by_group(
        &self,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), RepositoryError>;

    /// Deletes memberships; absent pairs are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the delete fails.
    async fn remove_roles_by_group(
        &self,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<(), RepositoryError>;
}

/// Organization and organization-membership persistence.
#[async_trait]
pub trait OrgRepository: Send + Sync {
    /// Persists a new organization.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when the id exists.
    async fn save(&self, org: &Organization) -> Result<(), RepositoryError>;

    /// Fetches one organization.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the organization is absent.
    async fn retrieve_by_id(&self, id: &OrgId) -> Result<Organization, RepositoryError>;

    /// Persists organization memberships atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] on a duplicate membership.
    async fn save_members(&self, members: &[OrgMember]) -> Result<(), RepositoryError>;

    /// Returns the role `member_id` holds on `org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when no membership exists.
    async fn retrieve_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<Role, RepositoryError>;
}

/// Thing persistence, as far as group scoping needs it.
#[async_trait]
pub trait ThingRepository: Send + Sync {
    /// Persists things.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when an id exists.
    async fn save(&self, things: &[Thing]) -> Result<(), RepositoryError>;

    /// Fetches one thing.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the thing is absent.
    async fn retrieve_by_id(&self, id: &ThingId) -> Result<Thing, RepositoryError>;

    /// Returns a page of things owned by a group, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ThingsPage, RepositoryError>;
}

/// Profile persistence, as far as group scoping needs it.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Persists profiles.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] when an id exists.
    async fn save(&self, profiles: &[Profile]) -> Result<(), RepositoryError>;

    /// Fetches one profile.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the profile is absent.
    async fn retrieve_by_id(&self, id: &ProfileId) -> Result<Profile, RepositoryError>;

    /// Returns a page of profiles owned by a group, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError`] when the query fails.
    async fn retrieve_by_group(
        &self,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ProfilesPage, RepositoryError>;
}

// ============================================================================
// SECTION: Membership Caches
// ============================================================================

/// Cache backend errors. Callers treat every variant as a miss on reads.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Backing store is unavailable or its state is poisoned.
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

/// Invalidation counter for one cache key space (a group or an organization).
///
/// A fill carrying a generation older than the current one is discarded, so a
/// lookup that raced an invalidation cannot reinstate a removed fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Creates a generation from a raw counter.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw counter.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns the following generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Result of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup<T> {
    /// Cached value.
    Hit(T),
    /// No entry; carries the generation to present when filling.
    Miss(Generation),
}

impl<T> CacheLookup<T> {
    /// Returns the cached value, if any.
    #[must_use]
    pub fn hit(self) -> Option<T> {
        match self {
            Self::Hit(value) => Some(value),
            Self::Miss(_) => None,
        }
    }

    /// Returns true for a miss.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss(_))
    }
}

/// Group-level membership cache: group → org and (group, member) → role.
///
/// # Invariants
/// - Every operation is internally synchronized and atomic per call.
/// - `save_*` and `remove_*` are idempotent.
/// - `remove_org` also drops every cached role for the group.
/// - Removals advance the group's [`Generation`]; `fill_*` with a stale
///   generation stores nothing and returns `false`.
#[async_trait]
pub trait GroupCache: Send + Sync {
    /// Looks up the organization owning a group.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn view_org(&self, group_id: &GroupId) -> Result<CacheLookup<OrgId>, CacheError>;

    /// Upserts the group → org mapping.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn save_org(&self, group_id: &GroupId, org_id: &OrgId) -> Result<(), CacheError>;

    /// Stores the mapping only when `generation` is still current.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn fill_org(
        &self,
        group_id: &GroupId,
        org_id: &OrgId,
        generation: Generation,
    ) -> Result<bool, CacheError>;

    /// Drops the mapping and every cached role for the group.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn remove_org(&self, group_id: &GroupId) -> Result<(), CacheError>;

    /// Looks up a member's role on a group.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn view_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError>;

    /// Upserts a member's role on a group.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn save_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role: Role,
    ) -> Result<(), CacheError>;

    /// Stores the role only when `generation` is still current.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn fill_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role: Role,
        generation: Generation,
    ) -> Result<bool, CacheError>;

    /// Drops a member's cached role on a group.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn remove_role(&self, group_id: &GroupId, member_id: &MemberId)
    -> Result<(), CacheError>;

    /// Returns the groups the member currently has cached roles in.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn group_memberships(&self, member_id: &MemberId)
    -> Result<BTreeSet<GroupId>, CacheError>;
}

/// Organization-level role cache, in a namespace separate from groups.
///
/// # Invariants
/// - Same synchronization, idempotence, and generation rules as [`GroupCache`].
#[async_trait]
pub trait OrgCache: Send + Sync {
    /// Looks up a member's role on an organization.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn view_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<CacheLookup<Role>, CacheError>;

    /// Upserts a member's role on an organization.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn save_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
        role: Role,
    ) -> Result<(), CacheError>;

    /// Stores the role only when `generation` is still current.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn fill_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
        role: Role,
        generation: Generation,
    ) -> Result<bool, CacheError>;

    /// Drops a member's cached role on an organization.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    async fn remove_role(&self, org_id: &OrgId, member_id: &MemberId) -> Result<(), CacheError>;
}

// ============================================================================
// SECTION: Publish Configuration
// ============================================================================

/// Publish-config resolution errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never contain the presented key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    /// Key is unknown or revoked.
    #[error("invalid device key")]
    InvalidKey,
    /// Resolution service failed or could not be reached.
    #[error("publish config resolver unavailable: {0}")]
    Unavailable(String),
}

/// Resolves device keys to publishing context with one round-trip.
#[async_trait]
pub trait PublishConfigResolver: Send + Sync {
    /// Returns the publish configuration bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolverError`] when the key cannot be resolved.
    async fn resolve_by_key(&self, key: &str) -> Result<PublishConfig, ResolverError>;
}

// ============================================================================
// SECTION: Message Broker
// ============================================================================

/// Message broker errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Topic is empty.
    #[error("empty topic")]
    EmptyTopic,
    /// Subscriber identity is empty.
    #[error("empty subscriber id")]
    EmptySubscriber,
    /// Subscriber already observes the topic.
    #[error("already subscribed to {0}")]
    AlreadySubscribed(String),
    /// Subscriber does not observe the topic.
    #[error("not subscribed to {0}")]
    NotSubscribed(String),
    /// Topic reached its subscriber limit.
    #[error("subscriber limit reached for {topic} ({limit})")]
    SubscriberLimit {
        /// Topic name.
        topic: String,
        /// Configured limit.
        limit: usize,
    },
    /// A subscriber handler failed.
    #[error("handler error: {0}")]
    Handler(String),
    /// Transport failed.
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

/// Receives messages delivered to a subscription.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles one delivered message.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Handler`] when the message cannot be handled.
    async fn handle(&self, message: &Message) -> Result<(), BrokerError>;

    /// Releases handler resources after unsubscription.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Handler`] when cleanup fails.
    async fn cancel(&self) -> Result<(), BrokerError> {
        Ok(())
    }
}

/// Fan-out transport keyed by (subscriber, topic).
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a stamped message to subscribers of its subtopic.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when delivery fails.
    async fn publish(&self, message: Message) -> Result<(), BrokerError>;

    /// Registers `handler` for `topic` under `subscriber`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the subscription is rejected.
    async fn subscribe(
        &self,
        subscriber: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError>;

    /// Deregisters `subscriber` from `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::NotSubscribed`] when no such subscription exists.
    async fn unsubscribe(&self, subscriber: &str, topic: &str) -> Result<(), BrokerError>;
}
