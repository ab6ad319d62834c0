// crates/fluxgate-authz/src/engine.rs
// ============================================================================
// Module: Decision Engine
// Description: Identity, cache-aside membership lookups, and bypass rules.
// Purpose: Grant or deny every resource-management call.
// Dependencies: fluxgate-core, fluxgate-config, tokio
// ============================================================================

//! ## Overview
//! [`AccessControl`] answers three questions: may this caller act on an
//! organization, on a group, or on any subject kind through the single
//! [`AccessControl::authorize`] dispatcher. The caller is identified first, so
//! an unauthenticated request never learns whether a target exists.
//!
//! ## Layer Responsibilities
//! - Resolve identity once per request; failures are authentication errors.
//! - Apply the global-admin bypass in `authorize`, then dispatch by kind.
//! - Resolve group → organization and roles cache-aside, filling the cache
//!   only with the generation observed on the miss.
//! - Apply the organization-owner bypass as a separate rule over the group
//!   check; it can be disabled.
//!
//! ## Invariants
//! - No lock is held across a collaborator call; caches lock internally.
//! - Every collaborator call is bounded by `call_timeout`.
//! - Cache failures degrade to a repository lookup, never to a decision.
//! - No retries: repository errors propagate as-is.
//!
//! Security posture: decisions fail closed; raw tokens only reach the
//! identity provider and appear in audit events as a fingerprint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use fluxgate_config::DEFAULT_CALL_TIMEOUT_MS;
use fluxgate_config::FluxgateConfig;
use fluxgate_core::CacheError;
use fluxgate_core::CacheLookup;
use fluxgate_core::Generation;
use fluxgate_core::GroupCache;
use fluxgate_core::GroupId;
use fluxgate_core::GroupRepository;
use fluxgate_core::GroupRoleRepository;
use fluxgate_core::Identity;
use fluxgate_core::IdentityError;
use fluxgate_core::IdentityProvider;
use fluxgate_core::InMemoryProfileRepository;
use fluxgate_core::InMemoryThingRepository;
use fluxgate_core::MemberId;
use fluxgate_core::OrgCache;
use fluxgate_core::OrgId;
use fluxgate_core::OrgRepository;
use fluxgate_core::ProfileId;
use fluxgate_core::ProfileRepository;
use fluxgate_core::RepositoryError;
use fluxgate_core::Role;
use fluxgate_core::ThingId;
use fluxgate_core::ThingRepository;
use fluxgate_core::fingerprint_secret;

use crate::audit::AuthzAuditEvent;
use crate::audit::AuthzAuditEventParams;
use crate::audit::AuthzAuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::cache::InMemoryGroupCache;
use crate::cache::InMemoryOrgCache;
use crate::cache::NoopGroupCache;
use crate::cache::NoopOrgCache;
use crate::error::AuthzError;
use crate::request::AuthorizeRequest;
use crate::request::SubjectKind;
use crate::telemetry::AuthzMetricEvent;
use crate::telemetry::AuthzMetrics;
use crate::telemetry::AuthzOperation;
use crate::telemetry::AuthzOutcome;
use crate::telemetry::CacheKind;
use crate::telemetry::CacheOutcome;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Grants
// ============================================================================

/// Path through which access was granted.
///
/// # Invariants
/// - Variants are stable for audit labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Caller is the configured global admin.
    GlobalAdmin,
    /// Caller owns the organization that contains the target group.
    OrgOwner,
    /// Caller holds a role that permits the action.
    Role(Role),
}

impl Grant {
    /// Returns a stable audit label for the grant path.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::GlobalAdmin => "global_admin",
            Self::OrgOwner => "org_owner",
            Self::Role(_) => "role_permits",
        }
    }
}

/// Cache consultation result as seen by the engine.
enum Cached<T> {
    /// Served from cache.
    Hit(T),
    /// Consult the repository; fill only when a generation was observed.
    Miss(Option<Generation>),
}

/// Audit and metrics context for one public decision.
struct Decision<'a> {
    /// Public entry point.
    operation: AuthzOperation,
    /// Target subject kind.
    subject: SubjectKind,
    /// Target entity id.
    object: &'a str,
    /// Required action.
    action: Role,
    /// Presented token; only its fingerprint is recorded.
    token: &'a str,
    /// Resolved caller, when identification succeeded.
    member: Option<&'a MemberId>,
}

// ============================================================================
// SECTION: Access Control
// ============================================================================

/// Decision engine over identity, repositories, and membership caches.
///
/// # Invariants
/// - Collaborators are shared and `Send + Sync`; the engine holds no locks.
pub struct AccessControl {
    /// Identity service.
    identity: Arc<dyn IdentityProvider>,
    /// Group repository.
    groups: Arc<dyn GroupRepository>,
    /// Group membership repository.
    group_roles: Arc<dyn GroupRoleRepository>,
    /// Organization repository.
    orgs: Arc<dyn OrgRepository>,
    /// Thing repository used to resolve thing subjects.
    things: Arc<dyn ThingRepository>,
    /// Profile repository used to resolve profile subjects.
    profiles: Arc<dyn ProfileRepository>,
    /// Group → org and (group, member) → role cache.
    group_cache: Arc<dyn GroupCache>,
    /// (org, member) → role cache.
    org_cache: Arc<dyn OrgCache>,
    /// Global-admin principal.
    admin: Option<MemberId>,
    /// Whether organization owners bypass group checks.
    org_owner_bypass: bool,
    /// Deadline for each collaborator call.
    call_timeout: Duration,
    /// Decision audit sink.
    audit: Arc<dyn AuthzAuditSink>,
    /// Decision metrics sink.
    metrics: Arc<dyn AuthzMetrics>,
}

impl AccessControl {
    /// Starts a builder over the required collaborators.
    #[must_use]
    pub fn builder(
        identity: Arc<dyn IdentityProvider>,
        groups: Arc<dyn GroupRepository>,
        group_roles: Arc<dyn GroupRoleRepository>,
        orgs: Arc<dyn OrgRepository>,
    ) -> AccessControlBuilder {
        AccessControlBuilder::new(identity, groups, group_roles, orgs)
    }

    /// Authorizes a request through the global-admin bypass and the
    /// subject-kind dispatcher.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Unauthenticated`] when the token does not
    /// resolve, [`AuthzError::Forbidden`] when no rule grants the action, and
    /// repository or deadline errors as-is.
    pub async fn authorize(&self, request: &AuthorizeRequest<'_>) -> Result<Grant, AuthzError> {
        let started = Instant::now();
        let (member, result) = match self.identify(request.token).await {
            Ok(identity) => {
                let result =
                    self.dispatch(&identity, request.subject, request.object, request.action).await;
                (Some(identity.id), result)
            }
            Err(err) => (None, Err(err)),
        };
        self.observe(
            &Decision {
                operation: AuthzOperation::Authorize,
                subject: request.subject,
                object: request.object,
                action: request.action,
                token: request.token,
                member: member.as_ref(),
            },
            started,
            &result,
        );
        result
    }

    /// Checks the caller's role on an organization.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Unauthenticated`] or [`AuthzError::Forbidden`].
    pub async fn can_access_org(
        &self,
        token: &str,
        org_id: &OrgId,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        let started = Instant::now();
        let (member, result) = match self.identify(token).await {
            Ok(identity) => {
                let result = self.check_org(&identity, org_id, action).await;
                (Some(identity.id), result)
            }
            Err(err) => (None, Err(err)),
        };
        self.observe(
            &Decision {
                operation: AuthzOperation::CanAccessOrg,
                subject: SubjectKind::Organization,
                object: org_id.as_str(),
                action,
                token,
                member: member.as_ref(),
            },
            started,
            &result,
        );
        result
    }

    /// Checks the caller's effective rights on a group, including the
    /// organization-owner bypass.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] when the group does not exist, plus
    /// the errors of [`AccessControl::can_access_org`].
    pub async fn can_access_group(
        &self,
        token: &str,
        group_id: &GroupId,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        let started = Instant::now();
        let (member, result) = match self.identify(token).await {
            Ok(identity) => {
                let result = self.check_group(&identity, group_id, action).await;
                (Some(identity.id), result)
            }
            Err(err) => (None, Err(err)),
        };
        self.observe(
            &Decision {
                operation: AuthzOperation::CanAccessGroup,
                subject: SubjectKind::Group,
                object: group_id.as_str(),
                action,
                token,
                member: member.as_ref(),
            },
            started,
            &result,
        );
        result
    }

    /// Resolves the caller behind `token`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Unauthenticated`] for blank, unknown, or
    /// unverifiable tokens and [`AuthzError::Deadline`] on timeout.
    pub async fn identify(&self, token: &str) -> Result<Identity, AuthzError> {
        if token.trim().is_empty() {
            return Err(IdentityError::MissingToken.into());
        }
        Ok(self.within("identity.identify", self.identity.identify(token)).await??)
    }

    /// Returns true when `identity` is the configured global admin.
    #[must_use]
    pub fn is_global_admin(&self, identity: &Identity) -> bool {
        self.admin.as_ref().is_some_and(|admin| *admin == identity.id)
    }

    // ------------------------------------------------------------------------
    // Crate-internal entry points for the group services.
    // ------------------------------------------------------------------------

    /// Authorizes an already identified caller, with audit.
    pub(crate) async fn authorize_identity(
        &self,
        token: &str,
        identity: &Identity,
        subject: SubjectKind,
        object: &str,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        let started = Instant::now();
        let result = self.dispatch(identity, subject, object, action).await;
        self.observe(
            &Decision {
                operation: AuthzOperation::Authorize,
                subject,
                object,
                action,
                token,
                member: Some(&identity.id),
            },
            started,
            &result,
        );
        result
    }

    /// Bounds a collaborator call by the configured deadline.
    pub(crate) async fn within<F: Future>(
        &self,
        call: &'static str,
        future: F,
    ) -> Result<F::Output, AuthzError> {
        tokio::time::timeout(self.call_timeout, future)
            .await
            .map_err(|_| AuthzError::Deadline(call))
    }

    /// Returns the group repository.
    pub(crate) fn groups(&self) -> &dyn GroupRepository {
        self.groups.as_ref()
    }

    /// Returns the group membership repository.
    pub(crate) fn group_roles(&self) -> &dyn GroupRoleRepository {
        self.group_roles.as_ref()
    }

    /// Returns the thing repository.
    pub(crate) fn things(&self) -> &dyn ThingRepository {
        self.things.as_ref()
    }

    /// Returns the profile repository.
    pub(crate) fn profiles(&self) -> &dyn ProfileRepository {
        self.profiles.as_ref()
    }

    /// Drops the org mapping and every cached role for a group.
    pub(crate) async fn invalidate_group(&self, group_id: &GroupId) -> Result<(), AuthzError> {
        self.within("cache.remove_org", self.group_cache.remove_org(group_id))
            .await?
            .map_err(invalidation_error)
    }

    /// Drops one cached group role.
    pub(crate) async fn invalidate_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<(), AuthzError> {
        self.within("cache.remove_role", self.group_cache.remove_role(group_id, member_id))
            .await?
            .map_err(invalidation_error)
    }

    /// Counts a failed compensating write.
    pub(crate) fn rollback_failed(&self, call: &'static str) {
        self.metrics.record_rollback_failure(call);
    }

    /// Reads the group's cache generation ahead of a membership write.
    /// `None` means the role must not be cached afterwards.
    pub(crate) async fn role_generation(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Option<Generation> {
        let lookup = self.group_cache.view_role(group_id, member_id);
        match tokio::time::timeout(self.call_timeout, lookup).await {
            Ok(Ok(CacheLookup::Miss(generation))) => Some(generation),
            Ok(Ok(CacheLookup::Hit(_))) => None,
            Ok(Err(_)) | Err(_) => {
                self.metrics.record_cache(CacheKind::GroupRole, CacheOutcome::Error);
                None
            }
        }
    }

    /// Caches a role the caller just persisted, unless the group was
    /// invalidated after `generation` was read.
    pub(crate) async fn remember_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
        role: Role,
        generation: Option<Generation>,
    ) {
        if let Some(generation) = generation {
            self.fill(
                CacheKind::GroupRole,
                self.group_cache.fill_role(group_id, member_id, role, generation),
            )
            .await;
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch and checks.
    // ------------------------------------------------------------------------

    /// Applies the global-admin bypass, then routes by subject kind.
    async fn dispatch(
        &self,
        identity: &Identity,
        subject: SubjectKind,
        object: &str,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        if object.trim().is_empty() {
            return Err(AuthzError::Malformed(format!("{subject} id must be non-empty")));
        }
        if self.is_global_admin(identity) {
            return Ok(Grant::GlobalAdmin);
        }
        match subject {
            SubjectKind::Organization => self.check_org(identity, &OrgId::new(object), action).await,
            SubjectKind::Group => self.check_group(identity, &GroupId::new(object), action).await,
            SubjectKind::Thing => {
                let thing = self
                    .within("things.retrieve_by_id", self.things.retrieve_by_id(&ThingId::new(object)))
                    .await??;
                self.check_group(identity, &thing.group_id, action).await
            }
            SubjectKind::Profile => {
                let profile = self
                    .within(
                        "profiles.retrieve_by_id",
                        self.profiles.retrieve_by_id(&ProfileId::new(object)),
                    )
                    .await??;
                self.check_group(identity, &profile.group_id, action).await
            }
        }
    }

    /// Organization check: role lookup plus the role-hierarchy rule.
    async fn check_org(
        &self,
        identity: &Identity,
        org_id: &OrgId,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        match self.org_role(org_id, &identity.id).await? {
            Some(role) if role.permits(action) => Ok(Grant::Role(role)),
            _ => Err(AuthzError::Forbidden),
        }
    }

    /// Group check: org resolution, org-owner bypass, then the group role.
    async fn check_group(
        &self,
        identity: &Identity,
        group_id: &GroupId,
        action: Role,
    ) -> Result<Grant, AuthzError> {
        let org_id = self.group_org(group_id).await?;
        if self.org_owner_bypass && self.check_org(identity, &org_id, Role::Owner).await.is_ok() {
            return Ok(Grant::OrgOwner);
        }
        match self.group_role(group_id, &identity.id).await? {
            Some(role) if role.permits(action) => Ok(Grant::Role(role)),
            _ => Err(AuthzError::Forbidden),
        }
    }

    /// Resolves the organization owning a group, cache-aside.
    async fn group_org(&self, group_id: &GroupId) -> Result<OrgId, AuthzError> {
        let generation =
            match self.consult(CacheKind::GroupOrg, self.group_cache.view_org(group_id)).await {
                Cached::Hit(org_id) => return Ok(org_id),
                Cached::Miss(generation) => generation,
            };
        let group =
            self.within("groups.retrieve_by_id", self.groups.retrieve_by_id(group_id)).await??;
        if let Some(generation) = generation {
            self.fill(
                CacheKind::GroupOrg,
                self.group_cache.fill_org(group_id, &group.org_id, generation),
            )
            .await;
        }
        Ok(group.org_id)
    }

    /// Resolves a member's group role, cache-aside. `None` means no role.
    async fn group_role(
        &self,
        group_id: &GroupId,
        member_id: &MemberId,
    ) -> Result<Option<Role>, AuthzError> {
        let generation = match self
            .consult(CacheKind::GroupRole, self.group_cache.view_role(group_id, member_id))
            .await
        {
            Cached::Hit(role) => return Ok(Some(role)),
            Cached::Miss(generation) => generation,
        };
        let retrieved = self
            .within("group_roles.retrieve_role", self.group_roles.retrieve_role(group_id, member_id))
            .await?;
        let Some(role) = absent_as_none(retrieved)? else {
            return Ok(None);
        };
        if let Some(generation) = generation {
            self.fill(
                CacheKind::GroupRole,
                self.group_cache.fill_role(group_id, member_id, role, generation),
            )
            .await;
        }
        Ok(Some(role))
    }

    /// Resolves a member's organization role, cache-aside. The organization
    /// owner holds `Owner` without an explicit membership row.
    async fn org_role(
        &self,
        org_id: &OrgId,
        member_id: &MemberId,
    ) -> Result<Option<Role>, AuthzError> {
        let generation = match self
            .consult(CacheKind::OrgRole, self.org_cache.view_role(org_id, member_id))
            .await
        {
            Cached::Hit(role) => return Ok(Some(role)),
            Cached::Miss(generation) => generation,
        };
        let retrieved = self.within("orgs.retrieve_by_id", self.orgs.retrieve_by_id(org_id)).await?;
        let Some(org) = absent_as_none(retrieved)? else {
            return Ok(None);
        };
        let role = if org.owner_id == *member_id {
            Role::Owner
        } else {
            let retrieved =
                self.within("orgs.retrieve_role", self.orgs.retrieve_role(org_id, member_id)).await?;
            match absent_as_none(retrieved)? {
                Some(role) => role,
                None => return Ok(None),
            }
        };
        if let Some(generation) = generation {
            self.fill(CacheKind::OrgRole, self.org_cache.fill_role(org_id, member_id, role, generation))
                .await;
        }
        Ok(Some(role))
    }

    /// Consults a cache; failures and timeouts count as misses.
    async fn consult<T, F>(&self, kind: CacheKind, lookup: F) -> Cached<T>
    where
        F: Future<Output = Result<CacheLookup<T>, CacheError>>,
    {
        match tokio::time::timeout(self.call_timeout, lookup).await {
            Ok(Ok(CacheLookup::Hit(value))) => {
                self.metrics.record_cache(kind, CacheOutcome::Hit);
                Cached::Hit(value)
            }
            Ok(Ok(CacheLookup::Miss(generation))) => {
                self.metrics.record_cache(kind, CacheOutcome::Miss);
                Cached::Miss(Some(generation))
            }
            Ok(Err(_)) | Err(_) => {
                self.metrics.record_cache(kind, CacheOutcome::Error);
                Cached::Miss(None)
            }
        }
    }

    /// Fills a cache entry; a rejected or failed fill is not an error.
    async fn fill<F>(&self, kind: CacheKind, fill: F)
    where
        F: Future<Output = Result<bool, CacheError>>,
    {
        if !matches!(tokio::time::timeout(self.call_timeout, fill).await, Ok(Ok(_))) {
            self.metrics.record_cache(kind, CacheOutcome::Error);
        }
    }

    /// Emits the audit event and metrics for a public decision.
    fn observe(&self, decision: &Decision<'_>, started: Instant, result: &Result<Grant, AuthzError>) {
        let outcome = AuthzOutcome::classify(result);
        let reason = match result {
            Ok(grant) => grant.reason(),
            Err(err) => err.kind(),
        };
        let event = AuthzMetricEvent {
            operation: decision.operation,
            subject: decision.subject,
            outcome,
            error_kind: result.as_ref().err().map(AuthzError::kind),
        };
        self.metrics.record_decision(event);
        self.metrics.record_latency(event, started.elapsed());
        self.audit.record(&AuthzAuditEvent::new(AuthzAuditEventParams {
            operation: decision.operation,
            subject: decision.subject,
            object_id: decision.object.to_string(),
            action: decision.action,
            outcome,
            reason,
            member_id: decision.member.map(|member| member.as_str().to_string()),
            token_fingerprint: (!decision.token.is_empty())
                .then(|| fingerprint_secret(decision.token)),
        }));
    }
}

/// Maps "no such membership" (or an undecodable one) to `None`; other
/// repository failures propagate.
fn absent_as_none<T>(result: Result<T, RepositoryError>) -> Result<Option<T>, AuthzError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(RepositoryError::NotFound(_) | RepositoryError::Malformed(_)) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// A failed invalidation must fail the mutation that requested it.
fn invalidation_error(error: CacheError) -> AuthzError {
    AuthzError::Storage(format!("cache invalidation failed: {error}"))
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`AccessControl`].
///
/// Defaults: in-memory caches, empty thing and profile repositories, no
/// global admin, organization-owner bypass on, the default call timeout, and
/// no-op audit and metrics sinks.
pub struct AccessControlBuilder {
    /// Identity service.
    identity: Arc<dyn IdentityProvider>,
    /// Group repository.
    groups: Arc<dyn GroupRepository>,
    /// Group membership repository.
    group_roles: Arc<dyn GroupRoleRepository>,
    /// Organization repository.
    orgs: Arc<dyn OrgRepository>,
    /// Thing repository.
    things: Arc<dyn ThingRepository>,
    /// Profile repository.
    profiles: Arc<dyn ProfileRepository>,
    /// Group cache.
    group_cache: Arc<dyn GroupCache>,
    /// Organization cache.
    org_cache: Arc<dyn OrgCache>,
    /// Global-admin principal.
    admin: Option<MemberId>,
    /// Organization-owner bypass toggle.
    org_owner_bypass: bool,
    /// Per-call deadline.
    call_timeout: Duration,
    /// Audit sink.
    audit: Arc<dyn AuthzAuditSink>,
    /// Metrics sink.
    metrics: Arc<dyn AuthzMetrics>,
}

impl AccessControlBuilder {
    /// Creates a builder over the required collaborators.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        groups: Arc<dyn GroupRepository>,
        group_roles: Arc<dyn GroupRoleRepository>,
        orgs: Arc<dyn OrgRepository>,
    ) -> Self {
        Self {
            identity,
            groups,
            group_roles,
            orgs,
            things: Arc::new(InMemoryThingRepository::new()),
            profiles: Arc::new(InMemoryProfileRepository::new()),
            group_cache: Arc::new(InMemoryGroupCache::new()),
            org_cache: Arc::new(InMemoryOrgCache::new()),
            admin: None,
            org_owner_bypass: true,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            audit: Arc::new(NoopAuditSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Applies the `[authz]` and `[cache]` config sections.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Storage`] when the audit log cannot be opened.
    pub fn configure(mut self, config: &FluxgateConfig) -> Result<Self, AuthzError> {
        self.admin = config.authz.admin_member();
        self.org_owner_bypass = config.authz.org_owner_bypass;
        self.call_timeout = config.authz.call_timeout();
        if !config.cache.enabled {
            self.group_cache = Arc::new(NoopGroupCache);
            self.org_cache = Arc::new(NoopOrgCache);
        }
        if config.authz.audit.enabled {
            self.audit = match &config.authz.audit.path {
                Some(path) => Arc::new(
                    FileAuditSink::new(path)
                        .map_err(|err| AuthzError::Storage(format!("authz audit log: {err}")))?,
                ),
                None => Arc::new(StderrAuditSink),
            };
        }
        Ok(self)
    }

    /// Sets the thing repository.
    #[must_use]
    pub fn things(mut self, things: Arc<dyn ThingRepository>) -> Self {
        self.things = things;
        self
    }

    /// Sets the profile repository.
    #[must_use]
    pub fn profiles(mut self, profiles: Arc<dyn ProfileRepository>) -> Self {
        self.profiles = profiles;
        self
    }

    /// Sets the group cache.
    #[must_use]
    pub fn group_cache(mut self, cache: Arc<dyn GroupCache>) -> Self {
        self.group_cache = cache;
        self
    }

    /// Sets the organization cache.
    #[must_use]
    pub fn org_cache(mut self, cache: Arc<dyn OrgCache>) -> Self {
        self.org_cache = cache;
        self
    }

    /// Sets the global-admin principal.
    #[must_use]
    pub fn admin(mut self, admin: Option<MemberId>) -> Self {
        self.admin = admin;
        self
    }

    /// Enables or disables the organization-owner bypass.
    #[must_use]
    pub const fn org_owner_bypass(mut self, enabled: bool) -> Self {
        self.org_owner_bypass = enabled;
        self
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub const fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn audit(mut self, audit: Arc<dyn AuthzAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn AuthzMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> AccessControl {
        AccessControl {
            identity: self.identity,
            groups: self.groups,
            group_roles: self.group_roles,
            orgs: self.orgs,
            things: self.things,
            profiles: self.profiles,
            group_cache: self.group_cache,
            org_cache: self.org_cache,
            admin: self.admin,
            org_owner_bypass: self.org_owner_bypass,
            call_timeout: self.call_timeout,
            audit: self.audit,
            metrics: self.metrics,
        }
    }
}
