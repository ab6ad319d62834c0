// crates/fluxgate-authz/src/groups.rs
// ============================================================================
// Module: Group Service
// Description: Authorized group create/update/view/list/remove operations.
// Purpose: Keep every group mutation behind the decision engine.
// Dependencies: fluxgate-core, crate::engine
// ============================================================================

//! ## Overview
//! [`GroupService`] authorizes through [`AccessControl`] before touching a
//! repository. Creation persists the group and the creator's `Owner`
//! membership together, and a failed membership write removes the groups
//! again. A rollback that itself fails is counted and reported in the
//! returned error. Removal invalidates the cached org mapping before
//! and after the repository delete, so a lookup racing the delete cannot
//! reinstate the mapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use fluxgate_core::Group;
use fluxgate_core::GroupId;
use fluxgate_core::GroupMember;
use fluxgate_core::GroupPage;
use fluxgate_core::IdProvider;
use fluxgate_core::MAX_PAGE_LIMIT;
use fluxgate_core::OrgId;
use fluxgate_core::PageMetadata;
use fluxgate_core::ProfileId;
use fluxgate_core::ProfilesPage;
use fluxgate_core::Role;
use fluxgate_core::ThingId;
use fluxgate_core::ThingsPage;
use fluxgate_core::Timestamp;

use crate::engine::AccessControl;
use crate::error::AuthzError;
use crate::request::AuthorizeRequest;
use crate::request::SubjectKind;

// ============================================================================
// SECTION: Service
// ============================================================================

/// Group resource-management operations.
pub struct GroupService {
    /// Decision engine and repository access.
    access: Arc<AccessControl>,
    /// Fresh id source for created groups.
    ids: Arc<dyn IdProvider>,
}

impl GroupService {
    /// Creates a group service.
    #[must_use]
    pub fn new(access: Arc<AccessControl>, ids: Arc<dyn IdProvider>) -> Self {
        Self {
            access,
            ids,
        }
    }

    /// Creates groups in one organization and makes the caller their owner.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Malformed`] for an empty batch, mixed
    /// organizations, or blank names; [`AuthzError::Unauthenticated`] or
    /// [`AuthzError::Forbidden`] when the caller is not an org editor;
    /// repository errors as-is; and [`AuthzError::Storage`] when the owner
    /// membership fails and the created groups cannot be removed.
    pub async fn create_groups(
        &self,
        token: &str,
        groups: Vec<Group>,
    ) -> Result<Vec<Group>, AuthzError> {
        let identity = self.access.identify(token).await?;
        let Some(first) = groups.first() else {
            return Err(AuthzError::Malformed("at least one group is required".to_string()));
        };
        let org_id = first.org_id.clone();
        if groups.iter().any(|group| group.org_id != org_id) {
            return Err(AuthzError::Malformed("groups must share one organization".to_string()));
        }
        if groups.iter().any(|group| group.name.trim().is_empty()) {
            return Err(AuthzError::Malformed("group name must be non-empty".to_string()));
        }
        self.access
            .authorize_identity(
                token,
                &identity,
                SubjectKind::Organization,
                org_id.as_str(),
                Role::Editor,
            )
            .await?;

        let now = Timestamp::now();
        let created: Vec<Group> = groups
            .into_iter()
            .map(|group| Group {
                id: GroupId::new(self.ids.id()),
                created_at: now,
                updated_at: now,
                ..group
            })
            .collect();
        let mut generations = Vec::with_capacity(created.len());
        for group in &created {
            generations.push(self.access.role_generation(&group.id, &identity.id).await);
        }
        self.access.within("groups.save", self.access.groups().save(&created)).await??;

        for (group, generation) in created.iter().zip(generations) {
            let owner = GroupMember {
                group_id: group.id.clone(),
                member_id: identity.id.clone(),
                role: Role::Owner,
            };
            let saved = self
                .access
                .within(
                    "group_roles.save_roles_by_group",
                    self.access.group_roles().save_roles_by_group(&group.id, &[owner]),
                )
                .await
                .and_then(|result| result.map_err(AuthzError::from));
            if let Err(err) = saved {
                return Err(self.discard(&created, err).await);
            }
            self.access.remember_role(&group.id, &identity.id, Role::Owner, generation).await;
        }
        Ok(created)
    }

    /// Updates a group's name, description, and metadata.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Forbidden`] unless the caller is a group admin,
    /// [`AuthzError::Malformed`] for a blank name, and repository errors.
    pub async fn update_group(&self, token: &str, group: Group) -> Result<(), AuthzError> {
        if group.name.trim().is_empty() {
            return Err(AuthzError::Malformed("group name must be non-empty".to_string()));
        }
        self.access.authorize(&AuthorizeRequest::group(token, &group.id, Role::Admin)).await?;
        let updated = Group {
            updated_at: Timestamp::now(),
            ..group
        };
        self.access.within("groups.update", self.access.groups().update(&updated)).await??;
        Ok(())
    }

    /// Returns a group the caller can view.
    ///
    /// # Errors
    ///
    /// Returns authorization and repository errors.
    pub async fn view_group(&self, token: &str, group_id: &GroupId) -> Result<Group, AuthzError> {
        self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Viewer)).await?;
        Ok(self
            .access
            .within("groups.retrieve_by_id", self.access.groups().retrieve_by_id(group_id))
            .await??)
    }

    /// Lists the groups visible to the caller.
    ///
    /// Org viewers get every group of the requested organization; the global
    /// admin gets every group; everyone else gets exactly the groups they hold
    /// a membership in.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Unauthenticated`] and repository errors.
    pub async fn list_groups(
        &self,
        token: &str,
        org_id: Option<&OrgId>,
        page: &PageMetadata,
    ) -> Result<GroupPage, AuthzError> {
        let identity = self.access.identify(token).await?;
        if let Some(org_id) = org_id {
            let org_view = self
                .access
                .authorize_identity(
                    token,
                    &identity,
                    SubjectKind::Organization,
                    org_id.as_str(),
                    Role::Viewer,
                )
                .await;
            if org_view.is_ok() {
                return Ok(self
                    .access
                    .within(
                        "groups.retrieve_by_admin",
                        self.access.groups().retrieve_by_admin(Some(org_id), page),
                    )
                    .await??);
            }
        }
        if self.access.is_global_admin(&identity) {
            return Ok(self
                .access
                .within(
                    "groups.retrieve_by_admin",
                    self.access.groups().retrieve_by_admin(None, page),
                )
                .await??);
        }
        let group_ids = self
            .access
            .within(
                "group_roles.retrieve_group_ids_by_member",
                self.access.group_roles().retrieve_group_ids_by_member(&identity.id),
            )
            .await??;
        if group_ids.is_empty() {
            return Ok(GroupPage::empty(page));
        }
        Ok(self
            .access
            .within("groups.retrieve_by_ids", self.access.groups().retrieve_by_ids(&group_ids, page))
            .await??)
    }

    /// Returns groups by id for trusted internal callers; no authorization.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Malformed`] for more ids than one page holds,
    /// and repository errors.
    pub async fn list_groups_by_ids(&self, ids: &[GroupId]) -> Result<Vec<Group>, AuthzError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if u64::try_from(ids.len()).unwrap_or(u64::MAX) > MAX_PAGE_LIMIT {
            return Err(AuthzError::Malformed(format!(
                "at most {MAX_PAGE_LIMIT} group ids per request"
            )));
        }
        let page = PageMetadata::new(0, MAX_PAGE_LIMIT);
        let found = self
            .access
            .within("groups.retrieve_by_ids", self.access.groups().retrieve_by_ids(ids, &page))
            .await??;
        Ok(found.items)
    }

    /// Removes groups the caller owns.
    ///
    /// Every id is authorized before anything is deleted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Forbidden`] unless the caller has owner rights on
    /// every group, cache invalidation failures as [`AuthzError::Storage`], and
    /// repository errors.
    pub async fn remove_groups(&self, token: &str, ids: &[GroupId]) -> Result<(), AuthzError> {
        if ids.is_empty() {
            return Ok(());
        }
        for group_id in ids {
            self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Owner)).await?;
            self.access.invalidate_group(group_id).await?;
        }
        self.access.within("groups.remove", self.access.groups().remove(ids)).await??;
        for group_id in ids {
            self.access.invalidate_group(group_id).await?;
        }
        Ok(())
    }

    /// Lists things owned by a group the caller can view.
    ///
    /// # Errors
    ///
    /// Returns authorization and repository errors.
    pub async fn list_things_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ThingsPage, AuthzError> {
        self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Viewer)).await?;
        Ok(self
            .access
            .within("things.retrieve_by_group", self.access.things().retrieve_by_group(group_id, page))
            .await??)
    }

    /// Lists profiles owned by a group the caller can view.
    ///
    /// # Errors
    ///
    /// Returns authorization and repository errors.
    pub async fn list_profiles_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<ProfilesPage, AuthzError> {
        self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Viewer)).await?;
        Ok(self
            .access
            .within(
                "profiles.retrieve_by_group",
                self.access.profiles().retrieve_by_group(group_id, page),
            )
            .await??)
    }

    /// Returns the group owning a thing.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] for an unknown thing, plus
    /// authorization and repository errors.
    pub async fn view_group_by_thing(
        &self,
        token: &str,
        thing_id: &ThingId,
    ) -> Result<Group, AuthzError> {
        let thing = self
            .access
            .within("things.retrieve_by_id", self.access.things().retrieve_by_id(thing_id))
            .await??;
        self.view_group(token, &thing.group_id).await
    }

    /// Returns the group owning a profile.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] for an unknown profile, plus
    /// authorization and repository errors.
    pub async fn view_group_by_profile(
        &self,
        token: &str,
        profile_id: &ProfileId,
    ) -> Result<Group, AuthzError> {
        let profile = self
            .access
            .within("profiles.retrieve_by_id", self.access.profiles().retrieve_by_id(profile_id))
            .await??;
        self.view_group(token, &profile.group_id).await
    }

    /// Removes groups whose owner membership failed to persist and returns
    /// the error to report. A failed removal is counted and folded into a
    /// storage error naming the groups left behind.
    async fn discard(&self, created: &[Group], cause: AuthzError) -> AuthzError {
        let ids: Vec<GroupId> = created.iter().map(|group| group.id.clone()).collect();
        let removed = self
            .access
            .within("groups.remove", self.access.groups().remove(&ids))
            .await
            .and_then(|result| result.map_err(AuthzError::from));
        for group_id in &ids {
            if self.access.invalidate_group(group_id).await.is_err() {
                self.access.rollback_failed("cache.remove_org");
            }
        }
        match removed {
            Ok(()) => cause,
            Err(err) => {
                self.access.rollback_failed("groups.remove");
                let left: Vec<&str> = ids.iter().map(GroupId::as_str).collect();
                AuthzError::Storage(format!(
                    "{cause}; rollback failed, groups [{}] remain: {err}",
                    left.join(", ")
                ))
            }
        }
    }
}
