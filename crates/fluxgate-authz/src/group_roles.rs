// crates/fluxgate-authz/src/group_roles.rs
// ============================================================================
// Module: Group Role Service
// Description: Authorized membership create/update/remove/list operations.
// Purpose: Mutate group memberships without leaving stale cached grants.
// Dependencies: fluxgate-core, crate::engine
// ============================================================================

//! ## Overview
//! Membership changes require group `Admin`; granting, changing, or removing
//! an `Owner` membership additionally requires owner rights. Cached roles are
//! dropped before the repository write and again after it, so a concurrent
//! check can only repopulate from the post-write repository state. New
//! memberships are cached only when no invalidation of the group landed
//! between the generation read and the repository write.

use std::sync::Arc;

use fluxgate_core::GroupId;
use fluxgate_core::GroupMember;
use fluxgate_core::GroupMembersPage;
use fluxgate_core::MemberId;
use fluxgate_core::PageMetadata;
use fluxgate_core::RepositoryError;
use fluxgate_core::Role;

use crate::engine::AccessControl;
use crate::engine::Grant;
use crate::error::AuthzError;
use crate::request::AuthorizeRequest;

/// Group membership operations.
pub struct GroupRoleService {
    /// Decision engine and repository access.
    access: Arc<AccessControl>,
}

impl GroupRoleService {
    /// Creates a group role service.
    #[must_use]
    pub const fn new(access: Arc<AccessControl>) -> Self {
        Self {
            access,
        }
    }

    /// Adds memberships to a group.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Conflict`] when a member already belongs to the
    /// group, [`AuthzError::Forbidden`] when the caller lacks the rights to
    /// grant the requested roles, and repository errors.
    pub async fn create_roles_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), AuthzError> {
        validate_members(group_id, members)?;
        let grant =
            self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Admin)).await?;
        if members.iter().any(|member| member.role == Role::Owner) && !has_owner_rights(grant) {
            return Err(AuthzError::Forbidden);
        }
        let mut generations = Vec::with_capacity(members.len());
        for member in members {
            generations.push(self.access.role_generation(group_id, &member.member_id).await);
        }
        self.access
            .within(
                "group_roles.save_roles_by_group",
                self.access.group_roles().save_roles_by_group(group_id, members),
            )
            .await??;
        for (member, generation) in members.iter().zip(generations) {
            self.access.remember_role(group_id, &member.member_id, member.role, generation).await;
        }
        Ok(())
    }

    /// Changes the roles of existing members.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::NotFound`] when a member has no membership,
    /// [`AuthzError::Forbidden`] when promoting to or demoting from `Owner`
    /// without owner rights, and repository errors.
    pub async fn update_roles_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        members: &[GroupMember],
    ) -> Result<(), AuthzError> {
        validate_members(group_id, members)?;
        let grant =
            self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Admin)).await?;
        if !has_owner_rights(grant) {
            let member_ids: Vec<MemberId> =
                members.iter().map(|member| member.member_id.clone()).collect();
            let promotes = members.iter().any(|member| member.role == Role::Owner);
            if promotes || self.touches_owner(group_id, &member_ids).await? {
                return Err(AuthzError::Forbidden);
            }
        }
        for member in members {
            self.access.invalidate_role(group_id, &member.member_id).await?;
        }
        self.access
            .within(
                "group_roles.update_roles_by_group",
                self.access.group_roles().update_roles_by_group(group_id, members),
            )
            .await??;
        for member in members {
            self.access.invalidate_role(group_id, &member.member_id).await?;
        }
        Ok(())
    }

    /// Removes memberships from a group; absent members are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`AuthzError::Forbidden`] when removing an owner without owner
    /// rights, cache invalidation failures as [`AuthzError::Storage`], and
    /// repository errors.
    pub async fn remove_roles_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<(), AuthzError> {
        if member_ids.is_empty() {
            return Err(AuthzError::Malformed("at least one member is required".to_string()));
        }
        let grant =
            self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Admin)).await?;
        if !has_owner_rights(grant) && self.touches_owner(group_id, member_ids).await? {
            return Err(AuthzError::Forbidden);
        }
        for member_id in member_ids {
            self.access.invalidate_role(group_id, member_id).await?;
        }
        self.access
            .within(
                "group_roles.remove_roles_by_group",
                self.access.group_roles().remove_roles_by_group(group_id, member_ids),
            )
            .await??;
        for member_id in member_ids {
            self.access.invalidate_role(group_id, member_id).await?;
        }
        Ok(())
    }

    /// Lists a group's memberships.
    ///
    /// # Errors
    ///
    /// Returns authorization and repository errors.
    pub async fn list_roles_by_group(
        &self,
        token: &str,
        group_id: &GroupId,
        page: &PageMetadata,
    ) -> Result<GroupMembersPage, AuthzError> {
        self.access.authorize(&AuthorizeRequest::group(token, group_id, Role::Viewer)).await?;
        Ok(self
            .access
            .within(
                "group_roles.retrieve_roles_by_group",
                self.access.group_roles().retrieve_roles_by_group(group_id, page),
            )
            .await??)
    }

    /// Returns true when any listed member currently holds `Owner`.
    async fn touches_owner(
        &self,
        group_id: &GroupId,
        member_ids: &[MemberId],
    ) -> Result<bool, AuthzError> {
        for member_id in member_ids {
            let current = self
                .access
                .within(
                    "group_roles.retrieve_role",
                    self.access.group_roles().retrieve_role(group_id, member_id),
                )
                .await?;
            match current {
                Ok(Role::Owner) => return Ok(true),
                Ok(_) | Err(RepositoryError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(false)
    }
}

/// Owner rights: global admin, organization owner, or group owner.
const fn has_owner_rights(grant: Grant) -> bool {
    matches!(grant, Grant::GlobalAdmin | Grant::OrgOwner | Grant::Role(Role::Owner))
}

/// Rejects empty batches and rows addressed to another group.
fn validate_members(group_id: &GroupId, members: &[GroupMember]) -> Result<(), AuthzError> {
    if members.is_empty() {
        return Err(AuthzError::Malformed("at least one member is required".to_string()));
    }
    if let Some(member) = members.iter().find(|member| member.group_id != *group_id) {
        return Err(AuthzError::Malformed(format!(
            "membership for group {} submitted to group {group_id}",
            member.group_id
        )));
    }
    if members.iter().any(|member| member.member_id.is_blank()) {
        return Err(AuthzError::Malformed("member id must be non-empty".to_string()));
    }
    Ok(())
}
