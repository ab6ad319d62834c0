// crates/fluxgate-authz/src/request.rs
// ============================================================================
// Module: Authorization Requests
// Description: Subject kinds and the single authorization request shape.
// Purpose: Route every resource check through one exhaustive dispatcher.
// Dependencies: fluxgate-core, serde
// ============================================================================

//! ## Overview
//! [`SubjectKind`] is a closed tag set. Organizations and groups are checked
//! directly; things and profiles resolve to their owning group first. Adding
//! a kind means extending the enum and the engine's single dispatcher.

use std::fmt;

use fluxgate_core::GroupId;
use fluxgate_core::OrgId;
use fluxgate_core::ProfileId;
use fluxgate_core::Role;
use fluxgate_core::ThingId;
use serde::Serialize;

/// Kind of entity an authorization request targets.
///
/// # Invariants
/// - Variants are stable for audit and telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// Organization (tenant root).
    Organization,
    /// Group nested in an organization.
    Group,
    /// Thing owned by a group.
    Thing,
    /// Profile owned by a group.
    Profile,
}

impl SubjectKind {
    /// Returns a stable label for the subject kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::Group => "group",
            Self::Thing => "thing",
            Self::Profile => "profile",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single authorization request.
///
/// # Invariants
/// - Pure request container; `object` is validated by the engine.
#[derive(Clone, Copy)]
pub struct AuthorizeRequest<'a> {
    /// Caller token.
    pub token: &'a str,
    /// Target entity id, interpreted according to `subject`.
    pub object: &'a str,
    /// Target entity kind.
    pub subject: SubjectKind,
    /// Required action, expressed as the minimum role.
    pub action: Role,
}

impl<'a> AuthorizeRequest<'a> {
    /// Builds a request against an organization.
    #[must_use]
    pub fn organization(token: &'a str, org_id: &'a OrgId, action: Role) -> Self {
        Self {
            token,
            object: org_id.as_str(),
            subject: SubjectKind::Organization,
            action,
        }
    }

    /// Builds a request against a group.
    #[must_use]
    pub fn group(token: &'a str, group_id: &'a GroupId, action: Role) -> Self {
        Self {
            token,
            object: group_id.as_str(),
            subject: SubjectKind::Group,
            action,
        }
    }

    /// Builds a request against a thing.
    #[must_use]
    pub fn thing(token: &'a str, thing_id: &'a ThingId, action: Role) -> Self {
        Self {
            token,
            object: thing_id.as_str(),
            subject: SubjectKind::Thing,
            action,
        }
    }

    /// Builds a request against a profile.
    #[must_use]
    pub fn profile(token: &'a str, profile_id: &'a ProfileId, action: Role) -> Self {
        Self {
            token,
            object: profile_id.as_str(),
            subject: SubjectKind::Profile,
            action,
        }
    }
}

impl fmt::Debug for AuthorizeRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeRequest")
            .field("token", &"<redacted>")
            .field("object", &self.object)
            .field("subject", &self.subject)
            .field("action", &self.action)
            .finish()
    }
}
