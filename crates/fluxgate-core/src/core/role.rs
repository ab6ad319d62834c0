// crates/fluxgate-core/src/core/role.rs
// ============================================================================
// Module: Fluxgate Role Model
// Description: Ordered permission vocabulary and the comparison rule.
// Purpose: Keep the role hierarchy auditable as a single total order.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Roles form a strict total order `Viewer < Editor < Admin < Owner`. The same
//! four values double as action tags: an action requires a rank, and a held
//! role permits the action when its rank is at least that rank.
//!
//! Unrecognized role labels never compare; [`permits_label`] fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Role
// ============================================================================

/// Membership role and action tag.
///
/// # Invariants
/// - Declaration order is the rank order; `Ord` is derived from it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Read and modify resources.
    Editor,
    /// Manage resources and memberships below owner.
    Admin,
    /// Full control, including removal.
    Owner,
}

impl Role {
    /// All roles in ascending rank order.
    pub const ALL: [Self; 4] = [Self::Viewer, Self::Editor, Self::Admin, Self::Owner];

    /// Returns the numeric rank of the role.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::Editor => 2,
            Self::Admin => 3,
            Self::Owner => 4,
        }
    }

    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Returns true when this held role permits `required`.
    #[must_use]
    pub const fn permits(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role label is not part of the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            "owner" => Ok(Self::Owner),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Permission Rule
// ============================================================================

/// Returns `rank(held) >= rank(required)`.
#[must_use]
pub const fn permits(held: Role, required: Role) -> bool {
    held.permits(required)
}

/// Applies [`permits`] to a raw role label, denying unknown labels.
#[must_use]
pub fn permits_label(held: &str, required: Role) -> bool {
    held.parse::<Role>().is_ok_and(|role| role.permits(required))
}
