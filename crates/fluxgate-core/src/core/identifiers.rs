// crates/fluxgate-core/src/core/identifiers.rs
// ============================================================================
// Module: Fluxgate Identifiers
// Description: Canonical opaque identifiers for tenants, groups, and members.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings wrapped in distinct types so an organization
//! id can never be passed where a group id is expected. They serialize as bare
//! strings. Validation (non-empty, length) happens at request boundaries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Declares an opaque string identifier with the shared accessor surface.
macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns true when the identifier is empty or whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

opaque_id!(
    /// Organization (tenant root) identifier.
    OrgId
);

opaque_id!(
    /// Group identifier; every group belongs to exactly one organization.
    GroupId
);

opaque_id!(
    /// Principal identifier resolved from a caller token.
    MemberId
);

opaque_id!(
    /// Thing (device) identifier scoped to a group.
    ThingId
);

opaque_id!(
    /// Profile identifier scoped to a group.
    ProfileId
);
