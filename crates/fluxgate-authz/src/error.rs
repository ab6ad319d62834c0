// crates/fluxgate-authz/src/error.rs
// ============================================================================
// Module: Authz Errors
// Description: Terminal error taxonomy for decisions and group services.
// Purpose: Keep authentication and authorization failures distinct.
// Dependencies: fluxgate-core, thiserror
// ============================================================================

//! ## Overview
//! Every decision either grants or returns exactly one [`AuthzError`].
//! Repository failures map onto the same taxonomy and are never retried here.

use fluxgate_core::IdentityError;
use fluxgate_core::RepositoryError;
use thiserror::Error;

/// Authorization and group-service errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never contain the caller's token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    /// Token is missing, invalid, or could not be verified.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Identity is valid but lacks the required role.
    #[error("forbidden")]
    Forbidden,
    /// Target entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Entity or membership already exists.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Request or stored entity is malformed.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// Collaborator storage failure.
    #[error("storage error: {0}")]
    Storage(String),
    /// An external call exceeded the configured deadline.
    #[error("deadline exceeded: {0}")]
    Deadline(&'static str),
}

impl AuthzError {
    /// Returns a stable label for audit and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Malformed(_) => "malformed",
            Self::Storage(_) => "storage",
            Self::Deadline(_) => "deadline",
        }
    }
}

impl From<RepositoryError> for AuthzError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(message) => Self::NotFound(message),
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::Malformed(message) => Self::Malformed(message),
            RepositoryError::Storage(message) => Self::Storage(message),
        }
    }
}

impl From<IdentityError> for AuthzError {
    fn from(error: IdentityError) -> Self {
        Self::Unauthenticated(error.to_string())
    }
}
