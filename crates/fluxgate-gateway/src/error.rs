// crates/fluxgate-gateway/src/error.rs
// ============================================================================
// Module: Gateway Errors
// Description: Error type returned by protocol gateway operations.
// Purpose: Keep key failures opaque to devices and broker failures intact.
// Dependencies: fluxgate-core, thiserror
// ============================================================================

//! ## Overview
//! A device never learns why its key was refused: unknown, revoked, and
//! "resolver unreachable" all surface as [`GatewayError::Unauthorized`].
//! Broker failures are passed through unchanged.

use fluxgate_core::BrokerError;
use thiserror::Error;

/// Protocol gateway errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - No variant carries the presented device key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Device key did not resolve to a publish configuration.
    #[error("unauthorized device key")]
    Unauthorized,
    /// Broker rejected or failed the operation.
    #[error(transparent)]
    Broker(#[from] BrokerError),
    /// A collaborator call exceeded the configured deadline.
    #[error("deadline exceeded calling {0}")]
    Deadline(&'static str),
    /// Gateway could not be assembled from configuration.
    #[error("gateway setup failed: {0}")]
    Setup(String),
}

impl GatewayError {
    /// Returns a stable label for audit events.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Broker(_) => "broker",
            Self::Deadline(_) => "deadline",
            Self::Setup(_) => "setup",
        }
    }
}
