// crates/fluxgate-core/src/runtime/identity.rs
// ============================================================================
// Module: Fluxgate Static Identity
// Description: Token table identity provider and UUID id generator.
// Purpose: Resolve caller tokens without a remote identity service.
// Dependencies: crate::{core, interfaces}, uuid
// ============================================================================

//! ## Overview
//! [`StaticIdentityProvider`] maps bearer tokens to identities from a fixed
//! table loaded at startup. Tokens are compared exactly; an empty token is
//! reported as missing rather than invalid.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::Identity;
use crate::interfaces::IdProvider;
use crate::interfaces::IdentityError;
use crate::interfaces::IdentityProvider;

// ============================================================================
// SECTION: Static Identity Provider
// ============================================================================

/// Identity provider backed by a fixed token table.
///
/// # Invariants
/// - The table is immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    /// Identities keyed by token.
    identities: BTreeMap<String, Identity>,
}

impl StaticIdentityProvider {
    /// Creates a provider from `(token, identity)` pairs; later tokens win.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = (String, Identity)>) -> Self {
        Self {
            identities: entries.into_iter().collect(),
        }
    }

    /// Adds one token binding.
    #[must_use]
    pub fn with_identity(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.identities.insert(token.into(), identity);
        self
    }

    /// Returns the number of configured tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    /// Returns true when no tokens are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn identify(&self, token: &str) -> Result<Identity, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        self.identities.get(token).cloned().ok_or(IdentityError::InvalidToken)
    }
}

// ============================================================================
// SECTION: Identifier Generation
// ============================================================================

/// Random (v4) UUID identifier generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::StaticIdentityProvider;
    use super::UuidProvider;
    use crate::core::Identity;
    use crate::core::MemberId;
    use crate::interfaces::IdProvider;
    use crate::interfaces::IdentityError;
    use crate::interfaces::IdentityProvider;

    fn provider() -> StaticIdentityProvider {
        StaticIdentityProvider::default().with_identity(
            "token-a",
            Identity {
                id: MemberId::new("member-a"),
                email: "a@example.com".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn identify_known_token() {
        let identity = provider().identify("token-a").await;
        assert_eq!(identity.map(|i| i.id), Ok(MemberId::new("member-a")));
    }

    #[tokio::test]
    async fn identify_distinguishes_missing_and_invalid() {
        assert_eq!(provider().identify("").await, Err(IdentityError::MissingToken));
        assert_eq!(provider().identify("token-b").await, Err(IdentityError::InvalidToken));
    }

    #[test]
    fn uuid_provider_yields_distinct_ids() {
        let ids = UuidProvider;
        assert_ne!(ids.id(), ids.id());
        assert_eq!(ids.id().len(), 36);
    }
}
