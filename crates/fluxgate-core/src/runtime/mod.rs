// crates/fluxgate-core/src/runtime/mod.rs
// ============================================================================
// Module: Fluxgate Runtime
// Description: In-process implementations of the core collaborator contracts.
// Purpose: Back local deployments and tests without external services.
// Dependencies: crate::{core, interfaces}, uuid
// ============================================================================

//! ## Overview
//! The runtime provides in-memory repositories, a static token table identity
//! provider, and a UUID generator. They honor the same contracts as networked
//! backends (not-found vs conflict, atomic batch writes) so services can be
//! exercised end to end in-process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod identity;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identity::StaticIdentityProvider;
pub use identity::UuidProvider;
pub use store::InMemoryOrgRepository;
pub use store::InMemoryProfileRepository;
pub use store::InMemoryTenancyStore;
pub use store::InMemoryThingRepository;
