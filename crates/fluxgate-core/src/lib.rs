// crates/fluxgate-core/src/lib.rs
// ============================================================================
// Module: Fluxgate Core Library
// Description: Public API surface for the Fluxgate core.
// Purpose: Expose the tenancy model, role model, and collaborator contracts.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Fluxgate core defines the multi-tenant data model (organizations, groups,
//! memberships), the ordered role vocabulary, and the contracts for every
//! collaborator the authorization engine and protocol gateway call: identity,
//! repositories, membership caches, publish-config resolution, and the
//! message broker. It is backend-agnostic; storage and transport live in
//! sibling crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::BrokerError;
pub use interfaces::CacheError;
pub use interfaces::CacheLookup;
pub use interfaces::Generation;
pub use interfaces::GroupCache;
pub use interfaces::GroupRepository;
pub use interfaces::GroupRoleRepository;
pub use interfaces::IdProvider;
pub use interfaces::IdentityError;
pub use interfaces::IdentityProvider;
pub use interfaces::MessageBroker;
pub use interfaces::MessageHandler;
pub use interfaces::OrgCache;
pub use interfaces::OrgRepository;
pub use interfaces::ProfileRepository;
pub use interfaces::PublishConfigResolver;
pub use interfaces::RepositoryError;
pub use interfaces::ResolverError;
pub use interfaces::ThingRepository;
pub use runtime::InMemoryOrgRepository;
pub use runtime::InMemoryProfileRepository;
pub use runtime::InMemoryTenancyStore;
pub use runtime::InMemoryThingRepository;
pub use runtime::StaticIdentityProvider;
pub use runtime::UuidProvider;
