// crates/fluxgate-core/src/core/mod.rs
// ============================================================================
// Module: Fluxgate Core Types
// Description: Tenancy model, role vocabulary, and message types.
// Purpose: Group the serializable data model behind one re-export surface.
// Dependencies: serde, serde_json, sha2, time
// ============================================================================

//! ## Overview
//! Core types are plain data: identifiers, organizations, groups,
//! memberships, the [`Role`] order, and the message/publish configuration
//! shapes used by protocol adapters. None of them perform I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod message;
pub mod model;
pub mod role;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::fingerprint_secret;
pub use identifiers::GroupId;
pub use identifiers::MemberId;
pub use identifiers::OrgId;
pub use identifiers::ProfileId;
pub use identifiers::ThingId;
pub use message::Message;
pub use message::NotifierConfig;
pub use message::ProfileConfig;
pub use message::PublishConfig;
pub use message::TransformerConfig;
pub use message::format_message;
pub use model::Group;
pub use model::GroupMember;
pub use model::GroupMembersPage;
pub use model::GroupPage;
pub use model::Identity;
pub use model::DEFAULT_PAGE_LIMIT;
pub use model::MAX_PAGE_LIMIT;
pub use model::Metadata;
pub use model::OrgMember;
pub use model::Organization;
pub use model::Page;
pub use model::PageMetadata;
pub use model::Profile;
pub use model::ProfilesPage;
pub use model::Thing;
pub use model::ThingsPage;
pub use role::Role;
pub use role::UnknownRole;
pub use role::permits;
pub use role::permits_label;
pub use time::Timestamp;
