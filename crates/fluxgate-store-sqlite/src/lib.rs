// crates/fluxgate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Fluxgate SQLite Store
// Description: SQLite-backed tenancy repositories.
// Purpose: Persist organizations, groups, and memberships durably.
// Dependencies: fluxgate-core, rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteTenancyStore`] implements the organization, group, and group-role
//! repository contracts over a single `SQLite` database. Membership rows
//! cascade with their group, so removing a group removes every grant on it.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::SqliteTenancyStore;
