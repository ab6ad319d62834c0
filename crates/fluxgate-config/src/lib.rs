// crates/fluxgate-config/src/lib.rs
// ============================================================================
// Module: Fluxgate Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for fluxgate.toml semantics.
// Dependencies: fluxgate-core, fluxgate-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! `fluxgate-config` defines the configuration model for the authorization
//! engine, membership caches, tenancy store, protocol gateway, and static
//! identity table. Loading is strict and fails closed.
//!
//! Security posture: config inputs are untrusted and may carry bearer tokens;
//! token values never appear in error messages or debug output.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
