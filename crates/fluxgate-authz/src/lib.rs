// crates/fluxgate-authz/src/lib.rs
// ============================================================================
// Module: Fluxgate Authz Library
// Description: Membership caches, decision engine, and group services.
// Purpose: Decide whether a caller may act on an organization or group.
// Dependencies: fluxgate-core, fluxgate-config, tokio
// ============================================================================

//! ## Overview
//! Fluxgate authz implements the hierarchical authorization path: identity
//! resolution, cache-aside membership lookups, the role-hierarchy check, and
//! the global-admin and organization-owner bypass rules. Group and membership
//! services authorize through [`AccessControl`] before touching repositories.
//!
//! Security posture: decisions fail closed and never leak raw tokens into
//! audit events or errors.

pub mod audit;
pub mod cache;
pub mod engine;
pub mod error;
pub mod group_roles;
pub mod groups;
pub mod request;
pub mod telemetry;

pub use audit::AuthzAuditEvent;
pub use audit::AuthzAuditSink;
pub use audit::AuthzAuditEventParams;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use cache::InMemoryGroupCache;
pub use cache::InMemoryOrgCache;
pub use cache::NoopGroupCache;
pub use cache::NoopOrgCache;
pub use engine::AccessControl;
pub use engine::AccessControlBuilder;
pub use engine::Grant;
pub use error::AuthzError;
pub use group_roles::GroupRoleService;
pub use groups::GroupService;
pub use request::AuthorizeRequest;
pub use request::SubjectKind;
pub use telemetry::AUTHZ_LATENCY_BUCKETS_MS;
pub use telemetry::AuthzMetricEvent;
pub use telemetry::AuthzMetrics;
pub use telemetry::AuthzOperation;
pub use telemetry::AuthzOutcome;
pub use telemetry::CacheOutcome;
pub use telemetry::CacheKind;
pub use telemetry::NoopMetrics;
