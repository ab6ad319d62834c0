// crates/fluxgate-authz/src/telemetry.rs
// ============================================================================
// Module: Authz Telemetry
// Description: Metric events for decisions, latencies, and cache lookups.
// Purpose: Provide observability hooks without hard metrics dependencies.
// Dependencies: crate::request
// ============================================================================

//! ## Overview
//! A thin metrics interface for decision counters, latency histograms, and
//! cache hit/miss counters, plus a counter for failed rollbacks.
//! Deployments plug in their own exporter.
//! Labels never carry tokens or member ids.

use std::time::Duration;

use serde::Serialize;

use crate::error::AuthzError;
use crate::request::SubjectKind;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default latency buckets in milliseconds for decision histograms.
pub const AUTHZ_LATENCY_BUCKETS_MS: &[u64] =
    &[1, 2, 5, 10, 25, 50, 100, 250, 500, 1_000, 2_000, 5_000, 10_000];

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Decision entry point.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzOperation {
    /// `authorize` dispatch.
    Authorize,
    /// Direct organization check.
    CanAccessOrg,
    /// Direct group check.
    CanAccessGroup,
}

impl AuthzOperation {
    /// Returns a stable label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authorize => "authorize",
            Self::CanAccessOrg => "can_access_org",
            Self::CanAccessGroup => "can_access_group",
        }
    }
}

/// Decision outcome classification.
///
/// # Invariants
/// - Variants are stable for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthzOutcome {
    /// Access granted.
    Allow,
    /// Authentication or authorization denial.
    Deny,
    /// Collaborator failure or deadline.
    Error,
}

impl AuthzOutcome {
    /// Classifies a decision result.
    #[must_use]
    pub fn classify<T>(result: &Result<T, AuthzError>) -> Self {
        match result {
            Ok(_) => Self::Allow,
            Err(AuthzError::Unauthenticated(_) | AuthzError::Forbidden) => Self::Deny,
            Err(_) => Self::Error,
        }
    }

    /// Returns a stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Error => "error",
        }
    }
}

/// Cache namespace for hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// Group → organization mapping.
    GroupOrg,
    /// (group, member) → role mapping.
    GroupRole,
    /// (organization, member) → role mapping.
    OrgRole,
}

impl CacheKind {
    /// Returns a stable label for the cache namespace.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GroupOrg => "group_org",
            Self::GroupRole => "group_role",
            Self::OrgRole => "org_role",
        }
    }
}

/// Cache lookup result classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheOutcome {
    /// Entry served from cache.
    Hit,
    /// Entry absent; repository consulted.
    Miss,
    /// Cache backend failed; treated as a miss.
    Error,
}

/// Decision metric event payload.
#[derive(Debug, Clone, Copy)]
pub struct AuthzMetricEvent {
    /// Decision entry point.
    pub operation: AuthzOperation,
    /// Target subject kind.
    pub subject: SubjectKind,
    /// Decision outcome.
    pub outcome: AuthzOutcome,
    /// Normalized error kind label on failure.
    pub error_kind: Option<&'static str>,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for authorization decisions.
pub trait AuthzMetrics: Send + Sync {
    /// Records a decision counter event.
    fn record_decision(&self, event: AuthzMetricEvent);
    /// Records a latency observation for the decision.
    fn record_latency(&self, event: AuthzMetricEvent, latency: Duration);
    /// Records a cache lookup.
    fn record_cache(&self, _kind: CacheKind, _outcome: CacheOutcome) {}
    /// Records a compensating write that failed and left partial state.
    fn record_rollback_failure(&self, _call: &'static str) {}
}

/// No-op metrics sink.
///
/// # Invariants
/// - Metrics are intentionally discarded.
pub struct NoopMetrics;

impl AuthzMetrics for NoopMetrics {
    fn record_decision(&self, _event: AuthzMetricEvent) {}

    fn record_latency(&self, _event: AuthzMetricEvent, _latency: Duration) {}
}
