// crates/fluxgate-authz/src/audit.rs
// ============================================================================
// Module: Authz Audit Logging
// Description: Structured audit events for authorization decisions.
// Purpose: Emit redacted decision logs without hard logging dependencies.
// Dependencies: fluxgate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Every public decision produces one [`AuthzAuditEvent`]. Tokens are
//! recorded as a short SHA-256 fingerprint only; the raw token never reaches
//! a sink.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fluxgate_core::Role;
use serde::Serialize;

use crate::request::SubjectKind;
use crate::telemetry::AuthzOperation;
use crate::telemetry::AuthzOutcome;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Authorization decision audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuthzAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Decision entry point.
    pub operation: AuthzOperation,
    /// Target subject kind.
    pub subject: SubjectKind,
    /// Target entity id.
    pub object_id: String,
    /// Required action.
    pub action: Role,
    /// Decision outcome.
    pub outcome: AuthzOutcome,
    /// Grant path or error kind label.
    pub reason: &'static str,
    /// Resolved member id when identity resolution succeeded.
    pub member_id: Option<String>,
    /// Fingerprint of the presented token.
    pub token_fingerprint: Option<String>,
}

/// Inputs required to construct an authz audit event.
pub struct AuthzAuditEventParams {
    /// Decision entry point.
    pub operation: AuthzOperation,
    /// Target subject kind.
    pub subject: SubjectKind,
    /// Target entity id.
    pub object_id: String,
    /// Required action.
    pub action: Role,
    /// Decision outcome.
    pub outcome: AuthzOutcome,
    /// Grant path or error kind label.
    pub reason: &'static str,
    /// Resolved member id.
    pub member_id: Option<String>,
    /// Fingerprint of the presented token.
    pub token_fingerprint: Option<String>,
}

impl AuthzAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: AuthzAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "authz_decision",
            timestamp_ms,
            operation: params.operation,
            subject: params.subject,
            object_id: params.object_id,
            action: params.action,
            outcome: params.outcome,
            reason: params.reason,
            member_id: params.member_id,
            token_fingerprint: params.token_fingerprint,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for authorization decisions.
pub trait AuthzAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &AuthzAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuthzAuditSink for StderrAuditSink {
    fn record(&self, event: &AuthzAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuthzAuditSink for FileAuditSink {
    fn record(&self, event: &AuthzAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuthzAuditSink for NoopAuditSink {
    fn record(&self, _event: &AuthzAuditEvent) {}
}
