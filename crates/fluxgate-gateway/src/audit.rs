// crates/fluxgate-gateway/src/audit.rs
// ============================================================================
// Module: Gateway Audit Logging
// Description: Structured audit events for device publish/subscribe calls.
// Purpose: Record who touched which topic without logging device keys.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! One [`GatewayAuditEvent`] is emitted per gateway operation. The device
//! key appears only as a short SHA-256 fingerprint.

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

use serde::Serialize;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Gateway operation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOperation {
    /// Device publish.
    Publish,
    /// Topic subscription.
    Subscribe,
    /// Topic unsubscription.
    Unsubscribe,
}

impl GatewayOperation {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
        }
    }
}

/// Gateway decision outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayOutcome {
    /// Key resolved and the broker accepted the call.
    Allow,
    /// Key was refused.
    Deny,
    /// Key resolved but the broker or a deadline failed the call.
    Error,
}

// ============================================================================
// SECTION: Event
// ============================================================================

/// Gateway audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Gateway operation.
    pub operation: GatewayOperation,
    /// Decision outcome.
    pub outcome: GatewayOutcome,
    /// Outcome detail label.
    pub reason: &'static str,
    /// Topic the call addressed.
    pub topic: String,
    /// Resolved publisher, when the key resolved.
    pub publisher_id: Option<String>,
    /// Fingerprint of the presented key; absent for blank keys.
    pub key_fingerprint: Option<String>,
}

impl GatewayAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        operation: GatewayOperation,
        outcome: GatewayOutcome,
        reason: &'static str,
        topic: &str,
    ) -> Self {
        Self {
            event: "gateway_decision",
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
            operation,
            outcome,
            reason,
            topic: topic.to_string(),
            publisher_id: None,
            key_fingerprint: None,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for gateway decisions.
pub trait GatewayAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GatewayAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrGatewayAuditSink;

impl GatewayAuditSink for StderrGatewayAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileGatewayAuditSink {
    /// Append-only log file.
    file: Mutex<std::fs::File>,
}

impl FileGatewayAuditSink {
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

impl GatewayAuditSink for FileGatewayAuditSink {
    fn record(&self, event: &GatewayAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopGatewayAuditSink;

impl GatewayAuditSink for NoopGatewayAuditSink {
    fn record(&self, _event: &GatewayAuditEvent) {}
}
