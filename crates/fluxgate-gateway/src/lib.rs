// crates/fluxgate-gateway/src/lib.rs
// ============================================================================
// Module: Fluxgate Gateway Library
// Description: Device-key authorization for protocol adapters.
// Purpose: Gate publish/subscribe traffic behind publish-config resolution.
// Dependencies: fluxgate-core, fluxgate-config, reqwest, tokio
// ============================================================================

//! ## Overview
//! Protocol adapters (CoAP, MQTT, WebSocket, HTTP) hand every device request
//! to [`ProtocolGateway`]. The gateway resolves the device key to a
//! [`fluxgate_core::PublishConfig`] on every call, stamps outgoing messages,
//! and only then touches the [`fluxgate_core::MessageBroker`].
//!
//! Security posture: device keys are secrets. They reach the resolver and
//! nothing else; audit events carry a fingerprint.

pub mod audit;
pub mod error;
pub mod gateway;
pub mod pubsub;
pub mod resolver;

pub use audit::FileGatewayAuditSink;
pub use audit::GatewayAuditEvent;
pub use audit::GatewayAuditSink;
pub use audit::GatewayOperation;
pub use audit::GatewayOutcome;
pub use audit::NoopGatewayAuditSink;
pub use audit::StderrGatewayAuditSink;
pub use error::GatewayError;
pub use gateway::ProtocolGateway;
pub use pubsub::InMemoryPubSub;
pub use resolver::HttpPublishConfigResolver;
pub use resolver::RESOLVE_PATH;
