// crates/fluxgate-gateway/src/gateway.rs
// ============================================================================
// Module: Protocol Gateway
// Description: Device-key gate in front of the message broker.
// Purpose: Authorize every publish, subscribe, and unsubscribe by key.
// Dependencies: fluxgate-core, fluxgate-config, tokio
// ============================================================================

//! ## Overview
//! Every operation resolves the device key first; the broker is touched only
//! after resolution succeeds. Resolution is never cached here: revocation
//! takes effect on the next message, and the resolved configuration is what
//! gets stamped onto that message.
//!
//! ## Invariants
//! - A refused key never reaches the broker.
//! - Resolver and broker calls are bounded by `call_timeout`.
//! - Broker errors are returned unwrapped as [`GatewayError::Broker`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fluxgate_config::DEFAULT_CALL_TIMEOUT_MS;
use fluxgate_config::GatewayConfig;
use fluxgate_core::Message;
use fluxgate_core::MessageBroker;
use fluxgate_core::MessageHandler;
use fluxgate_core::PublishConfig;
use fluxgate_core::PublishConfigResolver;
use fluxgate_core::ResolverError;
use fluxgate_core::fingerprint_secret;
use fluxgate_core::format_message;

use crate::audit::FileGatewayAuditSink;
use crate::audit::GatewayAuditEvent;
use crate::audit::GatewayAuditSink;
use crate::audit::GatewayOperation;
use crate::audit::GatewayOutcome;
use crate::audit::NoopGatewayAuditSink;
use crate::audit::StderrGatewayAuditSink;
use crate::error::GatewayError;
use crate::pubsub::InMemoryPubSub;
use crate::resolver::HttpPublishConfigResolver;

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Device-key authorization in front of a message broker.
pub struct ProtocolGateway {
    /// Device key resolver.
    resolver: Arc<dyn PublishConfigResolver>,
    /// Message broker.
    broker: Arc<dyn MessageBroker>,
    /// Deadline for each resolver and broker call.
    call_timeout: Duration,
    /// Decision audit sink.
    audit: Arc<dyn GatewayAuditSink>,
}

impl ProtocolGateway {
    /// Creates a gateway with the default deadline and no audit sink.
    #[must_use]
    pub fn new(resolver: Arc<dyn PublishConfigResolver>, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            resolver,
            broker,
            call_timeout: Duration::from_millis(DEFAULT_CALL_TIMEOUT_MS),
            audit: Arc::new(NoopGatewayAuditSink),
        }
    }

    /// Assembles an HTTP-resolved gateway over an in-memory broker from the
    /// `[gateway]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Setup`] when no resolver is configured, the
    /// resolver client cannot be built, or the audit log cannot be opened.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let resolver_config = config
            .resolver
            .as_ref()
            .ok_or_else(|| GatewayError::Setup("gateway.resolver is required".to_string()))?;
        let resolver = HttpPublishConfigResolver::from_config(resolver_config)
            .map_err(|err| GatewayError::Setup(err.to_string()))?;
        let broker = InMemoryPubSub::from_config(config);
        Self::new(Arc::new(resolver), Arc::new(broker)).configure(config)
    }

    /// Applies the deadline and audit settings of the `[gateway]` section.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Setup`] when the audit log cannot be opened.
    pub fn configure(mut self, config: &GatewayConfig) -> Result<Self, GatewayError> {
        self.call_timeout = config.call_timeout();
        if config.audit.enabled {
            self.audit = match &config.audit.path {
                Some(path) => Arc::new(
                    FileGatewayAuditSink::new(path)
                        .map_err(|err| GatewayError::Setup(format!("gateway audit log: {err}")))?,
                ),
                None => Arc::new(StderrGatewayAuditSink),
            };
        }
        Ok(self)
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn GatewayAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Returns the broker behind the gateway.
    #[must_use]
    pub const fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    /// Publishes a device message after stamping it with the resolved
    /// publisher and profile configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] when the key does not resolve,
    /// [`GatewayError::Broker`] when fan-out fails, and
    /// [`GatewayError::Deadline`] on timeout.
    pub async fn publish(&self, key: &str, mut message: Message) -> Result<(), GatewayError> {
        let topic = message.subtopic.clone();
        let config = match self.resolve(key).await {
            Ok(config) => config,
            Err(err) => return self.refuse(GatewayOperation::Publish, key, &topic, err),
        };
        format_message(&config, &mut message);
        let result = self.within("broker.publish", self.broker.publish(message)).await;
        self.finish(GatewayOperation::Publish, key, &topic, &config, result)
    }

    /// Subscribes `subscriber` to `topic` for the device holding `key`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] when the key does not resolve,
    /// [`GatewayError::Broker`] when the broker rejects the subscription, and
    /// [`GatewayError::Deadline`] on timeout.
    pub async fn subscribe(
        &self,
        key: &str,
        topic: &str,
        subscriber: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), GatewayError> {
        let config = match self.resolve(key).await {
            Ok(config) => config,
            Err(err) => return self.refuse(GatewayOperation::Subscribe, key, topic, err),
        };
        let result = self
            .within("broker.subscribe", self.broker.subscribe(subscriber, topic, handler))
            .await;
        self.finish(GatewayOperation::Subscribe, key, topic, &config, result)
    }

    /// Removes the subscription of `subscriber` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unauthorized`] when the key does not resolve,
    /// [`GatewayError::Broker`] when no such subscription exists, and
    /// [`GatewayError::Deadline`] on timeout.
    pub async fn unsubscribe(
        &self,
        key: &str,
        topic: &str,
        subscriber: &str,
    ) -> Result<(), GatewayError> {
        let config = match self.resolve(key).await {
            Ok(config) => config,
            Err(err) => return self.refuse(GatewayOperation::Unsubscribe, key, topic, err),
        };
        let result =
            self.within("broker.unsubscribe", self.broker.unsubscribe(subscriber, topic)).await;
        self.finish(GatewayOperation::Unsubscribe, key, topic, &config, result)
    }

    // ------------------------------------------------------------------------
    // Helpers.
    // ------------------------------------------------------------------------

    /// Resolves a device key. Blank keys never reach the resolver.
    async fn resolve(&self, key: &str) -> Result<PublishConfig, Refusal> {
        if key.trim().is_empty() {
            return Err(Refusal::Resolver(ResolverError::InvalidKey));
        }
        match tokio::time::timeout(self.call_timeout, self.resolver.resolve_by_key(key)).await {
            Ok(Ok(config)) => Ok(config),
            Ok(Err(err)) => Err(Refusal::Resolver(err)),
            Err(_) => Err(Refusal::Deadline),
        }
    }

    /// Bounds a broker call by the configured deadline.
    async fn within<F>(&self, call: &'static str, future: F) -> Result<(), GatewayError>
    where
        F: Future<Output = Result<(), fluxgate_core::BrokerError>>,
    {
        tokio::time::timeout(self.call_timeout, future)
            .await
            .map_err(|_| GatewayError::Deadline(call))?
            .map_err(GatewayError::from)
    }

    /// Audits and returns a refused key.
    fn refuse(
        &self,
        operation: GatewayOperation,
        key: &str,
        topic: &str,
        refusal: Refusal,
    ) -> Result<(), GatewayError> {
        let (outcome, reason, error) = match refusal {
            Refusal::Resolver(ResolverError::InvalidKey) => {
                (GatewayOutcome::Deny, "invalid_key", GatewayError::Unauthorized)
            }
            Refusal::Resolver(ResolverError::Unavailable(_)) => {
                (GatewayOutcome::Deny, "resolver_unavailable", GatewayError::Unauthorized)
            }
            Refusal::Deadline => {
                (GatewayOutcome::Error, "deadline", GatewayError::Deadline("resolver.resolve_by_key"))
            }
        };
        let mut event = GatewayAuditEvent::new(operation, outcome, reason, topic);
        event.key_fingerprint = key_fingerprint(key);
        self.audit.record(&event);
        Err(error)
    }

    /// Audits and returns the broker result for a resolved key.
    fn finish(
        &self,
        operation: GatewayOperation,
        key: &str,
        topic: &str,
        config: &PublishConfig,
        result: Result<(), GatewayError>,
    ) -> Result<(), GatewayError> {
        let (outcome, reason) = match &result {
            Ok(()) => (GatewayOutcome::Allow, "key_resolved"),
            Err(err) => (GatewayOutcome::Error, err.kind()),
        };
        let mut event = GatewayAuditEvent::new(operation, outcome, reason, topic);
        event.publisher_id = Some(config.publisher_id.as_str().to_string());
        event.key_fingerprint = key_fingerprint(key);
        self.audit.record(&event);
        result
    }
}

/// Why a key did not produce a publish configuration.
enum Refusal {
    /// Resolver answered with an error.
    Resolver(ResolverError),
    /// Resolver did not answer in time.
    Deadline,
}

/// Fingerprints a non-blank key.
fn key_fingerprint(key: &str) -> Option<String> {
    (!key.trim().is_empty()).then(|| fingerprint_secret(key))
}
