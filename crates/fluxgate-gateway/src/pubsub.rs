// crates/fluxgate-gateway/src/pubsub.rs
// ============================================================================
// Module: In-Memory Pub/Sub
// Description: Process-local message broker keyed by (subscriber, topic).
// Purpose: Fan messages out to adapter handlers without an external broker.
// Dependencies: fluxgate-core, tokio
// ============================================================================

//! ## Overview
//! [`InMemoryPubSub`] keeps one handler per `(subscriber, topic)` pair.
//! Publishing snapshots the topic's handlers under the lock and delivers
//! after releasing it, so a slow handler never blocks subscribe or
//! unsubscribe on the same topic.
//!
//! ## Invariants
//! - A subscriber observes a topic at most once.
//! - A topic holds at most `max_subscribers_per_topic` subscribers.
//! - Empty topics are dropped from the map.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use async_trait::async_trait;
use fluxgate_config::GatewayConfig;
use fluxgate_core::BrokerError;
use fluxgate_core::Message;
use fluxgate_core::MessageBroker;
use fluxgate_core::MessageHandler;

/// Handlers per topic, keyed by subscriber id.
type Topics = BTreeMap<String, BTreeMap<String, Arc<dyn MessageHandler>>>;

// ============================================================================
// SECTION: Broker
// ============================================================================

/// Process-local pub/sub broker.
pub struct InMemoryPubSub {
    /// Subscriptions by topic.
    topics: Mutex<Topics>,
    /// Subscriber limit per topic.
    max_subscribers_per_topic: usize,
}

impl InMemoryPubSub {
    /// Creates a broker with a per-topic subscriber limit.
    #[must_use]
    pub fn new(max_subscribers_per_topic: usize) -> Self {
        Self {
            topics: Mutex::new(BTreeMap::new()),
            max_subscribers_per_topic,
        }
    }

    /// Creates a broker from the `[gateway]` config section.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(config.max_subscriptions_per_topic)
    }

    /// Returns the number of subscribers observing `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Unavailable`] when the subscription table is
    /// poisoned.
    pub fn subscriber_count(&self, topic: &str) -> Result<usize, BrokerError> {
        Ok(self.lock()?.get(topic).map_or(0, BTreeMap::len))
    }

    /// Locks the subscription table.
    fn lock(&self) -> Result<MutexGuard<'_, Topics>, BrokerError> {
        self.topics
            .lock()
            .map_err(|_| BrokerError::Unavailable("subscription table poisoned".to_string()))
    }
}

#[async_trait]
impl MessageBroker for InMemoryPubSub {
    async fn publish(&self, message: Message) -> Result<(), BrokerError> {
        if message.subtopic.trim().is_empty() {
            return Err(BrokerError::EmptyTopic);
        }
        let handlers: Vec<Arc<dyn MessageHandler>> = {
            let guard = self.lock()?;
            guard
                .get(&message.subtopic)
                .map(|subscribers| subscribers.values().cloned().collect())
                .unwrap_or_default()
        };
        let mut failures = Vec::new();
        for handler in &handlers {
            if let Err(err) = handler.handle(&message).await {
                failures.push(err);
            }
        }
        match failures.first() {
            None => Ok(()),
            Some(first) => Err(BrokerError::Handler(format!(
                "{} of {} handlers failed; first: {first}",
                failures.len(),
                handlers.len()
            ))),
        }
    }

    async fn subscribe(
        &self,
        subscriber: &str,
        topic: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError> {
        if subscriber.trim().is_empty() {
            return Err(BrokerError::EmptySubscriber);
        }
        if topic.trim().is_empty() {
            return Err(BrokerError::EmptyTopic);
        }
        let mut guard = self.lock()?;
        let subscribers = guard.entry(topic.to_string()).or_default();
        if subscribers.contains_key(subscriber) {
            return Err(BrokerError::AlreadySubscribed(topic.to_string()));
        }
        if subscribers.len() >= self.max_subscribers_per_topic {
            let limit = self.max_subscribers_per_topic;
            if subscribers.is_empty() {
                guard.remove(topic);
            }
            return Err(BrokerError::SubscriberLimit {
                topic: topic.to_string(),
                limit,
            });
        }
        subscribers.insert(subscriber.to_string(), handler);
        drop(guard);
        Ok(())
    }

    async fn unsubscribe(&self, subscriber: &str, topic: &str) -> Result<(), BrokerError> {
        if subscriber.trim().is_empty() {
            return Err(BrokerError::EmptySubscriber);
        }
        if topic.trim().is_empty() {
            return Err(BrokerError::EmptyTopic);
        }
        let handler = {
            let mut guard = self.lock()?;
            let removed = guard.get_mut(topic).and_then(|subscribers| subscribers.remove(subscriber));
            if guard.get(topic).is_some_and(BTreeMap::is_empty) {
                guard.remove(topic);
            }
            removed
        };
        match handler {
            Some(handler) => handler.cancel().await,
            None => Err(BrokerError::NotSubscribed(topic.to_string())),
        }
    }
}

#[cfg(test)]
mod tests;
