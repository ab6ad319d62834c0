// crates/fluxgate-gateway/src/pubsub/tests.rs
// ============================================================================
// Module: In-Memory Pub/Sub Tests
// Description: Fan-out, subscription limits, and cancellation.
// Purpose: Validate the subscription table invariants.
// Dependencies: fluxgate-gateway, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use fluxgate_core::BrokerError;
use fluxgate_core::Message;
use fluxgate_core::MessageBroker;
use fluxgate_core::MessageHandler;

use super::InMemoryPubSub;

#[derive(Default)]
struct Collector {
    received: Mutex<Vec<Vec<u8>>>,
    cancelled: AtomicBool,
    failing: bool,
}

impl Collector {
    fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn payloads(&self) -> Vec<Vec<u8>> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageHandler for Collector {
    async fn handle(&self, message: &Message) -> Result<(), BrokerError> {
        if self.failing {
            return Err(BrokerError::Handler("socket closed".to_string()));
        }
        self.received.lock().unwrap().push(message.payload.clone());
        Ok(())
    }

    async fn cancel(&self) -> Result<(), BrokerError> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn message(topic: &str, payload: &[u8]) -> Message {
    Message::new("coap", topic, payload.to_vec())
}

#[tokio::test]
async fn publish_fans_out_to_topic_subscribers_only() {
    let pubsub = InMemoryPubSub::new(8);
    let first = Arc::new(Collector::default());
    let second = Arc::new(Collector::default());
    let elsewhere = Arc::new(Collector::default());
    pubsub.subscribe("s1", "temp", first.clone()).await.unwrap();
    pubsub.subscribe("s2", "temp", second.clone()).await.unwrap();
    pubsub.subscribe("s3", "humidity", elsewhere.clone()).await.unwrap();

    pubsub.publish(message("temp", b"21")).await.unwrap();

    assert_eq!(first.payloads(), vec![b"21".to_vec()]);
    assert_eq!(second.payloads(), vec![b"21".to_vec()]);
    assert!(elsewhere.payloads().is_empty());
}

#[tokio::test]
async fn publish_without_subscribers_succeeds() {
    let pubsub = InMemoryPubSub::new(8);
    pubsub.publish(message("temp", b"21")).await.unwrap();
    assert_eq!(pubsub.subscriber_count("temp").unwrap(), 0);
}

#[tokio::test]
async fn duplicate_subscription_is_rejected() {
    let pubsub = InMemoryPubSub::new(8);
    pubsub.subscribe("s1", "temp", Arc::new(Collector::default())).await.unwrap();
    let result = pubsub.subscribe("s1", "temp", Arc::new(Collector::default())).await;
    assert_eq!(result, Err(BrokerError::AlreadySubscribed("temp".to_string())));
    assert_eq!(pubsub.subscriber_count("temp").unwrap(), 1);
}

#[tokio::test]
async fn subscriber_limit_is_enforced_per_topic() {
    let pubsub = InMemoryPubSub::new(2);
    for subscriber in ["s1", "s2"] {
        pubsub.subscribe(subscriber, "temp", Arc::new(Collector::default())).await.unwrap();
    }
    let result = pubsub.subscribe("s3", "temp", Arc::new(Collector::default())).await;
    assert_eq!(
        result,
        Err(BrokerError::SubscriberLimit {
            topic: "temp".to_string(),
            limit: 2,
        })
    );
    pubsub.subscribe("s3", "humidity", Arc::new(Collector::default())).await.unwrap();
}

#[tokio::test]
async fn zero_limit_leaves_no_empty_topic() {
    let pubsub = InMemoryPubSub::new(0);
    let result = pubsub.subscribe("s1", "temp", Arc::new(Collector::default())).await;
    assert!(matches!(result, Err(BrokerError::SubscriberLimit { .. })));
    assert!(pubsub.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_cancels_handler_and_stops_delivery() {
    let pubsub = InMemoryPubSub::new(8);
    let collector = Arc::new(Collector::default());
    pubsub.subscribe("s1", "temp", collector.clone()).await.unwrap();

    pubsub.unsubscribe("s1", "temp").await.unwrap();
    pubsub.publish(message("temp", b"21")).await.unwrap();

    assert!(collector.cancelled.load(Ordering::SeqCst));
    assert!(collector.payloads().is_empty());
    assert!(pubsub.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsubscribe_without_subscription_is_not_subscribed() {
    let pubsub = InMemoryPubSub::new(8);
    pubsub.subscribe("s1", "temp", Arc::new(Collector::default())).await.unwrap();
    assert_eq!(
        pubsub.unsubscribe("s2", "temp").await,
        Err(BrokerError::NotSubscribed("temp".to_string()))
    );
    assert_eq!(
        pubsub.unsubscribe("s1", "humidity").await,
        Err(BrokerError::NotSubscribed("humidity".to_string()))
    );
    assert_eq!(pubsub.subscriber_count("temp").unwrap(), 1);
}

#[tokio::test]
async fn failing_handler_does_not_starve_others() {
    let pubsub = InMemoryPubSub::new(8);
    let healthy = Arc::new(Collector::default());
    pubsub.subscribe("a-broken", "temp", Arc::new(Collector::failing())).await.unwrap();
    pubsub.subscribe("b-healthy", "temp", healthy.clone()).await.unwrap();

    let result = pubsub.publish(message("temp", b"21")).await;

    assert_eq!(healthy.payloads(), vec![b"21".to_vec()]);
    match result {
        Err(BrokerError::Handler(detail)) => {
            assert!(detail.starts_with("1 of 2 handlers failed"), "{detail}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn blank_topic_and_subscriber_are_rejected() {
    let pubsub = InMemoryPubSub::new(8);
    assert_eq!(pubsub.publish(message(" ", b"")).await, Err(BrokerError::EmptyTopic));
    assert_eq!(
        pubsub.subscribe("", "temp", Arc::new(Collector::default())).await,
        Err(BrokerError::EmptySubscriber)
    );
    assert_eq!(
        pubsub.subscribe("s1", "", Arc::new(Collector::default())).await,
        Err(BrokerError::EmptyTopic)
    );
    assert_eq!(pubsub.unsubscribe("", "temp").await, Err(BrokerError::EmptySubscriber));
}
