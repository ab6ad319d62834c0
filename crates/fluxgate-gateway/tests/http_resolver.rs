// crates/fluxgate-gateway/tests/http_resolver.rs
// ============================================================================
// Module: HTTP Resolver Tests
// Description: Gateway over the HTTP resolver and in-memory broker.
// Purpose: Exercise key resolution end to end over a loopback server.
// Dependencies: fluxgate-gateway, axum, tempfile, tokio
// ============================================================================

//! ## Overview
//! Drives [`ProtocolGateway`] against a real HTTP things-service stub and
//! the in-process broker: refusals, revocation, outage mapping, fan-out,
//! and config-driven assembly.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::GOOD_KEY;
use common::Inbox;
use common::SERVICE_TOKEN;
use common::good_config;
use common::spawn_things_stub;
use fluxgate_config::FluxgateConfig;
use fluxgate_core::Message;
use fluxgate_core::PublishConfigResolver;
use fluxgate_core::ResolverError;
use fluxgate_core::ThingId;
use fluxgate_gateway::GatewayError;
use fluxgate_gateway::HttpPublishConfigResolver;
use fluxgate_gateway::InMemoryPubSub;
use fluxgate_gateway::ProtocolGateway;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn resolver(base_url: &str, token: Option<&str>) -> HttpPublishConfigResolver {
    HttpPublishConfigResolver::new(
        base_url,
        token.map(str::to_string),
        Duration::from_millis(500),
        Duration::from_secs(2),
    )
    .unwrap()
}

fn gateway(base_url: &str) -> (ProtocolGateway, Arc<InMemoryPubSub>) {
    let broker = Arc::new(InMemoryPubSub::new(16));
    let gateway =
        ProtocolGateway::new(Arc::new(resolver(base_url, Some(SERVICE_TOKEN))), broker.clone());
    (gateway, broker)
}

// ============================================================================
// SECTION: Resolver
// ============================================================================

#[tokio::test]
async fn resolver_decodes_publish_config() {
    let stub = spawn_things_stub().await;
    let resolver = resolver(stub.base_url(), Some(SERVICE_TOKEN));
    assert!(resolver.endpoint().as_str().ends_with("/v1/publish-config"));
    assert!(!resolver.endpoint().as_str().contains("//v1"));
    assert_eq!(resolver.resolve_by_key(GOOD_KEY).await, Ok(good_config()));
}

#[tokio::test]
async fn resolver_maps_refusals_to_invalid_key() {
    let stub = spawn_things_stub().await;
    let authorized = resolver(stub.base_url(), Some(SERVICE_TOKEN));
    let unauthenticated = resolver(stub.base_url(), None);

    assert_eq!(authorized.resolve_by_key("unknown").await, Err(ResolverError::InvalidKey));
    assert_eq!(unauthenticated.resolve_by_key(GOOD_KEY).await, Err(ResolverError::InvalidKey));
}

#[tokio::test]
async fn resolver_maps_outages_to_unavailable() {
    let stub = spawn_things_stub().await;
    let resolver = resolver(stub.base_url(), Some(SERVICE_TOKEN));
    stub.fail(true);
    match resolver.resolve_by_key(GOOD_KEY).await {
        Err(ResolverError::Unavailable(detail)) => {
            assert!(detail.contains("500"), "{detail}");
            assert!(!detail.contains(GOOD_KEY), "{detail}");
        }
        other => panic!("unexpected result: {other:?}"),
    }

    let base_url = stub.base_url().to_string();
    drop(stub);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let closed = self::resolver(&base_url, Some(SERVICE_TOKEN));
    assert!(matches!(
        closed.resolve_by_key(GOOD_KEY).await,
        Err(ResolverError::Unavailable(_))
    ));
}

#[test]
fn resolver_rejects_non_http_urls() {
    let result = HttpPublishConfigResolver::new(
        "ftp://things.local",
        None,
        Duration::from_millis(500),
        Duration::from_secs(2),
    );
    assert!(matches!(result, Err(ResolverError::Unavailable(_))));
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

#[tokio::test]
async fn published_messages_reach_every_subscriber_stamped() {
    let stub = spawn_things_stub().await;
    let (gateway, broker) = gateway(stub.base_url());
    let first = Arc::new(Inbox::default());
    let second = Arc::new(Inbox::default());
    gateway.subscribe(GOOD_KEY, "temp", "ws-1", first.clone()).await.unwrap();
    gateway.subscribe(GOOD_KEY, "temp", "ws-2", second.clone()).await.unwrap();
    assert_eq!(broker.subscriber_count("temp").unwrap(), 2);

    let mut message = Message::new("http", "temp", b"{\"t\":21}".to_vec());
    message.publisher = Some(ThingId::new("spoofed"));
    gateway.publish(GOOD_KEY, message).await.unwrap();

    for inbox in [&first, &second] {
        let delivered = inbox.messages();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].publisher, Some(ThingId::new("thing-1")));
        assert_eq!(delivered[0].profile, Some(good_config().profile_config));
    }
}

#[tokio::test]
async fn revoked_key_is_refused_on_next_message() {
    let stub = spawn_things_stub().await;
    let (gateway, _) = gateway(stub.base_url());
    let inbox = Arc::new(Inbox::default());
    gateway.subscribe(GOOD_KEY, "temp", "ws-1", inbox.clone()).await.unwrap();
    gateway.publish(GOOD_KEY, Message::new("http", "temp", b"1".to_vec())).await.unwrap();

    stub.revoke(GOOD_KEY);
    let result = gateway.publish(GOOD_KEY, Message::new("http", "temp", b"2".to_vec())).await;

    assert_eq!(result, Err(GatewayError::Unauthorized));
    assert_eq!(inbox.messages().len(), 1);
    assert_eq!(stub.requests(), 3);
}

#[tokio::test]
async fn resolver_outage_refuses_without_touching_broker() {
    let stub = spawn_things_stub().await;
    let (gateway, broker) = gateway(stub.base_url());
    stub.fail(true);

    let result = gateway.subscribe(GOOD_KEY, "temp", "ws-1", Arc::new(Inbox::default())).await;

    assert_eq!(result, Err(GatewayError::Unauthorized));
    assert_eq!(broker.subscriber_count("temp").unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_subscribers_all_receive() {
    let stub = spawn_things_stub().await;
    let (gateway, broker) = gateway(stub.base_url());
    let gateway = Arc::new(gateway);
    let mut tasks = Vec::new();
    let mut inboxes = Vec::new();
    for index in 0 .. 8 {
        let inbox = Arc::new(Inbox::default());
        inboxes.push(inbox.clone());
        let gateway = gateway.clone();
        tasks.push(tokio::spawn(async move {
            gateway.subscribe(GOOD_KEY, "temp", &format!("ws-{index}"), inbox).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(broker.subscriber_count("temp").unwrap(), 8);

    gateway.publish(GOOD_KEY, Message::new("mqtt", "temp", b"x".to_vec())).await.unwrap();
    assert!(inboxes.iter().all(|inbox| inbox.messages().len() == 1));

    gateway.unsubscribe(GOOD_KEY, "temp", "ws-0").await.unwrap();
    assert_eq!(broker.subscriber_count("temp").unwrap(), 7);
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

#[tokio::test]
async fn gateway_assembles_from_config_and_audits_to_file() {
    let stub = spawn_things_stub().await;
    let dir = TempDir::new().unwrap();
    let audit_path = dir.path().join("gateway-audit.jsonl");
    let toml = format!(
        r#"
[gateway]
call_timeout_ms = 1000
max_subscriptions_per_topic = 4

[gateway.resolver]
base_url = "{base}"
auth_token = "{token}"

[gateway.audit]
enabled = true
path = "{audit}"
"#,
        base = stub.base_url(),
        token = SERVICE_TOKEN,
        audit = audit_path.display(),
    );
    let config = FluxgateConfig::from_toml_str(&toml).unwrap();
    let gateway = ProtocolGateway::from_config(&config.gateway).unwrap();

    gateway.subscribe(GOOD_KEY, "temp", "ws-1", Arc::new(Inbox::default())).await.unwrap();
    let _ = gateway.publish("wrong-key", Message::new("http", "temp", Vec::new())).await;

    let log = std::fs::read_to_string(&audit_path).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("\"outcome\":\"allow\""));
    assert!(lines[1].contains("\"reason\":\"invalid_key\""));
    assert!(!log.contains(GOOD_KEY));
    assert!(!log.contains("wrong-key"));
}

#[test]
fn gateway_without_resolver_config_is_a_setup_error() {
    let config = FluxgateConfig::from_toml_str("[gateway]\n").unwrap();
    assert!(matches!(ProtocolGateway::from_config(&config.gateway), Err(GatewayError::Setup(_))));
}
