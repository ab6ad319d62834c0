// crates/fluxgate-core/src/core/message.rs
// ============================================================================
// Module: Fluxgate Messages
// Description: Device messages and the publish configuration stamped on them.
// Purpose: Define what protocol adapters hand to the broker.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A device publishes a [`Message`] with its key. The gateway resolves the
//! key to a [`PublishConfig`] and stamps the message with the resolved
//! publisher and profile settings via [`format_message`] before fan-out.
//! Downstream transformers and notifiers read the stamped [`ProfileConfig`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ProfileId;
use crate::core::identifiers::ThingId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Profile Configuration
// ============================================================================

/// Payload transformation rules attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformerConfig {
    /// Dotted path of the field holding the measurement payload.
    #[serde(default)]
    pub data_field: String,
    /// Payload fields kept after extraction; empty keeps all.
    #[serde(default)]
    pub data_filters: Vec<String>,
    /// Field carrying the measurement time.
    #[serde(default)]
    pub time_field: String,
    /// Format of `time_field` (e.g. `unix`, `rfc3339`).
    #[serde(default)]
    pub time_format: String,
    /// Time zone location used when parsing `time_field`.
    #[serde(default)]
    pub time_location: String,
}

/// Notification settings attached to a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Notification contacts (emails or phone numbers).
    #[serde(default)]
    pub contacts: Vec<String>,
    /// Subject line for notifications.
    #[serde(default)]
    pub subject: String,
}

/// Per-profile message handling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Payload content type (`application/json`, `application/senml+json`).
    pub content_type: String,
    /// Whether readers persist messages for this profile.
    #[serde(default)]
    pub write: bool,
    /// Whether webhooks are forwarded for this profile.
    #[serde(default)]
    pub webhook: bool,
    /// Transformation rules.
    #[serde(default)]
    pub transformer: TransformerConfig,
    /// Optional notification settings.
    #[serde(default)]
    pub notifier: Option<NotifierConfig>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            content_type: "application/senml+json".to_string(),
            write: false,
            webhook: false,
            transformer: TransformerConfig::default(),
            notifier: None,
        }
    }
}

/// Publishing context resolved from a device key.
///
/// # Invariants
/// - Produced per call by the resolver; never cached by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Publishing thing.
    pub publisher_id: ThingId,
    /// Profile the thing is attached to, when any.
    #[serde(default)]
    pub profile_id: Option<ProfileId>,
    /// Profile handling configuration.
    #[serde(default)]
    pub profile_config: ProfileConfig,
}

// ============================================================================
// SECTION: Messages
// ============================================================================

/// Device message flowing through the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Publisher identity; set by the gateway, never trusted from the device.
    #[serde(default)]
    pub publisher: Option<ThingId>,
    /// Subtopic the message is published on.
    #[serde(default)]
    pub subtopic: String,
    /// Transport protocol label (`coap`, `http`, `mqtt`, `ws`).
    pub protocol: String,
    /// Raw payload bytes.
    #[serde(default)]
    pub payload: Vec<u8>,
    /// Creation time; filled by the gateway when absent.
    #[serde(default)]
    pub created: Option<Timestamp>,
    /// Profile configuration stamped from the publish configuration.
    #[serde(default)]
    pub profile: Option<ProfileConfig>,
}

impl Message {
    /// Creates an unstamped message.
    #[must_use]
    pub fn new(protocol: impl Into<String>, subtopic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            publisher: None,
            subtopic: subtopic.into(),
            protocol: protocol.into(),
            payload,
            created: None,
            profile: None,
        }
    }
}

/// Stamps a message with the resolved publisher and profile configuration.
pub fn format_message(config: &PublishConfig, message: &mut Message) {
    message.publisher = Some(config.publisher_id.clone());
    message.profile = Some(config.profile_config.clone());
    if message.created.is_none() {
        message.created = Some(Timestamp::now());
    }
}
