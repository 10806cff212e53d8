// # Message Transport Trait
//
// The channel-level send primitive adaptors hand rendered messages to.
//
// ## Implementations
//
// - SMTP (lettre): `notifier-adaptor-email` crate
// - HTTP SMS gateway: `notifier-adaptor-sms` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Content type of a message body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    PlainText,
    Html,
}

impl ContentType {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::PlainText => "text/plain",
            ContentType::Html => "text/html",
        }
    }
}

/// A rendered, channel-native message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Sender identity (mail From, SMS sender id)
    pub from: Option<String>,
    /// Bare recipient addresses, scheme prefixes already stripped
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body: String,
    pub content_type: ContentType,
}

/// Trait for channel transports
///
/// # Behavior
///
/// - Single attempt per call; retries belong to the engine's next cycle
/// - `Err(Error::Delivery)` for anything the channel could not do right now
/// - `Err(Error::Rejected)` when the channel permanently refused a destination
/// - `Err(Error::Config)` only for messages that can never be sent as built
///   (e.g. unparseable addresses)
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Send one message
    async fn send(&self, message: &OutboundMessage) -> Result<(), crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}
