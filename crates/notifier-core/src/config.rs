//! Configuration types for the notifier system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use crate::model::Subscription;
use crate::traits::DeliveryMethod;

/// Main notifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Connector used to reach the remote collections
    pub connector: ConnectorConfig,

    /// Destination adaptors, one per processor type
    pub adaptors: Vec<AdaptorConfig>,

    /// Notification store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Subscriptions to poll
    pub subscriptions: Vec<Subscription>,

    /// Message templates
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl NotifierConfig {
    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self, crate::Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.subscriptions.is_empty() {
            return Err(crate::Error::config("No subscriptions configured"));
        }
        if self.adaptors.is_empty() {
            return Err(crate::Error::config("No adaptors configured"));
        }

        self.connector.validate()?;
        self.engine.validate()?;

        let mut processor_types = HashSet::new();
        for adaptor in &self.adaptors {
            adaptor.validate()?;
            if !processor_types.insert(adaptor.processor_type()) {
                return Err(crate::Error::config(format!(
                    "Processor type {} is configured more than once",
                    adaptor.processor_type()
                )));
            }
        }

        let mut ids = HashSet::new();
        for subscription in &self.subscriptions {
            subscription.validate()?;
            if !ids.insert(subscription.id.as_str()) {
                return Err(crate::Error::config(format!(
                    "Duplicate subscription id: {}",
                    subscription.id
                )));
            }
            for processor_type in subscription.destinations.keys() {
                if !processor_types.contains(processor_type.as_str()) {
                    return Err(crate::Error::config(format!(
                        "Subscription {} routes to {} but no such adaptor is configured",
                        subscription.id, processor_type
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Connector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorConfig {
    /// WebDAV collection connector
    Webdav {
        /// Basic auth user name
        #[serde(default)]
        username: Option<String>,
        /// Basic auth password
        #[serde(default)]
        password: Option<String>,
        /// Extra headers sent with every request
        #[serde(default)]
        headers: HashMap<String, String>,
        /// Whether to follow HTTP redirects
        #[serde(default)]
        follow_redirects: bool,
    },

    /// Custom connector
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ConnectorConfig {
    /// Validate the connector configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ConnectorConfig::Webdav {
                username, password, ..
            } => {
                if username.is_some() != password.is_some() {
                    return Err(crate::Error::config(
                        "WebDAV username and password must be set together",
                    ));
                }
                Ok(())
            }
            ConnectorConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom connector factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom connector config cannot be null"));
                }
                Ok(())
            }
        }
    }

    /// Get the connector type name
    pub fn type_name(&self) -> &str {
        match self {
            ConnectorConfig::Webdav { .. } => "webdav",
            ConnectorConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        ConnectorConfig::Webdav {
            username: None,
            password: None,
            headers: HashMap::new(),
            follow_redirects: false,
        }
    }
}

/// Subject and template-key settings shared by message adaptors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Subject per template key (`prefix-localname`)
    #[serde(default)]
    pub subjects: HashMap<String, String>,

    /// Subject used when no key-specific subject exists
    #[serde(default = "default_subject")]
    pub default_subject: String,

    /// Namespace URI -> prefix, merged over the built-in prefixes
    #[serde(default)]
    pub namespace_prefixes: HashMap<String, String>,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            subjects: HashMap::new(),
            default_subject: default_subject(),
            namespace_prefixes: HashMap::new(),
        }
    }
}

fn default_subject() -> String {
    "Notification".to_string()
}

/// Adaptor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdaptorConfig {
    /// SMTP email adaptor
    Email(EmailConfig),

    /// HTTP SMS gateway adaptor
    Sms(SmsConfig),

    /// Custom adaptor
    Custom {
        /// Factory name to use
        factory: String,
        /// Processor type the adaptor owns
        processor_type: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl AdaptorConfig {
    /// Validate the adaptor configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AdaptorConfig::Email(email) => email.validate(),
            AdaptorConfig::Sms(sms) => sms.validate(),
            AdaptorConfig::Custom {
                factory,
                processor_type,
                ..
            } => {
                if factory.is_empty() || processor_type.is_empty() {
                    return Err(crate::Error::config(
                        "Custom adaptor needs a factory and a processor type",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Factory name used to build this adaptor
    pub fn type_name(&self) -> &str {
        match self {
            AdaptorConfig::Email(_) => "email",
            AdaptorConfig::Sms(_) => "sms",
            AdaptorConfig::Custom { factory, .. } => factory,
        }
    }

    /// Processor type the adaptor owns
    pub fn processor_type(&self) -> &str {
        match self {
            AdaptorConfig::Email(_) => "email",
            AdaptorConfig::Sms(_) => "sms",
            AdaptorConfig::Custom { processor_type, .. } => processor_type,
        }
    }
}

/// SMTP email adaptor configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Sender address
    pub from: String,

    /// SMTP relay host
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Use STARTTLS (disable only for local relays)
    #[serde(default = "default_starttls")]
    pub starttls: bool,

    /// Per-send timeout (in seconds)
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub message: MessageConfig,
}

impl EmailConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.from.is_empty() {
            return Err(crate::Error::config("Email sender address cannot be empty"));
        }
        if self.smtp_host.is_empty() {
            return Err(crate::Error::config("SMTP host cannot be empty"));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(crate::Error::config(
                "SMTP username and password must be set together",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Email send timeout must be > 0"));
        }
        Ok(())
    }
}

// Custom Debug keeps credentials out of logs
impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("from", &self.from)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("starttls", &self.starttls)
            .field("timeout_secs", &self.timeout_secs)
            .field("message", &self.message)
            .finish()
    }
}

/// HTTP SMS gateway adaptor configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Gateway endpoint accepting JSON send requests
    pub gateway_url: String,

    /// Bearer token for the gateway
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sender id shown to recipients
    #[serde(default)]
    pub sender: Option<String>,

    /// Maximum body length; longer bodies are truncated
    #[serde(default = "default_sms_max_length")]
    pub max_length: usize,

    /// Per-send timeout (in seconds)
    #[serde(default = "default_send_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub message: MessageConfig,
}

impl SmsConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.gateway_url.is_empty() {
            return Err(crate::Error::config("SMS gateway URL cannot be empty"));
        }
        if !self.gateway_url.starts_with("https://") && !self.gateway_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "SMS gateway URL must use HTTP or HTTPS. Got: {}",
                self.gateway_url
            )));
        }
        if self.max_length == 0 {
            return Err(crate::Error::config("SMS max_length must be > 0"));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("SMS send timeout must be > 0"));
        }
        Ok(())
    }
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("gateway_url", &self.gateway_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("sender", &self.sender)
            .field("max_length", &self.max_length)
            .field("timeout_secs", &self.timeout_secs)
            .field("message", &self.message)
            .finish()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_starttls() -> bool {
    true
}

fn default_send_timeout_secs() -> u64 {
    30
}

fn default_sms_max_length() -> usize {
    480
}

/// Notification store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-based store
    File {
        /// Path to the store file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// One message body template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDefinition {
    /// Delivery method the template renders for
    pub method: DeliveryMethod,

    /// Template key (`prefix-localname`), or `default` for the method's fallback
    pub key: String,

    /// Body with `{{name}}` placeholders
    pub body: String,
}

/// Template configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub templates: Vec<TemplateDefinition>,
}

/// What to do with a batch when some items fail to fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchFailurePolicy {
    /// Skip failed items and dispatch the rest
    #[default]
    Isolate,
    /// Fail the whole cycle if any item fails
    AbortBatch,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between poll cycles (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Deadline for each transport operation (in seconds)
    #[serde(default = "default_transport_timeout_secs")]
    pub transport_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Handling of per-item fetch failures
    #[serde(default)]
    pub fetch_failure_policy: FetchFailurePolicy,

    /// Delete stored notifications whose item is no longer listed
    #[serde(default = "default_prune_missing")]
    pub prune_missing: bool,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.transport_timeout_secs == 0 {
            return Err(crate::Error::config("Transport timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn transport_timeout(&self) -> Duration {
        Duration::from_secs(self.transport_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            transport_timeout_secs: default_transport_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            fetch_failure_policy: FetchFailurePolicy::default(),
            prune_missing: default_prune_missing(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    300
}

fn default_transport_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_prune_missing() -> bool {
    true
}
