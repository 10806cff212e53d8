// # SMS Adaptor
//
// This crate provides the SMS destination adaptor for the notifier system.
// It owns the `sms` processor type and sends through an HTTP SMS gateway.
//
// ## Implementation Status
//
// - ✅ Skips delivery when the `sms` ledger slot is already processed
// - ✅ One message per recipient, `sms:` / `tel:` prefixes stripped
// - ✅ Subject prefixed to the body, body truncated to `max_length` characters
// - ✅ Per-recipient ledger slots (`sms:<number>`): a recipient is sent to once
// - ✅ `sms` slot written once every recipient has a terminal outcome
// - ✅ A number the gateway permanently refuses is recorded and reported as a
//      configuration problem, never retried
// - ✅ Each send bounded by the configured timeout
// - ❌ NO retry logic (the next poll cycle is the retry)
//
// ## Security Requirements
//
// - The gateway API key NEVER appears in logs or Debug output

mod gateway;

pub use gateway::SmsGateway;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use notifier_core::config::{AdaptorConfig, SmsConfig};
use notifier_core::delivery::{strip_scheme, MessageSettings};
use notifier_core::traits::transport::ContentType;
use notifier_core::traits::{
    Adaptor, AdaptorFactory, DeliveryMethod, MessageTransport, OutboundMessage, TemplateRenderer,
};
use notifier_core::{Action, Error, NotifierRegistry, Result, STATUS_OK};

/// Processor type owned by this adaptor
pub const SMS_PROCESSOR: &str = "sms";

const SMS_SCHEMES: &[&str] = &["sms:", "tel:"];

/// Ledger slot tracking delivery to a single recipient
pub fn recipient_slot(recipient: &str) -> String {
    format!("{}:{}", SMS_PROCESSOR, recipient)
}

enum SendOutcome {
    Sent,
    Refused { status: u16, reason: String },
    Pending,
}

/// Truncate to at most `max_chars` characters
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// SMS destination adaptor
pub struct SmsAdaptor {
    sender: Option<String>,
    max_length: usize,
    settings: MessageSettings,
    templates: Arc<dyn TemplateRenderer>,
    transport: Arc<dyn MessageTransport>,
    timeout: Duration,
}

impl SmsAdaptor {
    pub fn new(
        config: &SmsConfig,
        templates: Arc<dyn TemplateRenderer>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            sender: config.sender.clone(),
            max_length: config.max_length,
            settings: MessageSettings::from_config(&config.message),
            templates,
            transport,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// One `(recipient, message)` pair per destination
    fn build(&self, action: &Action<'_>) -> Result<Vec<(String, OutboundMessage)>> {
        let subscription = action.subscription;
        let recipients: Vec<&str> = subscription
            .destinations_for(SMS_PROCESSOR)
            .iter()
            .map(|address| strip_scheme(address, SMS_SCHEMES))
            .filter(|address| !address.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(Error::config(format!(
                "Subscription {} has no SMS recipients",
                subscription.id
            )));
        }

        let notification = &*action.notification;
        let element = &notification.payload.name;
        let key = self.settings.template_key(element);
        let rendered = self
            .templates
            .render(
                element,
                &key,
                DeliveryMethod::Sms,
                &notification.payload,
                &notification.extra_values,
            )
            .map_err(|e| Error::config(format!("Failed to render {}: {}", key, e)))?;

        let subject = self.settings.subject_for(&key);
        let full = format!("{}: {}", subject, rendered.trim());
        let body = truncate_chars(&full, self.max_length).to_string();

        Ok(recipients
            .into_iter()
            .map(|recipient| {
                let message = OutboundMessage {
                    from: self.sender.clone(),
                    recipients: vec![recipient.to_string()],
                    subject: None,
                    body: body.clone(),
                    content_type: ContentType::PlainText,
                };
                (recipient.to_string(), message)
            })
            .collect())
    }

    async fn send_one(&self, href: &str, message: &OutboundMessage) -> Result<SendOutcome> {
        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(())) => Ok(SendOutcome::Sent),
            Ok(Err(Error::Config(msg))) => Err(Error::Config(msg)),
            Ok(Err(Error::Rejected { status, reason })) => {
                tracing::error!(
                    "SMS gateway refused {} for {}: {}",
                    message.recipients.join(","),
                    href,
                    reason
                );
                Ok(SendOutcome::Refused { status, reason })
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    "SMS delivery of {} to {} failed: {}",
                    href,
                    message.recipients.join(","),
                    e
                );
                Ok(SendOutcome::Pending)
            }
            Err(_) => {
                tracing::warn!("SMS delivery of {} timed out after {:?}", href, self.timeout);
                Ok(SendOutcome::Pending)
            }
        }
    }
}

#[async_trait]
impl Adaptor for SmsAdaptor {
    fn processor_type(&self) -> &str {
        SMS_PROCESSOR
    }

    async fn process(&self, action: &mut Action<'_>) -> Result<bool> {
        let href = action.notification.href.clone();
        if action
            .notification
            .ledger
            .status_for(SMS_PROCESSOR)
            .is_processed()
        {
            tracing::debug!("{} already sent by SMS", href);
            return Ok(true);
        }

        let messages = self.build(action)?;
        let ledger = &mut action.notification.ledger;

        let mut pending = 0;
        let mut refused: Option<(u16, String)> = None;
        for (recipient, message) in &messages {
            let slot = recipient_slot(recipient);
            let status = ledger.status_for(&slot);
            if status.is_processed() {
                if let Some(code) = status.status_code.filter(|_| !status.is_success()) {
                    refused.get_or_insert((code, format!("{} was refused earlier", recipient)));
                }
                continue;
            }

            // Keep going so one bad number does not starve the rest
            match self.send_one(&href, message).await? {
                SendOutcome::Sent => {
                    ledger.update(&slot, Utc::now(), STATUS_OK);
                }
                SendOutcome::Refused { status, reason } => {
                    ledger.update(&slot, Utc::now(), status);
                    refused.get_or_insert((status, reason));
                }
                SendOutcome::Pending => pending += 1,
            }
        }

        if pending > 0 {
            tracing::debug!("{} has {} SMS recipient(s) still pending", href, pending);
            return Ok(false);
        }

        match refused {
            None => {
                ledger.update(SMS_PROCESSOR, Utc::now(), STATUS_OK);
                tracing::info!("Sent {} by SMS to {} recipient(s)", href, messages.len());
                Ok(true)
            }
            Some((status, reason)) => {
                ledger.update(SMS_PROCESSOR, Utc::now(), status);
                Err(Error::rejected(status, reason))
            }
        }
    }
}

/// Factory for SMS adaptors
pub struct SmsFactory;

impl AdaptorFactory for SmsFactory {
    fn create(
        &self,
        config: &AdaptorConfig,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Box<dyn Adaptor>> {
        match config {
            AdaptorConfig::Sms(sms) => {
                sms.validate()?;
                let gateway = SmsGateway::new(sms)?;
                Ok(Box::new(SmsAdaptor::new(sms, templates, Arc::new(gateway))))
            }
            _ => Err(Error::config("Invalid config for SMS adaptor")),
        }
    }
}

/// Register the SMS adaptor with a registry
///
/// # Example
///
/// ```rust
/// use notifier_core::NotifierRegistry;
///
/// let registry = NotifierRegistry::new();
/// notifier_adaptor_sms::register(&registry);
/// assert!(registry.has_adaptor("sms"));
/// ```
pub fn register(registry: &NotifierRegistry) {
    registry.register_adaptor(SMS_PROCESSOR, Box::new(SmsFactory));
}
