// # Email Adaptor
//
// This crate provides the email destination adaptor for the notifier
// system. It owns the `email` processor type.
//
// ## Implementation Status
//
// - ✅ Skips delivery when the `email` ledger slot is already processed
// - ✅ One plain-text message addressed to every destination of the subscription
// - ✅ Template key `prefix-localname`, subject per key with a default fallback
// - ✅ `mailto:` prefixes stripped from recipients
// - ✅ Send bounded by the configured timeout
// - ✅ Ledger slot written only after a successful send
// - ❌ NO retry logic (the next poll cycle is the retry)
// - ❌ NO writes to any other processor type's slot
//
// ## Security Requirements
//
// - The SMTP password NEVER appears in logs or Debug output

mod smtp;

pub use smtp::{build_message, SmtpMailer};

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use notifier_core::config::{AdaptorConfig, EmailConfig};
use notifier_core::delivery::{strip_scheme, MessageSettings};
use notifier_core::traits::transport::ContentType;
use notifier_core::traits::{
    Adaptor, AdaptorFactory, DeliveryMethod, MessageTransport, OutboundMessage, TemplateRenderer,
};
use notifier_core::{Action, Error, NotifierRegistry, Result, STATUS_OK};

/// Processor type owned by this adaptor
pub const EMAIL_PROCESSOR: &str = "email";

const MAILTO: &[&str] = &["mailto:"];

/// Email destination adaptor
pub struct EmailAdaptor {
    from: String,
    settings: MessageSettings,
    templates: Arc<dyn TemplateRenderer>,
    transport: Arc<dyn MessageTransport>,
    timeout: Duration,
}

impl EmailAdaptor {
    /// Create an adaptor sending through the given transport
    ///
    /// # Parameters
    ///
    /// - `config`: Sender address, subjects and timeout
    /// - `templates`: Body renderer
    /// - `transport`: Channel transport (SMTP in production)
    pub fn new(
        config: &EmailConfig,
        templates: Arc<dyn TemplateRenderer>,
        transport: Arc<dyn MessageTransport>,
    ) -> Self {
        Self {
            from: config.from.clone(),
            settings: MessageSettings::from_config(&config.message),
            templates,
            transport,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn build(&self, action: &Action<'_>) -> Result<OutboundMessage> {
        let subscription = action.subscription;
        let recipients: Vec<String> = subscription
            .destinations_for(EMAIL_PROCESSOR)
            .iter()
            .map(|address| strip_scheme(address, MAILTO).to_string())
            .filter(|address| !address.is_empty())
            .collect();
        if recipients.is_empty() {
            return Err(Error::config(format!(
                "Subscription {} has no email recipients",
                subscription.id
            )));
        }

        let notification = &*action.notification;
        let element = &notification.payload.name;
        let key = self.settings.template_key(element);
        let body = self
            .templates
            .render(
                element,
                &key,
                DeliveryMethod::Email,
                &notification.payload,
                &notification.extra_values,
            )
            .map_err(|e| Error::config(format!("Failed to render {}: {}", key, e)))?;

        Ok(OutboundMessage {
            from: Some(self.from.clone()),
            recipients,
            subject: Some(self.settings.subject_for(&key).to_string()),
            body,
            content_type: ContentType::PlainText,
        })
    }
}

#[async_trait]
impl Adaptor for EmailAdaptor {
    fn processor_type(&self) -> &str {
        EMAIL_PROCESSOR
    }

    async fn process(&self, action: &mut Action<'_>) -> Result<bool> {
        let href = action.notification.href.clone();
        if action
            .notification
            .ledger
            .status_for(EMAIL_PROCESSOR)
            .is_processed()
        {
            tracing::debug!("{} already emailed", href);
            return Ok(true);
        }

        let message = self.build(action)?;

        let outcome = tokio::time::timeout(self.timeout, self.transport.send(&message)).await;
        match outcome {
            Ok(Ok(())) => {
                action
                    .notification
                    .ledger
                    .update(EMAIL_PROCESSOR, Utc::now(), STATUS_OK);
                tracing::info!(
                    "Emailed {} to {} recipient(s)",
                    href,
                    message.recipients.len()
                );
                Ok(true)
            }
            Ok(Err(Error::Config(msg))) => Err(Error::Config(msg)),
            Ok(Err(e)) => {
                tracing::warn!("Email delivery of {} failed: {}", href, e);
                Ok(false)
            }
            Err(_) => {
                tracing::warn!(
                    "Email delivery of {} timed out after {:?}",
                    href,
                    self.timeout
                );
                Ok(false)
            }
        }
    }
}

/// Factory for email adaptors
pub struct EmailFactory;

impl AdaptorFactory for EmailFactory {
    fn create(
        &self,
        config: &AdaptorConfig,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Box<dyn Adaptor>> {
        match config {
            AdaptorConfig::Email(email) => {
                email.validate()?;
                let mailer = SmtpMailer::new(email)?;
                Ok(Box::new(EmailAdaptor::new(email, templates, Arc::new(mailer))))
            }
            _ => Err(Error::config("Invalid config for email adaptor")),
        }
    }
}

/// Register the email adaptor with a registry
///
/// # Example
///
/// ```rust
/// use notifier_core::NotifierRegistry;
///
/// let registry = NotifierRegistry::new();
/// notifier_adaptor_email::register(&registry);
/// assert!(registry.has_adaptor("email"));
/// ```
pub fn register(registry: &NotifierRegistry) {
    registry.register_adaptor(EMAIL_PROCESSOR, Box::new(EmailFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifier_core::config::MessageConfig;
    use notifier_core::{Notification, NotificationPayload, QName, SimpleTemplateRenderer, Subscription};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        sent: Mutex<Vec<OutboundMessage>>,
        failing: AtomicBool,
    }

    impl CountingTransport {
        fn sent(&self) -> Vec<OutboundMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageTransport for CountingTransport {
        async fn send(&self, message: &OutboundMessage) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::delivery("relay said no"));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }

        fn transport_name(&self) -> &'static str {
            "counting"
        }
    }

    fn config() -> EmailConfig {
        let mut message = MessageConfig::default();
        message
            .subjects
            .insert("CSS-invite-notification".to_string(), "Calendar shared with you".to_string());
        EmailConfig {
            from: "notifier@mysite.edu".to_string(),
            smtp_host: "smtp.mysite.edu".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            starttls: true,
            timeout_secs: 5,
            message,
        }
    }

    fn invite() -> Notification {
        Notification::new(
            "/notes/1.xml",
            NotificationPayload::new(QName::new(
                "http://calendarserver.org/ns/",
                "invite-notification",
            ))
            .with_field("summary", "share"),
        )
    }

    fn adaptor(transport: Arc<CountingTransport>) -> EmailAdaptor {
        EmailAdaptor::new(&config(), Arc::new(SimpleTemplateRenderer::new()), transport)
    }

    #[tokio::test]
    async fn test_delivers_once_and_records_success() {
        let transport = Arc::new(CountingTransport::default());
        let adaptor = adaptor(transport.clone());
        let sub = Subscription::new("mtwain", "https://cal/")
            .with_destination("email", "mailto:mtwain@mysite.edu")
            .with_destination("email", "douglm@mysite.edu");
        let mut note = invite();

        let first = adaptor.process(&mut Action::new(&mut note, &sub)).await;
        assert!(matches!(first, Ok(true)));
        assert!(note.ledger.status_for("email").is_processed());

        let second = adaptor.process(&mut Action::new(&mut note, &sub)).await;
        assert!(matches!(second, Ok(true)));

        let sent = transport.sent();
        assert_eq!(sent.len(), 1, "processed slot short-circuits");
        assert_eq!(
            sent[0].recipients,
            vec!["mtwain@mysite.edu".to_string(), "douglm@mysite.edu".to_string()]
        );
        assert_eq!(sent[0].subject.as_deref(), Some("Calendar shared with you"));
        assert_eq!(sent[0].content_type, ContentType::PlainText);
    }

    #[tokio::test]
    async fn test_failed_send_leaves_slot_untouched() {
        let transport = Arc::new(CountingTransport::default());
        transport.failing.store(true, Ordering::SeqCst);
        let adaptor = adaptor(transport.clone());
        let sub = Subscription::new("mtwain", "https://cal/")
            .with_destination("email", "mtwain@mysite.edu");
        let mut note = invite();

        let result = adaptor.process(&mut Action::new(&mut note, &sub)).await;
        assert!(matches!(result, Ok(false)));
        assert!(note.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipients_is_config_error() {
        let transport = Arc::new(CountingTransport::default());
        let adaptor = adaptor(transport.clone());
        let sub = Subscription::new("mtwain", "https://cal/");
        let mut note = invite();

        let result = adaptor.process(&mut Action::new(&mut note, &sub)).await;
        assert!(matches!(result, Err(Error::Config(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_other_slots_are_not_touched() {
        let transport = Arc::new(CountingTransport::default());
        let adaptor = adaptor(transport);
        let sub = Subscription::new("mtwain", "https://cal/")
            .with_destination("email", "mtwain@mysite.edu");
        let mut note = invite();
        note.ledger.update("sms", Utc::now(), 503);

        adaptor
            .process(&mut Action::new(&mut note, &sub))
            .await
            .unwrap();

        assert_eq!(note.ledger.len(), 2);
        assert_eq!(note.ledger.status_for("sms").status_code, Some(503));
    }

    #[test]
    fn test_factory_and_register() {
        let registry = NotifierRegistry::new();
        register(&registry);
        assert!(registry.has_adaptor("email"));

        let adaptor = registry
            .create_adaptor(
                &AdaptorConfig::Email(config()),
                Arc::new(SimpleTemplateRenderer::new()),
            )
            .unwrap();
        assert_eq!(adaptor.processor_type(), "email");

        let wrong = EmailFactory.create(
            &AdaptorConfig::Custom {
                factory: "x".to_string(),
                processor_type: "x".to_string(),
                config: Default::default(),
            },
            Arc::new(SimpleTemplateRenderer::new()),
        );
        assert!(matches!(wrong, Err(Error::Config(_))));
    }
}
