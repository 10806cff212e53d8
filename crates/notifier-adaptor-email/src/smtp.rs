//! SMTP message transport (lettre)

use async_trait::async_trait;
use lettre::message::header::ContentType as MimeType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use notifier_core::config::EmailConfig;
use notifier_core::traits::transport::ContentType;
use notifier_core::traits::{MessageTransport, OutboundMessage};
use notifier_core::{Error, Result};

/// Sends messages through an SMTP relay
///
/// Building the mailer does not connect; the first send does.
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer").field("host", &self.host).finish()
    }
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host).map_err(|e| {
                Error::config(format!("Invalid SMTP relay {}: {}", config.smtp_host, e))
            })?
        } else {
            tracing::warn!(
                "SMTP relay {} configured without STARTTLS",
                config.smtp_host
            );
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };

        let mut builder = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_secs)));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            host: config.smtp_host.clone(),
        })
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::config(format!("Invalid email address {}: {}", address, e)))
}

/// Build the MIME message for an outbound message
///
/// Address problems are configuration errors; the message could never be sent.
pub fn build_message(message: &OutboundMessage) -> Result<Message> {
    let from = message
        .from
        .as_deref()
        .ok_or_else(|| Error::config("Email message has no sender"))?;
    if message.recipients.is_empty() {
        return Err(Error::config("Email message has no recipients"));
    }

    let mut builder = Message::builder().from(mailbox(from)?);
    for recipient in &message.recipients {
        builder = builder.to(mailbox(recipient)?);
    }
    if let Some(subject) = &message.subject {
        builder = builder.subject(subject.as_str());
    }

    let mime = match message.content_type {
        ContentType::PlainText => MimeType::TEXT_PLAIN,
        ContentType::Html => MimeType::TEXT_HTML,
    };

    builder
        .header(mime)
        .body(message.body.clone())
        .map_err(|e| Error::config(format!("Failed to build email: {}", e)))
}

#[async_trait]
impl MessageTransport for SmtpMailer {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let email = build_message(message)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| Error::delivery(format!("SMTP send via {} failed: {}", self.host, e)))?;
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> OutboundMessage {
        OutboundMessage {
            from: Some("notifier@mysite.edu".to_string()),
            recipients: vec!["mtwain@mysite.edu".to_string(), "douglm@mysite.edu".to_string()],
            subject: Some("Calendar shared".to_string()),
            body: "share".to_string(),
            content_type: ContentType::PlainText,
        }
    }

    #[test]
    fn test_build_message_addresses_everyone() {
        let email = build_message(&message()).unwrap();
        let formatted = String::from_utf8(email.formatted()).unwrap();

        assert!(formatted.contains("mtwain@mysite.edu"));
        assert!(formatted.contains("douglm@mysite.edu"));
        assert!(formatted.contains("Subject: Calendar shared"));
        assert!(formatted.contains("text/plain"));
    }

    #[test]
    fn test_bad_addresses_are_config_errors() {
        let mut bad_recipient = message();
        bad_recipient.recipients = vec!["not an address".to_string()];
        assert!(matches!(build_message(&bad_recipient), Err(Error::Config(_))));

        let mut no_sender = message();
        no_sender.from = None;
        assert!(matches!(build_message(&no_sender), Err(Error::Config(_))));

        let mut nobody = message();
        nobody.recipients.clear();
        assert!(matches!(build_message(&nobody), Err(Error::Config(_))));
    }
}
