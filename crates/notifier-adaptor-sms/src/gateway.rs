//! HTTP SMS gateway transport
//!
//! One JSON `POST` per recipient:
//!
//! ```http
//! POST <gateway_url>
//! Authorization: Bearer <api_key>
//! Content-Type: application/json
//!
//! {"from": "Calendar", "to": "+15550100", "body": "Calendar shared: ..."}
//! ```
//!
//! 401/403 is a configuration error, 408/429 and 5xx are retried next cycle,
//! and any other 4xx is a permanent refusal of that recipient.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use notifier_core::config::SmsConfig;
use notifier_core::traits::{MessageTransport, OutboundMessage};
use notifier_core::{Error, Result};

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    to: &'a str,
    body: &'a str,
}

/// SMS gateway client
pub struct SmsGateway {
    client: Client,
    url: String,
    /// ⚠️ NEVER log this value
    api_key: Option<String>,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for SmsGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsGateway")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl SmsGateway {
    pub fn new(config: &SmsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.gateway_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl MessageTransport for SmsGateway {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        for recipient in &message.recipients {
            let payload = SendRequest {
                from: message.from.as_deref(),
                to: recipient,
                body: &message.body,
            };

            let mut request = self.client.post(&self.url).json(&payload);
            if let Some(api_key) = &self.api_key {
                request = request.bearer_auth(api_key);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::delivery(format!("SMS gateway request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(match status.as_u16() {
                    401 | 403 => Error::config(format!(
                        "SMS gateway rejected credentials. Status: {}",
                        status
                    )),
                    408 | 429 => Error::delivery(format!(
                        "SMS gateway asked to retry later. Status: {}",
                        status
                    )),
                    code @ 400..=499 => Error::rejected(
                        code,
                        format!("SMS gateway refused {}: {}", recipient, error_text),
                    ),
                    _ => Error::delivery(format!(
                        "SMS gateway returned {}: {}",
                        status, error_text
                    )),
                });
            }
        }
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "sms-gateway"
    }
}
