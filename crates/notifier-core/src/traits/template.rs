use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{NotificationPayload, QName};

/// Channel a message is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Email,
    Sms,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Email => "email",
            DeliveryMethod::Sms => "sms",
        }
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders message bodies for notifications
///
/// Implementations are synchronous and must not perform I/O beyond reading
/// templates they already hold.
pub trait TemplateRenderer: Send + Sync {
    /// Render the body for a payload element and delivery method
    ///
    /// # Parameters
    ///
    /// - `element`: Qualified name of the payload element
    /// - `template_key`: Adaptor-derived key (`prefix-localname`)
    /// - `method`: Target delivery method
    /// - `payload`: The notification payload
    /// - `extra`: Additional key-value context
    fn render(
        &self,
        element: &QName,
        template_key: &str,
        method: DeliveryMethod,
        payload: &NotificationPayload,
        extra: &BTreeMap<String, String>,
    ) -> Result<String, crate::Error>;
}
