use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::item::QName;
use crate::ledger::ProcessorLedger;

/// Kind of event a notification describes, derived from its payload element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    /// A sharing invitation
    Invite,
    /// A reply to a sharing invitation
    InviteReply,
    /// A resource was created, updated or deleted
    ResourceChange,
    /// A sharee was added or removed
    Share,
    /// Any other payload element (local name)
    Other(String),
}

/// Typed payload of a notification
///
/// `fields` holds the flattened text content of the payload element's
/// descendants, keyed by dotted local-name path (e.g. `organizer.href`).
/// `attributes` holds the payload element's own attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub name: QName,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl NotificationPayload {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn kind(&self) -> NotificationKind {
        match self.name.local_name.as_str() {
            "invite-notification" | "invite" => NotificationKind::Invite,
            "invite-reply" => NotificationKind::InviteReply,
            "resource-change" => NotificationKind::ResourceChange,
            "sharee-change" | "share" => NotificationKind::Share,
            other => NotificationKind::Other(other.to_string()),
        }
    }
}

/// Parsed notification item together with its processor ledger
///
/// The ledger is part of the notification's own data and is persisted with
/// it as one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Location of the remote item this notification was fetched from
    pub href: String,

    /// Entity tag of the fetched item, when the listing reported one
    #[serde(default)]
    pub etag: Option<String>,

    /// Creation timestamp carried by the notification itself
    #[serde(default)]
    pub dtstamp: Option<DateTime<Utc>>,

    pub payload: NotificationPayload,

    /// Delivery outcome per processor type
    #[serde(default)]
    pub ledger: ProcessorLedger,

    /// Extra key-value context handed to the template renderer
    #[serde(default)]
    pub extra_values: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(href: impl Into<String>, payload: NotificationPayload) -> Self {
        Self {
            href: href.into(),
            etag: None,
            dtstamp: None,
            payload,
            ledger: ProcessorLedger::default(),
            extra_values: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> NotificationKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSS: &str = "http://calendarserver.org/ns/";

    #[test]
    fn test_kind_from_element() {
        let invite = NotificationPayload::new(QName::new(CSS, "invite-notification"));
        assert_eq!(invite.kind(), NotificationKind::Invite);

        let reply = NotificationPayload::new(QName::new(CSS, "invite-reply"));
        assert_eq!(reply.kind(), NotificationKind::InviteReply);

        let other = NotificationPayload::new(QName::new(CSS, "something-new"));
        assert_eq!(
            other.kind(),
            NotificationKind::Other("something-new".to_string())
        );
    }

    #[test]
    fn test_new_notification_has_empty_ledger() {
        let note = Notification::new(
            "/notes/1.xml",
            NotificationPayload::new(QName::new(CSS, "invite-notification"))
                .with_field("summary", "share"),
        );

        assert!(note.ledger.is_empty());
        assert_eq!(note.payload.field("summary"), Some("share"));
    }

    #[test]
    fn test_json_roundtrip_keeps_ledger() {
        let mut note = Notification::new(
            "/notes/1.xml",
            NotificationPayload::new(QName::new(CSS, "invite-notification")),
        );
        note.ledger.update("email", Utc::now(), 200);

        let json = serde_json::to_string(&note).unwrap();
        let back: Notification = serde_json::from_str(&json).unwrap();

        assert_eq!(back, note);
        assert!(back.ledger.status_for("email").is_processed());
    }
}
