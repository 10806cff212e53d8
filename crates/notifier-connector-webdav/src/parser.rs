//! CalendarServer notification parser
//!
//! Reads notification items of the form:
//!
//! ```xml
//! <CSS:notification xmlns:CSS="http://calendarserver.org/ns/" xmlns:BSS="http://bedework.org/ns/">
//!   <BSS:processors>
//!     <BSS:processor>
//!       <BSS:type>email</BSS:type>
//!       <BSS:dtstamp>20150819T180000Z</BSS:dtstamp>
//!       <BSS:status>HTTP/1.1 200 OK</BSS:status>
//!     </BSS:processor>
//!   </BSS:processors>
//!   <CSS:dtstamp>20150819T173132Z</CSS:dtstamp>
//!   <CSS:invite-notification shared-type="calendar">
//!     <CSS:summary>share</CSS:summary>
//!     <CSS:organizer><DAV:href>mailto:mtwain@mysite.edu</DAV:href></CSS:organizer>
//!   </CSS:invite-notification>
//! </CSS:notification>
//! ```
//!
//! The first element after the processors and dtstamp is the payload. Its
//! descendants are flattened into fields keyed by dotted local-name path
//! (`organizer.href`); a descendant's attributes become `path@attr`.
//! Repeated paths are joined with `", "`.

use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;
use std::collections::BTreeMap;

use notifier_core::ledger::{parse_status_line, ProcessorStatus};
use notifier_core::traits::NotificationParser;
use notifier_core::{Error, Notification, NotificationPayload, ProcessorLedger, QName, Result};

use crate::multistatus::{local_name_of, namespace_of};

pub const CSS_NS: &str = "http://calendarserver.org/ns/";
pub const BSS_NS: &str = "http://bedework.org/ns/";

const DTSTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Parse a notification timestamp (`20150819T173132Z`, or RFC 3339)
pub fn parse_dtstamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DTSTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    namespace: String,
    local: String,
}

impl Frame {
    fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }
}

#[derive(Default)]
struct ProcessorFields {
    processor_type: String,
    dtstamp: Option<DateTime<Utc>>,
    status_code: Option<u16>,
}

#[derive(Default)]
struct NotificationReader {
    stack: Vec<Frame>,
    dtstamp: Option<DateTime<Utc>>,
    payload: Option<NotificationPayload>,
    payload_open: bool,
    processor: Option<ProcessorFields>,
    ledger: ProcessorLedger,
}

impl NotificationReader {
    fn payload_path(&self, leaf: Option<&str>) -> String {
        let mut parts: Vec<&str> = self
            .stack
            .iter()
            .skip(2)
            .map(|frame| frame.local.as_str())
            .collect();
        if let Some(leaf) = leaf {
            parts.push(leaf);
        }
        parts.join(".")
    }

    fn open(&mut self, frame: Frame, attributes: Vec<(String, String)>, empty: bool) -> Result<()> {
        match self.stack.len() {
            0 => {
                if !frame.is(CSS_NS, "notification") {
                    return Err(Error::connector(format!(
                        "Unexpected root element {}",
                        QName::new(&frame.namespace, &frame.local)
                    )));
                }
            }
            1 => {
                if frame.is(BSS_NS, "processors") || frame.is(CSS_NS, "dtstamp") {
                    // handled by text()/close()
                } else if self.payload.is_none() {
                    let mut payload =
                        NotificationPayload::new(QName::new(&frame.namespace, &frame.local));
                    payload.attributes.extend(attributes);
                    self.payload = Some(payload);
                    self.payload_open = !empty;
                } else {
                    tracing::debug!("Ignoring extra top-level element {}", frame.local);
                }
            }
            2 if self.stack[1].is(BSS_NS, "processors") => {
                if frame.is(BSS_NS, "processor") {
                    self.processor = Some(ProcessorFields::default());
                }
            }
            _ if self.payload_open => {
                let path = self.payload_path(Some(&frame.local));
                if let Some(payload) = self.payload.as_mut() {
                    for (key, value) in attributes {
                        append_field(&mut payload.fields, format!("{}@{}", path, key), &value);
                    }
                    if empty {
                        payload.fields.entry(path).or_default();
                    }
                }
            }
            _ => {}
        }

        if !empty {
            self.stack.push(frame);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        let depth = self.stack.len();
        let Some(top) = self.stack.last() else {
            return;
        };

        if depth == 2 && top.is(CSS_NS, "dtstamp") {
            self.dtstamp = parse_dtstamp(text);
            return;
        }

        if depth == 4 && top.namespace == BSS_NS {
            if let Some(processor) = self.processor.as_mut() {
                match top.local.as_str() {
                    "type" => processor.processor_type = text.trim().to_string(),
                    "dtstamp" => processor.dtstamp = parse_dtstamp(text),
                    "status" => processor.status_code = parse_status_line(text),
                    _ => {}
                }
            }
            return;
        }

        if self.payload_open && depth >= 2 {
            let path = if depth == 2 {
                "text".to_string()
            } else {
                self.payload_path(None)
            };
            if let Some(payload) = self.payload.as_mut() {
                append_field(&mut payload.fields, path, text);
            }
        }
    }

    fn close(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };

        match self.stack.len() {
            1 if self.payload_open => self.payload_open = false,
            2 if frame.is(BSS_NS, "processor") => {
                if let Some(processor) = self.processor.take() {
                    if processor.processor_type.is_empty() {
                        tracing::debug!("Ignoring processor entry without a type");
                    } else {
                        self.ledger.insert_parsed(ProcessorStatus {
                            processor_type: processor.processor_type,
                            dtstamp: processor.dtstamp,
                            status_code: processor.status_code,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    fn finish(self, href: &str) -> Result<Notification> {
        let payload = self
            .payload
            .ok_or_else(|| Error::connector(format!("Notification {} has no payload", href)))?;

        let mut notification = Notification::new(href, payload);
        notification.dtstamp = self.dtstamp;
        notification.ledger = self.ledger;
        Ok(notification)
    }
}

fn attributes_of(e: &BytesStart) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| Error::connector(format!("Bad attribute: {}", e)))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::connector(format!("Bad attribute value: {}", e)))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}

/// Add a value under `key`, joining onto an existing value with `", "`
fn append_field(fields: &mut BTreeMap<String, String>, key: String, value: &str) {
    let existing = fields.entry(key).or_default();
    if !existing.is_empty() {
        existing.push_str(", ");
    }
    existing.push_str(value);
}

/// Parser for CalendarServer/Bedework notification XML
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarServerParser;

impl CalendarServerParser {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationParser for CalendarServerParser {
    fn parse(&self, href: &str, raw: &[u8]) -> Result<Notification> {
        let mut reader = NsReader::from_reader(raw);
        reader.config_mut().trim_text(true);

        let malformed = |e: &dyn std::fmt::Display| {
            Error::connector(format!("Malformed notification {}: {}", href, e))
        };

        let mut state = NotificationReader::default();
        let mut buf = Vec::new();
        loop {
            match reader.read_resolved_event_into(&mut buf) {
                Ok((ns, Event::Start(e))) => {
                    let frame = Frame {
                        namespace: namespace_of(&ns),
                        local: local_name_of(&e),
                    };
                    state.open(frame, attributes_of(&e)?, false)?;
                }
                Ok((ns, Event::Empty(e))) => {
                    let frame = Frame {
                        namespace: namespace_of(&ns),
                        local: local_name_of(&e),
                    };
                    state.open(frame, attributes_of(&e)?, true)?;
                }
                Ok((_, Event::End(_))) => state.close(),
                Ok((_, Event::Text(t))) => {
                    let text = t.unescape().map_err(|e| malformed(&e))?;
                    state.text(&text);
                }
                Ok((_, Event::CData(c))) => {
                    state.text(&String::from_utf8_lossy(&c));
                }
                Ok((_, Event::Eof)) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(&e)),
            }
            buf.clear();
        }

        state.finish(href)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notifier_core::NotificationKind;

    const SAMPLE: &str = include_str!("../tests/fixtures/invite-notification.xml");

    #[test]
    fn test_parse_sample_invite() {
        let note = CalendarServerParser::new()
            .parse("/notes/1.xml", SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(note.href, "/notes/1.xml");
        assert_eq!(note.kind(), NotificationKind::Invite);
        assert_eq!(
            note.payload.name,
            QName::new(CSS_NS, "invite-notification")
        );
        assert_eq!(
            note.payload.attributes.get("shared-type").map(String::as_str),
            Some("calendar")
        );
        assert_eq!(note.payload.field("summary"), Some("share"));
        assert_eq!(note.payload.field("organizer.href"), Some("mailto:mtwain@mysite.edu"));
        assert_eq!(note.payload.field("organizer.common-name"), Some("Mark Twain"));
        assert_eq!(note.payload.field("href"), Some("mailto:douglm@mysite.edu"));
        assert_eq!(note.payload.field("invite-noresponse"), Some(""));
        assert_eq!(note.payload.field("access.read-write"), Some(""));
        assert_eq!(
            note.payload.field("supported-calendar-component-set.comp@name"),
            Some("VEVENT, VTODO")
        );
        assert_eq!(
            note.dtstamp.map(|d| d.to_rfc3339()),
            Some("2015-08-19T17:31:32+00:00".to_string())
        );
    }

    #[test]
    fn test_processor_without_status_is_not_processed() {
        let note = CalendarServerParser::new()
            .parse("/notes/1.xml", SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(note.ledger.len(), 1);
        let status = note.ledger.status_for("email");
        assert!(!status.is_processed());
        assert!(note.ledger.status_for("sms").status_code.is_none());
    }

    #[test]
    fn test_processed_status_is_read() {
        let xml = SAMPLE.replace(
            "<BSS:type>email</BSS:type>",
            "<BSS:type>email</BSS:type>\
             <BSS:dtstamp>20150819T180000Z</BSS:dtstamp>\
             <BSS:status>HTTP/1.1 200 OK</BSS:status>",
        );
        let note = CalendarServerParser::new()
            .parse("/notes/1.xml", xml.as_bytes())
            .unwrap();

        let status = note.ledger.status_for("email");
        assert!(status.is_processed());
        assert!(status.dtstamp.is_some());
    }

    #[test]
    fn test_wrong_root_or_missing_payload() {
        let parser = CalendarServerParser::new();

        let wrong_root = parser.parse("/x", b"<D:multistatus xmlns:D=\"DAV:\"/>");
        assert!(matches!(wrong_root, Err(Error::Connector(_))));

        let no_payload = parser.parse(
            "/x",
            b"<CSS:notification xmlns:CSS=\"http://calendarserver.org/ns/\"><CSS:dtstamp>20150819T173132Z</CSS:dtstamp></CSS:notification>",
        );
        assert!(matches!(no_payload, Err(Error::Connector(_))));

        assert!(parser.parse("/x", b"not xml at all <").is_err());
    }

    #[test]
    fn test_parse_dtstamp_formats() {
        assert!(parse_dtstamp("20150819T173132Z").is_some());
        assert!(parse_dtstamp("2015-08-19T17:31:32Z").is_some());
        assert!(parse_dtstamp("yesterday").is_none());
    }
}
