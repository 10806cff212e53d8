//! PROPFIND multistatus parsing
//!
//! Reads `DAV:response` entries into [`CollectionChild`] values. Only
//! properties from a `propstat` with a 2xx status (or no status at all) are
//! kept. Hrefs are resolved against the collection URL, and the entry for
//! the collection itself is dropped.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use reqwest::Url;

use notifier_core::ledger::parse_status_line;
use notifier_core::{CollectionChild, Error, QName, Result};

pub(crate) const DAV_NS: &str = "DAV:";

/// PROPFIND body asking for what the locator needs
pub(crate) const PROPFIND_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:getetag/>
    <D:getlastmodified/>
  </D:prop>
</D:propfind>"#;

pub(crate) fn namespace_of(ns: &ResolveResult) -> String {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => String::from_utf8_lossy(uri).into_owned(),
        _ => String::new(),
    }
}

pub(crate) fn local_name_of(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    Etag,
    LastModified,
    Status,
}

#[derive(Default)]
struct Propstat {
    resource_types: Vec<QName>,
    etag: Option<String>,
    last_modified: Option<String>,
    status: Option<u16>,
}

#[derive(Default)]
struct Response {
    href: Option<String>,
    resource_types: Vec<QName>,
    etag: Option<String>,
    last_modified: Option<String>,
}

#[derive(Default)]
struct MultistatusReader {
    children: Vec<CollectionChild>,
    response: Option<Response>,
    propstat: Option<Propstat>,
    in_resourcetype: bool,
    field: Option<Field>,
}

impl MultistatusReader {
    fn open(&mut self, namespace: &str, local: &str, empty: bool) {
        if self.in_resourcetype {
            if let Some(propstat) = self.propstat.as_mut() {
                propstat.resource_types.push(QName::new(namespace, local));
            }
            return;
        }
        if namespace != DAV_NS {
            return;
        }

        match local {
            "response" => self.response = Some(Response::default()),
            "propstat" if self.response.is_some() => self.propstat = Some(Propstat::default()),
            "resourcetype" if self.propstat.is_some() && !empty => self.in_resourcetype = true,
            "href" if self.response.is_some() && self.propstat.is_none() => {
                self.field = Some(Field::Href)
            }
            "getetag" if self.propstat.is_some() => self.field = Some(Field::Etag),
            "getlastmodified" if self.propstat.is_some() => self.field = Some(Field::LastModified),
            "status" if self.propstat.is_some() => self.field = Some(Field::Status),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        let Some(field) = self.field else {
            return;
        };
        match field {
            Field::Href => {
                if let Some(response) = self.response.as_mut() {
                    response.href = Some(text.to_string());
                }
            }
            Field::Etag | Field::LastModified | Field::Status => {
                let Some(propstat) = self.propstat.as_mut() else {
                    return;
                };
                match field {
                    Field::Etag => propstat.etag = Some(text.to_string()),
                    Field::LastModified => propstat.last_modified = Some(text.to_string()),
                    _ => propstat.status = parse_status_line(text),
                }
            }
        }
    }

    fn close(&mut self, namespace: &str, local: &str, base: &Url) {
        if namespace == DAV_NS && local == "resourcetype" {
            self.in_resourcetype = false;
            return;
        }
        if self.in_resourcetype || namespace != DAV_NS {
            return;
        }

        match local {
            "propstat" => {
                if let (Some(propstat), Some(response)) =
                    (self.propstat.take(), self.response.as_mut())
                {
                    let ok = propstat.status.is_none_or(|code| (200..300).contains(&code));
                    if ok {
                        response.resource_types.extend(propstat.resource_types);
                        response.etag = response.etag.take().or(propstat.etag);
                        response.last_modified =
                            response.last_modified.take().or(propstat.last_modified);
                    }
                }
            }
            "response" => {
                if let Some(response) = self.response.take() {
                    self.finish_response(response, base);
                }
            }
            _ => self.field = None,
        }
    }

    fn finish_response(&mut self, response: Response, base: &Url) {
        let Some(href) = response.href else {
            tracing::debug!("Skipping multistatus response without href");
            return;
        };
        let url = match base.join(&href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping unresolvable href {}: {}", href, e);
                return;
            }
        };
        if is_same_resource(&url, base) {
            return;
        }

        self.children.push(CollectionChild {
            href: url.to_string(),
            resource_types: response.resource_types,
            etag: response.etag,
            last_modified: response.last_modified,
        });
    }
}

fn is_same_resource(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
}

/// Parse a 207 body into the collection's children
pub fn parse_multistatus(body: &[u8], base: &Url) -> Result<Vec<CollectionChild>> {
    let mut reader = NsReader::from_reader(body);
    reader.config_mut().trim_text(true);

    let malformed = |e: &dyn std::fmt::Display| {
        Error::connector(format!("Malformed multistatus from {}: {}", base, e))
    };

    let mut state = MultistatusReader::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, Event::Start(e))) => {
                state.open(&namespace_of(&ns), &local_name_of(&e), false);
            }
            Ok((ns, Event::Empty(e))) => {
                let (namespace, local) = (namespace_of(&ns), local_name_of(&e));
                state.open(&namespace, &local, true);
                state.close(&namespace, &local, base);
            }
            Ok((ns, Event::End(e))) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.close(&namespace_of(&ns), &local, base);
            }
            Ok((_, Event::Text(t))) => {
                let text = t.unescape().map_err(|e| malformed(&e))?;
                state.text(&text);
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(malformed(&e)),
        }
        buf.clear();
    }

    Ok(state.children)
}
