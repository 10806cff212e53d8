//! WebDAV resource transport over reqwest
//!
//! Listing is a `PROPFIND` with `Depth: 1`; fetching is a plain `GET`.
//! Each connection wraps a clone of one shared client, so opening one is
//! cheap and dropping it releases nothing but the handle.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, StatusCode, Url};
use std::collections::HashMap;
use std::time::Duration;

use notifier_core::traits::{ResourceConnection, ResourceTransport};
use notifier_core::{CollectionChild, Error, Result};

use crate::multistatus::{parse_multistatus, PROPFIND_BODY};

/// Redirect hops followed when redirects are enabled
const MAX_REDIRECTS: usize = 10;

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

/// WebDAV transport settings
#[derive(Clone, Default)]
pub struct WebDavSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub headers: HashMap<String, String>,
    pub follow_redirects: bool,
    pub timeout: Option<Duration>,
}

// Custom Debug keeps the password out of logs
impl std::fmt::Debug for WebDavSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavSettings")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("follow_redirects", &self.follow_redirects)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Resource transport speaking WebDAV
pub struct WebDavTransport {
    client: Client,
    credentials: Option<Credentials>,
}

impl std::fmt::Debug for WebDavTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavTransport")
            .field(
                "username",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .field("password", &"<REDACTED>")
            .finish()
    }
}

impl WebDavTransport {
    /// Build a transport
    ///
    /// # Errors
    ///
    /// `Error::Config` for header names or values that are not valid HTTP,
    /// or when the HTTP client cannot be built.
    pub fn new(settings: WebDavSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::config(format!("Invalid header name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::config(format!("Invalid value for header {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        let redirects = if settings.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };

        let mut builder = Client::builder()
            .default_headers(headers)
            .redirect(redirects);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let credentials = match (settings.username, settings.password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => {
                return Err(Error::config(
                    "WebDAV username and password must be set together",
                ));
            }
        };

        Ok(Self {
            client,
            credentials,
        })
    }
}

#[async_trait]
impl ResourceTransport for WebDavTransport {
    async fn connect(&self) -> Result<Box<dyn ResourceConnection>> {
        Ok(Box::new(WebDavConnection {
            client: self.client.clone(),
            credentials: self.credentials.clone(),
        }))
    }

    fn transport_name(&self) -> &'static str {
        "webdav"
    }
}

struct WebDavConnection {
    client: Client,
    credentials: Option<Credentials>,
}

impl WebDavConnection {
    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.credentials {
            Some(c) => request.basic_auth(&c.username, Some(&c.password)),
            None => request,
        }
    }
}

fn parse_url(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|e| Error::connector(format!("Invalid URL {}: {}", uri, e)))
}

#[async_trait]
impl ResourceConnection for WebDavConnection {
    async fn list_children(&mut self, collection_uri: &str) -> Result<Option<Vec<CollectionChild>>> {
        let url = parse_url(collection_uri)?;
        let propfind = Method::from_bytes(b"PROPFIND")
            .map_err(|e| Error::connector(format!("Invalid method: {}", e)))?;

        let response = self
            .request(propfind, url.clone())
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(PROPFIND_BODY)
            .send()
            .await
            .map_err(|e| Error::connector(format!("PROPFIND {} failed: {}", url, e)))?;

        let status = response.status();
        if status != StatusCode::MULTI_STATUS {
            tracing::warn!("PROPFIND {} returned {}", url, status);
            return Ok(None);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::connector(format!("Failed to read PROPFIND response: {}", e)))?;

        parse_multistatus(&body, &url).map(Some)
    }

    async fn get(&mut self, href: &str) -> Result<Vec<u8>> {
        let url = parse_url(href)?;

        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .map_err(|e| Error::connector(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::connector(format!("GET {} returned {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::connector(format!("Failed to read {}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}
