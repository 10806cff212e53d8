// # WebDAV Connector
//
// This crate provides the WebDAV collection connector for the notifier
// system: a resource transport (PROPFIND/GET over reqwest) and a parser for
// CalendarServer notification XML, combined into a `CollectionConnector`.
//
// ## Implementation Status
//
// - ✅ One connection per locator/fetcher operation, dropped on every exit path
// - ✅ Listing keeps only children typed `{http://calendarserver.org/ns/}notification`
// - ✅ Hrefs resolved to absolute URLs against the collection
// - ✅ Basic auth, extra headers and optional redirect following
// - ✅ Every transport operation bounded by the engine's transport timeout
// - ✅ Processor statuses embedded in the notification are read into its ledger
// - ❌ NO sync tokens (every poll is a full re-list)
// - ❌ NO multi-item REPORT fetch (items are fetched one GET at a time)
// - ❌ NO retry logic (the next poll cycle is the retry)
//
// ## Security Requirements
//
// - The password NEVER appears in logs or Debug output

mod multistatus;
mod parser;
mod transport;

pub use multistatus::parse_multistatus;
pub use parser::{parse_dtstamp, CalendarServerParser, BSS_NS, CSS_NS};
pub use transport::{WebDavSettings, WebDavTransport};

use notifier_core::config::{ConnectorConfig, EngineConfig};
use notifier_core::traits::{Connector, ConnectorFactory};
use notifier_core::{CollectionConnector, Error, NotifierRegistry, Result};

/// Build a WebDAV connector directly from settings
pub fn connector(settings: WebDavSettings, engine: &EngineConfig) -> Result<CollectionConnector> {
    let transport = WebDavTransport::new(settings)?;
    Ok(CollectionConnector::new(
        Box::new(transport),
        Box::new(CalendarServerParser::new()),
        engine.transport_timeout(),
    ))
}

/// Factory for WebDAV connectors
pub struct WebDavFactory;

impl ConnectorFactory for WebDavFactory {
    fn create(&self, config: &ConnectorConfig, engine: &EngineConfig) -> Result<Box<dyn Connector>> {
        match config {
            ConnectorConfig::Webdav {
                username,
                password,
                headers,
                follow_redirects,
            } => {
                let settings = WebDavSettings {
                    username: username.clone(),
                    password: password.clone(),
                    headers: headers.clone(),
                    follow_redirects: *follow_redirects,
                    timeout: Some(engine.transport_timeout()),
                };
                Ok(Box::new(connector(settings, engine)?))
            }
            _ => Err(Error::config("Invalid config for WebDAV connector")),
        }
    }
}

/// Register the WebDAV connector with a registry
///
/// # Example
///
/// ```rust
/// use notifier_core::NotifierRegistry;
///
/// let registry = NotifierRegistry::new();
/// notifier_connector_webdav::register(&registry);
/// assert!(registry.has_connector("webdav"));
/// ```
pub fn register(registry: &NotifierRegistry) {
    registry.register_connector("webdav", Box::new(WebDavFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_factory_creation() {
        let config = ConnectorConfig::Webdav {
            username: Some("notifier".to_string()),
            password: Some("secret".to_string()),
            headers: HashMap::new(),
            follow_redirects: true,
        };

        let connector = WebDavFactory.create(&config, &EngineConfig::default());
        assert!(connector.is_ok());
        assert_eq!(connector.unwrap().connector_name(), "webdav");
    }

    #[test]
    fn test_factory_rejects_other_config() {
        let config = ConnectorConfig::Custom {
            factory: "other".to_string(),
            config: serde_json::json!({}),
        };

        assert!(matches!(
            WebDavFactory.create(&config, &EngineConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_register() {
        let registry = NotifierRegistry::new();
        register(&registry);

        assert!(registry.has_connector("webdav"));
        let connector = registry.create_connector(&ConnectorConfig::default(), &EngineConfig::default());
        assert!(connector.is_ok());
    }
}
