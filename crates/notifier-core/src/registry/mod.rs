//! Plugin-based component registry
//!
//! The registry allows connectors, adaptors and notification stores to be
//! registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use notifier_core::registry::NotifierRegistry;
//!
//! let registry = NotifierRegistry::with_builtin_stores();
//!
//! // Plugin crates register their factories
//! notifier_connector_webdav::register(&registry);
//! notifier_adaptor_email::register(&registry);
//!
//! let connector = registry.create_connector(&config.connector, &config.engine)?;
//! let adaptor = registry.create_adaptor(&config.adaptors[0], templates.clone())?;
//! let store = registry.create_store(&config.store).await?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In notifier-adaptor-email crate
//! pub fn register(registry: &NotifierRegistry) {
//!     registry.register_adaptor("email", Box::new(EmailFactory));
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{AdaptorConfig, ConnectorConfig, EngineConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileNotificationStoreFactory, MemoryNotificationStoreFactory};
use crate::traits::{
    Adaptor, AdaptorFactory, Connector, ConnectorFactory, NotificationStore,
    NotificationStoreFactory, TemplateRenderer,
};

/// Registry for plugin-based component creation
///
/// Maps type names (the `type` or `factory` field of each configuration
/// block) to factory objects.
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct NotifierRegistry {
    connectors: RwLock<HashMap<String, Box<dyn ConnectorFactory>>>,
    adaptors: RwLock<HashMap<String, Box<dyn AdaptorFactory>>>,
    stores: RwLock<HashMap<String, Arc<dyn NotificationStoreFactory>>>,
}

impl NotifierRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `memory` and `file` stores pre-registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_store("memory", Box::new(MemoryNotificationStoreFactory));
        registry.register_store("file", Box::new(FileNotificationStoreFactory));
        registry
    }

    /// Register a connector factory
    ///
    /// # Parameters
    ///
    /// - `name`: Connector type name (e.g., "webdav")
    /// - `factory`: Factory object for creating connector instances
    pub fn register_connector(&self, name: impl Into<String>, factory: Box<dyn ConnectorFactory>) {
        let mut connectors = self.connectors.write().unwrap_or_else(PoisonError::into_inner);
        connectors.insert(name.into(), factory);
    }

    /// Register an adaptor factory
    ///
    /// # Parameters
    ///
    /// - `name`: Adaptor type name (e.g., "email", "sms")
    /// - `factory`: Factory object for creating adaptor instances
    pub fn register_adaptor(&self, name: impl Into<String>, factory: Box<dyn AdaptorFactory>) {
        let mut adaptors = self.adaptors.write().unwrap_or_else(PoisonError::into_inner);
        adaptors.insert(name.into(), factory);
    }

    /// Register a notification store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "memory")
    /// - `factory`: Factory object for creating store instances
    pub fn register_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn NotificationStoreFactory>,
    ) {
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Create a connector from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn Connector>)`: Created connector instance
    /// - `Err(Error)`: If the connector type is not registered or creation fails
    pub fn create_connector(
        &self,
        config: &ConnectorConfig,
        engine: &EngineConfig,
    ) -> Result<Box<dyn Connector>> {
        let connector_type = config.type_name();
        let connectors = self.connectors.read().unwrap_or_else(PoisonError::into_inner);

        let factory = connectors
            .get(connector_type)
            .ok_or_else(|| Error::config(format!("Unknown connector type: {}", connector_type)))?;

        factory.create(config, engine)
    }

    /// Create an adaptor from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Adaptor configuration
    /// - `templates`: Renderer shared by all adaptors
    pub fn create_adaptor(
        &self,
        config: &AdaptorConfig,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Box<dyn Adaptor>> {
        let adaptor_type = config.type_name();
        let adaptors = self.adaptors.read().unwrap_or_else(PoisonError::into_inner);

        let factory = adaptors
            .get(adaptor_type)
            .ok_or_else(|| Error::config(format!("Unknown adaptor type: {}", adaptor_type)))?;

        factory.create(config, templates)
    }

    /// Create a notification store from configuration
    ///
    /// Built-in stores receive the whole serialized block; custom stores
    /// receive their `config` value.
    pub async fn create_store(&self, config: &StoreConfig) -> Result<Box<dyn NotificationStore>> {
        let store_type = config.type_name();

        let factory = {
            let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
            stores
                .get(store_type)
                .cloned()
                .ok_or_else(|| Error::config(format!("Unknown store type: {}", store_type)))?
        };

        let config_json = match config {
            StoreConfig::Custom { config, .. } => config.clone(),
            other => serde_json::to_value(other)?,
        };

        factory.create(&config_json).await
    }

    /// List all registered connector types
    pub fn list_connectors(&self) -> Vec<String> {
        let connectors = self.connectors.read().unwrap_or_else(PoisonError::into_inner);
        connectors.keys().cloned().collect()
    }

    /// List all registered adaptor types
    pub fn list_adaptors(&self) -> Vec<String> {
        let adaptors = self.adaptors.read().unwrap_or_else(PoisonError::into_inner);
        adaptors.keys().cloned().collect()
    }

    /// List all registered store types
    pub fn list_stores(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    pub fn has_connector(&self, name: &str) -> bool {
        let connectors = self.connectors.read().unwrap_or_else(PoisonError::into_inner);
        connectors.contains_key(name)
    }

    pub fn has_adaptor(&self, name: &str) -> bool {
        let adaptors = self.adaptors.read().unwrap_or_else(PoisonError::into_inner);
        adaptors.contains_key(name)
    }

    pub fn has_store(&self, name: &str) -> bool {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
