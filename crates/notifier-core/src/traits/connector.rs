// # Connector Traits
//
// Defines how notification items are discovered and fetched from a remote
// collection.
//
// ## Layers
//
// - `ItemLocator` / `ItemFetcher`: the connector protocol the engine talks to
// - `ResourceTransport` / `ResourceConnection`: raw listing and GET against
//   the remote store (WebDAV: `notifier-connector-webdav` crate)
// - `NotificationParser`: turns fetched bytes into a `Notification`
//
// `crate::connector::CollectionConnector` implements the protocol on top of
// any transport + parser pair.
//
// ## Usage
//
// ```rust,ignore
// use notifier_core::traits::{ItemFetcher, ItemLocator};
//
// let connector = /* Connector implementation */;
//
// if let Some(items) = connector.list_candidates(&subscription).await? {
//     for result in connector.fetch_batch(&items).await {
//         let notification = result?;
//         println!("{}", notification.href);
//     }
// }
// ```

use async_trait::async_trait;

use crate::model::{CollectionChild, ItemReference, Notification, Subscription};

/// Lists notification items in a subscription's collection
#[async_trait]
pub trait ItemLocator: Send + Sync {
    /// List candidate notification items
    ///
    /// # Returns
    ///
    /// - `Ok(Some(items))`: children typed as notifications (possibly empty)
    /// - `Ok(None)`: the collection itself could not be enumerated
    /// - `Err(Error::Connector)`: transport or parse failure; never a partial list
    async fn list_candidates(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Vec<ItemReference>>, crate::Error>;

    /// Whether the collection may have changed since the last listing
    ///
    /// Change tokens are not tracked, so every listing is a full re-list.
    async fn changed(&self, _subscription: &Subscription) -> Result<bool, crate::Error> {
        Ok(true)
    }
}

/// Fetches and parses notification items
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// Fetch a single item
    ///
    /// A parse failure is an error for this item only.
    async fn fetch(&self, item: &ItemReference) -> Result<Notification, crate::Error>;

    /// Fetch several items, one result per input item, in input order
    ///
    /// Failures are isolated: one failing item does not prevent the others
    /// from being fetched.
    async fn fetch_batch(&self, items: &[ItemReference]) -> Vec<Result<Notification, crate::Error>> {
        let mut results = Vec::with_capacity(items.len());
        for item in items {
            results.push(self.fetch(item).await);
        }
        results
    }
}

/// A complete connector: locator + fetcher
pub trait Connector: ItemLocator + ItemFetcher {
    /// Connector name (for logging/debugging)
    fn connector_name(&self) -> &'static str;
}

/// Transport-level access to the remote resource store
///
/// # Connection Scope
///
/// Each locator/fetcher operation acquires its own connection and drops it
/// before returning, on success and error paths alike. Implementations
/// release underlying resources in `Drop`; callers must not assume a
/// connection outlives the operation that opened it.
#[async_trait]
pub trait ResourceTransport: Send + Sync {
    /// Open a connection for one operation
    async fn connect(&self) -> Result<Box<dyn ResourceConnection>, crate::Error>;

    /// Transport name (for logging/debugging)
    fn transport_name(&self) -> &'static str;
}

/// One open connection to the remote resource store
#[async_trait]
pub trait ResourceConnection: Send {
    /// List the immediate children of a collection
    ///
    /// # Returns
    ///
    /// - `Ok(Some(children))`: the collection's children with their resource types
    /// - `Ok(None)`: the collection could not be enumerated
    /// - `Err(Error)`: transport failure
    async fn list_children(
        &mut self,
        collection_uri: &str,
    ) -> Result<Option<Vec<CollectionChild>>, crate::Error>;

    /// Retrieve the raw content of one item
    async fn get(&mut self, href: &str) -> Result<Vec<u8>, crate::Error>;
}

/// Parses raw item content into a notification
pub trait NotificationParser: Send + Sync {
    /// Parse fetched bytes
    ///
    /// The returned ledger holds exactly the processor entries found in the
    /// content.
    fn parse(&self, href: &str, raw: &[u8]) -> Result<Notification, crate::Error>;
}

/// Helper trait for constructing connectors from configuration
pub trait ConnectorFactory: Send + Sync {
    /// Create a connector from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Connector configuration
    /// - `engine`: Engine settings (transport timeout)
    fn create(
        &self,
        config: &crate::config::ConnectorConfig,
        engine: &crate::config::EngineConfig,
    ) -> Result<Box<dyn Connector>, crate::Error>;
}
