//! Collection connector
//!
//! Implements the connector protocol ([`ItemLocator`] + [`ItemFetcher`]) on
//! top of any [`ResourceTransport`] and [`NotificationParser`].
//!
//! ## Guarantees
//!
//! - Listing keeps only children typed as notifications, without duplicates
//! - Every operation opens its own connection and drops it on every exit path
//! - Every transport operation is bounded by the configured timeout
//! - Every fault leaves as [`Error::Connector`]

use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::model::{CollectionChild, ItemReference, Notification, QName, Subscription};
use crate::traits::{Connector, ItemFetcher, ItemLocator, NotificationParser, ResourceTransport};

/// Namespace of the notification resource type marker
pub const NOTIFICATION_NAMESPACE: &str = "http://calendarserver.org/ns/";

/// Resource type marking a collection child as a notification
pub fn notification_resource_type() -> QName {
    QName::new(NOTIFICATION_NAMESPACE, "notification")
}

/// Reduce a collection listing to notification item references
///
/// Children without resource types, or without the notification marker, are
/// skipped. The first occurrence of an href wins.
pub fn filter_notifications(children: Vec<CollectionChild>) -> Vec<ItemReference> {
    let marker = notification_resource_type();
    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(children.len());

    for child in children {
        if child.resource_types.is_empty() {
            trace!("Skipping untyped child {}", child.href);
            continue;
        }
        if !child.has_resource_type(&marker) {
            trace!("Skipping non-notification child {}", child.href);
            continue;
        }
        if !seen.insert(child.href.clone()) {
            continue;
        }
        items.push(ItemReference {
            href: child.href,
            etag: child.etag,
            last_modified: child.last_modified,
        });
    }

    items
}

fn into_connector_error(err: Error) -> Error {
    match err {
        Error::Connector(_) => err,
        other => Error::connector(other.to_string()),
    }
}

/// Connector over a resource transport and a notification parser
pub struct CollectionConnector {
    transport: Box<dyn ResourceTransport>,
    parser: Box<dyn NotificationParser>,
    timeout: Duration,
}

impl CollectionConnector {
    /// Create a connector
    ///
    /// # Parameters
    ///
    /// - `transport`: Remote resource access
    /// - `parser`: Payload parser for fetched items
    /// - `timeout`: Deadline applied to each transport operation
    pub fn new(
        transport: Box<dyn ResourceTransport>,
        parser: Box<dyn NotificationParser>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            parser,
            timeout,
        }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(into_connector_error),
            Err(_) => Err(Error::timeout(operation, self.timeout)),
        }
    }
}

#[async_trait]
impl ItemLocator for CollectionConnector {
    async fn list_candidates(
        &self,
        subscription: &Subscription,
    ) -> Result<Option<Vec<ItemReference>>> {
        let uri = subscription.collection_uri.as_str();
        debug!("Listing collection {} for subscription {}", uri, subscription.id);

        let mut connection = self.bounded("connect", self.transport.connect()).await?;
        let children = self
            .bounded(&format!("list {}", uri), connection.list_children(uri))
            .await?;
        drop(connection);

        let Some(children) = children else {
            warn!("Collection {} could not be enumerated", uri);
            return Ok(None);
        };

        let listed = children.len();
        let items = filter_notifications(children);
        debug!(
            "Collection {}: {} children, {} notifications",
            uri,
            listed,
            items.len()
        );
        Ok(Some(items))
    }
}

#[async_trait]
impl ItemFetcher for CollectionConnector {
    async fn fetch(&self, item: &ItemReference) -> Result<Notification> {
        debug!("Fetch item {}", item.href);

        let mut connection = self.bounded("connect", self.transport.connect()).await?;
        let raw = self
            .bounded(&format!("fetch {}", item.href), connection.get(&item.href))
            .await?;
        drop(connection);

        let mut notification = self
            .parser
            .parse(&item.href, &raw)
            .map_err(|e| Error::connector(format!("Failed to parse {}: {}", item.href, e)))?;

        if notification.etag.is_none() {
            notification.etag = item.etag.clone();
        }
        Ok(notification)
    }

    async fn fetch_batch(&self, items: &[ItemReference]) -> Vec<Result<Notification>> {
        // Sequential GETs; a multi-item query would need a REPORT search
        debug!("Fetching {} items one by one", items.len());

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            let result = self.fetch(item).await;
            if let Err(e) = &result {
                warn!("Failed to fetch {}: {}", item.href, e);
            }
            results.push(result);
        }
        results
    }
}

impl Connector for CollectionConnector {
    fn connector_name(&self) -> &'static str {
        self.transport.transport_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_keeps_only_notifications() {
        let children = vec![
            CollectionChild::new("/notes/untyped.xml"),
            CollectionChild::new("/notes/1.xml").with_resource_type(notification_resource_type()),
            CollectionChild::new("/notes/sub/")
                .with_resource_type(QName::new("DAV:", "collection")),
        ];

        let items = filter_notifications(children);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].href, "/notes/1.xml");
    }

    #[test]
    fn test_filter_drops_duplicates_and_keeps_metadata() {
        let mut first =
            CollectionChild::new("/notes/1.xml").with_resource_type(notification_resource_type());
        first.etag = Some("\"1\"".to_string());
        let second = first.clone();
        let other_ns = CollectionChild::new("/notes/2.xml")
            .with_resource_type(QName::new("urn:other", "notification"));

        let items = filter_notifications(vec![first, second, other_ns]);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].etag.as_deref(), Some("\"1\""));
    }

    #[test]
    fn test_filter_empty_listing() {
        assert!(filter_notifications(Vec::new()).is_empty());
    }
}
