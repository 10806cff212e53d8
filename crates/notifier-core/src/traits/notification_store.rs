// # Notification Store Trait
//
// Defines the interface for persisting notifications between cycles.
//
// ## Purpose
//
// The remote collection keeps listing an item until something removes it,
// so the ledger written by adaptors has to survive re-fetches and restarts.
// The store keeps each notification (payload and ledger together) keyed by
// subscription id and item href.
//
// ## Implementations
//
// - In-memory: `MemoryNotificationStore`
// - JSON file with atomic writes: `FileNotificationStore`
//
// ## Usage
//
// ```rust,ignore
// use notifier_core::NotificationStore;
//
// let store = /* NotificationStore implementation */;
//
// if let Some(stored) = store.get("sub-1", &notification.href).await? {
//     notification.ledger.merge(&stored.ledger);
// }
//
// store.put("sub-1", &notification).await?;
// store.flush().await?;
// ```

use async_trait::async_trait;

use crate::model::Notification;

/// Trait for notification store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks; the
/// engine runs one task per subscription against the same store.
///
/// # Durability
///
/// `put` followed by `flush` must make the notification survive a restart.
/// Implementations that buffer writes persist them in `flush`.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Get a stored notification
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Notification))`: The stored notification
    /// - `Ok(None)`: Nothing stored under this key
    /// - `Err(Error)`: Storage error
    async fn get(
        &self,
        subscription_id: &str,
        href: &str,
    ) -> Result<Option<Notification>, crate::Error>;

    /// Create or replace a stored notification (keyed by its href)
    async fn put(&self, subscription_id: &str, notification: &Notification)
    -> Result<(), crate::Error>;

    /// Delete a stored notification (succeeds if it didn't exist)
    async fn delete(&self, subscription_id: &str, href: &str) -> Result<(), crate::Error>;

    /// List hrefs stored for a subscription
    async fn list(&self, subscription_id: &str) -> Result<Vec<String>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing notification stores from configuration
#[async_trait]
pub trait NotificationStoreFactory: Send + Sync {
    /// Create a store from its JSON configuration
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Box<dyn NotificationStore>, crate::Error>;
}
