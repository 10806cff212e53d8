// # Memory Notification Store
//
// In-memory implementation of NotificationStore.
//
// ## Crash Behavior
//
// - All ledgers are lost on restart/crash
// - First cycle after a restart treats every listed item as undelivered,
//   so adaptors will send again
//
// ## When to Use
//
// - Testing environments
// - Deployments where a repeated delivery after restart is acceptable

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Notification;
use crate::traits::{NotificationStore, NotificationStoreFactory};

type Collections = BTreeMap<String, BTreeMap<String, Notification>>;

/// In-memory notification store
///
/// Notifications are kept per subscription id, keyed by href, behind a
/// RwLock. Clones share the same contents.
///
/// # Example
///
/// ```rust,no_run
/// use notifier_core::store::MemoryNotificationStore;
/// use notifier_core::traits::NotificationStore;
///
/// # async fn example(notification: notifier_core::Notification) -> notifier_core::Result<()> {
/// let store = MemoryNotificationStore::new();
/// store.put("sub-1", &notification).await?;
///
/// let stored = store.get("sub-1", &notification.href).await?;
/// assert!(stored.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryNotificationStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored notifications across subscriptions
    pub async fn len(&self) -> usize {
        self.inner.read().await.values().map(BTreeMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove everything
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn get(&self, subscription_id: &str, href: &str) -> Result<Option<Notification>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(subscription_id)
            .and_then(|notes| notes.get(href))
            .cloned())
    }

    async fn put(&self, subscription_id: &str, notification: &Notification) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard
            .entry(subscription_id.to_string())
            .or_default()
            .insert(notification.href.clone(), notification.clone());
        Ok(())
    }

    async fn delete(&self, subscription_id: &str, href: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        if let Some(notes) = guard.get_mut(subscription_id) {
            notes.remove(href);
            if notes.is_empty() {
                guard.remove(subscription_id);
            }
        }
        Ok(())
    }

    async fn list(&self, subscription_id: &str) -> Result<Vec<String>, Error> {
        let guard = self.inner.read().await;
        Ok(guard
            .get(subscription_id)
            .map(|notes| notes.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for `{"type": "memory"}` store configurations
pub struct MemoryNotificationStoreFactory;

#[async_trait]
impl NotificationStoreFactory for MemoryNotificationStoreFactory {
    async fn create(
        &self,
        _config: &serde_json::Value,
    ) -> Result<Box<dyn NotificationStore>, Error> {
        Ok(Box::new(MemoryNotificationStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationPayload, QName};

    fn note(href: &str) -> Notification {
        Notification::new(
            href,
            NotificationPayload::new(QName::new("http://calendarserver.org/ns/", "invite-notification")),
        )
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryNotificationStore::new();
        assert!(store.is_empty().await);

        store.put("s1", &note("/n/1.xml")).await.unwrap();
        store.put("s2", &note("/n/1.xml")).await.unwrap();
        assert_eq!(store.len().await, 2);

        let stored = store.get("s1", "/n/1.xml").await.unwrap();
        assert_eq!(stored.map(|n| n.href), Some("/n/1.xml".to_string()));
        assert!(store.get("s1", "/n/2.xml").await.unwrap().is_none());

        store.delete("s1", "/n/1.xml").await.unwrap();
        assert!(store.get("s1", "/n/1.xml").await.unwrap().is_none());
        assert!(store.get("s2", "/n/1.xml").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_store_put_replaces_ledger() {
        let store = MemoryNotificationStore::new();
        let mut notification = note("/n/1.xml");
        store.put("s1", &notification).await.unwrap();

        notification.ledger.update("email", chrono::Utc::now(), 200);
        store.put("s1", &notification).await.unwrap();

        let stored = store.get("s1", "/n/1.xml").await.unwrap().unwrap();
        assert!(stored.ledger.status_for("email").is_processed());
        assert_eq!(store.list("s1").await.unwrap(), vec!["/n/1.xml".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store_delete_missing_is_ok() {
        let store = MemoryNotificationStore::new();
        tokio_test::assert_ok!(store.delete("s1", "/n/none.xml").await);
        assert!(store.list("s1").await.unwrap().is_empty());
    }
}
