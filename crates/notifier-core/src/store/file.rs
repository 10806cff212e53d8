// # File Notification Store
//
// File-based implementation of NotificationStore with crash recovery.
//
// ## Purpose
//
// Keeps every notification together with its processor ledger across
// daemon restarts, so a delivered notification is not sent again.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good contents
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "subscriptions": {
//     "mtwain": {
//       "/notifications/mtwain/1.xml": {
//         "href": "/notifications/mtwain/1.xml",
//         "etag": "\"17\"",
//         "payload": { "name": { ... }, "fields": { ... } },
//         "ledger": {
//           "email": { "processor_type": "email", "dtstamp": "...", "status_code": 200 }
//         }
//       }
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::model::Notification;
use crate::traits::{NotificationStore, NotificationStoreFactory};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

type Collections = BTreeMap<String, BTreeMap<String, Notification>>;

/// File-based notification store with crash recovery
///
/// Every mutation is written through to disk immediately; `flush` writes
/// only if something is still pending.
#[derive(Debug)]
pub struct FileNotificationStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
    // Serializes writers so concurrent subscriptions never share the temp file
    write_lock: Mutex<()>,
}

#[derive(Debug)]
struct FileState {
    subscriptions: Collections,
    dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(default)]
    subscriptions: Collections,
}

impl FileNotificationStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing store file
    /// 3. If it is corrupted, load the backup instead
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let subscriptions = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                subscriptions,
                dirty: false,
            })),
            write_lock: Mutex::new(()),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<Collections, Error> {
        match Self::load(path).await {
            Ok(subscriptions) => {
                tracing::debug!(
                    "Loaded notification store: {} subscriptions",
                    subscriptions.len()
                );
                Ok(subscriptions)
            }
            Err(Error::Json(e)) => {
                tracing::warn!(
                    "Store file {} appears corrupted: {}. Attempting recovery from backup.",
                    path.display(),
                    e
                );

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty store.");
                    return Ok(Collections::new());
                }

                match Self::load(&backup_path).await {
                    Ok(subscriptions) => {
                        tracing::info!(
                            "Recovered store from backup: {} subscriptions",
                            subscriptions.len()
                        );
                        if let Err(restore_err) = fs::copy(&backup_path, path).await {
                            tracing::error!(
                                "Failed to restore store file from backup: {}",
                                restore_err
                            );
                        }
                        Ok(subscriptions)
                    }
                    Err(backup_err) => {
                        tracing::error!(
                            "Backup also unreadable: {}. Starting with empty store.",
                            backup_err
                        );
                        Ok(Collections::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<Collections, Error> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(Collections::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;

        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.subscriptions)
    }

    /// Write the store to disk atomically
    async fn write(&self) -> Result<(), Error> {
        let _writer = self.write_lock.lock().await;

        let json = {
            let mut state = self.state.write().await;
            let file = StoreFileFormat {
                version: STORE_FILE_VERSION.to_string(),
                subscriptions: state.subscriptions.clone(),
            };
            state.dirty = false;
            serde_json::to_string_pretty(&file)
                .map_err(|e| Error::store(format!("Failed to serialize store: {}", e)))?
        };

        let result = self.write_file(&json).await;
        if result.is_err() {
            self.state.write().await.dirty = true;
        }
        result
    }

    async fn write_file(&self, json: &str) -> Result<(), Error> {
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                Error::store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Store written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Force immediate write to disk
    pub async fn sync(&self) -> Result<(), Error> {
        self.write().await
    }
}

#[async_trait]
impl NotificationStore for FileNotificationStore {
    async fn get(&self, subscription_id: &str, href: &str) -> Result<Option<Notification>, Error> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .get(subscription_id)
            .and_then(|notes| notes.get(href))
            .cloned())
    }

    async fn put(&self, subscription_id: &str, notification: &Notification) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            state
                .subscriptions
                .entry(subscription_id.to_string())
                .or_default()
                .insert(notification.href.clone(), notification.clone());
            state.dirty = true;
        }

        // Immediate write for durability
        self.write().await
    }

    async fn delete(&self, subscription_id: &str, href: &str) -> Result<(), Error> {
        {
            let mut state = self.state.write().await;
            let Some(notes) = state.subscriptions.get_mut(subscription_id) else {
                return Ok(());
            };
            if notes.remove(href).is_none() {
                return Ok(());
            }
            if notes.is_empty() {
                state.subscriptions.remove(subscription_id);
            }
            state.dirty = true;
        }

        self.write().await
    }

    async fn list(&self, subscription_id: &str) -> Result<Vec<String>, Error> {
        let state = self.state.read().await;
        Ok(state
            .subscriptions
            .get(subscription_id)
            .map(|notes| notes.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn flush(&self) -> Result<(), Error> {
        if self.state.read().await.dirty {
            self.write().await
        } else {
            Ok(())
        }
    }
}

/// Factory for `{"type": "file", "path": "..."}` store configurations
pub struct FileNotificationStoreFactory;

#[async_trait]
impl NotificationStoreFactory for FileNotificationStoreFactory {
    async fn create(
        &self,
        config: &serde_json::Value,
    ) -> Result<Box<dyn NotificationStore>, Error> {
        let path = config
            .get("path")
            .and_then(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::config("File store requires a 'path'"))?;

        Ok(Box::new(FileNotificationStore::new(path).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationPayload, QName};
    use chrono::Utc;
    use tempfile::tempdir;

    fn note(href: &str) -> Notification {
        Notification::new(
            href,
            NotificationPayload::new(QName::new("http://calendarserver.org/ns/", "invite-notification"))
                .with_field("summary", "share"),
        )
    }

    #[tokio::test]
    async fn test_file_store_persists_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileNotificationStore::new(&path).await.unwrap();
        assert!(store.list("mtwain").await.unwrap().is_empty());

        let mut notification = note("/n/1.xml");
        notification.ledger.update("email", Utc::now(), 200);
        store.put("mtwain", &notification).await.unwrap();
        assert!(path.exists());

        let reopened = FileNotificationStore::new(&path).await.unwrap();
        let stored = reopened.get("mtwain", "/n/1.xml").await.unwrap().unwrap();
        assert_eq!(stored, notification);
        assert!(stored.ledger.status_for("email").is_processed());
    }

    #[tokio::test]
    async fn test_file_store_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileNotificationStore::new(&path).await.unwrap();
        store.put("mtwain", &note("/n/1.xml")).await.unwrap();
        // Second write leaves the first contents in the backup
        store.put("mtwain", &note("/n/2.xml")).await.unwrap();
        assert!(FileNotificationStore::backup_path(&path).exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        let recovered = FileNotificationStore::new(&path).await.unwrap();
        assert_eq!(
            recovered.list("mtwain").await.unwrap(),
            vec!["/n/1.xml".to_string()]
        );
    }

    #[tokio::test]
    async fn test_file_store_delete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = FileNotificationStore::new(&path).await.unwrap();
        store.put("mtwain", &note("/n/1.xml")).await.unwrap();
        store.delete("mtwain", "/n/1.xml").await.unwrap();
        store.delete("mtwain", "/n/missing.xml").await.unwrap();
        store.flush().await.unwrap();

        let reopened = FileNotificationStore::new(&path).await.unwrap();
        assert!(reopened.get("mtwain", "/n/1.xml").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_factory_requires_path() {
        let factory = FileNotificationStoreFactory;
        let missing = factory.create(&serde_json::json!({})).await;
        assert!(matches!(missing, Err(Error::Config(_))));

        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let config = serde_json::json!({ "path": path.to_string_lossy() });
        tokio_test::assert_ok!(factory.create(&config).await);
    }
}
