//! Test doubles and common utilities for contract tests
//!
//! These doubles stand in for the remote collection, the payload parser and
//! the channel adaptors. They count calls so tests can assert on what the
//! engine did, not just on what it returned.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use notifier_core::config::EngineConfig;
use notifier_core::error::{Error, Result};
use notifier_core::traits::{
    Adaptor, Connector, NotificationParser, ResourceConnection, ResourceTransport,
};
use notifier_core::{
    Action, CollectionChild, CollectionConnector, Notification, NotificationPayload, QName,
    Subscription,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CSS: &str = "http://calendarserver.org/ns/";

/// Resource type every notification child carries
pub fn notification_type() -> QName {
    QName::new(CSS, "notification")
}

/// JSON body of a notification item as the test parser expects it
pub fn note_body(href: &str) -> Vec<u8> {
    let notification = Notification::new(
        href,
        NotificationPayload::new(QName::new(CSS, "invite-notification"))
            .with_field("summary", "share"),
    );
    serde_json::to_vec(&notification).unwrap()
}

/// Same as [`note_body`] with a processor entry already recorded remotely
pub fn note_body_with_status(href: &str, processor_type: &str, status: u16) -> Vec<u8> {
    let mut notification: Notification = serde_json::from_slice(&note_body(href)).unwrap();
    notification.ledger.update(processor_type, Utc::now(), status);
    serde_json::to_vec(&notification).unwrap()
}

pub fn subscription(id: &str) -> Subscription {
    Subscription::new(id, format!("https://cal.example.com/notifications/{}/", id))
        .with_destination("email", format!("mailto:{}@example.com", id))
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        poll_interval_secs: 3600,
        transport_timeout_secs: 1,
        ..EngineConfig::default()
    }
}

#[derive(Default)]
struct CollectionState {
    collections: HashMap<String, Vec<CollectionChild>>,
    bodies: HashMap<String, Vec<u8>>,
    broken_gets: HashSet<String>,
    list_delay: Option<Duration>,
}

/// A remote store held in memory
///
/// Collections missing from the map cannot be enumerated. Clones share
/// contents and counters.
#[derive(Clone, Default)]
pub struct InMemoryCollection {
    state: Arc<Mutex<CollectionState>>,
    connects: Arc<AtomicUsize>,
    open_connections: Arc<AtomicUsize>,
    gets: Arc<AtomicUsize>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an (initially empty) collection
    pub fn add_collection(&self, uri: &str) {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(uri.to_string())
            .or_default();
    }

    /// Add a child of any kind to a collection
    pub fn add_child(&self, uri: &str, child: CollectionChild) {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(uri.to_string())
            .or_default()
            .push(child);
    }

    /// Add a notification item with its body
    pub fn add_notification(&self, uri: &str, href: &str, etag: &str, body: Vec<u8>) {
        let mut child = CollectionChild::new(href).with_resource_type(notification_type());
        child.etag = Some(etag.to_string());
        self.add_child(uri, child);
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert(href.to_string(), body);
    }

    /// Remove an item from every collection
    pub fn remove(&self, href: &str) {
        let mut state = self.state.lock().unwrap();
        for children in state.collections.values_mut() {
            children.retain(|child| child.href != href);
        }
        state.bodies.remove(href);
    }

    /// Make GET of this href fail at the transport level
    pub fn break_get(&self, href: &str) {
        self.state
            .lock()
            .unwrap()
            .broken_gets
            .insert(href.to_string());
    }

    /// Delay every listing (to trigger timeouts)
    pub fn delay_listing(&self, delay: Duration) {
        self.state.lock().unwrap().list_delay = Some(delay);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn transport(&self) -> Box<dyn ResourceTransport> {
        Box::new(InMemoryTransport {
            collection: self.clone(),
        })
    }

    /// Collection connector over this store with the JSON test parser
    pub fn connector(&self) -> Box<dyn Connector> {
        Box::new(CollectionConnector::new(
            self.transport(),
            Box::new(JsonNotificationParser),
            Duration::from_millis(200),
        ))
    }
}

struct InMemoryTransport {
    collection: InMemoryCollection,
}

#[async_trait]
impl ResourceTransport for InMemoryTransport {
    async fn connect(&self) -> Result<Box<dyn ResourceConnection>> {
        self.collection.connects.fetch_add(1, Ordering::SeqCst);
        self.collection.open_connections.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            collection: self.collection.clone(),
        }))
    }

    fn transport_name(&self) -> &'static str {
        "in-memory"
    }
}

struct InMemoryConnection {
    collection: InMemoryCollection,
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        self.collection.open_connections.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ResourceConnection for InMemoryConnection {
    async fn list_children(&mut self, collection_uri: &str) -> Result<Option<Vec<CollectionChild>>> {
        let (delay, children) = {
            let state = self.collection.state.lock().unwrap();
            (
                state.list_delay,
                state.collections.get(collection_uri).cloned(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(children)
    }

    async fn get(&mut self, href: &str) -> Result<Vec<u8>> {
        self.collection.gets.fetch_add(1, Ordering::SeqCst);
        let state = self.collection.state.lock().unwrap();
        if state.broken_gets.contains(href) {
            return Err(Error::Other(format!("connection reset fetching {}", href)));
        }
        state
            .bodies
            .get(href)
            .cloned()
            .ok_or_else(|| Error::Other(format!("404 Not Found: {}", href)))
    }
}

/// Parses bodies produced by [`note_body`]
pub struct JsonNotificationParser;

impl NotificationParser for JsonNotificationParser {
    fn parse(&self, href: &str, raw: &[u8]) -> Result<Notification> {
        let mut notification: Notification = serde_json::from_slice(raw)?;
        notification.href = href.to_string();
        Ok(notification)
    }
}

/// How a [`RecordingAdaptor`] reacts to unprocessed notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Deliver,
    Fail,
    Misconfigured,
}

/// An adaptor that follows the adaptor algorithm and records its sends
pub struct RecordingAdaptor {
    processor_type: &'static str,
    outcome: Arc<Mutex<Outcome>>,
    process_calls: Arc<AtomicUsize>,
    sends: Arc<Mutex<Vec<String>>>,
}

impl RecordingAdaptor {
    pub fn new(processor_type: &'static str, outcome: Outcome) -> Self {
        Self {
            processor_type,
            outcome: Arc::new(Mutex::new(outcome)),
            process_calls: Arc::new(AtomicUsize::new(0)),
            sends: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a new RecordingAdaptor that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            processor_type: other.processor_type,
            outcome: Arc::clone(&other.outcome),
            process_calls: Arc::clone(&other.process_calls),
            sends: Arc::clone(&other.sends),
        }
    }

    /// Change the behavior of this adaptor and every clone sharing its counters
    pub fn set_outcome(&self, outcome: Outcome) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }

    /// Hrefs actually sent, in order
    pub fn sends(&self) -> Vec<String> {
        self.sends.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

#[async_trait]
impl Adaptor for RecordingAdaptor {
    fn processor_type(&self) -> &str {
        self.processor_type
    }

    async fn process(&self, action: &mut Action<'_>) -> Result<bool> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);

        if action
            .notification
            .ledger
            .status_for(self.processor_type)
            .is_processed()
        {
            return Ok(true);
        }

        let outcome = *self.outcome.lock().unwrap();
        match outcome {
            Outcome::Deliver => {
                self.sends
                    .lock()
                    .unwrap()
                    .push(action.notification.href.clone());
                action
                    .notification
                    .ledger
                    .update(self.processor_type, Utc::now(), 200);
                Ok(true)
            }
            Outcome::Fail => Ok(false),
            Outcome::Misconfigured => Err(Error::config(format!(
                "no {} destination for {}",
                self.processor_type, action.subscription.id
            ))),
        }
    }
}

/// Drain every event currently queued
pub fn drain_events(
    rx: &mut tokio::sync::mpsc::Receiver<notifier_core::EngineEvent>,
) -> Vec<notifier_core::EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
