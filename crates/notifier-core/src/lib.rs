// # notifier-core
//
// Core library for the notification delivery pipeline.
//
// ## Architecture Overview
//
// Notifications accumulate in a remote collection (one per subscription).
// Each poll cycle lists the collection, fetches the notification items,
// and hands each one to the adaptors the subscription routes to. Every
// adaptor records its outcome in the notification's processor ledger, and
// the ledger is persisted with the notification so nothing is delivered
// twice.
//
// - **ItemLocator / ItemFetcher**: Connector protocol for listing and fetching items
// - **Adaptor**: Delivers a notification to one channel and records the outcome
// - **ProcessorLedger**: Per-processor delivery status carried by each notification
// - **NotificationStore**: Persists notifications and their ledgers between cycles
// - **NotifierEngine**: Polls subscriptions and drives dispatch
// - **NotifierRegistry**: Plugin-based registry for connectors, adaptors and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from channel and transport crates
// 2. **Plugin-Based**: Components are created from configuration through factories
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Idempotency**: A processed ledger entry is never overwritten or re-sent

pub mod config;
pub mod connector;
pub mod delivery;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod model;
pub mod registry;
pub mod store;
pub mod templates;
pub mod traits;

// Re-export core types for convenience
pub use config::{AdaptorConfig, ConnectorConfig, EngineConfig, NotifierConfig, StoreConfig};
pub use connector::CollectionConnector;
pub use engine::{CycleReport, DispatchReport, Dispatcher, EngineEvent, NotifierEngine};
pub use error::{Error, ErrorKind, Result};
pub use ledger::{ProcessorLedger, ProcessorStatus, STATUS_OK};
pub use model::{
    Action, CollectionChild, ItemReference, Notification, NotificationKind, NotificationPayload,
    QName, Subscription,
};
pub use registry::NotifierRegistry;
pub use store::{FileNotificationStore, MemoryNotificationStore};
pub use templates::SimpleTemplateRenderer;
pub use traits::{
    Adaptor, Connector, ItemFetcher, ItemLocator, MessageTransport, NotificationStore,
    TemplateRenderer,
};
