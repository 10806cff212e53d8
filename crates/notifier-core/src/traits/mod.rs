//! Core traits for the notifier system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ItemLocator`] / [`ItemFetcher`]: Discover and fetch remote notification items
//! - [`ResourceTransport`] / [`NotificationParser`]: Raw remote access and payload parsing
//! - [`Adaptor`]: Deliver notifications to one channel
//! - [`MessageTransport`]: Channel send primitive used by adaptors
//! - [`TemplateRenderer`]: Message body rendering
//! - [`NotificationStore`]: Persistence of notifications and their ledgers

pub mod adaptor;
pub mod connector;
pub mod notification_store;
pub mod template;
pub mod transport;

pub use adaptor::{Adaptor, AdaptorFactory};
pub use connector::{
    Connector, ConnectorFactory, ItemFetcher, ItemLocator, NotificationParser,
    ResourceConnection, ResourceTransport,
};
pub use notification_store::{NotificationStore, NotificationStoreFactory};
pub use template::{DeliveryMethod, TemplateRenderer};
pub use transport::{ContentType, MessageTransport, OutboundMessage};
