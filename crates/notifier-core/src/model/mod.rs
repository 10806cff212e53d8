//! Data model shared by connectors, adaptors and the engine

pub mod action;
pub mod item;
pub mod notification;
pub mod subscription;

pub use action::Action;
pub use item::{CollectionChild, ItemReference, QName};
pub use notification::{Notification, NotificationKind, NotificationPayload};
pub use subscription::Subscription;
