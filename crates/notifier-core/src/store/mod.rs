// # Notification Store Implementations
//
// This module provides implementations of the NotificationStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileNotificationStore, FileNotificationStoreFactory};
pub use memory::{MemoryNotificationStore, MemoryNotificationStoreFactory};
