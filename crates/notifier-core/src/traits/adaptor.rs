// # Adaptor Trait
//
// Defines the interface for destination adaptors (email, SMS, ...).
//
// ## Implementations
//
// - Email: `notifier-adaptor-email` crate
// - SMS: `notifier-adaptor-sms` crate
//
// ## Usage
//
// ```rust,ignore
// use notifier_core::{Action, Adaptor};
//
// let adaptor = /* Adaptor implementation */;
// let mut action = Action::new(&mut notification, &subscription);
//
// if adaptor.process(&mut action).await? {
//     println!("delivered (or already delivered)");
// }
// ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::Action;
use crate::traits::TemplateRenderer;

/// Trait for destination adaptor implementations
///
/// An adaptor owns exactly one processor type and is the only writer of that
/// processor type's ledger slot.
///
/// # Algorithm
///
/// 1. Read the ledger slot; if it is processed, return `Ok(true)` without sending
/// 2. Build a channel-native message (template key, recipients, subject, body)
/// 3. Hand the message to the channel transport
/// 4. On success, record `STATUS_OK` with the current time and return `Ok(true)`
/// 5. On delivery failure, leave the slot alone and return `Ok(false)`
///
/// # Errors
///
/// - ✅ `Ok(false)`: ordinary delivery failure, retried next cycle
/// - ✅ `Err(Error::Config)`: missing/invalid subscription or adaptor data
/// - ❌ Never return `Err` for a transient send failure
/// - ❌ Never retry or sleep internally (the next cycle is the retry)
/// - ❌ Never write another processor type's slot
#[async_trait]
pub trait Adaptor: Send + Sync {
    /// Processor type this adaptor owns (e.g. "email")
    fn processor_type(&self) -> &str;

    /// Deliver the action's notification if it has not been delivered yet
    async fn process(&self, action: &mut Action<'_>) -> Result<bool, crate::Error>;
}

/// Helper trait for constructing adaptors from configuration
pub trait AdaptorFactory: Send + Sync {
    /// Create an adaptor instance
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this adaptor
    /// - `templates`: Renderer shared by all adaptors
    fn create(
        &self,
        config: &crate::config::AdaptorConfig,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Result<Box<dyn Adaptor>, crate::Error>;
}
