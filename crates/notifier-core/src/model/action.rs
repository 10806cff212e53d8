use super::notification::Notification;
use super::subscription::Subscription;

/// One unit of adaptor work: a notification paired with the subscription
/// that produced it
///
/// The exclusive borrow of the notification means only the adaptor holding
/// the action can write the ledger while it runs.
#[derive(Debug)]
pub struct Action<'a> {
    pub notification: &'a mut Notification,
    pub subscription: &'a Subscription,
}

impl<'a> Action<'a> {
    pub fn new(notification: &'a mut Notification, subscription: &'a Subscription) -> Self {
        Self {
            notification,
            subscription,
        }
    }
}
