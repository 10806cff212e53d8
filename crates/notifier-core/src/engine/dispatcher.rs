//! Fan-out of one notification to every adaptor its subscription uses

use std::collections::BTreeMap;
use tracing::{debug, error, warn};

use crate::error::ErrorKind;
use crate::model::{Action, Notification, Subscription};
use crate::traits::Adaptor;

/// Outcome of dispatching one notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Processor type -> whether the adaptor reports the notification delivered
    pub results: BTreeMap<String, bool>,

    /// Processor type -> configuration problem that prevented delivery
    pub configuration_errors: BTreeMap<String, String>,
}

impl DispatchReport {
    /// True once every invoked adaptor reported success
    pub fn fully_processed(&self) -> bool {
        self.results.values().all(|delivered| *delivered)
    }

    /// Processor types still waiting for delivery
    pub fn pending(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, delivered)| !**delivered)
            .map(|(pt, _)| pt.as_str())
            .collect()
    }
}

/// Present a notification to each adaptor the subscription routes to
///
/// Every such adaptor is invoked exactly once, in order, regardless of how
/// the others fared. Adaptors the subscription has no destinations for are
/// not invoked.
pub async fn dispatch(
    notification: &mut Notification,
    subscription: &Subscription,
    adaptors: &[Box<dyn Adaptor>],
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for adaptor in adaptors {
        let processor_type = adaptor.processor_type().to_string();
        if !subscription.wants(&processor_type) {
            continue;
        }

        let mut action = Action::new(notification, subscription);
        let delivered = match adaptor.process(&mut action).await {
            Ok(delivered) => delivered,
            Err(e) if e.kind() == ErrorKind::Configuration => {
                error!(
                    "Adaptor {} misconfigured for subscription {}: {}",
                    processor_type, subscription.id, e
                );
                report
                    .configuration_errors
                    .insert(processor_type.clone(), e.to_string());
                false
            }
            Err(e) => {
                warn!(
                    "Adaptor {} failed on {}: {}",
                    processor_type, notification.href, e
                );
                false
            }
        };

        debug!(
            "Adaptor {} on {}: delivered={}",
            processor_type, notification.href, delivered
        );
        report.results.insert(processor_type, delivered);
    }

    report
}

/// Holds the configured adaptors
pub struct Dispatcher {
    adaptors: Vec<Box<dyn Adaptor>>,
}

impl Dispatcher {
    pub fn new(adaptors: Vec<Box<dyn Adaptor>>) -> Self {
        Self { adaptors }
    }

    /// Processor types of all configured adaptors
    pub fn processor_types(&self) -> Vec<&str> {
        self.adaptors.iter().map(|a| a.processor_type()).collect()
    }

    /// Processor types a subscription routes to
    pub fn processor_types_for<'a>(&'a self, subscription: &Subscription) -> Vec<&'a str> {
        self.adaptors
            .iter()
            .map(|a| a.processor_type())
            .filter(|pt| subscription.wants(pt))
            .collect()
    }

    pub async fn dispatch(
        &self,
        notification: &mut Notification,
        subscription: &Subscription,
    ) -> DispatchReport {
        dispatch(notification, subscription, &self.adaptors).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NotificationPayload, QName};
    use async_trait::async_trait;
    use chrono::Utc;

    struct FixedAdaptor {
        processor_type: &'static str,
        outcome: fn() -> crate::Result<bool>,
    }

    #[async_trait]
    impl Adaptor for FixedAdaptor {
        fn processor_type(&self) -> &str {
            self.processor_type
        }

        async fn process(&self, action: &mut Action<'_>) -> crate::Result<bool> {
            let outcome = (self.outcome)();
            if matches!(outcome, Ok(true)) {
                action
                    .notification
                    .ledger
                    .update(self.processor_type, Utc::now(), 200);
            }
            outcome
        }
    }

    fn note() -> Notification {
        Notification::new(
            "/notes/1.xml",
            NotificationPayload::new(QName::new("urn:x", "invite")),
        )
    }

    #[tokio::test]
    async fn test_failure_does_not_short_circuit() {
        let adaptors: Vec<Box<dyn Adaptor>> = vec![
            Box::new(FixedAdaptor {
                processor_type: "email",
                outcome: || Ok(false),
            }),
            Box::new(FixedAdaptor {
                processor_type: "sms",
                outcome: || Ok(true),
            }),
        ];
        let sub = Subscription::new("s1", "https://x/")
            .with_destination("email", "a@example.com")
            .with_destination("sms", "+15550100");

        let mut notification = note();
        let report = dispatch(&mut notification, &sub, &adaptors).await;

        assert_eq!(report.results.get("email"), Some(&false));
        assert_eq!(report.results.get("sms"), Some(&true));
        assert!(!report.fully_processed());
        assert_eq!(report.pending(), vec!["email"]);
        assert!(notification.ledger.status_for("sms").is_processed());
    }

    #[tokio::test]
    async fn test_config_error_reported_separately() {
        let adaptors: Vec<Box<dyn Adaptor>> = vec![Box::new(FixedAdaptor {
            processor_type: "email",
            outcome: || Err(crate::Error::config("no recipients")),
        })];
        let sub = Subscription::new("s1", "https://x/").with_destination("email", "");

        let mut notification = note();
        let report = dispatch(&mut notification, &sub, &adaptors).await;

        assert_eq!(report.results.get("email"), Some(&false));
        assert!(report.configuration_errors.contains_key("email"));
    }

    #[tokio::test]
    async fn test_unrouted_adaptor_not_invoked() {
        let dispatcher = Dispatcher::new(vec![Box::new(FixedAdaptor {
            processor_type: "sms",
            outcome: || panic!("sms adaptor must not run"),
        })]);
        let sub = Subscription::new("s1", "https://x/");

        let mut notification = note();
        let report = dispatcher.dispatch(&mut notification, &sub).await;

        assert!(report.results.is_empty());
        assert!(report.fully_processed());
        assert!(dispatcher.processor_types_for(&sub).is_empty());
        assert_eq!(dispatcher.processor_types(), vec!["sms"]);
    }
}
