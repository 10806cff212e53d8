//! Core notifier engine
//!
//! The NotifierEngine is responsible for:
//! - Listing each subscription's notification collection via the connector
//! - Skipping items whose stored copy is unchanged and fully delivered
//! - Fetching the remaining items and restoring their stored ledgers
//! - Dispatching each notification to the subscription's adaptors
//! - Persisting notifications with their updated ledgers
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐
//! │   Interval    │─── tick ───┐
//! └───────────────┘            │
//!                              ▼
//!                     ┌────────────────┐
//!                     │ NotifierEngine │  one task per subscription
//!                     └────────────────┘
//!                              │
//!      ┌───────────────┬───────┴───────┬───────────────┐
//!      │               │               │               │
//!      ▼               ▼               ▼               ▼
//! ┌──────────┐  ┌─────────────┐  ┌────────────┐  ┌──────────┐
//! │Connector │  │Notification │  │ Dispatcher │  │  Events  │
//! │(list/get)│  │Store (ledger│  │ (adaptors) │  │ (notify) │
//! └──────────┘  └─────────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. List candidate items; an unenumerable collection fails the cycle
//! 2. Prune stored notifications that are no longer listed
//! 3. Skip items with an unchanged etag whose ledger is already complete
//! 4. Fetch the rest (failures isolated or fatal per policy)
//! 5. Merge the stored ledger into each fetched notification
//! 6. Dispatch to adaptors, persist, flush

mod dispatcher;

pub use dispatcher::{DispatchReport, Dispatcher, dispatch};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use crate::config::{EngineConfig, FetchFailurePolicy};
use crate::error::{Error, Result};
use crate::model::{ItemReference, Notification, Subscription};
use crate::traits::{Adaptor, Connector, NotificationStore};

/// Events emitted by the NotifierEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { subscriptions_count: usize },

    /// Poll cycle for a subscription started
    CycleStarted { subscription_id: String },

    /// Item skipped: same etag as stored and every adaptor done
    ItemUnchanged {
        subscription_id: String,
        href: String,
    },

    /// Item could not be fetched or parsed
    FetchFailed {
        subscription_id: String,
        href: String,
        error: String,
    },

    /// Adaptor reported the notification delivered (now or earlier)
    Processed {
        subscription_id: String,
        href: String,
        processor_type: String,
    },

    /// Adaptor did not deliver; retried next cycle
    DeliveryPending {
        subscription_id: String,
        href: String,
        processor_type: String,
    },

    /// Adaptor cannot deliver until its configuration is fixed
    ConfigurationError {
        subscription_id: String,
        processor_type: String,
        error: String,
    },

    /// Poll cycle finished
    CycleCompleted { report: CycleReport },

    /// Poll cycle aborted
    CycleFailed {
        subscription_id: String,
        error: String,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// Counters for one subscription's poll cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub subscription_id: String,

    /// Notification items listed
    pub listed: usize,

    /// Items skipped as unchanged and fully delivered
    pub unchanged: usize,

    /// Items that failed to fetch or parse
    pub fetch_failures: usize,

    /// Notifications presented to the dispatcher
    pub dispatched: usize,

    /// Dispatched notifications every routed adaptor has now delivered
    pub fully_processed: usize,

    /// Stored notifications removed because their item disappeared
    pub pruned: usize,
}

/// Shared state of every cycle task
#[derive(Clone)]
struct Pipeline {
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn NotificationStore>,
    engine: EngineConfig,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl Pipeline {
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }

    async fn run_cycle(&self, subscription: &Subscription) -> Result<CycleReport> {
        self.emit_event(EngineEvent::CycleStarted {
            subscription_id: subscription.id.clone(),
        });

        match self.cycle(subscription).await {
            Ok(report) => {
                info!(
                    "Cycle {}: listed={} unchanged={} dispatched={} complete={} fetch_failures={} pruned={}",
                    report.subscription_id,
                    report.listed,
                    report.unchanged,
                    report.dispatched,
                    report.fully_processed,
                    report.fetch_failures,
                    report.pruned
                );
                self.emit_event(EngineEvent::CycleCompleted {
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                error!("Cycle {} failed: {}", subscription.id, e);
                self.emit_event(EngineEvent::CycleFailed {
                    subscription_id: subscription.id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn cycle(&self, subscription: &Subscription) -> Result<CycleReport> {
        let sub_id = subscription.id.as_str();
        let mut report = CycleReport {
            subscription_id: sub_id.to_string(),
            ..CycleReport::default()
        };

        if !self.connector.changed(subscription).await? {
            debug!("Collection for {} unchanged, skipping listing", sub_id);
            return Ok(report);
        }

        let items = self
            .connector
            .list_candidates(subscription)
            .await?
            .ok_or_else(|| {
                Error::connector(format!(
                    "Collection {} could not be enumerated",
                    subscription.collection_uri
                ))
            })?;
        report.listed = items.len();

        if self.engine.prune_missing {
            report.pruned = self.prune(sub_id, &items).await?;
        }

        let wanted = self.dispatcher.processor_types_for(subscription);
        let mut stored: HashMap<String, Notification> = HashMap::new();
        let mut to_fetch: Vec<ItemReference> = Vec::with_capacity(items.len());

        for item in items {
            if let Some(previous) = self.store.get(sub_id, &item.href).await? {
                let same_etag = item.etag.is_some() && previous.etag == item.etag;
                if same_etag && previous.ledger.all_processed(wanted.iter().copied()) {
                    debug!("Item {} unchanged and delivered, skipping", item.href);
                    report.unchanged += 1;
                    self.emit_event(EngineEvent::ItemUnchanged {
                        subscription_id: sub_id.to_string(),
                        href: item.href.clone(),
                    });
                    continue;
                }
                stored.insert(item.href.clone(), previous);
            }
            to_fetch.push(item);
        }

        let fetched = self.connector.fetch_batch(&to_fetch).await;

        if self.engine.fetch_failure_policy == FetchFailurePolicy::AbortBatch {
            if let Some((item, Err(e))) = to_fetch
                .iter()
                .zip(fetched.iter())
                .find(|(_, result)| result.is_err())
            {
                return Err(Error::connector(format!(
                    "Batch aborted, {} failed: {}",
                    item.href, e
                )));
            }
        }

        for (item, result) in to_fetch.iter().zip(fetched) {
            let mut notification = match result {
                Ok(notification) => notification,
                Err(e) => {
                    report.fetch_failures += 1;
                    self.emit_event(EngineEvent::FetchFailed {
                        subscription_id: sub_id.to_string(),
                        href: item.href.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(previous) = stored.get(&item.href) {
                notification.ledger.merge(&previous.ledger);
            }

            let outcome = self.dispatcher.dispatch(&mut notification, subscription).await;
            self.emit_dispatch_events(sub_id, &notification.href, &outcome);

            self.store.put(sub_id, &notification).await?;
            report.dispatched += 1;
            if outcome.fully_processed() {
                report.fully_processed += 1;
            }
        }

        self.store.flush().await?;
        Ok(report)
    }

    async fn prune(&self, sub_id: &str, items: &[ItemReference]) -> Result<usize> {
        let listed: HashSet<&str> = items.iter().map(|item| item.href.as_str()).collect();
        let mut pruned = 0;

        for href in self.store.list(sub_id).await? {
            if !listed.contains(href.as_str()) {
                debug!("Pruning {} for {}: no longer listed", href, sub_id);
                self.store.delete(sub_id, &href).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    fn emit_dispatch_events(&self, sub_id: &str, href: &str, outcome: &DispatchReport) {
        for (processor_type, delivered) in &outcome.results {
            let event = if *delivered {
                EngineEvent::Processed {
                    subscription_id: sub_id.to_string(),
                    href: href.to_string(),
                    processor_type: processor_type.clone(),
                }
            } else {
                EngineEvent::DeliveryPending {
                    subscription_id: sub_id.to_string(),
                    href: href.to_string(),
                    processor_type: processor_type.clone(),
                }
            };
            self.emit_event(event);
        }

        for (processor_type, error) in &outcome.configuration_errors {
            self.emit_event(EngineEvent::ConfigurationError {
                subscription_id: sub_id.to_string(),
                processor_type: processor_type.clone(),
                error: error.clone(),
            });
        }
    }
}

/// Core notifier engine
///
/// ## Lifecycle
///
/// 1. Create with [`NotifierEngine::new()`]
/// 2. Start with [`NotifierEngine::run()`] (or drive cycles with [`NotifierEngine::poll_all()`])
/// 3. Engine polls every `poll_interval_secs` until a shutdown signal is received
/// 4. The store is flushed before `run()` returns
///
/// ## Concurrency
///
/// Subscriptions are polled concurrently, one task each. Within a
/// subscription, items are handled sequentially and each notification is
/// dispatched to its adaptors one at a time.
pub struct NotifierEngine {
    pipeline: Pipeline,
    subscriptions: Vec<Subscription>,
}

impl NotifierEngine {
    /// Create a new notifier engine
    ///
    /// # Parameters
    ///
    /// - `connector`: Connector for the remote collections
    /// - `adaptors`: Destination adaptors, one per processor type
    /// - `store`: Notification store
    /// - `subscriptions`: Subscriptions to poll
    /// - `engine`: Engine settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        connector: Box<dyn Connector>,
        adaptors: Vec<Box<dyn Adaptor>>,
        store: Box<dyn NotificationStore>,
        subscriptions: Vec<Subscription>,
        engine: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        engine.validate()?;

        let mut processor_types = HashSet::new();
        for adaptor in &adaptors {
            if !processor_types.insert(adaptor.processor_type().to_string()) {
                return Err(Error::config(format!(
                    "Duplicate adaptor for processor type {}",
                    adaptor.processor_type()
                )));
            }
        }

        for subscription in &subscriptions {
            subscription.validate()?;
            for processor_type in subscription.destinations.keys() {
                if !processor_types.contains(processor_type) {
                    return Err(Error::config(format!(
                        "Subscription {} routes to {} but no such adaptor is configured",
                        subscription.id, processor_type
                    )));
                }
            }
        }

        let (tx, rx) = mpsc::channel(engine.event_channel_capacity);

        let engine = Self {
            pipeline: Pipeline {
                connector: Arc::from(connector),
                dispatcher: Arc::new(Dispatcher::new(adaptors)),
                store: Arc::from(store),
                engine,
                event_tx: tx,
            },
            subscriptions,
        };

        Ok((engine, rx))
    }

    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Run one poll cycle for a single subscription
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: Cycle completed (individual items may still be pending)
    /// - `Err(Error)`: Listing failed, the batch was aborted, or the store failed
    pub async fn run_cycle(&self, subscription: &Subscription) -> Result<CycleReport> {
        self.pipeline.run_cycle(subscription).await
    }

    /// Run one poll cycle for every subscription concurrently
    ///
    /// Results are ordered by subscription id. A failing subscription never
    /// affects the others.
    pub async fn poll_all(&self) -> Vec<(String, Result<CycleReport>)> {
        let mut tasks = JoinSet::new();

        for subscription in &self.subscriptions {
            let pipeline = self.pipeline.clone();
            let subscription = subscription.clone();
            tasks.spawn(async move {
                let result = pipeline.run_cycle(&subscription).await;
                (subscription.id, result)
            });
        }

        let mut results = Vec::with_capacity(self.subscriptions.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("Cycle task panicked: {}", e),
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }

    /// Run the engine
    ///
    /// Polls every subscription immediately and then once per poll interval
    /// until SIGINT/SIGTERM is received.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Final flush failed
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.pipeline.emit_event(EngineEvent::Started {
            subscriptions_count: self.subscriptions.len(),
        });
        info!(
            "Polling {} subscriptions every {}s",
            self.subscriptions.len(),
            self.pipeline.engine.poll_interval_secs
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = wait_for_signal().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut ticks = IntervalStream::new(tokio::time::interval(
            self.pipeline.engine.poll_interval(),
        ));

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    for (sub_id, result) in self.poll_all().await {
                        if let Err(e) = result {
                            debug!("Subscription {} will be retried next cycle: {}", sub_id, e);
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.pipeline.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.pipeline.store.flush().await?;
        info!("Store flushed, engine stopped");

        Ok(())
    }

    /// Run the engine until the given signal fires
    ///
    /// With `None`, behaves like [`NotifierEngine::run()`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

/// Wait for CTRL-C
#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
