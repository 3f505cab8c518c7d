//! Composition root for the mail core.
//!
//! [`App`] wires one event store to the read models, the projection
//! processor and every command handler. [`App::spawn_workers`] starts the
//! background tasks that keep running until the shared token is cancelled.

pub mod config;

use std::sync::Arc;
use std::time::Duration;

use event_store::EventStore;
use handlers::{
    CampaignHandler, ChaosAddressHandler, EmailHandler, HandlerContext, InboundMailHandler,
    KeyedLocks, SubdomainHandler,
};
use projections::{
    CampaignDeletionCascade, CampaignsView, ChaosAddressesView, EmailsView, ProjectionProcessor,
    ReadModel, SubdomainsView,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub use config::{Config, ConfigError, LogFormat};

/// Read models served to queries.
#[derive(Clone, Default)]
pub struct Views {
    pub chaos_addresses: ChaosAddressesView,
    pub campaigns: CampaignsView,
    pub emails: EmailsView,
    pub subdomains: SubdomainsView,
}

impl Views {
    pub fn read_models(&self) -> [&dyn ReadModel; 4] {
        [
            &self.chaos_addresses,
            &self.subdomains,
            &self.campaigns,
            &self.emails,
        ]
    }

    /// Row count of every view, also published as the `read_model_rows` gauge.
    pub async fn report_sizes(&self) -> Vec<(&'static str, usize)> {
        let mut sizes = Vec::with_capacity(4);
        for view in self.read_models() {
            let rows = view.count().await;
            metrics::gauge!("read_model_rows", "view" => view.name()).set(rows as f64);
            tracing::info!(view = view.name(), rows, "read model size");
            sizes.push((view.name(), rows));
        }
        sizes
    }
}

pub struct App<S: EventStore> {
    pub store: S,
    pub views: Views,
    pub processor: Arc<ProjectionProcessor<S>>,
    pub locks: KeyedLocks,
    pub chaos_addresses: ChaosAddressHandler<S>,
    pub campaigns: Arc<CampaignHandler<S>>,
    pub emails: EmailHandler<S>,
    pub subdomains: SubdomainHandler<S>,
    pub inbound: InboundMailHandler<S>,
    lock_eviction_interval: Duration,
}

impl<S> App<S>
where
    S: EventStore + Clone + 'static,
{
    pub fn new(context: HandlerContext<S>, config: &Config) -> Self {
        let store = context.store().clone();
        let views = Views::default();

        // The cascade reads the emails view, so it goes after it.
        let mut processor = ProjectionProcessor::new(store.clone())
            .with_batch_size(config.projection_batch_size)
            .with_retry_delay(config.projection_retry);
        processor.register(Box::new(views.chaos_addresses.clone()));
        processor.register(Box::new(views.subdomains.clone()));
        processor.register(Box::new(views.campaigns.clone()));
        processor.register(Box::new(views.emails.clone()));
        processor.register(Box::new(CampaignDeletionCascade::new(
            store.clone(),
            views.emails.clone(),
        )));

        let locks = KeyedLocks::new();
        let campaigns = Arc::new(
            CampaignHandler::new(context.clone(), locks.clone())
                .with_max_attempts(config.capture_max_attempts),
        );

        Self {
            chaos_addresses: ChaosAddressHandler::new(context.clone()),
            emails: EmailHandler::new(context.clone()),
            subdomains: SubdomainHandler::new(context.clone()),
            inbound: InboundMailHandler::new(
                context,
                views.chaos_addresses.clone(),
                Arc::clone(&campaigns),
            ),
            campaigns,
            store,
            views,
            processor: Arc::new(processor),
            locks,
            lock_eviction_interval: config.lock_eviction_interval,
        }
    }

    /// Starts the projection worker and the idle-lock sweeper.
    pub fn spawn_workers(&self, cancel: &CancellationToken) -> JoinSet<()> {
        let mut workers = JoinSet::new();

        let processor = Arc::clone(&self.processor);
        let token = cancel.clone();
        workers.spawn(async move { processor.run(token).await });

        workers.spawn(evict_idle_locks(
            self.locks.clone(),
            self.lock_eviction_interval,
            cancel.clone(),
        ));

        workers
    }
}

/// Sweeps unused capture locks every `every` until cancelled.
pub async fn evict_idle_locks(locks: KeyedLocks, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let evicted = locks.evict_idle();
                metrics::counter!("capture_locks_evicted_total").increment(evicted as u64);
            }
        }
    }
    tracing::debug!("lock sweeper stopped");
}
