//! Delivery of the global log to registered projections.

use std::time::Duration;

use event_store::{EventStore, EventStoreExt, Position};
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::projection::Projection;
use crate::{ProjectionError, Result};

/// Most catch-up rounds `settle` runs before giving up.
const MAX_SETTLE_ROUNDS: usize = 64;

/// Pages through the log and hands each event to every projection that has
/// not applied it yet.
///
/// Projections receive an event in the order they were registered. The
/// deletion cascade relies on this to read an emails view that already
/// contains everything before the deletion.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    batch_size: usize,
    retry_delay: Duration,
}

impl<S> ProjectionProcessor<S>
where
    S: EventStore + Clone + 'static,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            batch_size: 256,
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Page size for log reads. Clamped to at least one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Pause between a failed pass of `run` and the next attempt.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Delivers every event past each projection's position.
    ///
    /// A failing projection stops the pass with its error; its position
    /// stays before the failed event, so the next pass delivers it again.
    /// Returns the number of deliveries made.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let Some(from) = self.lowest_position().await else {
            return Ok(0);
        };

        let mut stream = self.store.stream_all_from(from, self.batch_size);
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;

            for projection in &self.projections {
                if projection.position().await.has_seen(event.position) {
                    continue;
                }
                if let Err(e) = projection.handle(&event).await {
                    tracing::warn!(
                        projection = projection.name(),
                        position = %event.position,
                        event_type = %event.event_type,
                        error = %e,
                        "projection failed to handle event"
                    );
                    metrics::counter!("projections_failures_total", "projection" => projection.name())
                        .increment(1);
                    return Err(e);
                }
                delivered += 1;
                metrics::counter!("projections_events_processed").increment(1);
            }
        }

        if delivered > 0 {
            tracing::debug!(delivered, "catch-up complete");
        }
        Ok(delivered)
    }

    /// Catches up until every projection has reached the store head.
    ///
    /// Projections that append events while handling (the deletion cascade)
    /// move the head, so this may take several passes.
    #[tracing::instrument(skip(self))]
    pub async fn settle(&self) -> Result<()> {
        for _ in 0..MAX_SETTLE_ROUNDS {
            self.run_catch_up().await?;
            let head = self.store.head_position().await;
            if self.is_caught_up(head).await {
                return Ok(());
            }
        }
        Err(ProjectionError::Projection(format!(
            "projections did not settle after {MAX_SETTLE_ROUNDS} rounds"
        )))
    }

    /// Keeps projections up to date until `cancel` fires.
    ///
    /// Wakes on every head change. A failed pass is logged and retried
    /// after the retry delay.
    #[tracing::instrument(skip(self, cancel))]
    pub async fn run(&self, cancel: CancellationToken) {
        let mut head = self.store.subscribe();
        tracing::info!(projections = self.projections.len(), "projection worker started");

        loop {
            head.borrow_and_update();

            if let Err(e) = self.run_catch_up().await {
                tracing::error!(error = %e, retry_in = ?self.retry_delay, "catch-up failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.retry_delay) => continue,
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = head.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("projection worker stopped");
    }

    /// Clears every projection, then replays the log from the start.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await.map(|_| ())
    }

    async fn lowest_position(&self) -> Option<Position> {
        let mut lowest: Option<Position> = None;
        for projection in &self.projections {
            let position = projection.position().await.last_position;
            lowest = Some(lowest.map_or(position, |l| l.min(position)));
        }
        lowest
    }

    async fn is_caught_up(&self, head: Position) -> bool {
        for projection in &self.projections {
            if projection.position().await.last_position < head {
                return false;
            }
        }
        true
    }
}
