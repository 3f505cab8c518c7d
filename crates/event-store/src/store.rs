use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use tokio::sync::watch;

use crate::{AggregateId, EventEnvelope, EventStoreError, Position, Result, Version};

/// Guards attached to an append.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Version the writer last saw. `None` appends unconditionally, which
    /// only seeding code and benches do.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Only succeeds while the stream is still empty.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Paged read of the global log as an async stream.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Append-only storage of per-aggregate streams plus one global log.
///
/// Writers racing on the same stream are settled here and nowhere else.
/// An append that carries an expected version fails with a conflict if
/// anyone else got there first.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes a batch for a single stream, all or nothing, stamping each
    /// envelope with its log position. Yields the stream's new version.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// Whole history of a stream, oldest first. Empty for unknown ids.
    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>>;

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Up to `limit` log entries positioned after `after`, in log order.
    async fn read_all_from(&self, after: Position, limit: usize) -> Result<Vec<EventEnvelope>>;

    /// Position of the newest event, or start for an empty store.
    async fn head_position(&self) -> Position;

    /// Watch channel on the head position; it ticks after every append.
    fn subscribe(&self) -> watch::Receiver<Position>;
}

/// Helpers layered on any [`EventStore`].
#[async_trait]
pub trait EventStoreExt: EventStore {
    async fn append_event(&self, event: EventEnvelope, options: AppendOptions) -> Result<Version> {
        self.append(vec![event], options).await
    }

    async fn stream_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.stream_version(aggregate_id).await?.is_some())
    }

    /// Walks the log past `after` one page of `batch_size` at a time. Ends
    /// when a page comes back empty, so events appended mid-walk are
    /// included if they land before the final page is read.
    fn stream_all_from(&self, after: Position, batch_size: usize) -> EventStream
    where
        Self: Clone + Sized + 'static,
    {
        use futures_util::stream::{self, StreamExt};

        let store = self.clone();
        let batch_size = batch_size.max(1);
        let pages = stream::unfold(Some(after), move |cursor| {
            let store = store.clone();
            async move {
                let cursor = cursor?;
                match store.read_all_from(cursor, batch_size).await {
                    Ok(batch) if batch.is_empty() => None,
                    Ok(batch) => {
                        let next = batch.last().map(|e| e.position);
                        let items: Vec<Result<EventEnvelope>> = batch.into_iter().map(Ok).collect();
                        Some((stream::iter(items), next))
                    }
                    Err(e) => Some((stream::iter(vec![Err(e)]), None)),
                }
            }
        });

        Box::pin(pages.flatten())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Rejects batches that are empty, span several streams or skip versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must target the same stream".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {}, got {}",
                expected_version, event.version
            )));
        }
    }

    Ok(())
}
