use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, watch};

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Position, Result, Version,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

#[derive(Default)]
struct Tables {
    streams: HashMap<AggregateId, Vec<EventEnvelope>>,
    /// Every event ever appended; index `n` holds position `n + 1`.
    log: Vec<EventEnvelope>,
}

impl Tables {
    fn version_of(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.streams
            .get(&aggregate_id)?
            .last()
            .map(|event| event.version)
    }

    fn head(&self) -> Position {
        self.log
            .last()
            .map_or(Position::start(), |event| event.position)
    }
}

/// Process-local store backing the service and its tests.
///
/// A single write lock covers both the streams and the log, so readers
/// never observe half of an append.
#[derive(Clone)]
pub struct InMemoryEventStore {
    tables: Arc<RwLock<Tables>>,
    head: Arc<watch::Sender<Position>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::default(),
            head: Arc::new(watch::channel(Position::start()).0),
        }
    }

    pub async fn event_count(&self) -> usize {
        self.tables.read().await.log.len()
    }

    /// Log entries whose payload variant is `event_type`, oldest first.
    pub async fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        let tables = self.tables.read().await;
        tables
            .log
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let opening_version = events[0].version;

        let mut tables = self.tables.write().await;
        let current = tables.version_of(aggregate_id).unwrap_or(Version::initial());

        // A stale expected version and a version already taken in the
        // stream are the same race seen from two sides.
        let stale = options.expected_version.is_some_and(|expected| expected != current);
        if stale || opening_version != current.next() {
            metrics::counter!("event_store_conflicts_total").increment(1);
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: options.expected_version.unwrap_or(current),
                actual: current,
            });
        }

        let mut position = tables.head();
        for event in &mut events {
            position = position.next();
            event.position = position;
        }

        let appended = events.len();
        let last_version = Version::new(current.as_i64() + appended as i64);

        tables.log.extend_from_slice(&events);
        tables.streams.entry(aggregate_id).or_default().append(&mut events);
        drop(tables);

        self.head.send_replace(position);
        metrics::counter!("event_store_events_appended_total").increment(appended as u64);
        tracing::trace!(%aggregate_id, version = %last_version, %position, "events appended");

        Ok(last_version)
    }

    async fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let tables = self.tables.read().await;
        Ok(tables.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    async fn stream_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.tables.read().await.version_of(aggregate_id))
    }

    async fn read_all_from(&self, after: Position, limit: usize) -> Result<Vec<EventEnvelope>> {
        let tables = self.tables.read().await;
        let skip = usize::try_from(after.as_u64()).unwrap_or(usize::MAX);
        Ok(tables.log.iter().skip(skip).take(limit).cloned().collect())
    }

    async fn head_position(&self) -> Position {
        *self.head.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Position> {
        self.head.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EventStoreExt;

    fn create_test_event(
        aggregate_id: AggregateId,
        version: Version,
        event_type: &str,
    ) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Campaign")
            .event_type(event_type)
            .version(version)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn append_assigns_versions_and_positions() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "CampaignCreated"),
            create_test_event(aggregate_id, Version::new(2), "CampaignCaptureRecorded"),
        ];

        let version = store
            .append(events, AppendOptions::expect_new())
            .await
            .unwrap();
        assert_eq!(version, Version::new(2));

        let stored = store.load_stream(aggregate_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].position, Position::new(1));
        assert_eq!(stored[1].position, Position::new(2));
        assert_eq!(store.head_position().await, Position::new(2));
    }

    #[tokio::test]
    async fn concurrency_conflict_on_wrong_version() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        let event1 = create_test_event(aggregate_id, Version::first(), "CampaignCreated");
        store
            .append(vec![event1], AppendOptions::expect_new())
            .await
            .unwrap();

        // A second creator that also loaded an empty stream.
        let event2 = create_test_event(aggregate_id, Version::first(), "CampaignCreated");
        let result = store
            .append(vec![event2], AppendOptions::expect_new())
            .await;

        match result {
            Err(EventStoreError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::initial());
                assert_eq!(actual, Version::first());
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_version_without_expectation_is_rejected() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "B")],
                AppendOptions::new(),
            )
            .await;

        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn append_with_matching_version_succeeds() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        store
            .append(
                vec![create_test_event(aggregate_id, Version::first(), "A")],
                AppendOptions::expect_new(),
            )
            .await
            .unwrap();
        let result = store
            .append(
                vec![create_test_event(aggregate_id, Version::new(2), "B")],
                AppendOptions::expect_version(Version::first()),
            )
            .await;

        assert_eq!(result.unwrap(), Version::new(2));
    }

    #[tokio::test]
    async fn read_all_from_pages_through_the_global_log() {
        let store = InMemoryEventStore::new();
        let id1 = AggregateId::new();
        let id2 = AggregateId::new();

        store
            .append(
                vec![create_test_event(id1, Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();
        store
            .append(
                vec![
                    create_test_event(id2, Version::first(), "B"),
                    create_test_event(id2, Version::new(2), "C"),
                ],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        let first_page = store.read_all_from(Position::start(), 2).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].event_type, "A");
        assert_eq!(first_page[1].event_type, "B");

        let rest = store.read_all_from(Position::new(2), 10).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].event_type, "C");

        let beyond = store.read_all_from(Position::new(50), 10).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn stream_all_from_yields_every_event() {
        use futures_util::StreamExt;

        let store = InMemoryEventStore::new();
        let id = AggregateId::new();
        let events = (1..=5)
            .map(|v| create_test_event(id, Version::new(v), "Tick"))
            .collect();
        store.append(events, AppendOptions::new()).await.unwrap();

        let collected: Vec<_> = store.stream_all_from(Position::start(), 2).collect().await;
        assert_eq!(collected.len(), 5);
        assert!(collected.iter().all(|e| e.is_ok()));
    }

    #[tokio::test]
    async fn subscribers_observe_new_head() {
        let store = InMemoryEventStore::new();
        let mut rx = store.subscribe();
        assert_eq!(*rx.borrow(), Position::start());

        store
            .append(
                vec![create_test_event(AggregateId::new(), Version::first(), "A")],
                AppendOptions::new(),
            )
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Position::new(1));
    }

    #[tokio::test]
    async fn stream_version_tracks_last_event() {
        let store = InMemoryEventStore::new();
        let aggregate_id = AggregateId::new();

        assert!(!store.stream_exists(aggregate_id).await.unwrap());

        let events = vec![
            create_test_event(aggregate_id, Version::new(1), "A"),
            create_test_event(aggregate_id, Version::new(2), "B"),
        ];
        store.append(events, AppendOptions::new()).await.unwrap();

        assert_eq!(
            store.stream_version(aggregate_id).await.unwrap(),
            Some(Version::new(2))
        );
        assert_eq!(store.events_of_type("B").await.len(), 1);
    }
}
