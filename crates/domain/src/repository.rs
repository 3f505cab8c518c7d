//! Loading and saving aggregates against an event store.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, AggregateRoot, DomainEvent};
use crate::error::DomainError;

/// Loads aggregates by replaying their stream and saves the events raised
/// on them.
///
/// Saves carry the version the aggregate was loaded at, so two writers that
/// loaded the same version cannot both persist: the second gets
/// `EventStoreError::ConcurrencyConflict`.
pub struct Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> Clone for Repository<S, A>
where
    S: EventStore + Clone,
    A: Aggregate,
{
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<S, A> Repository<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new repository over the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an aggregate, returning None if its stream is empty.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<Option<AggregateRoot<A>>, DomainError> {
        let events = self.store.load_stream(aggregate_id).await?;
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(AggregateRoot::load_from_history(events)))
    }

    /// Loads an aggregate, failing with `AggregateNotFound` if it does not exist.
    pub async fn get(&self, aggregate_id: AggregateId) -> Result<AggregateRoot<A>, DomainError> {
        self.load(aggregate_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Persists the aggregate's uncommitted events.
    ///
    /// A root with nothing uncommitted is left untouched. Returns the
    /// stream version after the save.
    pub async fn save(&self, root: &mut AggregateRoot<A>) -> Result<Version, DomainError> {
        if root.uncommitted().is_empty() {
            return Ok(root.version());
        }
        let Some(aggregate_id) = root.id() else {
            // Events were raised on a root that never received its creation
            // event; apply gives it no identity to store them under.
            return Err(DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: AggregateId::nil(),
            });
        };

        let expected = root.version();
        let envelopes = build_envelopes::<A>(aggregate_id, expected, root.uncommitted())?;
        let new_version = match self
            .store
            .append(envelopes, AppendOptions::expect_version(expected))
            .await
        {
            Ok(version) => version,
            Err(e) => {
                if e.is_conflict() {
                    metrics::counter!("aggregate_save_conflicts_total", "aggregate" => A::aggregate_type())
                        .increment(1);
                }
                return Err(e.into());
            }
        };
        metrics::counter!("aggregate_saves_total", "aggregate" => A::aggregate_type()).increment(1);

        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            %aggregate_id,
            from = %expected,
            to = %new_version,
            "aggregate saved"
        );
        root.mark_committed(new_version);
        Ok(new_version)
    }
}

/// Wraps domain events in envelopes numbered from `current_version + 1`.
fn build_envelopes<A: Aggregate>(
    aggregate_id: AggregateId,
    current_version: Version,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, DomainError> {
    let mut envelopes = Vec::with_capacity(events.len());
    let mut version = current_version;

    for event in events {
        version = version.next();
        let envelope = EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type(A::aggregate_type())
            .event_type(event.event_type())
            .version(version)
            .payload(event)?
            .build()?;
        envelopes.push(envelope);
    }

    Ok(envelopes)
}
