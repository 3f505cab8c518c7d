//! Core aggregate and domain event traits, and the replay machinery shared by
//! every aggregate.

use std::ops::Deref;

use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

/// A past-tense fact recorded in a stream.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone + std::fmt::Debug {
    /// Variant name written to the envelope, e.g. `CampaignCaptureRecorded`.
    /// Projections filter on it without decoding the payload.
    fn event_type(&self) -> &'static str;
}

/// State that exists only as a fold over its own stream.
///
/// Starting from `Default`, replaying the stream through `apply` yields the
/// current state. Command methods look at that state and either refuse
/// with `Self::Error` or return the events to raise. `apply` accepts any
/// event in any state and never fails.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    /// Refusals raised by command methods.
    type Error: std::error::Error + Send + Sync;

    /// Written to every envelope of the stream.
    fn aggregate_type() -> &'static str;

    /// `None` until the creation event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Folds one event into the state.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Decodes a stored payload into the aggregate's event type.
///
/// # Panics
///
/// Panics when the envelope belongs to another aggregate type or its
/// payload does not decode into a known variant. Either means the stored
/// schema and this binary have diverged, which no caller can recover from.
pub fn decode_event<A: Aggregate>(envelope: &EventEnvelope) -> A::Event {
    if envelope.aggregate_type != A::aggregate_type() {
        panic!(
            "stream {} holds a {} event but was loaded as {}",
            envelope.aggregate_id,
            envelope.aggregate_type,
            A::aggregate_type()
        );
    }
    match serde_json::from_value(envelope.payload.clone()) {
        Ok(event) => event,
        Err(e) => panic!(
            "stream {} version {} holds {} which {} cannot decode: {e}",
            envelope.aggregate_id,
            envelope.version,
            envelope.event_type,
            A::aggregate_type()
        ),
    }
}

/// An aggregate together with its persisted version and the events raised
/// since it was loaded.
///
/// `raise` records an event and applies it immediately, so reads made
/// before saving already see the change.
#[derive(Debug, Clone)]
pub struct AggregateRoot<A: Aggregate> {
    state: A,
    version: Version,
    uncommitted: Vec<A::Event>,
}

impl<A: Aggregate> AggregateRoot<A> {
    /// Creates an empty root for an aggregate that has no history yet.
    pub fn new() -> Self {
        Self {
            state: A::default(),
            version: Version::initial(),
            uncommitted: Vec::new(),
        }
    }

    /// Rehydrates an aggregate from its stored stream.
    ///
    /// Events are applied in the order given and nothing is recorded as
    /// uncommitted. See [`decode_event`] for the failure mode.
    pub fn load_from_history(envelopes: impl IntoIterator<Item = EventEnvelope>) -> Self {
        let mut root = Self::new();
        for envelope in envelopes {
            let event = decode_event::<A>(&envelope);
            root.state.apply(event);
            root.version = envelope.version;
        }
        root
    }

    /// Rebuilds state from bare events, with the version set to their count.
    pub fn replay(events: impl IntoIterator<Item = A::Event>) -> Self {
        let mut root = Self::new();
        for event in events {
            root.state.apply(event);
            root.version = root.version.next();
        }
        root
    }

    /// Records an event as uncommitted and applies it.
    pub fn raise(&mut self, event: A::Event) {
        self.state.apply(event.clone());
        self.uncommitted.push(event);
    }

    /// Raises every event in order.
    pub fn raise_all(&mut self, events: impl IntoIterator<Item = A::Event>) {
        for event in events {
            self.raise(event);
        }
    }

    /// Runs a command method against the current state and raises what it
    /// returns. On error nothing is raised.
    ///
    /// Returns the number of events raised.
    pub fn execute<F>(&mut self, command: F) -> Result<usize, A::Error>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let events = command(&self.state)?;
        let raised = events.len();
        self.raise_all(events);
        Ok(raised)
    }

    /// Returns the derived state.
    pub fn state(&self) -> &A {
        &self.state
    }

    /// Returns the version of the last persisted event.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if no event has been persisted for this aggregate.
    pub fn is_new(&self) -> bool {
        self.version == Version::initial()
    }

    /// Returns the events raised since the last load or save.
    pub fn uncommitted(&self) -> &[A::Event] {
        &self.uncommitted
    }

    /// Marks the uncommitted events as persisted at `version`.
    pub fn mark_committed(&mut self, version: Version) {
        self.uncommitted.clear();
        self.version = version;
    }

    /// Consumes the root, returning the derived state.
    pub fn into_state(self) -> A {
        self.state
    }
}

impl<A: Aggregate> Default for AggregateRoot<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> Deref for AggregateRoot<A> {
    type Target = A;

    fn deref(&self) -> &A {
        &self.state
    }
}
