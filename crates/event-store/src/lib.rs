//! Append-only event storage.
//!
//! Every aggregate instance owns one stream keyed by its [`AggregateId`].
//! Streams are versioned per aggregate for optimistic concurrency, and every
//! appended event also receives a store-wide [`Position`] so projections can
//! follow the global log.

pub mod error;
pub mod event;
pub mod memory;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Position, Version};
pub use memory::InMemoryEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
