//! Shared fixtures for handler unit tests.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use domain::FixedClock;
use event_store::InMemoryEventStore;

use crate::context::HandlerContext;
use crate::integration::InMemoryPublisher;

pub(crate) struct Harness {
    pub store: InMemoryEventStore,
    pub clock: Arc<FixedClock>,
    pub publisher: InMemoryPublisher,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: InMemoryEventStore::new(),
            clock: Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            )),
            publisher: InMemoryPublisher::new(),
        }
    }

    pub fn context(&self) -> HandlerContext<InMemoryEventStore> {
        HandlerContext::new(
            self.store.clone(),
            self.clock.clone(),
            Arc::new(self.publisher.clone()),
        )
    }
}
