//! Collaborators shared by every handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, AggregateRoot, Clock, DomainError, Repository, SystemClock};
use event_store::EventStore;
use tokio_util::sync::CancellationToken;

use crate::error::{HandlerError, Result};
use crate::integration::{IntegrationEvent, IntegrationEventPublisher, TracingPublisher, publish_all};

/// Store, clock and publisher, cloned into each handler.
pub struct HandlerContext<S: EventStore> {
    store: S,
    clock: Arc<dyn Clock>,
    publisher: Arc<dyn IntegrationEventPublisher>,
}

impl<S: EventStore + Clone> Clone for HandlerContext<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            clock: Arc::clone(&self.clock),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S: EventStore + Clone> HandlerContext<S> {
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        publisher: Arc<dyn IntegrationEventPublisher>,
    ) -> Self {
        Self {
            store,
            clock,
            publisher,
        }
    }

    /// A context on the system clock that logs integration events.
    pub fn with_defaults(store: S) -> Self {
        Self::new(store, Arc::new(SystemClock), Arc::new(TracingPublisher))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn repository<A: Aggregate>(&self) -> Repository<S, A> {
        Repository::new(self.store.clone())
    }

    pub(crate) async fn publish(&self, events: impl IntoIterator<Item = IntegrationEvent>) {
        publish_all(self.publisher.as_ref(), events).await;
    }
}

pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(HandlerError::Cancelled)
    } else {
        Ok(())
    }
}

/// Loads an existing aggregate, runs `command` on it and saves what it
/// raised. A command that raises nothing saves nothing.
pub(crate) async fn update<S, A, F>(
    repository: &Repository<S, A>,
    id: AggregateId,
    cancel: &CancellationToken,
    command: F,
) -> Result<AggregateRoot<A>>
where
    S: EventStore,
    A: Aggregate,
    F: FnOnce(&A) -> std::result::Result<Vec<A::Event>, A::Error>,
    DomainError: From<A::Error>,
{
    ensure_not_cancelled(cancel)?;
    let mut root = repository.get(id).await?;
    root.execute(command).map_err(DomainError::from)?;
    ensure_not_cancelled(cancel)?;
    repository.save(&mut root).await?;
    Ok(root)
}

/// Saves a freshly created aggregate.
pub(crate) async fn create<S, A>(
    repository: &Repository<S, A>,
    events: Vec<A::Event>,
    cancel: &CancellationToken,
) -> Result<AggregateRoot<A>>
where
    S: EventStore,
    A: Aggregate,
{
    ensure_not_cancelled(cancel)?;
    let mut root: AggregateRoot<A> = AggregateRoot::new();
    root.raise_all(events);
    repository.save(&mut root).await?;
    Ok(root)
}
