//! Document projections: one record per stream, built from create and
//! patch rules.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// What an event does to a document projection.
#[derive(Debug)]
pub enum Rule<D, P> {
    /// Insert a new record for the event's stream, replacing any existing one.
    Create(D),

    /// Update the existing record for the event's stream.
    Patch(P),

    /// The event does not concern this projection.
    Ignore,
}

/// Per-read-model rules for a [`DocumentProjection`].
pub trait DocumentRules: Send + Sync + 'static {
    /// The stored record.
    type Document: Clone + Send + Sync + 'static;

    /// A partial update to a record.
    type Patch: Send;

    /// Name of the projection, used in logs and metrics.
    const NAME: &'static str;

    /// Decides what the event does to this read model.
    fn rule(event: &EventEnvelope) -> Result<Rule<Self::Document, Self::Patch>>;

    /// Applies a patch to an existing record.
    ///
    /// List-valued fields append, scalar fields replace.
    fn apply_patch(document: &mut Self::Document, patch: Self::Patch, event: &EventEnvelope);
}

/// A projection keeping one document per aggregate id.
///
/// Events at or before the projection's position are skipped, so
/// redelivering an event leaves the documents unchanged.
pub struct DocumentProjection<R: DocumentRules> {
    documents: Arc<RwLock<HashMap<AggregateId, R::Document>>>,
    position: Arc<RwLock<ProjectionPosition>>,
}

impl<R: DocumentRules> Clone for DocumentProjection<R> {
    fn clone(&self) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            position: Arc::clone(&self.position),
        }
    }
}

impl<R: DocumentRules> Default for DocumentProjection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: DocumentRules> DocumentProjection<R> {
    /// Creates a new empty projection.
    pub fn new() -> Self {
        Self {
            documents: Arc::new(RwLock::new(HashMap::new())),
            position: Arc::new(RwLock::new(ProjectionPosition::zero())),
        }
    }

    /// Gets the document for one stream.
    pub async fn get(&self, id: AggregateId) -> Option<R::Document> {
        self.documents.read().await.get(&id).cloned()
    }

    /// Gets every document.
    pub async fn all(&self) -> Vec<R::Document> {
        self.documents.read().await.values().cloned().collect()
    }

    /// Gets the documents matching a predicate.
    pub async fn filter<F>(&self, predicate: F) -> Vec<R::Document>
    where
        F: Fn(&R::Document) -> bool,
    {
        self.documents
            .read()
            .await
            .values()
            .filter(|doc| predicate(doc))
            .cloned()
            .collect()
    }

    /// Gets the first document matching a predicate.
    pub async fn find<F>(&self, predicate: F) -> Option<R::Document>
    where
        F: Fn(&R::Document) -> bool,
    {
        self.documents
            .read()
            .await
            .values()
            .find(|doc| predicate(doc))
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

#[async_trait]
impl<R: DocumentRules> Projection for DocumentProjection<R> {
    fn name(&self) -> &'static str {
        R::NAME
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut position = self.position.write().await;
        if position.has_seen(event.position) {
            return Ok(());
        }

        match R::rule(event)? {
            Rule::Create(document) => {
                self.documents
                    .write()
                    .await
                    .insert(event.aggregate_id, document);
            }
            Rule::Patch(patch) => {
                if let Some(document) = self.documents.write().await.get_mut(&event.aggregate_id) {
                    R::apply_patch(document, patch, event);
                } else {
                    tracing::debug!(
                        projection = R::NAME,
                        aggregate_id = %event.aggregate_id,
                        event_type = %event.event_type,
                        "patch for unknown document ignored"
                    );
                }
            }
            Rule::Ignore => {}
        }

        *position = position.advance(event.position);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        *self.position.read().await
    }

    async fn reset(&self) -> Result<()> {
        let mut position = self.position.write().await;
        self.documents.write().await.clear();
        *position = ProjectionPosition::zero();
        Ok(())
    }
}

#[async_trait]
impl<R: DocumentRules> ReadModel for DocumentProjection<R> {
    fn name(&self) -> &'static str {
        R::NAME
    }

    async fn count(&self) -> usize {
        self.documents.read().await.len()
    }
}

/// Appends the items not already in `list`, keeping insertion order.
pub fn append_unique<T: PartialEq>(list: &mut Vec<T>, items: impl IntoIterator<Item = T>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}
