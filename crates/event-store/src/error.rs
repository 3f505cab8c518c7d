use thiserror::Error;

use crate::{AggregateId, Version};

#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer appended to the stream after the caller read it.
    #[error("stream {aggregate_id} is at {actual}, append expected {expected}")]
    ConcurrencyConflict {
        aggregate_id: AggregateId,
        expected: Version,
        actual: Version,
    },

    /// Empty batch, mixed streams or non-contiguous versions.
    #[error("rejected append: {0}")]
    InvalidAppend(String),

    #[error("event payload could not be encoded or decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EventStoreError {
    /// Conflicts are the only failure a writer can clear by reloading the
    /// stream and trying again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

pub type Result<T> = std::result::Result<T, EventStoreError>;
