//! Failures raised while feeding events into views and the cascade.

use domain::DomainError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// Reading the global log failed.
    #[error("could not read the event log: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A payload did not match the event type it was filed under.
    #[error("undecodable event payload: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// The cascade could not write to an email stream.
    #[error("cascade write failed: {0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Projection(String),
}

pub type Result<T> = std::result::Result<T, ProjectionError>;
