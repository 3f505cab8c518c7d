//! The projection contract and its checkpoint.

use async_trait::async_trait;
use event_store::{EventEnvelope, Position};

use crate::Result;

/// Checkpoint of a projection in the global log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Slot of the newest event fully applied.
    pub last_position: Position,

    /// Events applied since the projection last started from scratch.
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Checkpoint after applying the event stored at `position`.
    pub fn advance(&self, position: Position) -> Self {
        Self {
            last_position: position,
            events_processed: self.events_processed + 1,
        }
    }

    /// Redelivered events at or below the checkpoint are skipped.
    pub fn has_seen(&self, position: Position) -> bool {
        position <= self.last_position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} after {} events", self.last_position, self.events_processed)
    }
}

/// Consumer of the global log driven by the processor.
///
/// Delivery is at least once: after a failure or a restart the same event
/// can arrive again. The checkpoint moves only when an event is applied
/// completely, so a failed event is retried on the next pass.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Applies one event. Events the projection does not care about still
    /// advance its checkpoint.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops all state so the next catch-up replays from the beginning.
    async fn reset(&self) -> Result<()>;
}
