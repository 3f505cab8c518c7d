//! Query side of the views.

use async_trait::async_trait;

/// A view that can be inspected independently of its projection.
///
/// Contents trail the event log; a command's effects show up only after the
/// processor has delivered its events.
#[async_trait]
pub trait ReadModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows held by the view. Waits for an in-flight write to finish.
    async fn count(&self) -> usize;
}
