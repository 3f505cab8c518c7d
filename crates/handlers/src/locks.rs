//! Per-key mutual exclusion for capture recording.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use common::AggregateId;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;

type Handle = Arc<tokio::sync::Mutex<()>>;

/// Registry of lazily created locks, one per key.
///
/// The registry's own mutex is only held while a handle is looked up or
/// created, never across an await, so unrelated keys never wait on each
/// other. Handles stay in the map until [`KeyedLocks::evict_idle`] finds
/// them unused.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    handles: Arc<Mutex<HashMap<AggregateId, Handle>>>,
}

/// Exclusive access to one key. Dropping it releases the key.
#[derive(Debug)]
pub struct KeyGuard {
    key: AggregateId,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> AggregateId {
        self.key
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `key`, or until `cancel` fires.
    pub async fn acquire(
        &self,
        key: AggregateId,
        cancel: &CancellationToken,
    ) -> Result<KeyGuard, HandlerError> {
        let handle = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(handles.entry(key).or_default())
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HandlerError::Cancelled),
            guard = handle.lock_owned() => Ok(KeyGuard { key, _guard: guard }),
        }
    }

    /// Drops handles that nobody holds or waits on. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handles.len();
        // The map's own reference is the only one left on an idle handle.
        handles.retain(|_, handle| Arc::strong_count(handle) > 1);
        let evicted = before - handles.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = handles.len(), "evicted idle capture locks");
        }
        evicted
    }

    /// Returns the number of keys with a live handle.
    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
