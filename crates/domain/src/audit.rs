//! Append-only transition history.
//!
//! Toggle-style state (enabled, suspended) is never stored as a flag. It
//! is read off the chronologically last entry, while every entry stays in
//! the history verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry<K> {
    pub kind: K,
    pub at: DateTime<Utc>,
    /// Only negative transitions (disable, suspend) carry a reason.
    pub reason: Option<String>,
}

/// Append-only list of transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditTrail<K> {
    entries: Vec<AuditEntry<K>>,
}

impl<K> Default for AuditTrail<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<K: Copy> AuditTrail<K> {
    /// Appends a positive transition.
    pub fn record(&mut self, kind: K, at: DateTime<Utc>) {
        self.entries.push(AuditEntry {
            kind,
            at,
            reason: None,
        });
    }

    /// Appends a negative transition with its reason.
    pub fn record_with_reason(&mut self, kind: K, at: DateTime<Utc>, reason: Option<String>) {
        self.entries.push(AuditEntry { kind, at, reason });
    }

    /// Returns every entry in insertion order.
    pub fn entries(&self) -> &[AuditEntry<K>] {
        &self.entries
    }

    /// Returns the entry with the latest timestamp. Equal timestamps resolve
    /// to the later insertion.
    pub fn latest(&self) -> Option<&AuditEntry<K>> {
        self.entries.iter().max_by_key(|entry| entry.at)
    }

    /// Returns the kind of the chronologically last entry.
    pub fn current(&self) -> Option<K> {
        self.latest().map(|entry| entry.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
