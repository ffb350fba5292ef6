//! In-memory record of already-relayed message ids.
//!
//! Lives for the process lifetime only. A restart resets the set, but
//! the filter cutoff (reset to the new start time) keeps historical
//! mail excluded; only mail arriving in the crash/restart window can
//! be relayed twice, an accepted tradeoff.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct LedgerInner {
    seen: HashSet<String>,
    dispatch_failures: HashMap<String, u32>,
}

/// Dedup set shared between concurrent poll cycles and, via `Arc`,
/// anything else that dispatches.
///
/// Once an id is marked seen it is never relayed again for the life of
/// the process. The failure counter backs the dispatch retry bound:
/// messages that keep failing to post are eventually marked seen and
/// dropped instead of retrying forever.
#[derive(Default)]
pub struct DedupLedger {
    inner: Mutex<LedgerInner>,
}

impl DedupLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this id has already been relayed.
    pub fn seen(&self, id: &str) -> bool {
        self.inner.lock().expect("ledger lock poisoned").seen.contains(id)
    }

    /// Record an id as relayed. Clears any failure count for it.
    pub fn mark_seen(&self, id: &str) {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        inner.seen.insert(id.to_string());
        inner.dispatch_failures.remove(id);
    }

    /// Record a failed dispatch attempt and return the total attempts
    /// so far for this id.
    pub fn record_failure(&self, id: &str) -> u32 {
        let mut inner = self.inner.lock().expect("ledger lock poisoned");
        let count = inner.dispatch_failures.entry(id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Number of ids marked seen, for diagnostics.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("ledger lock poisoned").seen.len()
    }

    /// Whether nothing has been relayed yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
