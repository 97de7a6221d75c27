//! Per-competitor capture lock: at-most-one concurrent capture per
//! competitor, non-blocking acquisition.
//!
//! Grounded on the `DashMap`-backed, lock-free state this crate family uses
//! elsewhere for concurrent-safe shared state (session memory, usage
//! counters): a registry of `()` entries keyed by competitor id, acquired
//! with `entry().or_insert()` rather than a `Mutex`, so a second concurrent
//! attempt observes the entry and backs off immediately instead of queueing.

use dashmap::DashMap;
use std::sync::Arc;

/// Registry of in-flight captures, one slot per competitor.
#[derive(Debug, Clone, Default)]
pub struct CaptureLockRegistry {
    held: Arc<DashMap<String, ()>>,
}

/// RAII guard releasing the lock on drop, even if the capture panics or is cancelled.
pub struct CaptureLockGuard {
    held: Arc<DashMap<String, ()>>,
    competitor_id: String,
}

impl Drop for CaptureLockGuard {
    fn drop(&mut self) {
        self.held.remove(&self.competitor_id);
    }
}

impl CaptureLockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to acquire the lock for `competitor_id`.
    ///
    /// Non-blocking: returns `None` immediately if another capture already
    /// holds it, rather than waiting.
    pub fn try_acquire(&self, competitor_id: &str) -> Option<CaptureLockGuard> {
        match self.held.entry(competitor_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(CaptureLockGuard {
                    held: self.held.clone(),
                    competitor_id: competitor_id.to_string(),
                })
            }
        }
    }

    /// Whether a capture is currently in flight for `competitor_id`.
    pub fn is_held(&self, competitor_id: &str) -> bool {
        self.held.contains_key(competitor_id)
    }
}
