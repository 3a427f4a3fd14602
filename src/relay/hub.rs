//! Current-queue registry
//!
//! Maps each stream identity to the queue of its *current* session. A session
//! boundary is a queue identity change: the supervisor installs a fresh queue
//! at teardown and callers re-resolve through [`RelayHub::current`] rather
//! than holding a queue reference across sessions. Accessor and replacement
//! are guarded by the same lock.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::queue::BroadcastQueue;

/// Registry of current broadcast queues, one per stream identity
pub struct RelayHub {
    capacity: usize,
    streams: RwLock<HashMap<String, Arc<BroadcastQueue>>>,
}

impl RelayHub {
    /// Create a hub whose queues use the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Current queue for a stream identity, if one has ever been installed
    pub fn current(&self, stream_key: &str) -> Option<Arc<BroadcastQueue>> {
        self.streams.read().get(stream_key).cloned()
    }

    /// Current queue for a stream identity, installing an open one if absent
    pub fn current_or_install(&self, stream_key: &str) -> Arc<BroadcastQueue> {
        let mut streams = self.streams.write();
        streams
            .entry(stream_key.to_string())
            .or_insert_with(|| Arc::new(BroadcastQueue::new(self.capacity)))
            .clone()
    }

    /// Unconditionally install a fresh open queue for a stream identity
    ///
    /// The previous queue (if any) is returned so the caller can close it;
    /// the hub never closes queues itself.
    pub fn install(&self, stream_key: &str) -> (Arc<BroadcastQueue>, Option<Arc<BroadcastQueue>>) {
        let fresh = Arc::new(BroadcastQueue::new(self.capacity));
        let previous = self
            .streams
            .write()
            .insert(stream_key.to_string(), fresh.clone());
        (fresh, previous)
    }

    /// Number of known stream identities
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }
}
