//! Viewer presence tracking
//!
//! Viewers are counted by heartbeat: each signal upserts the caller's
//! last-seen time, and a count scans the registry for entries inside the
//! freshness window. Stale entries are evicted during that scan; counts are
//! queried on roughly the heartbeat cadence, so no separate sweep is needed.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

/// One time-labeled sample of the active-viewer count
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPoint {
    /// Wall-clock label, `HH:MM:SS`
    pub time: String,
    /// Reported viewer count at that time
    pub count: u64,
}

/// Count and history returned by the statistics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ViewerSnapshot {
    pub viewer_count: u64,
    pub history: Vec<HistoryPoint>,
}

struct Inner {
    heartbeats: HashMap<String, Instant>,
    history: VecDeque<HistoryPoint>,
}

/// Heartbeat registry with time-to-live eviction and a capped count history
pub struct ViewerStats {
    inner: Mutex<Inner>,
    /// Heartbeats older than this are stale; must exceed the client
    /// heartbeat interval with margin for jitter
    window: Duration,
    /// Undercount compensation for shared-address viewers. The reported
    /// count is approximate by design; zero stays zero.
    multiplier: u32,
    history_capacity: usize,
}

impl ViewerStats {
    pub fn new(window: Duration, multiplier: u32, history_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heartbeats: HashMap::new(),
                history: VecDeque::with_capacity(history_capacity),
            }),
            window,
            multiplier,
            history_capacity,
        }
    }

    /// Record a heartbeat for a viewer identifier
    pub fn record_heartbeat(&self, viewer_id: &str) {
        self.inner
            .lock()
            .heartbeats
            .insert(viewer_id.to_string(), Instant::now());
    }

    /// Reported count of active viewers
    ///
    /// Entries found stale during the scan are removed, so eviction is a
    /// byproduct of counting.
    pub fn active_count(&self) -> u64 {
        let mut inner = self.inner.lock();
        Self::count_and_evict(&mut inner.heartbeats, self.window, self.multiplier)
    }

    /// Count, record one history sample, and return count plus history
    pub fn snapshot(&self) -> ViewerSnapshot {
        let mut inner = self.inner.lock();
        let count = Self::count_and_evict(&mut inner.heartbeats, self.window, self.multiplier);

        inner.history.push_back(HistoryPoint {
            time: chrono::Local::now().format("%H:%M:%S").to_string(),
            count,
        });
        while inner.history.len() > self.history_capacity {
            inner.history.pop_front();
        }

        ViewerSnapshot {
            viewer_count: count,
            history: inner.history.iter().cloned().collect(),
        }
    }

    fn count_and_evict(
        heartbeats: &mut HashMap<String, Instant>,
        window: Duration,
        multiplier: u32,
    ) -> u64 {
        let now = Instant::now();
        let mut raw: u64 = 0;

        heartbeats.retain(|_, last_seen| {
            if now.duration_since(*last_seen) <= window {
                raw += 1;
                true
            } else {
                false
            }
        });

        raw * u64::from(multiplier)
    }

    /// Number of tracked entries, stale or not (for tests/introspection)
    pub fn tracked_entries(&self) -> usize {
        self.inner.lock().heartbeats.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(window_ms: u64) -> ViewerStats {
        ViewerStats::new(Duration::from_millis(window_ms), 1, 20)
    }

    #[test]
    fn test_empty_registry_counts_zero() {
        assert_eq!(stats(1000).active_count(), 0);
    }

    #[test]
    fn test_counts_distinct_viewers_in_window() {
        let stats = stats(1000);
        stats.record_heartbeat("10.0.0.1");
        stats.record_heartbeat("10.0.0.2");
        stats.record_heartbeat("10.0.0.1"); // Upsert, not a new entry

        assert_eq!(stats.active_count(), 2);
    }

    #[test]
    fn test_stale_entries_evicted_on_scan() {
        let stats = stats(30);
        stats.record_heartbeat("10.0.0.1");
        assert_eq!(stats.active_count(), 1);

        std::thread::sleep(Duration::from_millis(60));

        // The stale entry is excluded and removed as a side effect
        assert_eq!(stats.active_count(), 0);
        assert_eq!(stats.tracked_entries(), 0);
    }

    #[test]
    fn test_steady_heartbeats_stay_counted() {
        let stats = stats(100);
        for _ in 0..5 {
            stats.record_heartbeat("10.0.0.1");
            assert!(stats.active_count() >= 1);
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_multiplier_scales_but_zero_stays_zero() {
        let stats = ViewerStats::new(Duration::from_secs(1), 10, 20);
        assert_eq!(stats.active_count(), 0);

        stats.record_heartbeat("10.0.0.1");
        stats.record_heartbeat("10.0.0.2");
        assert_eq!(stats.active_count(), 20);
    }

    #[test]
    fn test_history_is_capped_and_ordered() {
        let stats = ViewerStats::new(Duration::from_secs(1), 1, 3);

        stats.record_heartbeat("10.0.0.1");
        let mut counts = Vec::new();
        for i in 0..4u64 {
            // Vary the count so ordering is observable
            if i == 3 {
                stats.record_heartbeat("10.0.0.2");
            }
            counts.push(stats.snapshot().viewer_count);
        }

        let history = stats.snapshot().history;
        assert_eq!(history.len(), 3);
        // Oldest sample dropped, most recent retained in append order
        assert_eq!(history[history.len() - 2].count, 2);
        assert_eq!(history[history.len() - 1].count, 2);
    }

    #[test]
    fn test_snapshot_appends_one_sample() {
        let stats = stats(1000);
        assert_eq!(stats.snapshot().history.len(), 1);
        assert_eq!(stats.snapshot().history.len(), 2);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let stats = stats(1000);
        stats.record_heartbeat("10.0.0.1");

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["viewer_count"], 1);

        let history = json["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["count"], 1);
        assert!(history[0]["time"].is_string());
    }
}
