// src/telemetry/store.rs
//! Per-source fix log shared between a reader and the render tick

use super::fix::Fix;
use serde::Serialize;
use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        PoisonError, RwLock,
    },
};

/// Default number of fixes retained per source
pub const DEFAULT_CAPACITY: usize = 4096;

/// Point-in-time summary of one store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub retained: usize,
    pub appended: u64,
    pub discarded: u64,
    pub latest: Option<Fix>,
}

/// Append-only, bounded log of fixes for one telemetry source.
///
/// Each append swaps in a complete `Fix` under the write lock, so readers of
/// [`FixStore::latest`] see either the old tail or the new one. When the log
/// is full the oldest fix is evicted.
#[derive(Debug)]
pub struct FixStore {
    name: String,
    log: RwLock<FixLog>,
    discarded: AtomicU64,
}

#[derive(Debug)]
struct FixLog {
    fixes: VecDeque<Fix>,
    capacity: usize,
    appended: u64,
}

impl FixStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_CAPACITY)
    }

    /// Create a store holding at most `capacity` fixes (minimum 1)
    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            name: name.into(),
            log: RwLock::new(FixLog {
                fixes: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                capacity,
                appended: 0,
            }),
            discarded: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append(&self, fix: Fix) {
        let mut log = self.log.write().unwrap_or_else(PoisonError::into_inner);
        if log.fixes.len() == log.capacity {
            log.fixes.pop_front();
        }
        log.fixes.push_back(fix);
        log.appended += 1;
    }

    /// Most recent fix, or `None` while nothing has arrived
    pub fn latest(&self) -> Option<Fix> {
        self.read_log().fixes.back().copied()
    }

    /// Retained fixes in arrival order
    pub fn history(&self) -> Vec<Fix> {
        self.read_log().fixes.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read_log().fixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_log().fixes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.read_log().capacity
    }

    /// Fixes ever appended, including evicted ones
    pub fn total_appended(&self) -> u64 {
        self.read_log().appended
    }

    /// Count a telemetry line that was thrown away
    pub fn record_discard(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> SourceStatus {
        let log = self.read_log();
        SourceStatus {
            name: self.name.clone(),
            retained: log.fixes.len(),
            appended: log.appended,
            discarded: self.discarded(),
            latest: log.fixes.back().copied(),
        }
    }

    fn read_log(&self) -> std::sync::RwLockReadGuard<'_, FixLog> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, thread};

    #[test]
    fn test_empty_store() {
        let store = FixStore::new("receiver");

        assert!(store.latest().is_none());
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_latest_tracks_tail() {
        let store = FixStore::new("receiver");
        store.append(Fix::new(1.0, 2.0, Some(10.0)));
        store.append(Fix::new(3.0, 4.0, None));

        let latest = store.latest().unwrap();
        assert_eq!((latest.latitude, latest.longitude), (3.0, 4.0));
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_appended(), 2);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let store = FixStore::with_capacity("target", 3);
        for i in 0..5 {
            store.append(Fix::new(i as f64, 0.0, None));
        }

        let lats: Vec<f64> = store.history().iter().map(|f| f.latitude).collect();
        assert_eq!(lats, vec![2.0, 3.0, 4.0]);
        assert_eq!(store.total_appended(), 5);
        assert_eq!(store.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let store = FixStore::with_capacity("target", 0);
        store.append(Fix::new(1.0, 1.0, None));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_discard_counter() {
        let store = FixStore::new("receiver");
        store.record_discard();
        store.record_discard();
        assert_eq!(store.discarded(), 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_status_summary() {
        let store = FixStore::with_capacity("target", 2);
        store.append(Fix::new(1.0, 1.0, None));
        store.append(Fix::new(2.0, 2.0, None));
        store.append(Fix::new(3.0, 3.0, None));
        store.record_discard();

        let status = store.status();
        assert_eq!(status.name, "target");
        assert_eq!(status.retained, 2);
        assert_eq!(status.appended, 3);
        assert_eq!(status.discarded, 1);
        assert_eq!(status.latest.map(|f| f.latitude), Some(3.0));
    }

    #[test]
    fn test_concurrent_appends_keep_order() {
        let store = Arc::new(FixStore::new("receiver"));
        let per_writer = 500;

        let writers: Vec<_> = [1.0, -1.0]
            .into_iter()
            .map(|sign| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..per_writer {
                        let v = sign * (i as f64) / 10.0;
                        store.append(Fix::new(v, v, Some(i as f64 % 360.0)));
                    }
                })
            })
            .collect();

        // Reader observing the tail while writers run
        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..1000 {
                    if let Some(fix) = store.latest() {
                        assert_eq!(fix.latitude, fix.longitude);
                    }
                }
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        reader.join().unwrap();

        let history = store.history();
        assert_eq!(history.len(), 2 * per_writer);

        for sign in [1.0, -1.0] {
            let seq: Vec<f64> = history
                .iter()
                .filter(|f| f.latitude * sign > 0.0)
                .map(|f| f.latitude * sign)
                .collect();
            assert!(seq.windows(2).all(|w| w[0] < w[1]), "writer order lost");
            assert_eq!(seq.len(), per_writer - 1);
        }
        for fix in &history {
            assert_eq!(fix.latitude, fix.longitude);
        }
    }
}
