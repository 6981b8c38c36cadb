//! Live progress aggregation for a run.
//!
//! One tracker per run. Workers grow the expected total as they are
//! admitted, bump per-item counters while streaming, and account each
//! item exactly once when it reaches a terminal state. Callbacks get a
//! consistent snapshot on a bounded interval, so arbitrarily chatty
//! transports cannot flood an observer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use crate::transport::ProgressFn;

/// Default snapshot notification interval.
const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Callback invoked with a progress snapshot.
pub type SnapshotCallback = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Transfer step an active item is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Fetching,
    Relaying,
}

/// Point-in-time view of one active item.
#[derive(Debug, Clone)]
pub struct ItemProgress {
    pub key: String,
    pub phase: TransferPhase,
    pub transferred: u64,
    pub total: u64,
}

/// Point-in-time view of the whole run.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    /// Bytes accounted as done, summed over terminal items.
    pub processed: u64,
    /// Sum of the declared sizes of all items admitted so far.
    pub expected: u64,
    /// Items currently in a fetch or relay step, sorted by key.
    pub items: Vec<ItemProgress>,
}

struct ActiveItem {
    phase: TransferPhase,
    transferred: AtomicU64,
    total: u64,
}

/// Aggregates progress across all workers of one run and notifies
/// callbacks periodically.
pub struct ProgressTracker {
    expected: AtomicU64,
    processed: AtomicU64,
    active: RwLock<HashMap<String, ActiveItem>>,
    callbacks: RwLock<Vec<SnapshotCallback>>,
    interval: Duration,
    stop: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

impl ProgressTracker {
    /// Creates a new tracker with the given notification interval.
    ///
    /// If `interval` is `None`, defaults to 500 ms.
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            expected: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            active: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(Vec::new()),
            interval: interval.unwrap_or(DEFAULT_INTERVAL),
            stop: Mutex::new(None),
        }
    }

    /// Registers a snapshot callback.
    pub fn on_snapshot(&self, callback: SnapshotCallback) {
        let mut callbacks = self.callbacks.write().unwrap();
        callbacks.push(callback);
    }

    /// Grows the expected total by an item's declared size.
    ///
    /// Called once per item when its worker is admitted, so the
    /// denominator fills in as the run ramps up.
    pub fn add_expected(&self, bytes: u64) {
        self.expected.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Accounts `bytes` as done. Called exactly once per terminal item.
    pub fn advance(&self, bytes: u64) {
        self.processed.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Clears totals and active items for a new run. Registered callbacks
    /// survive.
    pub fn reset(&self) {
        self.expected.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.active.write().unwrap().clear();
    }

    /// Begins tracking an item's fetch or relay step.
    pub fn track(&self, key: &str, total: u64, phase: TransferPhase) {
        let mut active = self.active.write().unwrap();
        active.insert(
            key.to_string(),
            ActiveItem {
                phase,
                transferred: AtomicU64::new(0),
                total,
            },
        );
    }

    /// Updates an item's cumulative byte count. Counters never move
    /// backwards, even if a transport reports out of order.
    pub fn set_transferred(&self, key: &str, bytes: u64) {
        let active = self.active.read().unwrap();
        if let Some(item) = active.get(key) {
            item.transferred.fetch_max(bytes, Ordering::Relaxed);
        }
    }

    /// Stops tracking an item. Safe to call for unknown keys.
    pub fn untrack(&self, key: &str) {
        let mut active = self.active.write().unwrap();
        active.remove(key);
    }

    /// Returns a progress callback bound to one item, in the shape
    /// transports expect.
    pub fn progress_fn(self: &Arc<Self>, key: &str) -> ProgressFn {
        let tracker = Arc::clone(self);
        let key = key.to_string();
        Arc::new(move |bytes| tracker.set_transferred(&key, bytes))
    }

    /// Takes a consistent point-in-time snapshot.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let active = self.active.read().unwrap();
        let mut items: Vec<ItemProgress> = active
            .iter()
            .map(|(key, item)| ItemProgress {
                key: key.clone(),
                phase: item.phase,
                transferred: item.transferred.load(Ordering::Relaxed),
                total: item.total,
            })
            .collect();
        items.sort_by(|a, b| a.key.cmp(&b.key));

        ProgressSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            expected: self.expected.load(Ordering::Relaxed),
            items,
        }
    }

    /// Sends a one-time snapshot to all callbacks.
    pub fn notify(&self) {
        let snapshot = self.snapshot();
        let callbacks = self.callbacks.read().unwrap();
        for cb in callbacks.iter() {
            cb(snapshot.clone());
        }
    }

    /// Starts periodic snapshot notifications in a background tokio task.
    ///
    /// Call [`stop`](Self::stop) to cancel.
    pub fn start(self: &Arc<Self>) {
        let (tx, mut rx) = tokio::sync::oneshot::channel();
        {
            let mut stop = self.stop.lock().unwrap();
            // Stop any existing task.
            drop(stop.take());
            *stop = Some(tx);
        }

        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tracker.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracker.notify();
                    }
                    _ = &mut rx => {
                        break;
                    }
                }
            }
        });
    }

    /// Stops the periodic notification task.
    pub fn stop(&self) {
        let mut stop = self.stop.lock().unwrap();
        // Dropping the sender signals the task to exit.
        drop(stop.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_and_untrack() {
        let tracker = ProgressTracker::new(None);
        tracker.track("a.mp4", 1000, TransferPhase::Fetching);
        assert_eq!(tracker.snapshot().items.len(), 1);

        tracker.untrack("a.mp4");
        assert!(tracker.snapshot().items.is_empty());
    }

    #[test]
    fn untrack_unknown_key_is_noop() {
        let tracker = ProgressTracker::new(None);
        tracker.untrack("nonexistent");
        tracker.set_transferred("nonexistent", 42);
        assert!(tracker.snapshot().items.is_empty());
    }

    #[test]
    fn per_item_counter_never_regresses() {
        let tracker = ProgressTracker::new(None);
        tracker.track("a.mp4", 1000, TransferPhase::Fetching);
        tracker.set_transferred("a.mp4", 600);
        tracker.set_transferred("a.mp4", 400);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.items[0].transferred, 600);
    }

    #[test]
    fn snapshot_items_sorted_by_key() {
        let tracker = ProgressTracker::new(None);
        tracker.track("zeta.bin", 10, TransferPhase::Relaying);
        tracker.track("alpha.bin", 10, TransferPhase::Fetching);

        let keys: Vec<String> = tracker
            .snapshot()
            .items
            .into_iter()
            .map(|i| i.key)
            .collect();
        assert_eq!(keys, vec!["alpha.bin".to_string(), "zeta.bin".to_string()]);
    }

    #[test]
    fn overall_counters_accumulate() {
        let tracker = ProgressTracker::new(None);
        tracker.add_expected(500);
        tracker.add_expected(300);
        tracker.advance(500);

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.expected, 800);
        assert_eq!(snapshot.processed, 500);
    }

    #[test]
    fn reset_zeroes_counters_and_active_items_but_keeps_callbacks() {
        let tracker = ProgressTracker::new(None);
        let received = Arc::new(Mutex::new(0usize));
        let r = Arc::clone(&received);
        tracker.on_snapshot(Box::new(move |_| {
            *r.lock().unwrap() += 1;
        }));

        tracker.add_expected(500);
        tracker.advance(200);
        tracker.track("a.mp4", 500, TransferPhase::Fetching);
        tracker.reset();

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.expected, 0);
        assert_eq!(snapshot.processed, 0);
        assert!(snapshot.items.is_empty());

        tracker.notify();
        assert_eq!(*received.lock().unwrap(), 1);
    }

    #[test]
    fn concurrent_advance_loses_nothing() {
        use std::thread;

        let tracker = Arc::new(ProgressTracker::new(None));
        let mut handles = vec![];

        for _ in 0..10 {
            let t = Arc::clone(&tracker);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    t.advance(1);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(tracker.snapshot().processed, 1000);
    }

    #[test]
    fn notify_calls_callbacks() {
        let tracker = ProgressTracker::new(None);
        let received = Arc::new(Mutex::new(Vec::<ProgressSnapshot>::new()));
        let r = Arc::clone(&received);
        tracker.on_snapshot(Box::new(move |s| {
            r.lock().unwrap().push(s);
        }));

        tracker.add_expected(100);
        tracker.notify();

        let snapshots = received.lock().unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].expected, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_notifies_periodically() {
        let tracker = Arc::new(ProgressTracker::new(Some(Duration::from_millis(100))));
        let received = Arc::new(Mutex::new(0usize));
        let r = Arc::clone(&received);
        tracker.on_snapshot(Box::new(move |_| {
            *r.lock().unwrap() += 1;
        }));

        tracker.start();
        tokio::time::sleep(Duration::from_millis(350)).await;
        tracker.stop();

        let count = *received.lock().unwrap();
        assert!(count >= 3, "expected at least 3 ticks, got {count}");
    }
}
