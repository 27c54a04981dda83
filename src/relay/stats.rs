use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct RelayStats {
    enqueued: AtomicU64,
    fallback: AtomicU64,
    drained: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub enqueued: u64,
    pub fallback: u64,
    pub drained: u64,
    /// Messages removed from the queue that could not be decoded.
    pub dropped: u64,
}

impl RelayStats {
    pub fn record_enqueued(&self, count: usize) {
        self.enqueued.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_fallback(&self, count: usize) {
        self.fallback.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_drained(&self, persisted: usize, dropped: usize) {
        self.drained.fetch_add(persisted as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            fallback: self.fallback.load(Ordering::Relaxed),
            drained: self.drained.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
