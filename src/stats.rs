//! Query counters for the tunnel.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::filter::Category;

/// Atomic counters shared across packet handlers.
pub struct Stats {
    total_blocked: AtomicU64,
    total_allowed: AtomicU64,
    ads_blocked: AtomicU64,
    trackers_blocked: AtomicU64,
    annoyances_blocked: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            total_blocked: AtomicU64::new(0),
            total_allowed: AtomicU64::new(0),
            ads_blocked: AtomicU64::new(0),
            trackers_blocked: AtomicU64::new(0),
            annoyances_blocked: AtomicU64::new(0),
        }
    }

    /// Count one blocked query under its category.
    pub fn record_blocked(&self, category: Category) {
        self.total_blocked.fetch_add(1, Ordering::Relaxed);
        let counter = match category {
            Category::Ads => &self.ads_blocked,
            Category::Tracking => &self.trackers_blocked,
            Category::Annoyances => &self.annoyances_blocked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one query answered by the upstream resolver.
    pub fn record_allowed(&self) {
        self.total_allowed.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative totals since these counters were created.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_blocked: self.total_blocked.load(Ordering::Relaxed),
            total_allowed: self.total_allowed.load(Ordering::Relaxed),
            ads_blocked: self.ads_blocked.load(Ordering::Relaxed),
            trackers_blocked: self.trackers_blocked.load(Ordering::Relaxed),
            annoyances_blocked: self.annoyances_blocked.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_blocked: u64,
    pub total_allowed: u64,
    pub ads_blocked: u64,
    pub trackers_blocked: u64,
    pub annoyances_blocked: u64,
}
