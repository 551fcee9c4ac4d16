//! Global atomic counters for search job observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (the engine does so after every query).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters, no allocations and no locking.
pub struct Metrics {
    jobs_started: AtomicU64,
    limit_hits: AtomicU64,
    pages_resolved: AtomicU64,
    alerts_raised: AtomicU64,
    matches_filtered: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            jobs_started: AtomicU64::new(0),
            limit_hits: AtomicU64::new(0),
            pages_resolved: AtomicU64::new(0),
            alerts_raised: AtomicU64::new(0),
            matches_filtered: AtomicU64::new(0),
        }
    }

    /// Increment the jobs-started counter by one. Counts every node run,
    /// combinators included.
    pub fn inc_jobs_started(&self) {
        self.jobs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "jobs_started", "counter incremented");
    }

    pub fn inc_limit_hits(&self) {
        self.limit_hits.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "limit_hits", "counter incremented");
    }

    pub fn inc_pages_resolved(&self) {
        self.pages_resolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "pages_resolved", "counter incremented");
    }

    pub fn inc_alerts_raised(&self) {
        self.alerts_raised.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "alerts_raised", "counter incremented");
    }

    /// Add `n` matches removed by sanitizing or permission filtering.
    pub fn add_matches_filtered(&self, n: u64) {
        if n == 0 {
            return;
        }
        self.matches_filtered.fetch_add(n, Ordering::Relaxed);
        tracing::trace!(metric = "matches_filtered", n, "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            jobs_started = self.jobs_started(),
            limit_hits = self.limit_hits(),
            pages_resolved = self.pages_resolved(),
            alerts_raised = self.alerts_raised(),
            matches_filtered = self.matches_filtered(),
        );
    }

    pub fn jobs_started(&self) -> u64 {
        self.jobs_started.load(Ordering::Relaxed)
    }

    pub fn limit_hits(&self) -> u64 {
        self.limit_hits.load(Ordering::Relaxed)
    }

    pub fn pages_resolved(&self) -> u64 {
        self.pages_resolved.load(Ordering::Relaxed)
    }

    pub fn alerts_raised(&self) -> u64 {
        self.alerts_raised.load(Ordering::Relaxed)
    }

    pub fn matches_filtered(&self) -> u64 {
        self.matches_filtered.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.jobs_started.store(0, Ordering::Relaxed);
        self.limit_hits.store(0, Ordering::Relaxed);
        self.pages_resolved.store(0, Ordering::Relaxed);
        self.alerts_raised.store(0, Ordering::Relaxed);
        self.matches_filtered.store(0, Ordering::Relaxed);
    }
}
