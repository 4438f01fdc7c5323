//! Delivery counters shared by the mock sources.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-source delivery metrics.
#[derive(Debug, Default)]
pub struct SourceMetrics {
    /// Total swap events delivered
    pub events_delivered: AtomicU64,

    /// Total injected stalls
    pub stalls_injected: AtomicU64,
}

impl SourceMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivered swap event
    pub fn record_delivered(&self, source_id: &str) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "timing_source_events_total",
            "source" => source_id.to_string()
        )
        .increment(1);
    }

    /// Record one injected stall
    pub fn record_stall(&self, source_id: &str) {
        self.stalls_injected.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(
            "timing_source_stalls_total",
            "source" => source_id.to_string()
        )
        .increment(1);
    }

    /// Total delivered events
    pub fn delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    /// Total injected stalls
    pub fn stalls(&self) -> u64 {
        self.stalls_injected.load(Ordering::Relaxed)
    }
}
