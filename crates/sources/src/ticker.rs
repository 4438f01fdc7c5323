//! Regular clock-tick source.
//!
//! The simplest swap source: one tick per configured period, unit advance
//! of 1. Useful as a wall-clock reference domain next to display and
//! audio.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use contracts::{SharedClock, SwapEventCallback, SwapObservation, SwapSource, SwapUnit, Time};

use crate::metrics::SourceMetrics;

/// Periodic tick source.
pub struct ClockTicker {
    source_id: String,
    period: Time,
    clock: SharedClock,
    running: Arc<AtomicBool>,
    metrics: Arc<SourceMetrics>,
}

impl ClockTicker {
    /// Create a ticker at a fixed period
    pub fn new(source_id: impl Into<String>, period: Time, clock: SharedClock) -> Self {
        Self {
            source_id: source_id.into(),
            period,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(SourceMetrics::new()),
        }
    }

    /// Delivery metrics
    pub fn metrics(&self) -> Arc<SourceMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl SwapSource for ClockTicker {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn nominal_period(&self) -> Time {
        self.period
    }

    fn units_per_swap(&self) -> SwapUnit {
        1
    }

    fn listen(&self, callback: SwapEventCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let source_id = self.source_id.clone();
        let period = self.period;
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);

        std::thread::spawn(move || {
            debug!(source_id = %source_id, period = %period, "clock ticker started");
            while running.load(Ordering::Relaxed) {
                std::thread::sleep(period.to_duration());
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                callback(SwapObservation::TimeOnly(clock.now()));
                metrics.record_delivered(&source_id);
            }
            debug!(source_id = %source_id, "clock ticker stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
