//! Mock display vsync source.
//!
//! Synthesises buffer-swap observations at a nominal frame period for
//! environments without a real display. Optional jitter and a scripted
//! stall make it usable for stability and stall-detection scenarios.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::prelude::*;
use tracing::{debug, trace};

use contracts::{SharedClock, SwapEventCallback, SwapObservation, SwapSource, SwapUnit, Time};

use crate::metrics::SourceMetrics;

/// Mock display source configuration
#[derive(Debug, Clone)]
pub struct MockDisplaySourceConfig {
    /// Source ID
    pub source_id: String,

    /// Nominal frame period (default 16.667 ms, 60 Hz)
    pub frame_period: Time,

    /// Uniform jitter bound; each interval is period ± jitter
    pub jitter: Time,

    /// Inject a stall after this many frames (None = never)
    pub stall_after_frames: Option<u64>,

    /// Length of the injected stall in frame periods
    pub stall_frames: u64,

    /// RNG seed for reproducible jitter
    pub seed: u64,
}

impl Default for MockDisplaySourceConfig {
    fn default() -> Self {
        Self {
            source_id: "mock_display".to_string(),
            frame_period: Time::from_micros(16_667),
            jitter: Time::ZERO,
            stall_after_frames: None,
            stall_frames: 2,
            seed: 0,
        }
    }
}

/// Synthesised vsync source.
///
/// Delivers `SwapObservation::TimeOnly` per frame; the store infers the
/// frame counter.
pub struct MockDisplaySource {
    config: MockDisplaySourceConfig,
    clock: SharedClock,
    running: Arc<AtomicBool>,
    metrics: Arc<SourceMetrics>,
}

impl MockDisplaySource {
    /// Create a new mock display source
    pub fn new(config: MockDisplaySourceConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            running: Arc::new(AtomicBool::new(false)),
            metrics: Arc::new(SourceMetrics::new()),
        }
    }

    /// Create a jitter-free source at a given refresh rate
    pub fn at_hz(source_id: &str, hz: f64, clock: SharedClock) -> Self {
        Self::new(
            MockDisplaySourceConfig {
                source_id: source_id.to_string(),
                frame_period: Time::from_secs_f64(1.0 / hz),
                ..Default::default()
            },
            clock,
        )
    }

    /// Delivery metrics
    pub fn metrics(&self) -> Arc<SourceMetrics> {
        Arc::clone(&self.metrics)
    }
}

impl SwapSource for MockDisplaySource {
    fn source_id(&self) -> &str {
        &self.config.source_id
    }

    fn nominal_period(&self) -> Time {
        self.config.frame_period
    }

    fn units_per_swap(&self) -> SwapUnit {
        1
    }

    fn listen(&self, callback: SwapEventCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let config = self.config.clone();
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);

        std::thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut frame: u64 = 0;

            debug!(
                source_id = %config.source_id,
                period = %config.frame_period,
                "mock display source started"
            );

            while running.load(Ordering::Relaxed) {
                let jitter = if config.jitter > Time::ZERO {
                    let bound = config.jitter.as_nanos();
                    Time::from_nanos(rng.random_range(-bound..=bound))
                } else {
                    Time::ZERO
                };
                std::thread::sleep((config.frame_period + jitter).to_duration());

                if Some(frame) == config.stall_after_frames {
                    metrics.record_stall(&config.source_id);
                    debug!(source_id = %config.source_id, frame, "injecting stall");
                    std::thread::sleep((config.frame_period * config.stall_frames as i64).to_duration());
                }

                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let time = clock.now();
                callback(SwapObservation::TimeOnly(time));
                metrics.record_delivered(&config.source_id);
                frame += 1;
                trace!(source_id = %config.source_id, frame, %time, "vsync delivered");
            }

            debug!(source_id = %config.source_id, "mock display source stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}
