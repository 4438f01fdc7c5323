//! Mock audio-callback source.
//!
//! Synthesises audio buffer boundaries: one swap per `buffer_size /
//! sample_rate` seconds, with sample-frame units advancing by the buffer
//! size. Delivers full `SwapObservation::Event`s since the callback knows
//! its own sample counter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use contracts::{
    SharedClock, SwapData, SwapEventCallback, SwapObservation, SwapSource, SwapUnit, Time,
};

use crate::metrics::SourceMetrics;

/// Mock audio source configuration
#[derive(Debug, Clone)]
pub struct MockAudioSourceConfig {
    /// Source ID
    pub source_id: String,

    /// Sample rate in Hz (default 44100)
    pub sample_rate: u32,

    /// Buffer size in sample frames (default 256)
    pub buffer_size: u32,

    /// Device-reported output latency, diagnostic only
    pub device_latency: Option<Time>,
}

impl Default for MockAudioSourceConfig {
    fn default() -> Self {
        Self {
            source_id: "mock_audio".to_string(),
            sample_rate: 44_100,
            buffer_size: 256,
            device_latency: None,
        }
    }
}

/// Synthesised audio-callback source.
pub struct MockAudioSource {
    config: MockAudioSourceConfig,
    clock: SharedClock,
    running: Arc<AtomicBool>,
    metrics: Arc<SourceMetrics>,
}

impl MockAudioSource {
    /// Create a new mock audio source
    pub fn new(config: MockAudioSourceConfig, clock: SharedClock) -> Self {
        Self {
            config,
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

impl SwapSource for MockAudioSource {
    fn source_id(&self) -> &str {
        &self.config.source_id
    }

    fn nominal_period(&self) -> Time {
        Time::from_secs_f64(self.config.buffer_size as f64 / self.config.sample_rate as f64)
    }

    fn units_per_swap(&self) -> SwapUnit {
        self.config.buffer_size as SwapUnit
    }

    fn listen(&self, callback: SwapEventCallback) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let config = self.config.clone();
        let period = self.nominal_period();
        let clock = Arc::clone(&self.clock);
        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);

        std::thread::spawn(move || {
            let mut sample_frame: SwapUnit = 0;

            debug!(
                source_id = %config.source_id,
                sample_rate = config.sample_rate,
                buffer_size = config.buffer_size,
                "mock audio source started"
            );

            while running.load(Ordering::Relaxed) {
                std::thread::sleep(period.to_duration());
                if !running.load(Ordering::Relaxed) {
                    break;
                }
                let data = SwapData::new(clock.now(), sample_frame);
                callback(SwapObservation::Event(data));
                metrics.record_delivered(&config.source_id);
                trace!(
                    source_id = %config.source_id,
                    sample_frame,
                    time = %data.time,
                    "buffer boundary delivered"
                );
                sample_frame = sample_frame.saturating_add(config.buffer_size as SwapUnit);
            }

            debug!(source_id = %config.source_id, "mock audio source stopped");
        });
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    fn reported_latency(&self) -> Option<Time> {
        self.config.device_latency
    }
}
