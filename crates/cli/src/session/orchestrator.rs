//! Session orchestrator - coordinates all components.
//!
//! Runs against mock sources: a simulated display with realtime vsync
//! pacing, plus optional audio-callback and clock-tick sources. Real
//! display or audio backends plug in through the same `Display` and
//! `SwapSource` traits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

use contracts::{
    ExperimentBlueprint, Framebuffer, MonotonicClock, RenderContent, SharedClock, Time,
};
use observability::PresentationStatsAggregator;
use presenter::{SharedDisplay, Slide, SlidePresenter};
use sources::{ClockTicker, MockAudioSource, MockAudioSourceConfig, MockDisplay};
use sync_engine::{DataClient, DomainSynchronizer, SwapStore};

use super::SessionStats;

/// Demo framebuffer dimensions.
const DEMO_WIDTH: u32 = 640;
const DEMO_HEIGHT: u32 = 480;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The experiment blueprint
    pub blueprint: ExperimentBlueprint,

    /// Number of demo slides to present
    pub slide_count: usize,

    /// Intended duration of each demo slide
    pub slide_duration: Time,

    /// Session timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main session orchestrator
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Create a new session with the given configuration
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run the session to completion
    pub async fn run(self) -> Result<SessionStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Initialize Metrics (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let clock: SharedClock = MonotonicClock::shared();

        // Display store and client
        let display_store = SwapStore::new(
            blueprint.display.name.clone(),
            blueprint.display.store_config(),
            Arc::clone(&clock),
        );
        let display_client = Arc::new(DataClient::new(
            Arc::clone(&display_store),
            blueprint.client.client_config(),
        ));

        // Export stability transitions as they happen
        let display_name = blueprint.display.name.clone();
        display_client
            .verifier()
            .add_status_change_listener(Arc::new(move |from, to| {
                observability::record_stability_transition(&display_name, from, to);
            }));

        let synchronizer = DomainSynchronizer::new(Arc::clone(&clock));
        synchronizer.add_data_client(&blueprint.display.name, Arc::clone(&display_client))?;

        // Auxiliary sources feed their own stores in the background
        let mut aux_stores: Vec<Arc<SwapStore>> = Vec::new();

        if let Some(spec) = &blueprint.audio {
            let store = SwapStore::new(spec.name.clone(), spec.store_config(), Arc::clone(&clock));
            let client = Arc::new(DataClient::new(
                Arc::clone(&store),
                blueprint.client.client_config(),
            ));
            synchronizer.add_data_client(&spec.name, client)?;

            let source = MockAudioSource::new(
                MockAudioSourceConfig {
                    source_id: spec.name.clone(),
                    sample_rate: spec.sample_rate_hz.round() as u32,
                    buffer_size: spec.buffer_size as u32,
                    device_latency: None,
                },
                Arc::clone(&clock),
            );
            store.receive_from(Some(Arc::new(source)));
            info!(source = %spec.name, sample_rate_hz = spec.sample_rate_hz, "Audio source started");
            aux_stores.push(store);
        }

        if let Some(spec) = &blueprint.clock {
            let store = SwapStore::new(spec.name.clone(), spec.store_config(), Arc::clone(&clock));
            let client = Arc::new(DataClient::new(
                Arc::clone(&store),
                blueprint.client.client_config(),
            ));
            synchronizer.add_data_client(&spec.name, client)?;

            let ticker = ClockTicker::new(
                &spec.name,
                Time::from_millis_f64(spec.tick_period_ms),
                Arc::clone(&clock),
            );
            store.receive_from(Some(Arc::new(ticker)));
            info!(source = %spec.name, tick_period_ms = spec.tick_period_ms, "Clock ticker started");
            aux_stores.push(store);
        }

        let active_sources = synchronizer.len();
        info!(active_sources, "Sources configured");

        // Mock display and presenter
        let frame_period = blueprint.display.store_config().nominal_swap_period;
        let display: SharedDisplay =
            Arc::new(Mutex::new(Box::new(MockDisplay::realtime(frame_period))));

        let mut slide_presenter = SlidePresenter::setup(
            display,
            Arc::clone(&display_client),
            blueprint.swapper.swapper_config(),
            blueprint.presenter.presenter_config(),
        )?;

        // Demo slides: alternating grey levels
        for i in 0..self.config.slide_count {
            let shade = if i % 2 == 0 { 32 } else { 224 };
            let framebuffer = Framebuffer::solid(DEMO_WIDTH, DEMO_HEIGHT, [shade, shade, shade, 255]);
            slide_presenter.append_slide(Slide::new(
                format!("slide_{i:02}"),
                RenderContent::Framebuffer(framebuffer),
                self.config.slide_duration,
            ));
        }

        info!(
            slides = slide_presenter.slide_count(),
            frame_period_ms = frame_period.as_millis_f64(),
            "Starting presentation"
        );

        // The presentation loop blocks on vsync; keep it off the runtime workers.
        let presentation = tokio::task::spawn_blocking(move || {
            let result = slide_presenter.present_slides();
            (slide_presenter, result)
        });

        let (slide_presenter, present_result) = if let Some(timeout) = self.config.timeout {
            match tokio::time::timeout(timeout, presentation).await {
                Ok(joined) => joined.context("Presentation task panicked")?,
                Err(_) => {
                    warn!(timeout_secs = timeout.as_secs(), "Session timed out");
                    for store in &aux_stores {
                        store.receive_from(None);
                    }
                    anyhow::bail!("session timed out before the presentation finished");
                }
            }
        } else {
            presentation.await.context("Presentation task panicked")?
        };
        present_result.context("Presentation failed")?;

        // Cross-domain sync point at the end of the run
        let sync_point = synchronizer.get_sync_point_at_time(clock.now());
        observability::record_sync_point(&sync_point);
        if let Some(fitted) = display_client.model().fitted() {
            let half_width = display_client
                .model()
                .predict_time(fitted.x_bar)
                .uncertainty;
            observability::record_fit_quality(
                &blueprint.display.name,
                fitted.slope,
                fitted.mse,
                half_width,
            );
        }
        let all_ready = synchronizer.all_ready();
        if !all_ready {
            warn!(status = %synchronizer.status_string(), "Not all clients reached readiness");
        }

        // Aggregate per-slide statistics
        let mut aggregator = PresentationStatsAggregator::new();
        for slide in slide_presenter.slides() {
            aggregator.record_slide(
                slide.intended().start_time,
                slide.actual().start_time,
                slide.intended().duration,
                slide.actual().duration,
            );
        }
        aggregator.record_sync_point(&sync_point);

        let errors = slide_presenter.check_for_presentation_errors();

        // Unbind auxiliary sources so their delivery threads stop
        for store in &aux_stores {
            store.receive_from(None);
        }

        let swaps_observed = display_store.stored_count();

        info!(
            duration_secs = start_time.elapsed().as_secs_f64(),
            swaps_observed,
            clean = errors.is_clean(),
            "Session complete"
        );

        Ok(SessionStats {
            slides_presented: aggregator.slides_presented,
            swaps_observed,
            active_sources,
            all_ready,
            duration: start_time.elapsed(),
            presentation: aggregator.summary(),
            errors,
        })
    }
}
