//! Timing metrics helpers and in-memory aggregation.
//!
//! The core crates emit their own counters as events happen; the helpers
//! here cover the cross-crate views (fit quality per source, sync-point
//! validity, presentation statistics) recorded from the driving loop.

use contracts::{SwapStatus, SyncPoint, Time};
use metrics::{counter, gauge, histogram};

/// Record the quality of a model fit for one source.
pub fn record_fit_quality(source: &str, slope_ms_per_unit: f64, mse: f64, half_width: Time) {
    gauge!("timing_model_slope_ms_per_unit", "source" => source.to_string())
        .set(slope_ms_per_unit);
    gauge!("timing_model_mse", "source" => source.to_string()).set(mse);
    histogram!("timing_prediction_half_width_ms", "source" => source.to_string())
        .record(half_width.as_millis_f64());
}

/// Record a stability transition for one source.
pub fn record_stability_transition(source: &str, from: SwapStatus, to: SwapStatus) {
    counter!(
        "timing_stability_transitions_total",
        "source" => source.to_string(),
        "from" => from.label(),
        "to" => to.label()
    )
    .increment(1);
}

/// Record a sync point and its per-client readiness.
pub fn record_sync_point(point: &SyncPoint) {
    let validity = if point.valid() { "valid" } else { "invalid" };
    counter!("timing_sync_points_recorded_total", "validity" => validity).increment(1);
    for (name, client) in &point.clients {
        gauge!(
            "timing_sync_point_client_ready",
            "client" => name.clone()
        )
        .set(if client.ready { 1.0 } else { 0.0 });
        if client.prediction.usable {
            gauge!(
                "timing_sync_point_unit",
                "client" => name.clone()
            )
            .set(client.prediction.pred);
        }
    }
}

/// Presentation statistics aggregator.
///
/// Aggregates in memory for an end-of-run summary, independent of the
/// Prometheus export.
#[derive(Debug, Clone, Default)]
pub struct PresentationStatsAggregator {
    /// Slides finished
    pub slides_presented: u64,

    /// Per-slide duration error (actual minus intended, ms)
    pub duration_error_ms: RunningStats,

    /// Per-slide onset error (actual minus intended, ms)
    pub onset_error_ms: RunningStats,

    /// Sync points taken
    pub sync_points: u64,

    /// Sync points with at least one unready client
    pub invalid_sync_points: u64,
}

impl PresentationStatsAggregator {
    /// Create a new aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished slide.
    ///
    /// Sentinel times are skipped; a slide that never came on screen has
    /// no error to aggregate.
    pub fn record_slide(
        &mut self,
        intended_onset: Time,
        actual_onset: Time,
        intended_duration: Time,
        actual_duration: Time,
    ) {
        self.slides_presented += 1;
        if !intended_duration.is_error() && !actual_duration.is_error() {
            self.duration_error_ms
                .push((actual_duration - intended_duration).as_millis_f64());
        }
        if !intended_onset.is_error() && !actual_onset.is_error() {
            self.onset_error_ms
                .push((actual_onset - intended_onset).as_millis_f64());
        }
    }

    /// Record one sync point.
    pub fn record_sync_point(&mut self, point: &SyncPoint) {
        self.sync_points += 1;
        if !point.valid() {
            self.invalid_sync_points += 1;
        }
        record_sync_point(point);
    }

    /// Produce a summary report
    pub fn summary(&self) -> PresentationSummary {
        PresentationSummary {
            slides_presented: self.slides_presented,
            duration_error_ms: StatsSummary::from(&self.duration_error_ms),
            onset_error_ms: StatsSummary::from(&self.onset_error_ms),
            sync_points: self.sync_points,
            invalid_sync_points: self.invalid_sync_points,
        }
    }

    /// Reset the aggregation
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Presentation summary
#[derive(Debug, Clone, Default)]
pub struct PresentationSummary {
    pub slides_presented: u64,
    pub duration_error_ms: StatsSummary,
    pub onset_error_ms: StatsSummary,
    pub sync_points: u64,
    pub invalid_sync_points: u64,
}

impl std::fmt::Display for PresentationSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Presentation Summary ===")?;
        writeln!(f, "Slides presented: {}", self.slides_presented)?;
        writeln!(f, "Duration error (ms): {}", self.duration_error_ms)?;
        writeln!(f, "Onset error (ms): {}", self.onset_error_ms)?;
        writeln!(
            f,
            "Sync points: {} ({} invalid)",
            self.sync_points, self.invalid_sync_points
        )
    }
}

/// Stats summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count(),
            min: stats.min(),
            max: stats.max(),
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// Add a new value
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Sample count
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Minimum
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Maximum
    pub fn max(&self) -> f64 {
        self.max
    }
}
