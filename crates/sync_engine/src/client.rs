//! Data client: one source's store, verifier and model wired together.
//!
//! The client is the safe query surface for a time domain. Every
//! predictor degrades to a marked-unusable fallback instead of failing,
//! so callers can poll freely during warm-up, stalls and recovery.

use std::sync::Arc;

use tracing::debug;

use contracts::{
    DataClientConfig, LinearModelConfig, StabilityVerifierConfig, SwapStatus, SwapUnit,
    SwapUnitPrediction, Time, TimePrediction,
};

use crate::model::LinearModel;
use crate::stability::StabilityVerifier;
use crate::store::SwapStore;

/// Fit-window floor; fewer samples cannot produce an interval.
const MIN_SAMPLE_SIZE: usize = 3;

/// Query surface for one swap-event source.
pub struct DataClient {
    store: Arc<SwapStore>,
    verifier: StabilityVerifier,
    model: LinearModel,
    sample_size: usize,
}

impl DataClient {
    /// Wire a client onto `store`.
    ///
    /// The fit window covers `data_collection_duration` of nominal swaps,
    /// floored at three samples; the verifier shares the window and takes
    /// its tolerances from the client config.
    pub fn new(store: Arc<SwapStore>, config: DataClientConfig) -> Self {
        let nominal = store.nominal_swap_period();
        let sample_size = if nominal > Time::ZERO {
            let ratio = config.data_collection_duration.as_nanos() as f64
                / nominal.as_nanos() as f64;
            (ratio.ceil() as usize).max(MIN_SAMPLE_SIZE)
        } else {
            MIN_SAMPLE_SIZE
        };
        debug!(
            store = store.name(),
            sample_size,
            duration = %config.data_collection_duration,
            "data client window sized"
        );

        let verifier = StabilityVerifier::new(
            Arc::clone(&store),
            StabilityVerifierConfig {
                sample_size,
                swap_period_tolerance: config.swap_period_tolerance,
                stoppage_period_multiplier: config.stoppage_period_multiplier,
                auto_update: config.auto_update,
            },
        );
        let model = LinearModel::new(
            Arc::clone(&store),
            LinearModelConfig {
                sample_size,
                auto_update: config.auto_update,
            },
        );

        Self {
            store,
            verifier,
            model,
            sample_size,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<SwapStore> {
        &self.store
    }

    /// The stability verifier.
    pub fn verifier(&self) -> &StabilityVerifier {
        &self.verifier
    }

    /// The linear model.
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Derived fit-window size.
    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// Current stability status.
    pub fn status(&self) -> SwapStatus {
        self.verifier.get_status()
    }

    /// Ready iff the source swaps stably and the model's last fit
    /// succeeded.
    pub fn all_ready(&self) -> bool {
        self.verifier.is_swapping_stably() && self.model.last_fit_succeeded()
    }

    // ===== Predictors =====

    /// Predicted time of integer swap unit `unit`.
    ///
    /// Unusable (both fields sentinel) until the source swaps stably and
    /// the model has a fit; a fit over unstable intervals is not trusted.
    pub fn predict_swap_time(&self, unit: SwapUnit) -> TimePrediction {
        self.predict_swap_time_fp(unit as f64)
    }

    /// Predicted time of a fractional swap unit.
    pub fn predict_swap_time_fp(&self, unit: f64) -> TimePrediction {
        if !self.all_ready() {
            return TimePrediction::UNUSABLE;
        }
        self.model.predict_time(unit)
    }

    /// Predicted time of the most recent swap.
    ///
    /// Fallback without a fit: the last stored time itself, marked
    /// unusable, with the nominal period as a wide half-width.
    pub fn predict_last_swap_time(&self) -> TimePrediction {
        if let Some(last) = self.store.last_swap() {
            let predicted = self.model.predict_time(last.unit as f64);
            if predicted.usable {
                return predicted;
            }
            return TimePrediction {
                pred: last.time,
                uncertainty: self.store.nominal_swap_period(),
                usable: false,
            };
        }
        TimePrediction::UNUSABLE
    }

    /// Predicted time of the next swap.
    ///
    /// Fallback without a fit: last stored time plus one nominal period,
    /// marked unusable.
    pub fn predict_next_swap_time(&self) -> TimePrediction {
        if let Some(last) = self.store.last_swap() {
            let next_unit = last.unit.saturating_add(self.store.units_per_swap());
            let predicted = self.model.predict_time(next_unit as f64);
            if predicted.usable {
                return predicted;
            }
            let nominal = self.store.nominal_swap_period();
            return TimePrediction {
                pred: last.time + nominal,
                uncertainty: nominal,
                usable: false,
            };
        }
        TimePrediction::UNUSABLE
    }

    /// Predicted interval from "now" (per the store's clock) until the
    /// next swap. Negative values mean the swap is already due.
    pub fn predict_time_to_next_swap(&self) -> TimePrediction {
        let next = self.predict_next_swap_time();
        if next.pred.is_error() {
            return next;
        }
        TimePrediction {
            pred: next.pred - self.store.clock().now(),
            uncertainty: next.uncertainty,
            usable: next.usable,
        }
    }

    /// Predicted swap unit in progress at `time`.
    ///
    /// Gated on readiness like `predict_swap_time`.
    pub fn predict_swap_unit_at_time(&self, time: Time) -> SwapUnitPrediction {
        self.predict_swap_unit(TimePrediction::exact(time))
    }

    /// Invert a full time prediction into swap units.
    pub fn predict_swap_unit(&self, time: TimePrediction) -> SwapUnitPrediction {
        if !self.all_ready() {
            return SwapUnitPrediction::UNUSABLE;
        }
        self.model.predict_swap_unit(time)
    }
}

impl std::fmt::Debug for DataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataClient")
            .field("store", &self.store.name())
            .field("sample_size", &self.sample_size)
            .field("ready", &self.all_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ManualClock, SwapStoreConfig};

    const NOMINAL: Time = Time::from_micros(16_667);

    fn client_with_clock(duration: Time) -> (DataClient, Arc<SwapStore>, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let store = SwapStore::new(
            "display",
            SwapStoreConfig {
                nominal_swap_period: NOMINAL,
                units_per_swap: 1,
                sample_size: 200,
                latency_offset: Time::ZERO,
            },
            clock.clone(),
        );
        let client = DataClient::new(
            store.clone(),
            DataClientConfig {
                data_collection_duration: duration,
                ..Default::default()
            },
        );
        (client, store, clock)
    }

    fn feed_nominal(store: &SwapStore, clock: &ManualClock, count: usize) {
        for _ in 0..count {
            clock.advance(NOMINAL);
            store.store_swap_time(clock.now());
        }
    }

    #[test]
    fn test_sample_size_from_duration() {
        // 1 s of 16.667 ms swaps: ceil(59.9988...) = 60
        let (client, _, _) = client_with_clock(Time::from_secs(1));
        assert_eq!(client.sample_size(), 60);

        // Tiny duration floors at 3
        let (client, _, _) = client_with_clock(Time::from_millis(1));
        assert_eq!(client.sample_size(), 3);
    }

    #[test]
    fn test_ready_after_warm_up() {
        let (client, store, clock) = client_with_clock(Time::from_millis(100));
        assert!(!client.all_ready());
        assert_eq!(client.status(), SwapStatus::InsufficientData);

        feed_nominal(&store, &clock, client.sample_size());
        assert!(client.all_ready());
        assert_eq!(client.status(), SwapStatus::SwappingStably);
    }

    #[test]
    fn test_fallback_predictions_are_marked_unusable() {
        let (client, store, clock) = client_with_clock(Time::from_millis(100));

        // Empty store: nothing to fall back on
        assert!(!client.predict_last_swap_time().usable);
        assert!(client.predict_last_swap_time().pred.is_error());

        // One sample: fallbacks carry values but stay unusable
        clock.advance(NOMINAL);
        store.store_swap_time(clock.now());
        let last = client.predict_last_swap_time();
        assert!(!last.usable);
        assert_eq!(last.pred, clock.now());

        let next = client.predict_next_swap_time();
        assert!(!next.usable);
        assert_eq!(next.pred, clock.now() + NOMINAL);
    }

    #[test]
    fn test_predictions_usable_once_fit() {
        let (client, store, clock) = client_with_clock(Time::from_millis(100));
        feed_nominal(&store, &clock, client.sample_size());

        let last = client.predict_last_swap_time();
        assert!(last.usable);
        assert!((last.pred - clock.now()).abs() < Time::from_millis(1));

        let next = client.predict_next_swap_time();
        assert!(next.usable);
        assert!((next.pred - (clock.now() + NOMINAL)).abs() < Time::from_millis(1));

        let to_next = client.predict_time_to_next_swap();
        assert!(to_next.usable);
        assert!((to_next.pred - NOMINAL).abs() < Time::from_millis(1));
    }

    #[test]
    fn test_unit_at_time_round_trips() {
        let (client, store, clock) = client_with_clock(Time::from_millis(200));
        feed_nominal(&store, &clock, client.sample_size());

        let last = store.last_swap().unwrap();
        let inv = client.predict_swap_unit_at_time(last.time);
        assert!(inv.usable);
        assert_eq!(inv.pred_unit(), last.unit);
    }

    #[test]
    fn test_unstable_source_gates_unit_predictions() {
        let (client, store, clock) = client_with_clock(Time::from_millis(100));
        feed_nominal(&store, &clock, client.sample_size());
        assert!(client.all_ready());
        assert!(client.predict_swap_time(10).usable);

        // One interval at twice nominal is outside the 0.5 tolerance but
        // below the stoppage threshold
        clock.advance(NOMINAL * 2);
        store.store_swap_time(clock.now());
        assert_eq!(client.status(), SwapStatus::SwappingUnstably);

        // The model may still hold a fit over the bad window; the client
        // must not serve predictions from it
        assert!(!client.predict_swap_time(10).usable);
        assert!(client.predict_swap_time(10).pred.is_error());
        assert!(!client.predict_swap_time_fp(10.5).usable);
        assert!(!client.predict_swap_unit_at_time(clock.now()).usable);
    }

    #[test]
    fn test_stalled_source_loses_readiness() {
        let (client, store, clock) = client_with_clock(Time::from_millis(100));
        feed_nominal(&store, &clock, client.sample_size());
        assert!(client.all_ready());

        clock.advance(NOMINAL * 10);
        assert!(!client.all_ready());
        assert_eq!(client.status(), SwapStatus::Stopped);
    }
}
