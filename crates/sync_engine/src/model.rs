//! Linear model mapping swap units to wall-clock time.
//!
//! Ordinary least squares with x = swap unit and y = time in
//! floating-point milliseconds, fit over the newest `sample_size` samples
//! of a store. Predictions carry a two-sided 95 % prediction interval
//! computed from the retained running sums.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use contracts::{
    LinearModelConfig, SwapData, SwapUnitPrediction, Time, TimePrediction, TimingError,
};

use crate::store::{ListenerId, SwapStore};

/// Two-sided 95 % t-quantiles for df = 1..=30.
///
/// df > 30 clamps to the df = 30 value, a mild but explicit conservatism.
const T_QUANTILE_95: [f64; 30] = [
    12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179, 2.160,
    2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064, 2.060, 2.056,
    2.052, 2.048, 2.045, 2.042,
];

fn t_quantile(df: usize) -> f64 {
    debug_assert!(df >= 1);
    T_QUANTILE_95[df.clamp(1, 30) - 1]
}

/// One successful fit; value-typed, a fresh one is produced per fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    /// Number of samples in the fit window.
    pub n: usize,

    /// Mean swap unit.
    pub x_bar: f64,

    /// Mean time (ms).
    pub y_bar: f64,

    /// Milliseconds per swap unit.
    pub slope: f64,

    /// Time (ms) at unit zero.
    pub intercept: f64,

    /// Per-sample residuals (ms).
    pub residuals: Vec<f64>,

    /// Mean squared error, Σr² / (N − 2).
    pub mse: f64,

    /// Σ(xᵢ−x̄)(yᵢ−ȳ), retained for diagnostics.
    pub num_sum: f64,

    /// Σ(xᵢ−x̄)², retained for interval half-widths.
    pub den_sum: f64,
}

impl FittedModel {
    /// Fit a window of samples. Fails below three samples or on a
    /// degenerate (constant-unit) window.
    pub fn fit(window: &[SwapData]) -> Result<Self, TimingError> {
        let n = window.len();
        if n < 3 {
            return Err(TimingError::InsufficientData { have: n, need: 3 });
        }

        let x_bar = window.iter().map(|d| d.unit as f64).sum::<f64>() / n as f64;
        let y_bar = window.iter().map(|d| d.time.as_millis_f64()).sum::<f64>() / n as f64;

        let mut num_sum = 0.0;
        let mut den_sum = 0.0;
        for d in window {
            let dx = d.unit as f64 - x_bar;
            let dy = d.time.as_millis_f64() - y_bar;
            num_sum += dx * dy;
            den_sum += dx * dx;
        }
        if den_sum <= f64::EPSILON {
            return Err(TimingError::Other(
                "degenerate fit window: all swap units identical".to_string(),
            ));
        }

        let slope = num_sum / den_sum;
        let intercept = y_bar - slope * x_bar;

        let residuals: Vec<f64> = window
            .iter()
            .map(|d| d.time.as_millis_f64() - (intercept + slope * d.unit as f64))
            .collect();
        let mse = residuals.iter().map(|r| r * r).sum::<f64>() / (n - 2) as f64;

        Ok(Self {
            n,
            x_bar,
            y_bar,
            slope,
            intercept,
            residuals,
            mse,
            num_sum,
            den_sum,
        })
    }

    /// Deterministic point prediction of the time at `unit`.
    pub fn calculate_time(&self, unit: f64) -> Time {
        Time::from_millis_f64(self.intercept + self.slope * unit)
    }

    /// Point prediction with a 95 % prediction-interval half-width.
    pub fn predict_time(&self, unit: f64) -> TimePrediction {
        let point = self.intercept + self.slope * unit;
        let dx = unit - self.x_bar;
        let half_width = t_quantile(self.n - 2)
            * self.mse.sqrt()
            * (1.0 + 1.0 / self.n as f64 + dx * dx / self.den_sum).sqrt();
        TimePrediction::new(
            Time::from_millis_f64(point),
            Time::from_millis_f64(half_width),
        )
    }

    /// Invert the regression at a single time, without uncertainty.
    pub fn calculate_swap_unit(&self, time: Time) -> f64 {
        (time.as_millis_f64() - self.intercept) / self.slope
    }

    /// Invert the regression at each of a time prediction's lower, point
    /// and upper values.
    pub fn predict_swap_unit(&self, time: TimePrediction) -> SwapUnitPrediction {
        if !time.usable || self.slope <= 0.0 {
            return SwapUnitPrediction::UNUSABLE;
        }
        SwapUnitPrediction {
            lower: self.calculate_swap_unit(time.lower()),
            pred: self.calculate_swap_unit(time.pred),
            upper: self.calculate_swap_unit(time.upper()),
            usable: true,
        }
    }
}

struct ModelState {
    fitted: Option<FittedModel>,
    last_fit_succeeded: bool,
}

/// Owns the latest fit for one store and refits on demand or on new data.
pub struct LinearModel {
    store: Arc<SwapStore>,
    config: LinearModelConfig,
    state: Arc<Mutex<ModelState>>,
    store_listener: Option<ListenerId>,
}

impl LinearModel {
    /// Create a model for `store`.
    ///
    /// The sample size only overrides the minimum of 3 upward. With
    /// `auto_update`, the model refits on every store notification.
    pub fn new(store: Arc<SwapStore>, mut config: LinearModelConfig) -> Self {
        if config.sample_size < 3 {
            debug!(
                store = store.name(),
                requested = config.sample_size,
                "model sample size raised to 3"
            );
            config.sample_size = 3;
        }

        let state = Arc::new(Mutex::new(ModelState {
            fitted: None,
            last_fit_succeeded: false,
        }));

        let store_listener = if config.auto_update {
            let state_clone = Arc::clone(&state);
            let sample_size = config.sample_size;
            let name = store.name().to_string();
            Some(store.add_new_data_listener(Arc::new(move |snapshot: &[SwapData]| {
                refit(&state_clone, snapshot, sample_size, &name);
            })))
        } else {
            None
        };

        Self {
            store,
            config,
            state,
            store_listener,
        }
    }

    /// Refit from the store's current samples. Returns whether the fit
    /// succeeded.
    pub fn fit(&self) -> bool {
        let name = self.store.name().to_string();
        self.store
            .with_data(|snapshot| refit(&self.state, snapshot, self.config.sample_size, &name))
    }

    /// Whether the most recent fit succeeded.
    pub fn last_fit_succeeded(&self) -> bool {
        self.state.lock().last_fit_succeeded
    }

    /// Copy of the current fitted model, if any.
    pub fn fitted(&self) -> Option<FittedModel> {
        self.state.lock().fitted.clone()
    }

    /// Borrow the current fitted model under the model mutex.
    pub fn with_fitted<R>(&self, f: impl FnOnce(Option<&FittedModel>) -> R) -> R {
        let state = self.state.lock();
        f(state.fitted.as_ref())
    }

    /// Fit window size.
    pub fn sample_size(&self) -> usize {
        self.config.sample_size
    }

    /// Predict the time of `unit`; unusable while no fit exists.
    pub fn predict_time(&self, unit: f64) -> TimePrediction {
        let state = self.state.lock();
        match (&state.fitted, state.last_fit_succeeded) {
            (Some(model), true) => model.predict_time(unit),
            _ => TimePrediction::UNUSABLE,
        }
    }

    /// Deterministic time at `unit`; `Time::ERROR` while no fit exists.
    pub fn calculate_time(&self, unit: f64) -> Time {
        let state = self.state.lock();
        match (&state.fitted, state.last_fit_succeeded) {
            (Some(model), true) => model.calculate_time(unit),
            _ => Time::ERROR,
        }
    }

    /// Invert a time prediction into swap units.
    pub fn predict_swap_unit(&self, time: TimePrediction) -> SwapUnitPrediction {
        let state = self.state.lock();
        match (&state.fitted, state.last_fit_succeeded) {
            (Some(model), true) => model.predict_swap_unit(time),
            _ => SwapUnitPrediction::UNUSABLE,
        }
    }

    /// Invert a single time; NaN while no fit exists.
    pub fn calculate_swap_unit(&self, time: Time) -> f64 {
        let state = self.state.lock();
        match (&state.fitted, state.last_fit_succeeded) {
            (Some(model), true) => model.calculate_swap_unit(time),
            _ => f64::NAN,
        }
    }
}

impl Drop for LinearModel {
    fn drop(&mut self) {
        if let Some(id) = self.store_listener.take() {
            self.store.remove_new_data_listener(id);
        }
    }
}

fn refit(state: &Mutex<ModelState>, snapshot: &[SwapData], sample_size: usize, name: &str) -> bool {
    if snapshot.len() < sample_size {
        let mut state = state.lock();
        state.last_fit_succeeded = false;
        return false;
    }

    let window = &snapshot[snapshot.len() - sample_size..];
    match FittedModel::fit(window) {
        Ok(model) => {
            trace!(
                store = %name,
                n = model.n,
                slope = model.slope,
                intercept = model.intercept,
                mse = model.mse,
                "model refit"
            );
            metrics::gauge!("timing_model_slope_ms_per_unit", "source" => name.to_string())
                .set(model.slope);
            metrics::gauge!("timing_model_mse", "source" => name.to_string()).set(model.mse);
            let mut state = state.lock();
            state.fitted = Some(model);
            state.last_fit_succeeded = true;
            true
        }
        Err(e) => {
            debug!(store = %name, error = %e, "model fit failed");
            let mut state = state.lock();
            state.last_fit_succeeded = false;
            false
        }
    }
}
