//! Prediction types: model outputs with explicit uncertainty.
//!
//! Every prediction carries a `usable` flag instead of an error: an
//! unusable prediction is the normal, recoverable "not enough data yet"
//! answer and never crosses a client boundary as a failure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{SwapStatus, SwapUnit, Time, SWAP_UNIT_ERROR};

/// A time prediction with a symmetric two-sided interval half-width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePrediction {
    /// Point prediction.
    pub pred: Time,

    /// Prediction-interval half-width.
    pub uncertainty: Time,

    /// False while the backing model has not fit successfully.
    pub usable: bool,
}

impl TimePrediction {
    /// An unusable prediction (both fields sentinel).
    pub const UNUSABLE: TimePrediction = TimePrediction {
        pred: Time::ERROR,
        uncertainty: Time::ERROR,
        usable: false,
    };

    /// A prediction with zero uncertainty (e.g. a caller-supplied root time).
    pub fn exact(time: Time) -> Self {
        Self {
            pred: time,
            uncertainty: Time::ZERO,
            usable: true,
        }
    }

    /// Construct a usable prediction.
    pub fn new(pred: Time, uncertainty: Time) -> Self {
        Self {
            pred,
            uncertainty,
            usable: true,
        }
    }

    /// Lower bound of the interval.
    pub fn lower(&self) -> Time {
        self.pred - self.uncertainty
    }

    /// Upper bound of the interval.
    pub fn upper(&self) -> Time {
        self.pred + self.uncertainty
    }
}

/// A swap-unit prediction: floating-point lower/point/upper bounds from
/// inverting the regression, with rounded integer views.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwapUnitPrediction {
    /// Lower bound (from the upper time bound under a positive slope).
    pub lower: f64,

    /// Point prediction.
    pub pred: f64,

    /// Upper bound.
    pub upper: f64,

    /// False while the backing model has not fit successfully.
    pub usable: bool,
}

impl SwapUnitPrediction {
    /// An unusable prediction.
    pub const UNUSABLE: SwapUnitPrediction = SwapUnitPrediction {
        lower: f64::NAN,
        pred: f64::NAN,
        upper: f64::NAN,
        usable: false,
    };

    /// Rounded integer view of the lower bound.
    pub fn lower_unit(&self) -> SwapUnit {
        Self::round_unit(self.lower)
    }

    /// Rounded integer view of the point prediction.
    pub fn pred_unit(&self) -> SwapUnit {
        Self::round_unit(self.pred)
    }

    /// Rounded integer view of the upper bound.
    pub fn upper_unit(&self) -> SwapUnit {
        Self::round_unit(self.upper)
    }

    /// Whether a unit lies inside the (rounded) prediction interval.
    pub fn contains(&self, unit: SwapUnit) -> bool {
        self.usable && self.lower_unit() <= unit && unit <= self.upper_unit()
    }

    fn round_unit(value: f64) -> SwapUnit {
        if value.is_finite() && value >= 0.0 {
            value.round() as SwapUnit
        } else {
            SWAP_UNIT_ERROR
        }
    }
}

/// One client's contribution to a sync point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientPrediction {
    /// Swap-unit prediction at the sync point's root time.
    pub prediction: SwapUnitPrediction,

    /// Whether the client was ready when the prediction was taken.
    pub ready: bool,

    /// The client's stability status at that moment.
    pub status: SwapStatus,
}

/// A cross-domain prediction: one root time plus, per registered client,
/// the swap unit expected to correspond to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPoint {
    /// Root wall-clock time of the sync point.
    pub time: TimePrediction,

    /// Per-client swap-unit predictions, keyed by client name.
    pub clients: HashMap<String, ClientPrediction>,
}

impl SyncPoint {
    /// A sync point is valid iff every participating client is ready.
    pub fn valid(&self) -> bool {
        !self.clients.is_empty() && self.clients.values().all(|c| c.ready)
    }
}
