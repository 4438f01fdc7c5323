//! Stability verification for a swap-event source.
//!
//! Watches one store and classifies the source as stably swapping,
//! unstable, stopped, or short on data. An interval is in tolerance iff
//! it differs from the nominal period by at most
//! `swap_period_tolerance × nominal`.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use contracts::{StabilityVerifierConfig, SwapData, SwapStatus, Time};

use crate::store::{ListenerId, SwapStore};

/// Callback fired on a status transition (auto-update mode only).
pub type StatusChangeListener = Arc<dyn Fn(SwapStatus, SwapStatus) + Send + Sync>;

struct VerifierState {
    status: SwapStatus,
    listeners: Vec<StatusChangeListener>,
}

/// Classifies a store's recent samples against its nominal period.
pub struct StabilityVerifier {
    store: Arc<SwapStore>,
    config: StabilityVerifierConfig,
    state: Arc<Mutex<VerifierState>>,
    store_listener: Option<ListenerId>,
}

impl StabilityVerifier {
    /// Create a verifier for `store`.
    ///
    /// The sample size is clamped up to 2 (one interval). With
    /// `auto_update`, status is recomputed on every store notification and
    /// transitions fire the status-change listeners.
    pub fn new(store: Arc<SwapStore>, mut config: StabilityVerifierConfig) -> Self {
        if config.sample_size < 2 {
            debug!(
                store = store.name(),
                requested = config.sample_size,
                "verifier sample size clamped to 2"
            );
            config.sample_size = 2;
        }

        let state = Arc::new(Mutex::new(VerifierState {
            status: SwapStatus::Uninitialized,
            listeners: Vec::new(),
        }));

        let store_listener = if config.auto_update {
            let state_clone = Arc::clone(&state);
            let config_clone = config.clone();
            let clock = store.clock();
            let nominal = store.nominal_swap_period();
            let name = store.name().to_string();
            Some(store.add_new_data_listener(Arc::new(move |snapshot: &[SwapData]| {
                let status = classify(snapshot, &config_clone, nominal, clock.now());
                let mut state = state_clone.lock();
                if status != state.status {
                    let previous = state.status;
                    state.status = status;
                    debug!(
                        store = %name,
                        from = previous.label(),
                        to = status.label(),
                        "stability transition"
                    );
                    metrics::counter!(
                        "timing_stability_transitions_total",
                        "source" => name.clone(),
                        "to" => status.label()
                    )
                    .increment(1);
                    let listeners = state.listeners.clone();
                    drop(state);
                    for listener in listeners {
                        listener(previous, status);
                    }
                }
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

    /// Register a status-transition listener (auto-update mode).
    pub fn add_status_change_listener(&self, listener: StatusChangeListener) {
        self.state.lock().listeners.push(listener);
    }

    /// Current status, recomputed from the store's samples.
    ///
    /// Idempotent: two calls with no new samples and an unchanged clock
    /// return the same value.
    pub fn get_status(&self) -> SwapStatus {
        let now = self.store.clock().now();
        let nominal = self.store.nominal_swap_period();
        let status = self
            .store
            .with_data(|snapshot| classify(snapshot, &self.config, nominal, now));
        self.state.lock().status = status;
        status
    }

    /// Whether the source is currently swapping stably.
    pub fn is_swapping_stably(&self) -> bool {
        self.get_status() == SwapStatus::SwappingStably
    }

    /// Last status seen by the auto-update listener (no recomputation).
    pub fn cached_status(&self) -> SwapStatus {
        self.state.lock().status
    }

    /// Samples examined per check.
    pub fn sample_size(&self) -> usize {
        self.config.sample_size
    }

    /// Spin (with cooperative yielding) until the source is observed
    /// stable or the timeout expires.
    pub fn wait_for_stable_swapping(&self, timeout: Time) -> bool {
        let clock = self.store.clock();
        let start = clock.now();
        loop {
            if self.is_swapping_stably() {
                return true;
            }
            if clock.now() - start > timeout {
                return false;
            }
            std::thread::yield_now();
        }
    }
}

impl Drop for StabilityVerifier {
    fn drop(&mut self) {
        if let Some(id) = self.store_listener.take() {
            self.store.remove_new_data_listener(id);
        }
    }
}

/// Classify a sample window.
///
/// Stop detection needs only one sample; a source that has never produced
/// one is `InsufficientData`, never `Stopped`.
fn classify(
    snapshot: &[SwapData],
    config: &StabilityVerifierConfig,
    nominal: Time,
    now: Time,
) -> SwapStatus {
    let Some(last) = snapshot.last() else {
        return SwapStatus::InsufficientData;
    };

    let stoppage_nanos = config.stoppage_period_multiplier * nominal.as_nanos() as f64;
    if (now - last.time).as_nanos() as f64 > stoppage_nanos {
        return SwapStatus::Stopped;
    }

    if snapshot.len() < config.sample_size {
        return SwapStatus::InsufficientData;
    }

    let window = &snapshot[snapshot.len() - config.sample_size..];
    let nominal_nanos = nominal.as_nanos() as f64;
    let tolerance = config.swap_period_tolerance * nominal_nanos;
    for pair in window.windows(2) {
        let interval = (pair[1].time - pair[0].time).as_nanos() as f64;
        if (interval - nominal_nanos).abs() > tolerance {
            return SwapStatus::SwappingUnstably;
        }
    }
    SwapStatus::SwappingStably
}
