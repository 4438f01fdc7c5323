//! Timing configuration contracts that can be shared across crates.
//!
//! All defaults documented here are the defaults the rest of the
//! workspace relies on; change them in one place only.

use serde::{Deserialize, Serialize};

use crate::{PresentationErrorMode, SwapperMode, SwappingMode, Time};

/// Swap-data store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapStoreConfig {
    /// Nominal period between swap events (default 16.667 ms, 60 Hz)
    pub nominal_swap_period: Time,

    /// How far the unit counter advances per inferred swap (must be > 0;
    /// 1 for display frames and clock ticks, buffer size for audio)
    pub units_per_swap: u64,

    /// Maximum number of retained samples
    pub sample_size: usize,

    /// Subtracted from every incoming time before storage
    pub latency_offset: Time,
}

impl Default for SwapStoreConfig {
    fn default() -> Self {
        Self {
            nominal_swap_period: Time::from_micros(16_667),
            units_per_swap: 1,
            sample_size: 100,
            latency_offset: Time::ZERO,
        }
    }
}

/// Stability verifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityVerifierConfig {
    /// Samples examined per check (clamped up to 2; N samples give N-1
    /// intervals)
    pub sample_size: usize,

    /// An interval is in tolerance iff it differs from nominal by at most
    /// this fraction of nominal
    pub swap_period_tolerance: f64,

    /// Silence longer than this multiple of nominal counts as stopped
    pub stoppage_period_multiplier: f64,

    /// Recompute status on each store notification (vs. only on query)
    pub auto_update: bool,
}

impl Default for StabilityVerifierConfig {
    fn default() -> Self {
        Self {
            sample_size: 10,
            swap_period_tolerance: 0.5,
            stoppage_period_multiplier: 4.0,
            auto_update: true,
        }
    }
}

/// Linear model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelConfig {
    /// Fit window; overrides the store's minimum upward if larger
    pub sample_size: usize,

    /// Refit on each store notification (vs. only on explicit fit)
    pub auto_update: bool,
}

impl Default for LinearModelConfig {
    fn default() -> Self {
        Self {
            sample_size: 30,
            auto_update: true,
        }
    }
}

/// Data client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataClientConfig {
    /// Span of data the model fits over; sample size is
    /// ceil(duration / nominal period), floored at 3 (default 1 s)
    pub data_collection_duration: Time,

    /// Auto-update the owned verifier and model on store notifications
    pub auto_update: bool,

    /// Verifier interval tolerance (fraction of nominal)
    pub swap_period_tolerance: f64,

    /// Verifier stoppage threshold (multiple of nominal)
    pub stoppage_period_multiplier: f64,
}

impl Default for DataClientConfig {
    fn default() -> Self {
        Self {
            data_collection_duration: Time::from_secs(1),
            auto_update: true,
            swap_period_tolerance: 0.5,
            stoppage_period_multiplier: 4.0,
        }
    }
}

/// Display swapper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySwapperConfig {
    /// Commit the swap once time-to-next-swap drops below this slack
    /// (default 2 ms)
    pub pre_swap_safety_buffer: Time,

    /// Estimation mode
    #[serde(default)]
    pub mode: SwapperMode,
}

impl Default for DisplaySwapperConfig {
    fn default() -> Self {
        Self {
            pre_swap_safety_buffer: Time::from_millis(2),
            mode: SwapperMode::NominalPeriod,
        }
    }
}

/// Slide presenter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlidePresenterConfig {
    /// Onset re-basing policy after timing errors
    #[serde(default)]
    pub error_mode: PresentationErrorMode,

    /// Where swaps execute
    #[serde(default)]
    pub swapping_mode: SwappingMode,

    /// Gate Rendering -> SwapPending on a GPU fence
    pub use_fence_sync: bool,

    /// Block the swap strictly until the fence signals
    pub wait_until_fence_complete: bool,

    /// Drop slide framebuffers once the slide finishes
    pub deallocate_finished_framebuffers: bool,

    /// CPU-spin length before a blocking swap (default 1 ms)
    pub pre_swap_cpu_hogging_duration: Time,
}

impl Default for SlidePresenterConfig {
    fn default() -> Self {
        Self {
            error_mode: PresentationErrorMode::PropagateDelays,
            swapping_mode: SwappingMode::SingleCoreBlockingSwaps,
            use_fence_sync: true,
            wait_until_fence_complete: false,
            deallocate_finished_framebuffers: false,
            pre_swap_cpu_hogging_duration: Time::from_millis(1),
        }
    }
}
