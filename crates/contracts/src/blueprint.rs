//! ExperimentBlueprint - Config Loader output
//!
//! Describes the timing setup of an experiment session: which swap-event
//! sources exist, how their stores and data clients are tuned, and how
//! the swapper and slide presenter behave.
//!
//! Blueprint fields use human units (Hz, milliseconds); conversion
//! methods produce the nanosecond-based runtime configs.

use serde::{Deserialize, Serialize};

use crate::{
    DataClientConfig, DisplaySwapperConfig, PresentationErrorMode, SlidePresenterConfig,
    SwapStoreConfig, SwapperMode, SwappingMode, Time,
};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete experiment timing blueprint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Display source (always present; the presenter needs one)
    pub display: DisplaySpec,

    /// Audio source (optional)
    #[serde(default)]
    pub audio: Option<AudioSpec>,

    /// Clock tick source (optional)
    #[serde(default)]
    pub clock: Option<ClockSpec>,

    /// Data client tuning shared by all sources
    #[serde(default)]
    pub client: ClientSpec,

    /// Display swapper tuning
    #[serde(default)]
    pub swapper: SwapperSpec,

    /// Slide presenter tuning
    #[serde(default)]
    pub presenter: PresenterSpec,
}

/// Display source specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplaySpec {
    /// Source name used as the data client key
    #[serde(default = "default_display_name")]
    pub name: String,

    /// Refresh rate in Hz
    #[serde(default = "default_refresh_hz")]
    pub refresh_rate_hz: f64,

    /// Latency offset subtracted from observed swap times (ms)
    #[serde(default)]
    pub latency_ms: f64,

    /// Store sample cap
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

fn default_display_name() -> String {
    "display".to_string()
}

fn default_refresh_hz() -> f64 {
    60.0
}

fn default_sample_size() -> usize {
    100
}

impl DisplaySpec {
    /// Store configuration for this display.
    pub fn store_config(&self) -> SwapStoreConfig {
        SwapStoreConfig {
            nominal_swap_period: Time::from_secs_f64(1.0 / self.refresh_rate_hz),
            units_per_swap: 1,
            sample_size: self.sample_size,
            latency_offset: Time::from_millis_f64(self.latency_ms),
        }
    }
}

/// Audio source specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSpec {
    /// Source name used as the data client key
    #[serde(default = "default_audio_name")]
    pub name: String,

    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,

    /// Buffer size in sample frames; becomes units_per_swap
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,

    /// Latency offset (ms)
    #[serde(default)]
    pub latency_ms: f64,

    /// Store sample cap
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
}

fn default_audio_name() -> String {
    "audio".to_string()
}

fn default_sample_rate() -> f64 {
    48_000.0
}

fn default_buffer_size() -> u64 {
    480
}

impl AudioSpec {
    /// Store configuration for this audio stream.
    pub fn store_config(&self) -> SwapStoreConfig {
        SwapStoreConfig {
            nominal_swap_period: Time::from_secs_f64(self.buffer_size as f64 / self.sample_rate_hz),
            units_per_swap: self.buffer_size,
            sample_size: self.sample_size,
            latency_offset: Time::from_millis_f64(self.latency_ms),
        }
    }
}

/// Clock tick source specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSpec {
    /// Source name used as the data client key
    #[serde(default = "default_clock_name")]
    pub name: String,

    /// Tick period (ms)
    #[serde(default = "default_tick_period_ms")]
    pub tick_period_ms: f64,

    /// Store sample cap
    #[serde(default = "default_clock_sample_size")]
    pub sample_size: usize,
}

fn default_clock_name() -> String {
    "clock".to_string()
}

fn default_tick_period_ms() -> f64 {
    1.0
}

fn default_clock_sample_size() -> usize {
    1000
}

impl ClockSpec {
    /// Store configuration for this tick source.
    pub fn store_config(&self) -> SwapStoreConfig {
        SwapStoreConfig {
            nominal_swap_period: Time::from_millis_f64(self.tick_period_ms),
            units_per_swap: 1,
            sample_size: self.sample_size,
            latency_offset: Time::ZERO,
        }
    }
}

/// Data client tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSpec {
    /// Span of data the model fits over (ms)
    pub data_collection_duration_ms: f64,

    /// Auto-update verifier and model on new data
    pub auto_update: bool,

    /// Verifier interval tolerance (fraction of nominal)
    pub swap_period_tolerance: f64,

    /// Verifier stoppage threshold (multiple of nominal)
    pub stoppage_period_multiplier: f64,
}

impl Default for ClientSpec {
    fn default() -> Self {
        Self {
            data_collection_duration_ms: 1000.0,
            auto_update: true,
            swap_period_tolerance: 0.5,
            stoppage_period_multiplier: 4.0,
        }
    }
}

impl ClientSpec {
    /// Runtime data client configuration.
    pub fn client_config(&self) -> DataClientConfig {
        DataClientConfig {
            data_collection_duration: Time::from_millis_f64(self.data_collection_duration_ms),
            auto_update: self.auto_update,
            swap_period_tolerance: self.swap_period_tolerance,
            stoppage_period_multiplier: self.stoppage_period_multiplier,
        }
    }
}

/// Display swapper tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapperSpec {
    /// Safety buffer (ms)
    pub pre_swap_safety_buffer_ms: f64,

    /// Estimation mode
    #[serde(default)]
    pub mode: SwapperMode,
}

impl Default for SwapperSpec {
    fn default() -> Self {
        Self {
            pre_swap_safety_buffer_ms: 2.0,
            mode: SwapperMode::NominalPeriod,
        }
    }
}

impl SwapperSpec {
    /// Runtime swapper configuration.
    pub fn swapper_config(&self) -> DisplaySwapperConfig {
        DisplaySwapperConfig {
            pre_swap_safety_buffer: Time::from_millis_f64(self.pre_swap_safety_buffer_ms),
            mode: self.mode,
        }
    }
}

/// Slide presenter tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenterSpec {
    /// Onset re-basing policy
    #[serde(default)]
    pub error_mode: PresentationErrorMode,

    /// Where swaps execute
    #[serde(default)]
    pub swapping_mode: SwappingMode,

    /// Gate on GPU fences
    pub use_fence_sync: bool,

    /// Block swaps until the fence signals
    pub wait_until_fence_complete: bool,

    /// Drop framebuffers of finished slides
    pub deallocate_finished_framebuffers: bool,

    /// Pre-swap CPU spin (ms)
    pub pre_swap_cpu_hogging_ms: f64,
}

impl Default for PresenterSpec {
    fn default() -> Self {
        Self {
            error_mode: PresentationErrorMode::PropagateDelays,
            swapping_mode: SwappingMode::SingleCoreBlockingSwaps,
            use_fence_sync: true,
            wait_until_fence_complete: false,
            deallocate_finished_framebuffers: false,
            pre_swap_cpu_hogging_ms: 1.0,
        }
    }
}

impl PresenterSpec {
    /// Runtime presenter configuration.
    pub fn presenter_config(&self) -> SlidePresenterConfig {
        SlidePresenterConfig {
            error_mode: self.error_mode,
            swapping_mode: self.swapping_mode,
            use_fence_sync: self.use_fence_sync,
            wait_until_fence_complete: self.wait_until_fence_complete,
            deallocate_finished_framebuffers: self.deallocate_finished_framebuffers,
            pre_swap_cpu_hogging_duration: Time::from_millis_f64(self.pre_swap_cpu_hogging_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_store_config() {
        let spec = DisplaySpec {
            name: "display".into(),
            refresh_rate_hz: 60.0,
            latency_ms: 1.5,
            sample_size: 100,
        };
        let cfg = spec.store_config();
        assert_eq!(cfg.units_per_swap, 1);
        assert!((cfg.nominal_swap_period.as_millis_f64() - 16.6667).abs() < 1e-3);
        assert_eq!(cfg.latency_offset, Time::from_micros(1500));
    }

    #[test]
    fn test_audio_store_config() {
        let spec = AudioSpec {
            name: "audio".into(),
            sample_rate_hz: 48_000.0,
            buffer_size: 480,
            latency_ms: 0.0,
            sample_size: 100,
        };
        let cfg = spec.store_config();
        assert_eq!(cfg.units_per_swap, 480);
        assert!((cfg.nominal_swap_period.as_millis_f64() - 10.0).abs() < 1e-9);
    }
}
