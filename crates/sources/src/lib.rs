//! # Sources
//!
//! Swap-event producers and the simulated display backend:
//!
//! - `MockDisplaySource`: synthesised vsync with jitter and stall
//!   injection
//! - `MockAudioSource`: audio buffer boundaries with sample-frame units
//! - `ClockTicker`: plain periodic tick
//! - `MockDisplay`: `contracts::Display` implementation for tests and
//!   the demo pipeline
//!
//! Each source is a config plus a running flag and a delivery thread;
//! `stop` halts delivery and the thread exits on its own.

mod audio_source;
mod display_source;
mod metrics;
mod mock_display;
mod ticker;

pub use audio_source::{MockAudioSource, MockAudioSourceConfig};
pub use display_source::{MockDisplaySource, MockDisplaySourceConfig};
pub use metrics::SourceMetrics;
pub use mock_display::MockDisplay;
pub use ticker::ClockTicker;
