//! Swap events and the swap-source contract.
//!
//! A "swap" is any discrete periodic event from a time-domain source: a
//! display refresh, an audio buffer boundary, a clock tick. Each source
//! counts swaps in its own integer unit (frame number, sample frame index,
//! synthetic tick).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::Time;

/// Source-specific swap counter (frame number, sample index, tick count).
pub type SwapUnit = u64;

/// Distinguished "no value" sentinel for swap units.
pub const SWAP_UNIT_ERROR: SwapUnit = u64::MAX;

/// One observed swap event: wall-clock time paired with the swap counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapData {
    /// Wall-clock time of the event, latency-corrected by the store.
    pub time: Time,

    /// Source-specific swap unit at the event.
    pub unit: SwapUnit,
}

impl SwapData {
    /// Construct a swap event.
    pub const fn new(time: Time, unit: SwapUnit) -> Self {
        Self { time, unit }
    }

    /// Whether either field carries its error sentinel.
    pub fn is_error(&self) -> bool {
        self.time.is_error() || self.unit == SWAP_UNIT_ERROR
    }
}

/// What an upstream delivers per swap.
///
/// Sources that know their own counter (audio sample index) deliver
/// `Event`; sources that only observe the moment of the swap (polled
/// vsync, clock tick) deliver `TimeOnly` and let the store infer the unit.
#[derive(Debug, Clone, Copy)]
pub enum SwapObservation {
    /// Full event with an explicit unit.
    Event(SwapData),

    /// Bare timestamp; the store advances its own counter.
    TimeOnly(Time),
}

/// Swap event callback type.
///
/// When a source observes a swap it delivers a `SwapObservation` through
/// this callback. `Arc` so a callback can be shared across contexts.
pub type SwapEventCallback = Arc<dyn Fn(SwapObservation) + Send + Sync>;

/// Swap-event source trait.
///
/// Abstracts the common behavior of display vsync observers, audio
/// callbacks, and clock tickers so stores bind to any of them through one
/// interface. `listen` is idempotent; rebinding happens at the store.
pub trait SwapSource: Send + Sync {
    /// Stable identifier for this source.
    fn source_id(&self) -> &str;

    /// Nominal period between swap events.
    fn nominal_period(&self) -> Time;

    /// How far the swap unit advances per event (1 for display frames and
    /// clock ticks, the buffer size for audio).
    fn units_per_swap(&self) -> SwapUnit;

    /// Register the delivery callback and start producing events.
    fn listen(&self, callback: SwapEventCallback);

    /// Stop producing events.
    fn stop(&self);

    /// Whether the source is currently delivering.
    fn is_listening(&self) -> bool;

    /// Device-reported latency, if the source knows one. Diagnostic only;
    /// the store's configured latency offset is the value that counts.
    fn reported_latency(&self) -> Option<Time> {
        None
    }
}
