//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - `Time` is a signed 64-bit nanosecond count since a monotonic reference
//! - `SwapUnit` is an unsigned source-specific swap counter
//! - Clocks are injected (`SharedClock`), never process-wide singletons

mod blueprint;
mod display;
mod error;
mod prediction;
mod status;
mod swap;
mod time;
mod timing_config;

pub use blueprint::*;
pub use display::*;
pub use error::*;
pub use prediction::*;
pub use status::*;
pub use swap::{SwapData, SwapEventCallback, SwapObservation, SwapSource, SwapUnit, SWAP_UNIT_ERROR};
pub use time::{Clock, ManualClock, MonotonicClock, SharedClock, Time};
pub use timing_config::*;
