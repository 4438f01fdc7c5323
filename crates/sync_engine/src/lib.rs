//! # Sync Engine
//!
//! Core temporal synchronization pipeline, one layer per module:
//!
//! - `store`: per-source bounded ring of `(time, unit)` swap samples
//! - `stability`: interval-based stability and stoppage classification
//! - `model`: OLS unit-to-time regression with 95 % prediction intervals
//! - `client`: store + verifier + model behind a safe query surface
//! - `synchronizer`: named clients, cross-domain sync points
//!
//! Everything runs on injected clocks (`contracts::SharedClock`); no
//! module owns a thread or a main loop.

pub mod client;
pub mod model;
pub mod stability;
pub mod store;
pub mod synchronizer;

pub use client::DataClient;
pub use model::{FittedModel, LinearModel};
pub use stability::{StabilityVerifier, StatusChangeListener};
pub use store::{ListenerId, NewDataListener, PolledSwapListener, SwapStore};
pub use synchronizer::DomainSynchronizer;
