//! # Presenter
//!
//! Display-side presentation layer:
//!
//! - `DisplaySwapper`: decides when a buffer swap is due and issues it
//! - `Slide`: one visual epoch with intended and actual timing
//! - `SlidePresenter`: per-slide state machine driven from the caller's
//!   main loop
//!
//! The presenter consumes an injected `contracts::Display` and the
//! display's `sync_engine::DataClient`; it owns no rendering primitives
//! and no loop.

mod slide;
mod slide_presenter;
mod swapper;

pub use slide::{Slide, SlidePresentedCallback, SlideTiming};
pub use slide_presenter::{
    FinalSlideCallback, FinalSlideOutcome, PresentationErrorSummary, SlidePresenter,
};
pub use swapper::{DisplaySwapper, SharedDisplay};
