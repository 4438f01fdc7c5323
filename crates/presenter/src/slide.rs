//! Slide: one visual epoch of a presentation.
//!
//! A slide carries its content, its intended timing and, once presented,
//! its actual timing. Actual fields hold error sentinels until the
//! presenter stamps them from observed swaps.

use std::sync::Arc;

use contracts::{FenceHandle, RenderContent, SlideStatus, SwapUnit, Time, SWAP_UNIT_ERROR};

/// Per-slide presented callback; fires when the slide finishes.
pub type SlidePresentedCallback = Arc<dyn Fn(&Slide) + Send + Sync>;

/// Onset and extent of a slide, in both time and frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideTiming {
    /// Frame at which the slide came (or should come) on screen.
    pub start_frame: SwapUnit,

    /// Frames the slide covers.
    pub frame_count: u64,

    /// Wall-clock onset.
    pub start_time: Time,

    /// Wall-clock extent.
    pub duration: Time,
}

impl SlideTiming {
    /// All-sentinel timing, before anything is known.
    pub fn unstamped() -> Self {
        Self {
            start_frame: SWAP_UNIT_ERROR,
            frame_count: 0,
            start_time: Time::ERROR,
            duration: Time::ERROR,
        }
    }

    /// Whether the onset has been stamped.
    pub fn has_onset(&self) -> bool {
        !self.start_time.is_error() && self.start_frame != SWAP_UNIT_ERROR
    }
}

/// One slide of a presentation.
pub struct Slide {
    name: String,
    content: Option<RenderContent>,
    intended: SlideTiming,
    actual: SlideTiming,
    status: SlideStatus,
    copy_complete_time: Time,
    fence: Option<FenceHandle>,
    presented_callback: Option<SlidePresentedCallback>,
}

impl Slide {
    /// Create a slide with content and an intended duration.
    ///
    /// Frame counts and onsets are filled in by the presenter once the
    /// display's nominal period and the preceding slides are known.
    pub fn new(name: impl Into<String>, content: RenderContent, duration: Time) -> Self {
        let mut intended = SlideTiming::unstamped();
        intended.duration = duration;
        Self {
            name: name.into(),
            content: Some(content),
            intended,
            actual: SlideTiming::unstamped(),
            status: SlideStatus::NotStarted,
            copy_complete_time: Time::ERROR,
            fence: None,
            presented_callback: None,
        }
    }

    /// Attach a presented callback to this slide.
    pub fn with_presented_callback(mut self, callback: SlidePresentedCallback) -> Self {
        self.presented_callback = Some(callback);
        self
    }

    /// Slide name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render content, unless already reclaimed.
    pub fn content(&self) -> Option<&RenderContent> {
        self.content.as_ref()
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SlideStatus {
        self.status
    }

    /// Intended timing.
    pub fn intended(&self) -> &SlideTiming {
        &self.intended
    }

    /// Actual timing; sentinels until stamped.
    pub fn actual(&self) -> &SlideTiming {
        &self.actual
    }

    /// When the back-buffer copy (render call) completed.
    pub fn copy_complete_time(&self) -> Time {
        self.copy_complete_time
    }

    /// Fence inserted after this slide's render, if any.
    pub fn fence(&self) -> Option<FenceHandle> {
        self.fence
    }

    // ===== Presenter-side mutation =====

    pub(crate) fn set_status(&mut self, status: SlideStatus) {
        self.status = status;
    }

    pub(crate) fn intended_mut(&mut self) -> &mut SlideTiming {
        &mut self.intended
    }

    pub(crate) fn actual_mut(&mut self) -> &mut SlideTiming {
        &mut self.actual
    }

    pub(crate) fn set_copy_complete_time(&mut self, time: Time) {
        self.copy_complete_time = time;
    }

    pub(crate) fn set_fence(&mut self, fence: Option<FenceHandle>) {
        self.fence = fence;
    }

    pub(crate) fn take_content(&mut self) -> Option<RenderContent> {
        self.content.take()
    }

    pub(crate) fn presented_callback(&self) -> Option<SlidePresentedCallback> {
        self.presented_callback.clone()
    }
}

impl std::fmt::Debug for Slide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slide")
            .field("name", &self.name)
            .field("status", &self.status)
            .field("intended", &self.intended)
            .field("actual", &self.actual)
            .finish()
    }
}
