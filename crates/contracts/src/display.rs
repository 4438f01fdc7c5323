//! Display abstraction consumed by the presenter.
//!
//! The core renders nothing itself: it issues render and swap calls to an
//! injected `Display` and treats every call as fallible. A failed render
//! or swap is surfaced as an error value and never aborts the presenter
//! state machine.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::{SwapData, Time, TimingError};

/// Opaque handle to a GPU fence inserted after a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FenceHandle(pub u64);

/// A prepared frame owned by a slide.
///
/// The pixel storage is owned here; the presenter drops the framebuffer
/// when the slide finishes if configured to reclaim memory.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Owned pixel data.
    pub data: Bytes,
}

impl Framebuffer {
    /// A solid-color placeholder framebuffer (RGBA8).
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..(width * height) {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data: Bytes::from(data),
        }
    }
}

/// What a slide puts on screen: a prepared framebuffer or a deferred
/// drawing callback executed at render time.
#[derive(Clone)]
pub enum RenderContent {
    /// Copy a prepared framebuffer to the back buffer.
    Framebuffer(Framebuffer),

    /// Run a drawing callback against the back buffer.
    Draw(Arc<dyn Fn() + Send + Sync>),
}

impl fmt::Debug for RenderContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderContent::Framebuffer(fb) => f
                .debug_struct("Framebuffer")
                .field("width", &fb.width)
                .field("height", &fb.height)
                .finish(),
            RenderContent::Draw(_) => f.write_str("Draw(..)"),
        }
    }
}

/// The display surface the presenter drives.
///
/// Implementations wrap a platform window or, in tests, a simulated vsync
/// source. All methods are fallible; implementations must not panic on
/// driver errors.
pub trait Display: Send {
    /// Swap front and back buffers, blocking until the swap is committed.
    ///
    /// Returns the wall-clock time of the committed swap together with its
    /// frame number. Frame numbers count vsync periods, not swap calls:
    /// when the compositor stalls or the caller misses a boundary, the
    /// number jumps past the skipped frames.
    fn swap_buffers(&mut self) -> Result<SwapData, TimingError>;

    /// Render content into the back buffer. Returns the wall-clock time at
    /// which the render call completed.
    fn render(&mut self, content: &RenderContent) -> Result<Time, TimingError>;

    /// Insert a fence after the most recent render.
    fn insert_fence(&mut self) -> Result<FenceHandle, TimingError>;

    /// Poll whether a fence has signalled.
    fn fence_complete(&mut self, fence: FenceHandle) -> Result<bool, TimingError>;

    /// The display's nominal refresh period.
    fn nominal_frame_period(&self) -> Time;
}
