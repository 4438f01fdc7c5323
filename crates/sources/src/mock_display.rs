//! Mock display backend.
//!
//! Implements `contracts::Display` against an injected clock. Swaps are
//! vsync-locked: a swap commits at the next frame boundary at or after
//! "now". With a `ManualClock` the mock advances the clock itself, which
//! keeps presenter tests fully deterministic; with a monotonic clock it
//! sleeps until the boundary.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use contracts::{
    Display, FenceHandle, ManualClock, MonotonicClock, RenderContent, SharedClock, SwapData,
    Time, TimingError,
};

/// Simulated display surface.
pub struct MockDisplay {
    clock: SharedClock,
    manual: Option<Arc<ManualClock>>,
    frame_period: Time,
    next_vsync: Time,
    frame_index: u64,
    stalls: HashMap<u64, u64>,
    render_cost: Time,
    fence_latency: Time,
    next_fence: u64,
    fences: HashMap<u64, Time>,
    fail_next_swap: bool,
    fail_next_render: bool,
    swap_count: u64,
    render_count: u64,
}

impl MockDisplay {
    /// Clock-simulating mock: swaps advance the manual clock to the
    /// frame boundary instead of waiting for it.
    pub fn simulated(clock: Arc<ManualClock>, frame_period: Time) -> Self {
        let next_vsync = clock.now() + frame_period;
        Self {
            clock: clock.clone(),
            manual: Some(clock),
            frame_period,
            next_vsync,
            frame_index: 0,
            stalls: HashMap::new(),
            render_cost: Time::ZERO,
            fence_latency: Time::ZERO,
            next_fence: 0,
            fences: HashMap::new(),
            fail_next_swap: false,
            fail_next_render: false,
            swap_count: 0,
            render_count: 0,
        }
    }

    /// Wall-clock mock: swaps sleep until the frame boundary.
    pub fn realtime(frame_period: Time) -> Self {
        let clock = MonotonicClock::shared();
        let next_vsync = clock.now() + frame_period;
        Self {
            clock,
            manual: None,
            frame_period,
            next_vsync,
            frame_index: 0,
            stalls: HashMap::new(),
            render_cost: Time::ZERO,
            fence_latency: Time::ZERO,
            next_fence: 0,
            fences: HashMap::new(),
            fail_next_swap: false,
            fail_next_render: false,
            swap_count: 0,
            render_count: 0,
        }
    }

    /// Push the swap that would land on frame `frame_index` back by
    /// `extra_frames` periods. The committed swap carries the later frame
    /// number, as a real compositor stall would.
    pub fn schedule_stall(&mut self, frame_index: u64, extra_frames: u64) {
        self.stalls.insert(frame_index, extra_frames);
    }

    /// Simulated cost of a render call (manual clocks advance by it).
    pub fn set_render_cost(&mut self, cost: Time) {
        self.render_cost = cost;
    }

    /// Delay between fence insertion and completion.
    pub fn set_fence_latency(&mut self, latency: Time) {
        self.fence_latency = latency;
    }

    /// Fail the next `swap_buffers` call.
    pub fn inject_swap_failure(&mut self) {
        self.fail_next_swap = true;
    }

    /// Fail the next `render` call.
    pub fn inject_render_failure(&mut self) {
        self.fail_next_render = true;
    }

    /// Frames swapped so far.
    pub fn swap_count(&self) -> u64 {
        self.swap_count
    }

    /// Render calls issued so far.
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// The clock this display runs against.
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }
}

impl Display for MockDisplay {
    fn swap_buffers(&mut self) -> Result<SwapData, TimingError> {
        if self.fail_next_swap {
            self.fail_next_swap = false;
            return Err(TimingError::swap_failed("injected swap failure"));
        }

        let now = self.clock.now();
        let mut target = self.next_vsync;
        let mut frame = self.frame_index;
        // A late caller skips past missed boundaries, frame number included
        while target < now {
            target += self.frame_period;
            frame += 1;
        }
        if let Some(extra) = self.stalls.remove(&frame) {
            target += self.frame_period * extra as i64;
            frame += extra;
        }

        match &self.manual {
            Some(manual) => manual.set_nanos(target.as_nanos()),
            None => {
                let remaining = target - now;
                if remaining > Time::ZERO {
                    std::thread::sleep(remaining.to_duration());
                }
            }
        }

        self.frame_index = frame + 1;
        self.swap_count += 1;
        self.next_vsync = target + self.frame_period;
        trace!(frame, time = %target, "mock swap committed");
        Ok(SwapData::new(target, frame))
    }

    fn render(&mut self, content: &RenderContent) -> Result<Time, TimingError> {
        if self.fail_next_render {
            self.fail_next_render = false;
            return Err(TimingError::render_failed("injected render failure"));
        }
        if let RenderContent::Draw(draw) = content {
            draw();
        }
        if self.render_cost > Time::ZERO {
            if let Some(manual) = &self.manual {
                manual.advance(self.render_cost);
            } else {
                std::thread::sleep(self.render_cost.to_duration());
            }
        }
        self.render_count += 1;
        Ok(self.clock.now())
    }

    fn insert_fence(&mut self) -> Result<FenceHandle, TimingError> {
        let handle = FenceHandle(self.next_fence);
        self.next_fence += 1;
        self.fences.insert(handle.0, self.clock.now() + self.fence_latency);
        Ok(handle)
    }

    fn fence_complete(&mut self, fence: FenceHandle) -> Result<bool, TimingError> {
        match self.fences.get(&fence.0) {
            Some(signal_at) => Ok(self.clock.now() >= *signal_at),
            None => Err(TimingError::FenceFailed {
                message: format!("unknown fence {}", fence.0),
            }),
        }
    }

    fn nominal_frame_period(&self) -> Time {
        self.frame_period
    }
}
