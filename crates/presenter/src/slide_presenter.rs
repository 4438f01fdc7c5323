//! Slide presenter: a per-slide state machine driven from the caller's
//! loop.
//!
//! Each slide walks `NotStarted -> Rendering -> SwapPending ->
//! InProgress -> Finished`. The presenter owns no loop of its own:
//! `update()` performs one tick, `present_slides()` is a convenience
//! drive loop. Upstream failures (render, swap, fence) are tagged,
//! logged and counted; the state machine itself never aborts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{debug, info, warn};

use contracts::{
    DisplaySwapperConfig, FinalSlideAction, PresentationErrorMode, SharedClock,
    SlidePresenterConfig, SlideStatus, SwapData, SwappingMode, Time, TimingError,
};
use sync_engine::{DataClient, PolledSwapListener};

use crate::slide::{Slide, SlidePresentedCallback};
use crate::swapper::{DisplaySwapper, SharedDisplay};

/// What the final-slide callback tells the presenter.
pub struct FinalSlideOutcome {
    /// Continue or halt after the current slide.
    pub action: FinalSlideAction,

    /// Slides to append; they are re-based off the current slide's
    /// actual onset.
    pub new_slides: Vec<Slide>,
}

impl FinalSlideOutcome {
    /// Plain continue with nothing appended.
    pub fn done() -> Self {
        Self {
            action: FinalSlideAction::ContinuePresentation,
            new_slides: Vec::new(),
        }
    }

    /// Halt after the current slide.
    pub fn stop() -> Self {
        Self {
            action: FinalSlideAction::StopNow,
            new_slides: Vec::new(),
        }
    }

    /// Continue with more slides.
    pub fn append(new_slides: Vec<Slide>) -> Self {
        Self {
            action: FinalSlideAction::ContinuePresentation,
            new_slides,
        }
    }
}

/// Fired when the last queued slide comes on screen.
pub type FinalSlideCallback = Box<dyn FnMut() -> FinalSlideOutcome + Send>;

/// Post-hoc presentation error report.
#[derive(Debug, Clone, Default)]
pub struct PresentationErrorSummary {
    /// Slides whose actual frame count differs from intended (final
    /// slide exempt).
    pub incorrect_frame_counts: Vec<String>,

    /// Slides whose back-buffer copy completed after their intended
    /// onset.
    pub late_copies: Vec<String>,

    /// Render calls that failed.
    pub render_failures: u64,

    /// Swap calls that failed.
    pub swap_failures: u64,

    /// Fence operations that failed or timed out.
    pub fence_failures: u64,
}

impl PresentationErrorSummary {
    /// Whether the presentation ran without any recorded problem.
    pub fn is_clean(&self) -> bool {
        self.incorrect_frame_counts.is_empty()
            && self.late_copies.is_empty()
            && self.render_failures == 0
            && self.swap_failures == 0
            && self.fence_failures == 0
    }
}

impl std::fmt::Display for PresentationErrorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Presentation Errors ===")?;
        writeln!(f, "Incorrect frame counts: {:?}", self.incorrect_frame_counts)?;
        writeln!(f, "Late copies: {:?}", self.late_copies)?;
        writeln!(
            f,
            "Upstream failures: render={} swap={} fence={}",
            self.render_failures, self.swap_failures, self.fence_failures
        )
    }
}

/// Drives a queue of slides onto a display at intended frame boundaries.
pub struct SlidePresenter {
    display: SharedDisplay,
    client: Arc<DataClient>,
    swapper: DisplaySwapper,
    config: SlidePresenterConfig,
    clock: SharedClock,
    nominal_period: Time,

    slides: Vec<Slide>,
    presenting: bool,
    swaps_at_onset: u64,
    drawing_scope: Option<(String, Time)>,
    last_presented: Option<String>,
    stop_deadline: Option<Time>,
    final_callback_fired_for: Option<usize>,

    final_slide_callback: Option<FinalSlideCallback>,
    slide_presented_callback: Option<SlidePresentedCallback>,

    swap_listener: PolledSwapListener,
    render_failures: u64,
    swap_failures: u64,
    fence_failures: u64,

    swap_thread: Option<JoinHandle<()>>,
    swap_thread_running: Arc<AtomicBool>,
}

impl SlidePresenter {
    /// Validate collaborators and build a presenter.
    ///
    /// `FixTimingFromFirstSlide` is rejected here: the skip-vs-shorten
    /// policy for late slides under absolute onsets is unspecified, so
    /// the mode is accepted in configuration only for compatibility.
    pub fn setup(
        display: SharedDisplay,
        client: Arc<DataClient>,
        swapper_config: DisplaySwapperConfig,
        config: SlidePresenterConfig,
    ) -> Result<Self, TimingError> {
        if config.error_mode == PresentationErrorMode::FixTimingFromFirstSlide {
            return Err(TimingError::config_validation(
                "error_mode",
                "fix_timing_from_first_slide is not implemented; use propagate_delays",
            ));
        }
        let nominal_period = display.lock().nominal_frame_period();
        if nominal_period <= Time::ZERO {
            return Err(TimingError::setup(
                "slide_presenter",
                "display reports a non-positive frame period",
            ));
        }
        if config.pre_swap_cpu_hogging_duration < Time::ZERO {
            return Err(TimingError::config_validation(
                "pre_swap_cpu_hogging_duration",
                "must be non-negative",
            ));
        }

        let clock = client.store().clock();
        let swap_listener = client.store().polled_swap_listener();
        let swapper = DisplaySwapper::new(Arc::clone(&display), Arc::clone(&client), swapper_config);

        Ok(Self {
            display,
            client,
            swapper,
            config,
            clock,
            nominal_period,
            slides: Vec::new(),
            presenting: false,
            swaps_at_onset: 0,
            drawing_scope: None,
            last_presented: None,
            stop_deadline: None,
            final_callback_fired_for: None,
            final_slide_callback: None,
            slide_presented_callback: None,
            swap_listener,
            render_failures: 0,
            swap_failures: 0,
            fence_failures: 0,
            swap_thread: None,
            swap_thread_running: Arc::new(AtomicBool::new(false)),
        })
    }

    // ===== Slide management =====

    /// Append one slide; its intended frame count is derived from the
    /// display's nominal period.
    pub fn append_slide(&mut self, mut slide: Slide) {
        slide.intended_mut().frame_count = self.frames_for(slide.intended().duration);
        self.slides.push(slide);
        let appended = self.slides.len() - 1;
        self.rebase_intended_from(appended.saturating_sub(1));
    }

    /// Append several slides in order.
    pub fn append_slides(&mut self, slides: Vec<Slide>) {
        for slide in slides {
            self.append_slide(slide);
        }
    }

    /// Open a named drawing scope for the next slide.
    pub fn begin_drawing_next_slide(
        &mut self,
        name: impl Into<String>,
        duration: Time,
    ) -> Result<(), TimingError> {
        let name = name.into();
        if self.drawing_scope.is_some() {
            return Err(TimingError::setup(
                "slide_presenter",
                "a drawing scope is already open",
            ));
        }
        if self.slides.iter().any(|s| s.name() == name) {
            return Err(TimingError::config_validation(
                "slide_name",
                format!("slide {name:?} already exists"),
            ));
        }
        self.drawing_scope = Some((name, duration));
        Ok(())
    }

    /// Close the open drawing scope, appending a slide with the content
    /// drawn into it.
    pub fn end_drawing_current_slide(
        &mut self,
        content: contracts::RenderContent,
    ) -> Result<(), TimingError> {
        let (name, duration) = self.drawing_scope.take().ok_or_else(|| {
            TimingError::setup("slide_presenter", "no drawing scope is open")
        })?;
        self.append_slide(Slide::new(name, content, duration));
        Ok(())
    }

    /// Remove all slides. Fails while a presentation is running.
    pub fn clear_slides(&mut self) -> Result<(), TimingError> {
        if self.presenting {
            return Err(TimingError::PresenterNotReady {
                message: "cannot clear slides while presenting".to_string(),
            });
        }
        self.slides.clear();
        self.last_presented = None;
        Ok(())
    }

    /// Slide by queue index.
    pub fn slide(&self, index: usize) -> Option<&Slide> {
        self.slides.get(index)
    }

    /// Slide by name.
    pub fn slide_by_name(&self, name: &str) -> Option<&Slide> {
        self.slides.iter().find(|s| s.name() == name)
    }

    /// All slides in queue order.
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Number of queued slides.
    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Name of the most recently presented slide.
    pub fn last_presented_slide_name(&self) -> Option<&str> {
        self.last_presented.as_deref()
    }

    /// `(name, actual duration)` per finished slide.
    pub fn actual_slide_durations(&self) -> Vec<(String, Time)> {
        self.slides
            .iter()
            .filter(|s| s.status() == SlideStatus::Finished)
            .map(|s| (s.name().to_string(), s.actual().duration))
            .collect()
    }

    /// `(name, actual frame count)` per finished slide.
    pub fn actual_frame_counts(&self) -> Vec<(String, u64)> {
        self.slides
            .iter()
            .filter(|s| s.status() == SlideStatus::Finished)
            .map(|s| (s.name().to_string(), s.actual().frame_count))
            .collect()
    }

    // ===== Callbacks =====

    /// Callback fired when the last queued slide comes on screen.
    pub fn set_final_slide_callback(&mut self, callback: FinalSlideCallback) {
        self.final_slide_callback = Some(callback);
    }

    /// Callback fired for every slide as it finishes.
    pub fn set_slide_presented_callback(&mut self, callback: SlidePresentedCallback) {
        self.slide_presented_callback = Some(callback);
    }

    // ===== Presentation control =====

    /// Whether a presentation is running.
    pub fn is_presenting(&self) -> bool {
        self.presenting
    }

    /// Arm the state machine and render the first slide.
    pub fn start_slide_presentation(&mut self) -> Result<(), TimingError> {
        if self.presenting {
            return Err(TimingError::PresenterNotReady {
                message: "presentation already running".to_string(),
            });
        }
        if self.slides.is_empty() {
            return Err(TimingError::PresenterNotReady {
                message: "no slides queued".to_string(),
            });
        }

        for slide in &mut self.slides {
            slide.set_status(SlideStatus::NotStarted);
            *slide.actual_mut() = crate::slide::SlideTiming::unstamped();
            // Intended onsets are re-stamped from the new first swap
            let intended = slide.intended_mut();
            intended.start_time = Time::ERROR;
            intended.start_frame = contracts::SWAP_UNIT_ERROR;
            slide.set_fence(None);
            slide.set_copy_complete_time(Time::ERROR);
        }
        self.render_failures = 0;
        self.swap_failures = 0;
        self.fence_failures = 0;
        self.stop_deadline = None;
        self.final_callback_fired_for = None;
        self.last_presented = None;
        self.presenting = true;

        // Fresh listener so stale swaps from before the presentation do
        // not promote the first slide.
        self.swap_listener = self.client.store().polled_swap_listener();

        info!(
            slides = self.slides.len(),
            mode = ?self.config.swapping_mode,
            "presentation started"
        );
        self.render_slide(0);

        if self.config.swapping_mode == SwappingMode::MultiCore {
            self.spawn_swap_thread();
        }
        Ok(())
    }

    /// Halt the presentation immediately.
    pub fn stop_slide_presentation(&mut self) {
        if !self.presenting {
            return;
        }
        self.presenting = false;
        self.join_swap_thread();
        info!(last = ?self.last_presented, "presentation stopped");
    }

    /// Drive the state machine until the presentation ends.
    pub fn present_slides(&mut self) -> Result<(), TimingError> {
        self.start_slide_presentation()?;
        while self.presenting {
            self.update();
            std::thread::yield_now();
        }
        Ok(())
    }

    /// One tick of the state machine.
    pub fn update(&mut self) {
        if !self.presenting {
            return;
        }

        if self.swap_listener.has_swapped_since_last_check() {
            if let Some(swap) = self.client.store().last_swap() {
                self.handle_observed_swap(swap);
            }
        }

        self.check_stop_deadline();
        if !self.presenting {
            return;
        }

        self.advance_if_due();
        self.poll_fences();

        if self.config.swapping_mode == SwappingMode::SingleCoreBlockingSwaps {
            self.issue_swap_if_due();
        }
    }

    /// Post-hoc error report for the most recent presentation.
    ///
    /// The final slide's frame count is exempt: nothing swaps after it,
    /// so its extent is only bounded by the stop deadline.
    pub fn check_for_presentation_errors(&self) -> PresentationErrorSummary {
        let finished: Vec<&Slide> = self
            .slides
            .iter()
            .filter(|s| s.status() == SlideStatus::Finished)
            .collect();
        let last_name = finished.last().map(|s| s.name().to_string());

        let mut summary = PresentationErrorSummary {
            render_failures: self.render_failures,
            swap_failures: self.swap_failures,
            fence_failures: self.fence_failures,
            ..Default::default()
        };
        for slide in &finished {
            let is_last = Some(slide.name().to_string()) == last_name;
            if !is_last && slide.actual().frame_count != slide.intended().frame_count {
                summary.incorrect_frame_counts.push(slide.name().to_string());
            }
            let copy = slide.copy_complete_time();
            let intended_onset = slide.intended().start_time;
            if !copy.is_error() && !intended_onset.is_error() && copy > intended_onset {
                summary.late_copies.push(slide.name().to_string());
            }
        }
        metrics::gauge!("timing_presentation_frame_count_errors")
            .set(summary.incorrect_frame_counts.len() as f64);
        metrics::gauge!("timing_presentation_late_copies").set(summary.late_copies.len() as f64);
        summary
    }

    // ===== Internals =====

    fn frames_for(&self, duration: Time) -> u64 {
        let frames =
            (duration.as_nanos() as f64 / self.nominal_period.as_nanos() as f64).round() as i64;
        frames.max(1) as u64
    }

    /// Propagate intended onsets forward from slide `from`.
    ///
    /// Each slide's intended onset is its predecessor's onset (actual
    /// when known, intended otherwise) plus the predecessor's intended
    /// duration.
    fn rebase_intended_from(&mut self, from: usize) {
        for i in (from + 1)..self.slides.len() {
            let (base_time, base_frame) = {
                let prev = &self.slides[i - 1];
                let timing = if prev.actual().has_onset() {
                    prev.actual()
                } else {
                    prev.intended()
                };
                (timing.start_time, timing.start_frame)
            };
            if base_time.is_error() {
                break;
            }
            let prev_duration = self.slides[i - 1].intended().duration;
            let prev_frames = self.slides[i - 1].intended().frame_count;
            let intended = self.slides[i].intended_mut();
            intended.start_time = base_time + prev_duration;
            intended.start_frame = base_frame.saturating_add(prev_frames);
        }
    }

    fn handle_observed_swap(&mut self, swap: SwapData) {
        let Some(idx) = self.index_with_status(SlideStatus::SwapPending) else {
            return;
        };

        self.swaps_at_onset = self.client.store().stored_count();
        {
            let slide = &mut self.slides[idx];
            slide.set_status(SlideStatus::InProgress);
            let actual = slide.actual_mut();
            actual.start_time = swap.time;
            actual.start_frame = swap.unit;
            if idx == 0 {
                // First slide: the observed onset defines the intended one
                let intended = slide.intended_mut();
                intended.start_time = swap.time;
                intended.start_frame = swap.unit;
            }
        }
        debug!(
            slide = self.slides[idx].name(),
            time = %swap.time,
            frame = swap.unit,
            "slide on screen"
        );
        self.last_presented = Some(self.slides[idx].name().to_string());
        self.rebase_intended_from(idx);

        if idx > 0 && self.slides[idx - 1].status() == SlideStatus::InProgress {
            self.finalize_slide(idx - 1, swap);
        }

        if idx + 1 == self.slides.len() {
            self.handle_final_slide(idx, swap);
        }
    }

    fn handle_final_slide(&mut self, idx: usize, swap: SwapData) {
        let duration = self.slides[idx].intended().duration;
        let natural_deadline = swap.time + duration;

        if self.final_callback_fired_for != Some(idx) {
            self.final_callback_fired_for = Some(idx);
            if let Some(mut callback) = self.final_slide_callback.take() {
                let outcome = callback();
                self.final_slide_callback = Some(callback);
                let appended = !outcome.new_slides.is_empty();
                self.append_slides(outcome.new_slides);
                match outcome.action {
                    FinalSlideAction::StopNow => {
                        self.stop_deadline = Some(natural_deadline);
                        return;
                    }
                    FinalSlideAction::ContinuePresentation if appended => {
                        self.stop_deadline = None;
                        return;
                    }
                    FinalSlideAction::ContinuePresentation => {}
                }
            }
        }
        self.stop_deadline = Some(natural_deadline);
    }

    fn check_stop_deadline(&mut self) {
        let Some(deadline) = self.stop_deadline else {
            return;
        };
        if self.clock.now() < deadline {
            return;
        }
        if let Some(idx) = self.index_with_status(SlideStatus::InProgress) {
            // Synthetic end: no successor swap bounds the final slide
            let end = SwapData::new(
                deadline,
                self.slides[idx]
                    .actual()
                    .start_frame
                    .saturating_add(self.slides[idx].intended().frame_count),
            );
            self.finalize_slide(idx, end);
        }
        self.presenting = false;
        self.join_swap_thread();
        info!(last = ?self.last_presented, "presentation finished");
    }

    fn finalize_slide(&mut self, idx: usize, end: SwapData) {
        {
            let slide = &mut self.slides[idx];
            slide.set_status(SlideStatus::Finished);
            let onset_time = slide.actual().start_time;
            let onset_frame = slide.actual().start_frame;
            let actual = slide.actual_mut();
            actual.duration = end.time - onset_time;
            actual.frame_count = end.unit.saturating_sub(onset_frame);
            if self.config.deallocate_finished_framebuffers {
                slide.take_content();
            }
        }

        let slide = &self.slides[idx];
        let error_ms =
            (slide.actual().duration - slide.intended().duration).as_millis_f64();
        metrics::counter!("timing_slides_presented_total").increment(1);
        metrics::histogram!("timing_slide_duration_error_ms").record(error_ms);
        debug!(
            slide = slide.name(),
            actual_frames = slide.actual().frame_count,
            intended_frames = slide.intended().frame_count,
            duration_error_ms = error_ms,
            "slide finished"
        );

        let per_slide = slide.presented_callback();
        let global = self.slide_presented_callback.clone();
        if let Some(callback) = per_slide {
            callback(&self.slides[idx]);
        }
        if let Some(callback) = global {
            callback(&self.slides[idx]);
        }
    }

    /// Render the next slide when the upcoming swap is the one meant to
    /// put it on screen.
    ///
    /// Advancement counts committed swaps, one intended frame each. A
    /// compositor stall therefore stretches the slide on screen, and the
    /// display's jumped frame numbers surface it afterwards as a
    /// frame-count error instead of silently shortening the slide.
    fn advance_if_due(&mut self) {
        if self.index_with_status(SlideStatus::Rendering).is_some()
            || self.index_with_status(SlideStatus::SwapPending).is_some()
        {
            return;
        }
        let Some(next) = self.index_with_status(SlideStatus::NotStarted) else {
            return;
        };
        let Some(current) = self.index_with_status(SlideStatus::InProgress) else {
            // Nothing on screen yet: the first slide renders right away
            // (this also retries a failed initial render)
            if next == 0 {
                self.render_slide(0);
            }
            return;
        };
        let swaps_shown = self
            .client
            .store()
            .stored_count()
            .saturating_sub(self.swaps_at_onset);
        if swaps_shown + 1 >= self.slides[current].intended().frame_count {
            self.render_slide(next);
        }
    }

    fn render_slide(&mut self, idx: usize) {
        let content = self.slides[idx].content().cloned();
        let copy_time = match content {
            Some(content) => match self.display.lock().render(&content) {
                Ok(time) => time,
                Err(e) => {
                    self.render_failures += 1;
                    warn!(slide = self.slides[idx].name(), error = %e, "render failed");
                    return; // retried next tick while still NotStarted
                }
            },
            None => {
                warn!(slide = self.slides[idx].name(), "slide content already reclaimed");
                self.clock.now()
            }
        };

        let fence = if self.config.use_fence_sync {
            match self.display.lock().insert_fence() {
                Ok(fence) => Some(fence),
                Err(e) => {
                    self.fence_failures += 1;
                    warn!(slide = self.slides[idx].name(), error = %e, "fence insert failed");
                    None
                }
            }
        } else {
            None
        };

        let slide = &mut self.slides[idx];
        slide.set_copy_complete_time(copy_time);
        slide.set_fence(fence);
        slide.set_status(SlideStatus::Rendering);
        debug!(slide = slide.name(), copy_complete = %copy_time, "slide rendered");
    }

    fn poll_fences(&mut self) {
        let Some(idx) = self.index_with_status(SlideStatus::Rendering) else {
            return;
        };
        let ready = match self.slides[idx].fence() {
            // No fence to wait on, or completion deferred to the swap
            None => true,
            Some(_) if self.config.wait_until_fence_complete => true,
            Some(fence) => match self.display.lock().fence_complete(fence) {
                Ok(complete) => complete,
                Err(e) => {
                    self.fence_failures += 1;
                    warn!(slide = self.slides[idx].name(), error = %e, "fence poll failed");
                    true
                }
            },
        };
        if ready {
            self.slides[idx].set_status(SlideStatus::SwapPending);
        }
    }

    fn issue_swap_if_due(&mut self) {
        if !self.swapper.should_swap() {
            return;
        }

        if let Some(idx) = self.index_with_status(SlideStatus::SwapPending) {
            if self.config.wait_until_fence_complete {
                self.block_on_fence(idx);
            }
            if self.config.pre_swap_cpu_hogging_duration > Time::ZERO && self.clock.is_monotonic()
            {
                self.delay(self.config.pre_swap_cpu_hogging_duration);
            }
        }

        if let Err(e) = self.swapper.try_swap() {
            self.swap_failures += 1;
            warn!(error = %e, "swap failed");
        }
    }

    /// Strict fence gate: spin until the fence signals, bounded to a few
    /// frame periods.
    fn block_on_fence(&mut self, idx: usize) {
        let Some(fence) = self.slides[idx].fence() else {
            return;
        };
        let give_up = self.clock.now() + self.nominal_period * 4;
        loop {
            match self.display.lock().fence_complete(fence) {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => {
                    self.fence_failures += 1;
                    warn!(error = %e, "fence wait failed");
                    return;
                }
            }
            if self.clock.now() >= give_up {
                self.fence_failures += 1;
                warn!(slide = self.slides[idx].name(), "fence wait timed out");
                return;
            }
            std::thread::yield_now();
        }
    }

    /// Busy-wait to keep the core hot right before a blocking swap.
    fn delay(&self, duration: Time) {
        let start = self.clock.now();
        while self.clock.now() - start < duration {
            std::hint::spin_loop();
        }
    }

    fn index_with_status(&self, status: SlideStatus) -> Option<usize> {
        self.slides.iter().position(|s| s.status() == status)
    }

    fn spawn_swap_thread(&mut self) {
        self.swap_thread_running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.swap_thread_running);
        let display = Arc::clone(&self.display);
        let store = Arc::clone(self.client.store());

        self.swap_thread = Some(std::thread::spawn(move || {
            debug!("swap thread started");
            while running.load(Ordering::Relaxed) {
                let result = {
                    let mut display = display.lock();
                    display.swap_buffers()
                };
                match result {
                    Ok(swap) => store.store_swap(swap),
                    Err(e) => {
                        warn!(error = %e, "swap thread swap failed");
                        metrics::counter!("timing_swap_thread_failures_total").increment(1);
                    }
                }
            }
            debug!("swap thread stopped");
        }));
    }

    fn join_swap_thread(&mut self) {
        self.swap_thread_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.swap_thread.take() {
            if handle.join().is_err() {
                warn!("swap thread panicked");
            }
        }
    }
}

impl Drop for SlidePresenter {
    fn drop(&mut self) {
        self.join_swap_thread();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DataClientConfig, ManualClock, RenderContent, SwapStoreConfig};
    use parking_lot::Mutex;
    use sources::MockDisplay;
    use sync_engine::SwapStore;

    const PERIOD: Time = Time::from_micros(16_667);

    struct Rig {
        presenter: SlidePresenter,
        store: Arc<SwapStore>,
    }

    fn rig_with(configure: impl FnOnce(&mut MockDisplay), config: SlidePresenterConfig) -> Rig {
        let clock = ManualClock::shared();
        let store = SwapStore::new(
            "display",
            SwapStoreConfig {
                nominal_swap_period: PERIOD,
                ..Default::default()
            },
            clock.clone(),
        );
        let client = Arc::new(DataClient::new(store.clone(), DataClientConfig::default()));
        let mut mock = MockDisplay::simulated(clock.clone(), PERIOD);
        configure(&mut mock);
        let display: SharedDisplay = Arc::new(Mutex::new(Box::new(mock)));
        // Safety buffer above the period: every tick issues exactly one
        // swap, so the simulated clock steps frame by frame.
        let swapper_config = DisplaySwapperConfig {
            pre_swap_safety_buffer: PERIOD + Time::from_millis(1),
            ..Default::default()
        };
        let presenter = SlidePresenter::setup(
            display,
            client,
            swapper_config,
            SlidePresenterConfig {
                pre_swap_cpu_hogging_duration: Time::ZERO,
                ..config
            },
        )
        .unwrap();
        Rig { presenter, store }
    }

    fn rig() -> Rig {
        rig_with(|_| {}, SlidePresenterConfig::default())
    }

    fn slide(name: &str, frames: i64) -> Slide {
        Slide::new(name, RenderContent::Draw(Arc::new(|| {})), PERIOD * frames)
    }

    #[test]
    fn test_setup_rejects_fix_timing_mode() {
        let clock = ManualClock::shared();
        let store = SwapStore::new("display", SwapStoreConfig::default(), clock.clone());
        let client = Arc::new(DataClient::new(store, DataClientConfig::default()));
        let display: SharedDisplay =
            Arc::new(Mutex::new(Box::new(MockDisplay::simulated(clock, PERIOD))));

        let result = SlidePresenter::setup(
            display,
            client,
            DisplaySwapperConfig::default(),
            SlidePresenterConfig {
                error_mode: PresentationErrorMode::FixTimingFromFirstSlide,
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(TimingError::ConfigValidation { .. })
        ));
    }

    #[test]
    fn test_start_requires_slides() {
        let mut rig = rig();
        assert!(matches!(
            rig.presenter.start_slide_presentation(),
            Err(TimingError::PresenterNotReady { .. })
        ));
    }

    #[test]
    fn test_three_slide_presentation_runs_to_completion() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.append_slide(slide("b", 3));
        rig.presenter.append_slide(slide("c", 2));

        rig.presenter.present_slides().unwrap();
        assert!(!rig.presenter.is_presenting());
        assert_eq!(rig.presenter.last_presented_slide_name(), Some("c"));

        // a and b bounded by successor swaps; exact frame counts
        let counts = rig.presenter.actual_frame_counts();
        assert_eq!(counts[0], ("a".to_string(), 2));
        assert_eq!(counts[1], ("b".to_string(), 3));

        let durations = rig.presenter.actual_slide_durations();
        assert_eq!(durations[0].1, PERIOD * 2);
        assert_eq!(durations[1].1, PERIOD * 3);

        let errors = rig.presenter.check_for_presentation_errors();
        assert!(errors.is_clean(), "{errors}");
    }

    #[test]
    fn test_onsets_fall_on_consecutive_intended_frames() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.append_slide(slide("b", 2));
        rig.presenter.present_slides().unwrap();

        let a = rig.presenter.slide_by_name("a").unwrap();
        let b = rig.presenter.slide_by_name("b").unwrap();
        assert!(a.actual().has_onset());
        assert_eq!(
            b.actual().start_frame - a.actual().start_frame,
            a.intended().frame_count
        );
        assert_eq!(b.actual().start_time, b.intended().start_time);
    }

    #[test]
    fn test_propagate_delays_rebases_after_stall() {
        // Stall the swap that should present slide b by two frames
        let mut rig = rig_with(
            |display| display.schedule_stall(2, 2),
            SlidePresenterConfig::default(),
        );
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.append_slide(slide("b", 2));
        rig.presenter.append_slide(slide("c", 2));
        rig.presenter.present_slides().unwrap();

        let a = rig.presenter.slide_by_name("a").unwrap();
        let b = rig.presenter.slide_by_name("b").unwrap();
        let c = rig.presenter.slide_by_name("c").unwrap();

        // a ran long because b's swap stalled: two intended frames, but
        // the display skipped to frame 4 before b came on screen
        assert!(a.actual().duration > a.intended().duration);
        assert_eq!(a.actual().frame_count, 4);
        assert_eq!(a.intended().frame_count, 2);
        // b still received its full intended duration after re-basing
        assert_eq!(b.actual().duration, b.intended().duration);
        assert_eq!(b.actual().frame_count, 2);
        assert_eq!(c.intended().start_time, b.actual().start_time + b.intended().duration);

        let errors = rig.presenter.check_for_presentation_errors();
        assert_eq!(errors.incorrect_frame_counts, vec!["a".to_string()]);
    }

    #[test]
    fn test_final_slide_callback_appends_and_stops() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.append_slide(slide("b", 2));

        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let fired_clone = fired.clone();
        rig.presenter.set_final_slide_callback(Box::new(move || {
            let n = fired_clone.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                FinalSlideOutcome::append(vec![Slide::new(
                    "encore",
                    RenderContent::Draw(Arc::new(|| {})),
                    PERIOD * 2,
                )])
            } else {
                FinalSlideOutcome::stop()
            }
        }));

        rig.presenter.present_slides().unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(rig.presenter.slide_count(), 3);
        assert_eq!(rig.presenter.last_presented_slide_name(), Some("encore"));

        let encore = rig.presenter.slide_by_name("encore").unwrap();
        let b = rig.presenter.slide_by_name("b").unwrap();
        assert_eq!(
            encore.intended().start_time,
            b.actual().start_time + b.intended().duration
        );
    }

    #[test]
    fn test_slide_presented_callback_fires_per_finished_slide() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.append_slide(slide("b", 2));

        let finished: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let finished_clone = finished.clone();
        rig.presenter
            .set_slide_presented_callback(Arc::new(move |slide| {
                finished_clone.lock().push(slide.name().to_string());
            }));

        rig.presenter.present_slides().unwrap();
        assert_eq!(*finished.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_framebuffer_reclaimed_when_configured() {
        let mut rig = rig_with(
            |_| {},
            SlidePresenterConfig {
                deallocate_finished_framebuffers: true,
                ..Default::default()
            },
        );
        rig.presenter.append_slide(Slide::new(
            "fb",
            RenderContent::Framebuffer(contracts::Framebuffer::solid(2, 2, [0; 4])),
            PERIOD * 2,
        ));
        rig.presenter.append_slide(slide("end", 2));
        rig.presenter.present_slides().unwrap();

        assert!(rig.presenter.slide_by_name("fb").unwrap().content().is_none());
        assert!(rig.presenter.slide_by_name("end").unwrap().content().is_some());
    }

    #[test]
    fn test_swap_failure_is_tolerated_and_counted() {
        let mut rig = rig_with(
            |display| display.inject_swap_failure(),
            SlidePresenterConfig::default(),
        );
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.present_slides().unwrap();

        let errors = rig.presenter.check_for_presentation_errors();
        assert_eq!(errors.swap_failures, 1);
        assert_eq!(
            rig.presenter.slide_by_name("a").unwrap().status(),
            SlideStatus::Finished
        );
    }

    #[test]
    fn test_drawing_scope_appends_named_slide() {
        let mut rig = rig();
        rig.presenter
            .begin_drawing_next_slide("scoped", PERIOD * 2)
            .unwrap();
        // A second open scope is rejected
        assert!(rig
            .presenter
            .begin_drawing_next_slide("other", PERIOD)
            .is_err());
        rig.presenter
            .end_drawing_current_slide(RenderContent::Draw(Arc::new(|| {})))
            .unwrap();

        assert_eq!(rig.presenter.slide_count(), 1);
        assert!(rig.presenter.slide_by_name("scoped").is_some());
        // No scope left to close
        assert!(rig
            .presenter
            .end_drawing_current_slide(RenderContent::Draw(Arc::new(|| {})))
            .is_err());
    }

    #[test]
    fn test_clear_slides_rejected_while_presenting() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.start_slide_presentation().unwrap();
        assert!(rig.presenter.clear_slides().is_err());
        rig.presenter.stop_slide_presentation();
        assert!(rig.presenter.clear_slides().is_ok());
        assert_eq!(rig.presenter.slide_count(), 0);
    }

    #[test]
    fn test_update_outside_presentation_is_a_no_op() {
        let mut rig = rig();
        rig.presenter.append_slide(slide("a", 2));
        rig.presenter.update();
        assert_eq!(rig.store.len(), 0);
        assert!(!rig.presenter.is_presenting());
    }
}
