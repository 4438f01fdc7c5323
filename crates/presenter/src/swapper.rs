//! Display swapper: decides when a buffer swap is due and issues it.
//!
//! `should_swap` and `try_swap` are deliberately separate and not atomic;
//! the caller owns the loop and may do work between the check and the
//! swap.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use contracts::{Display, DisplaySwapperConfig, SwapData, SwapperMode, Time, TimingError};
use sync_engine::DataClient;

/// Shared handle to the display surface.
///
/// The presenter's main loop and the multi-core swap thread contend for
/// the same backend, so the display always sits behind a mutex.
pub type SharedDisplay = Arc<Mutex<Box<dyn Display>>>;

/// Issues buffer swaps against a display and feeds the resulting swap
/// times into the display's store.
pub struct DisplaySwapper {
    display: SharedDisplay,
    client: Arc<DataClient>,
    config: DisplaySwapperConfig,
}

impl DisplaySwapper {
    /// Create a swapper over a display and its data client.
    pub fn new(display: SharedDisplay, client: Arc<DataClient>, config: DisplaySwapperConfig) -> Self {
        Self {
            display,
            client,
            config,
        }
    }

    /// Estimation mode in use.
    pub fn mode(&self) -> SwapperMode {
        self.config.mode
    }

    /// The display handle.
    pub fn display(&self) -> SharedDisplay {
        Arc::clone(&self.display)
    }

    /// Estimated time until the next swap boundary.
    ///
    /// `NominalPeriod`: last observed swap time plus one nominal period.
    /// `Prediction`: lower bound of the client's next-swap prediction,
    /// falling back to the nominal estimate while the model is unusable.
    /// An empty store estimates zero: the first swap is always due.
    pub fn estimated_time_to_next_swap(&self) -> Time {
        match self.config.mode {
            SwapperMode::NominalPeriod => self.nominal_estimate(),
            SwapperMode::Prediction => {
                let next = self.client.predict_next_swap_time();
                if next.usable {
                    next.lower() - self.client.store().clock().now()
                } else {
                    self.nominal_estimate()
                }
            }
        }
    }

    /// Whether the next swap boundary is inside the safety buffer.
    pub fn should_swap(&self) -> bool {
        self.estimated_time_to_next_swap() < self.config.pre_swap_safety_buffer
    }

    /// Issue a swap unconditionally and store the reported swap event.
    ///
    /// The display's frame number is stored as the swap unit, so frames
    /// skipped during a stall show up as a unit jump in the store.
    pub fn try_swap(&self) -> Result<SwapData, TimingError> {
        let swap = {
            let mut display = self.display.lock();
            display.swap_buffers()?
        };
        self.client.store().store_swap(swap);
        metrics::counter!("timing_swaps_issued_total").increment(1);
        trace!(time = %swap.time, frame = swap.unit, "buffer swap issued");
        Ok(swap)
    }

    /// Swap iff a swap is due. Returns the swap event when one was issued.
    pub fn swap_if_due(&self) -> Result<Option<SwapData>, TimingError> {
        if !self.should_swap() {
            return Ok(None);
        }
        match self.try_swap() {
            Ok(swap) => Ok(Some(swap)),
            Err(e) => {
                warn!(error = %e, "due swap failed");
                Err(e)
            }
        }
    }

    fn nominal_estimate(&self) -> Time {
        let store = self.client.store();
        match store.last_swap() {
            Some(last) => last.time + store.nominal_swap_period() - store.clock().now(),
            None => Time::ZERO,
        }
    }
}
