//! Session statistics.

use std::time::Duration;

use observability::PresentationSummary;
use presenter::PresentationErrorSummary;

/// Statistics from a session run
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Slides finished during the session
    pub slides_presented: u64,

    /// Swap events observed by the display store (live + evicted)
    pub swaps_observed: u64,

    /// Number of registered swap-event sources
    pub active_sources: usize,

    /// Whether every data client reached readiness
    pub all_ready: bool,

    /// Total duration of the session
    pub duration: Duration,

    /// Per-slide timing statistics
    pub presentation: PresentationSummary,

    /// Post-hoc presentation error report
    pub errors: PresentationErrorSummary,
}

impl SessionStats {
    /// Mean observed swap rate over the session
    pub fn swaps_per_second(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.swaps_observed as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Session Statistics ===");
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Active sources: {}", self.active_sources);
        println!(
            "Swaps observed: {} ({:.2}/s)",
            self.swaps_observed,
            self.swaps_per_second()
        );
        println!("All clients ready: {}", self.all_ready);
        println!();
        print!("{}", self.presentation);
        println!();
        if self.errors.is_clean() {
            println!("Presentation clean: no timing errors recorded");
        } else {
            print!("{}", self.errors);
        }
        println!();
    }
}
