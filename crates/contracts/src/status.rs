//! Status and mode enums shared across the workspace.

use serde::{Deserialize, Serialize};

/// Stability status of a swap-event source.
///
/// "Stopped" is detected purely from elapsed wall-clock time since the
/// most recent sample, so a source that has never produced a sample is
/// `InsufficientData`, never `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    /// No verifier has looked at the source yet.
    #[default]
    Uninitialized,

    /// Fewer samples than the verifier's window.
    InsufficientData,

    /// No sample within the stoppage interval.
    Stopped,

    /// At least one recent interval outside tolerance.
    SwappingUnstably,

    /// All recent intervals within tolerance of nominal.
    SwappingStably,
}

impl SwapStatus {
    /// Short label for logs and status dumps.
    pub fn label(self) -> &'static str {
        match self {
            SwapStatus::Uninitialized => "uninitialized",
            SwapStatus::InsufficientData => "insufficient_data",
            SwapStatus::Stopped => "stopped",
            SwapStatus::SwappingUnstably => "unstable",
            SwapStatus::SwappingStably => "stable",
        }
    }
}

/// Lifecycle of a slide through the presenter state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlideStatus {
    /// Queued, nothing issued.
    #[default]
    NotStarted,

    /// Render issued to the back buffer; fence inserted.
    Rendering,

    /// Fence complete; waiting for the buffer swap.
    SwapPending,

    /// Swap observed; slide is on screen.
    InProgress,

    /// Next slide's swap observed; duration computable.
    Finished,
}

/// How the presenter re-bases intended onsets after a timing error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentationErrorMode {
    /// Late slides shift subsequent intended onsets so each slide still
    /// receives its full intended duration.
    #[default]
    PropagateDelays,

    /// Intended onsets stay absolute; a late slide may be shortened or
    /// skipped. Accepted in configuration for compatibility but rejected
    /// at presenter setup: the skip-vs-shorten policy is unspecified.
    FixTimingFromFirstSlide,
}

/// How the display swapper estimates time-to-next-swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapperMode {
    /// Last observed swap time + nominal period.
    #[default]
    NominalPeriod,

    /// Lower bound of the data client's next-swap prediction, falling
    /// back to `NominalPeriod` while the model is not usable.
    Prediction,
}

/// Where buffer swaps are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwappingMode {
    /// Swaps run on the main loop with a short pre-swap CPU spin.
    #[default]
    SingleCoreBlockingSwaps,

    /// A secondary thread swaps continuously and measures swap timing.
    MultiCore,
}

/// What the final-slide callback asks the presenter to do next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FinalSlideAction {
    /// Keep presenting (the callback may have appended slides).
    #[default]
    ContinuePresentation,

    /// Halt the state machine after the current slide.
    StopNow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(SwapStatus::SwappingStably.label(), "stable");
        assert_eq!(SwapStatus::default().label(), "uninitialized");
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&SwapStatus::SwappingUnstably).unwrap();
        assert_eq!(json, "\"swapping_unstably\"");
        let mode: PresentationErrorMode = serde_json::from_str("\"propagate_delays\"").unwrap();
        assert_eq!(mode, PresentationErrorMode::PropagateDelays);
    }
}
