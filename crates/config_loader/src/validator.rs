//! Configuration validation.
//!
//! Rules:
//! - source names unique and non-empty
//! - rates and periods strictly positive
//! - audio buffer_size > 0
//! - store sample sizes at or above the model floor
//! - swap_period_tolerance in (0, 1]
//! - stoppage_period_multiplier > 1
//! - swapper safety buffer positive (warns when it covers a whole frame)

use std::collections::HashSet;

use contracts::{ExperimentBlueprint, TimingError};

/// Smallest store window that still admits a model fit.
const MIN_SAMPLE_SIZE: usize = 3;

/// Validate an ExperimentBlueprint.
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    validate_source_names(blueprint)?;
    validate_display(blueprint)?;
    validate_audio(blueprint)?;
    validate_clock(blueprint)?;
    validate_client(blueprint)?;
    validate_swapper(blueprint)?;
    validate_presenter(blueprint)?;
    Ok(())
}

/// Source names double as data client keys, so they must be unique.
fn validate_source_names(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let mut names: Vec<(&str, &str)> = vec![("display.name", blueprint.display.name.as_str())];
    if let Some(audio) = &blueprint.audio {
        names.push(("audio.name", audio.name.as_str()));
    }
    if let Some(clock) = &blueprint.clock {
        names.push(("clock.name", clock.name.as_str()));
    }

    let mut seen = HashSet::new();
    for (field, name) in names {
        if name.is_empty() {
            return Err(TimingError::config_validation(
                field,
                "source name cannot be empty",
            ));
        }
        if !seen.insert(name) {
            return Err(TimingError::config_validation(
                field,
                format!("duplicate source name '{name}'"),
            ));
        }
    }
    Ok(())
}

fn validate_display(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let display = &blueprint.display;
    if !display.refresh_rate_hz.is_finite() || display.refresh_rate_hz <= 0.0 {
        return Err(TimingError::config_validation(
            "display.refresh_rate_hz",
            format!("refresh rate must be > 0, got {}", display.refresh_rate_hz),
        ));
    }
    if display.sample_size < MIN_SAMPLE_SIZE {
        return Err(TimingError::config_validation(
            "display.sample_size",
            format!(
                "sample_size must be >= {MIN_SAMPLE_SIZE}, got {}",
                display.sample_size
            ),
        ));
    }
    if !display.latency_ms.is_finite() || display.latency_ms < 0.0 {
        return Err(TimingError::config_validation(
            "display.latency_ms",
            format!("latency must be >= 0, got {}", display.latency_ms),
        ));
    }
    Ok(())
}

fn validate_audio(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let Some(audio) = &blueprint.audio else {
        return Ok(());
    };
    if !audio.sample_rate_hz.is_finite() || audio.sample_rate_hz <= 0.0 {
        return Err(TimingError::config_validation(
            "audio.sample_rate_hz",
            format!("sample rate must be > 0, got {}", audio.sample_rate_hz),
        ));
    }
    if audio.buffer_size == 0 {
        return Err(TimingError::config_validation(
            "audio.buffer_size",
            "buffer_size must be > 0",
        ));
    }
    if audio.sample_size < MIN_SAMPLE_SIZE {
        return Err(TimingError::config_validation(
            "audio.sample_size",
            format!(
                "sample_size must be >= {MIN_SAMPLE_SIZE}, got {}",
                audio.sample_size
            ),
        ));
    }
    if !audio.latency_ms.is_finite() || audio.latency_ms < 0.0 {
        return Err(TimingError::config_validation(
            "audio.latency_ms",
            format!("latency must be >= 0, got {}", audio.latency_ms),
        ));
    }
    Ok(())
}

fn validate_clock(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let Some(clock) = &blueprint.clock else {
        return Ok(());
    };
    if !clock.tick_period_ms.is_finite() || clock.tick_period_ms <= 0.0 {
        return Err(TimingError::config_validation(
            "clock.tick_period_ms",
            format!("tick period must be > 0, got {}", clock.tick_period_ms),
        ));
    }
    if clock.sample_size < MIN_SAMPLE_SIZE {
        return Err(TimingError::config_validation(
            "clock.sample_size",
            format!(
                "sample_size must be >= {MIN_SAMPLE_SIZE}, got {}",
                clock.sample_size
            ),
        ));
    }
    Ok(())
}

fn validate_client(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let client = &blueprint.client;
    if !client.data_collection_duration_ms.is_finite() || client.data_collection_duration_ms <= 0.0
    {
        return Err(TimingError::config_validation(
            "client.data_collection_duration_ms",
            format!(
                "collection duration must be > 0, got {}",
                client.data_collection_duration_ms
            ),
        ));
    }
    if !client.swap_period_tolerance.is_finite()
        || client.swap_period_tolerance <= 0.0
        || client.swap_period_tolerance > 1.0
    {
        return Err(TimingError::config_validation(
            "client.swap_period_tolerance",
            format!(
                "tolerance must be in (0, 1], got {}",
                client.swap_period_tolerance
            ),
        ));
    }
    if !client.stoppage_period_multiplier.is_finite() || client.stoppage_period_multiplier <= 1.0 {
        return Err(TimingError::config_validation(
            "client.stoppage_period_multiplier",
            format!(
                "stoppage multiplier must be > 1, got {}",
                client.stoppage_period_multiplier
            ),
        ));
    }
    Ok(())
}

fn validate_swapper(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let swapper = &blueprint.swapper;
    if !swapper.pre_swap_safety_buffer_ms.is_finite() || swapper.pre_swap_safety_buffer_ms <= 0.0 {
        return Err(TimingError::config_validation(
            "swapper.pre_swap_safety_buffer_ms",
            format!(
                "safety buffer must be > 0, got {}",
                swapper.pre_swap_safety_buffer_ms
            ),
        ));
    }

    // A buffer that covers a whole frame makes every tick swap-eligible.
    let frame_ms = 1000.0 / blueprint.display.refresh_rate_hz;
    if blueprint.display.refresh_rate_hz > 0.0 && swapper.pre_swap_safety_buffer_ms >= frame_ms {
        tracing::warn!(
            safety_buffer_ms = swapper.pre_swap_safety_buffer_ms,
            frame_ms,
            "pre-swap safety buffer covers the whole frame period"
        );
    }
    Ok(())
}

fn validate_presenter(blueprint: &ExperimentBlueprint) -> Result<(), TimingError> {
    let presenter = &blueprint.presenter;
    if !presenter.pre_swap_cpu_hogging_ms.is_finite() || presenter.pre_swap_cpu_hogging_ms < 0.0 {
        return Err(TimingError::config_validation(
            "presenter.pre_swap_cpu_hogging_ms",
            format!(
                "CPU hogging duration must be >= 0, got {}",
                presenter.pre_swap_cpu_hogging_ms
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{
        AudioSpec, ClientSpec, ClockSpec, ConfigVersion, DisplaySpec, PresenterSpec, SwapperSpec,
    };

    fn minimal_blueprint() -> ExperimentBlueprint {
        ExperimentBlueprint {
            version: ConfigVersion::V1,
            display: DisplaySpec {
                name: "display".into(),
                refresh_rate_hz: 60.0,
                latency_ms: 0.0,
                sample_size: 100,
            },
            audio: Some(AudioSpec {
                name: "audio".into(),
                sample_rate_hz: 48_000.0,
                buffer_size: 480,
                latency_ms: 0.0,
                sample_size: 100,
            }),
            clock: Some(ClockSpec {
                name: "clock".into(),
                tick_period_ms: 1.0,
                sample_size: 1000,
            }),
            client: ClientSpec::default(),
            swapper: SwapperSpec::default(),
            presenter: PresenterSpec::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_duplicate_source_name() {
        let mut bp = minimal_blueprint();
        bp.audio.as_mut().unwrap().name = "display".into();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("duplicate source name"), "got: {err}");
    }

    #[test]
    fn test_empty_source_name() {
        let mut bp = minimal_blueprint();
        bp.display.name = String::new();
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_invalid_refresh_rate() {
        let mut bp = minimal_blueprint();
        bp.display.refresh_rate_hz = -60.0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("refresh rate must be > 0"), "got: {err}");
    }

    #[test]
    fn test_sample_size_below_floor() {
        let mut bp = minimal_blueprint();
        bp.display.sample_size = 2;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("sample_size must be >= 3"), "got: {err}");
    }

    #[test]
    fn test_zero_audio_buffer() {
        let mut bp = minimal_blueprint();
        bp.audio.as_mut().unwrap().buffer_size = 0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("buffer_size must be > 0"), "got: {err}");
    }

    #[test]
    fn test_tolerance_out_of_range() {
        let mut bp = minimal_blueprint();
        bp.client.swap_period_tolerance = 1.5;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("tolerance must be in (0, 1]"), "got: {err}");

        bp.client.swap_period_tolerance = 0.0;
        assert!(validate(&bp).is_err());

        bp.client.swap_period_tolerance = 1.0;
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_stoppage_multiplier_must_exceed_one() {
        let mut bp = minimal_blueprint();
        bp.client.stoppage_period_multiplier = 1.0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("stoppage multiplier"), "got: {err}");
    }

    #[test]
    fn test_nonpositive_safety_buffer() {
        let mut bp = minimal_blueprint();
        bp.swapper.pre_swap_safety_buffer_ms = 0.0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("safety buffer must be > 0"), "got: {err}");
    }

    #[test]
    fn test_negative_cpu_hogging() {
        let mut bp = minimal_blueprint();
        bp.presenter.pre_swap_cpu_hogging_ms = -1.0;
        let result = validate(&bp);
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("CPU hogging"), "got: {err}");
    }

    #[test]
    fn test_optional_sources_skipped() {
        let mut bp = minimal_blueprint();
        bp.audio = None;
        bp.clock = None;
        assert!(validate(&bp).is_ok());
    }
}
