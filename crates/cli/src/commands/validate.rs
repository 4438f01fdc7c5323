//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    display: String,
    refresh_rate_hz: f64,
    source_count: usize,
    has_audio: bool,
    has_clock: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        let message = result.error.unwrap_or_else(|| "invalid configuration".to_string());
        Err(CliError::config_validation(message).into())
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            let source_count =
                1 + blueprint.audio.is_some() as usize + blueprint.clock.is_some() as usize;

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    display: blueprint.display.name.clone(),
                    refresh_rate_hz: blueprint.display.refresh_rate_hz,
                    source_count,
                    has_audio: blueprint.audio.is_some(),
                    has_clock: blueprint.clock.is_some(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &contracts::ExperimentBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    // A safety buffer covering a whole frame makes every tick swap-eligible
    let frame_ms = 1000.0 / blueprint.display.refresh_rate_hz;
    if blueprint.swapper.pre_swap_safety_buffer_ms >= frame_ms {
        warnings.push(format!(
            "swapper.pre_swap_safety_buffer_ms ({}) covers the whole frame period ({:.3} ms)",
            blueprint.swapper.pre_swap_safety_buffer_ms, frame_ms
        ));
    }

    // Cross-domain sync points need more than one source
    if blueprint.audio.is_none() && blueprint.clock.is_none() {
        warnings
            .push("only the display source is configured - sync points are trivial".to_string());
    }

    // CPU hogging longer than a frame stalls the presentation loop
    if blueprint.presenter.pre_swap_cpu_hogging_ms >= frame_ms {
        warnings.push(format!(
            "presenter.pre_swap_cpu_hogging_ms ({}) is at least one frame period",
            blueprint.presenter.pre_swap_cpu_hogging_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Display: {} ({} Hz)", summary.display, summary.refresh_rate_hz);
            println!("  Sources: {}", summary.source_count);
            println!("  Audio: {}", summary.has_audio);
            println!("  Clock: {}", summary.has_clock);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
