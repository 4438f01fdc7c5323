//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use contracts::Time;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::session::{Session, SessionConfig};

/// Execute the `run` command
pub async fn run_session(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(refresh_rate) = args.refresh_rate {
        info!(refresh_rate_hz = refresh_rate, "Overriding display refresh rate from CLI");
        blueprint.display.refresh_rate_hz = refresh_rate;
    }

    info!(
        display = %blueprint.display.name,
        refresh_rate_hz = blueprint.display.refresh_rate_hz,
        audio = blueprint.audio.is_some(),
        clock = blueprint.clock.is_some(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.slides == 0 {
        anyhow::bail!("--slides must be at least 1");
    }
    if !args.slide_duration_ms.is_finite() || args.slide_duration_ms <= 0.0 {
        anyhow::bail!("--slide-duration-ms must be > 0");
    }

    // Build session configuration
    let session_config = SessionConfig {
        blueprint,
        slide_count: args.slides,
        slide_duration: Time::from_millis_f64(args.slide_duration_ms),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    // Create and run session
    let session = Session::new(session_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting session...");

    // Run session with shutdown signal
    tokio::select! {
        result = session.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        slides_presented = stats.slides_presented,
                        swaps_observed = stats.swaps_observed,
                        duration_secs = stats.duration.as_secs_f64(),
                        clean = stats.errors.is_clean(),
                        "Session completed successfully"
                    );

                    // Print detailed statistics
                    stats.print_summary();
                }
                Err(e) => {
                    return Err(e).context("Session execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping session...");
        }
    }

    info!("Stim Syncer finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::ExperimentBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Display:");
    println!("  Name: {}", blueprint.display.name);
    println!("  Refresh rate: {} Hz", blueprint.display.refresh_rate_hz);
    println!("  Latency offset: {} ms", blueprint.display.latency_ms);
    println!("  Sample size: {}", blueprint.display.sample_size);

    if let Some(ref audio) = blueprint.audio {
        println!("\nAudio:");
        println!("  Name: {}", audio.name);
        println!("  Sample rate: {} Hz", audio.sample_rate_hz);
        println!("  Buffer size: {} frames", audio.buffer_size);
    }

    if let Some(ref clock) = blueprint.clock {
        println!("\nClock:");
        println!("  Name: {}", clock.name);
        println!("  Tick period: {} ms", clock.tick_period_ms);
    }

    println!("\nClient:");
    println!(
        "  Collection duration: {} ms",
        blueprint.client.data_collection_duration_ms
    );
    println!("  Period tolerance: {}", blueprint.client.swap_period_tolerance);

    println!("\nSwapper:");
    println!(
        "  Safety buffer: {} ms ({:?})",
        blueprint.swapper.pre_swap_safety_buffer_ms, blueprint.swapper.mode
    );

    println!();
}
