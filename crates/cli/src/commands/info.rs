//! `info` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use config_loader::{ConfigFormat, ConfigLoader};
use contracts::ExperimentBlueprint;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Execute the `info` command
///
/// Without `--config` this dumps the built-in defaults, which doubles as
/// a starting point for a new configuration file.
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let blueprint = match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration info");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => {
            info!("Showing built-in defaults");
            // An empty display table picks up every serde default
            ConfigLoader::load_from_str("[display]\n", ConfigFormat::Toml)
                .context("Failed to build default configuration")?
        }
    };

    if args.json {
        let json =
            serde_json::to_string_pretty(&blueprint).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn print_config_info(blueprint: &ExperimentBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║              Stim Syncer Configuration                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("🖥  Display");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Name: {}", blueprint.display.name);
    println!("   ├─ Refresh rate: {} Hz", blueprint.display.refresh_rate_hz);
    println!("   ├─ Latency offset: {} ms", blueprint.display.latency_ms);
    println!("   └─ Sample size: {}", blueprint.display.sample_size);

    match &blueprint.audio {
        Some(audio) => {
            println!("\n🔊 Audio");
            println!("   ├─ Name: {}", audio.name);
            println!("   ├─ Sample rate: {} Hz", audio.sample_rate_hz);
            println!("   ├─ Buffer size: {} frames", audio.buffer_size);
            println!("   ├─ Latency offset: {} ms", audio.latency_ms);
            println!("   └─ Sample size: {}", audio.sample_size);
        }
        None => {
            println!("\n🔊 Audio: (not configured)");
        }
    }

    match &blueprint.clock {
        Some(clock) => {
            println!("\n⏱  Clock");
            println!("   ├─ Name: {}", clock.name);
            println!("   ├─ Tick period: {} ms", clock.tick_period_ms);
            println!("   └─ Sample size: {}", clock.sample_size);
        }
        None => {
            println!("\n⏱  Clock: (not configured)");
        }
    }

    let client = &blueprint.client;
    println!("\n⚙️  Client");
    println!(
        "   ├─ Collection duration: {} ms",
        client.data_collection_duration_ms
    );
    println!("   ├─ Auto update: {}", client.auto_update);
    println!("   ├─ Period tolerance: {}", client.swap_period_tolerance);
    println!(
        "   └─ Stoppage multiplier: {}",
        client.stoppage_period_multiplier
    );

    let swapper = &blueprint.swapper;
    println!("\n🔄 Swapper");
    println!(
        "   ├─ Safety buffer: {} ms",
        swapper.pre_swap_safety_buffer_ms
    );
    println!("   └─ Mode: {:?}", swapper.mode);

    let presenter = &blueprint.presenter;
    println!("\n🎬 Presenter");
    println!("   ├─ Error mode: {:?}", presenter.error_mode);
    println!("   ├─ Swapping mode: {:?}", presenter.swapping_mode);
    println!("   ├─ Fence sync: {}", presenter.use_fence_sync);
    println!(
        "   ├─ Wait for fence: {}",
        presenter.wait_until_fence_complete
    );
    println!(
        "   ├─ Deallocate finished framebuffers: {}",
        presenter.deallocate_finished_framebuffers
    );
    println!(
        "   └─ CPU hogging: {} ms",
        presenter.pre_swap_cpu_hogging_ms
    );

    println!();
}
