//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use sync_client::SyncClientConfig;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo<'a> {
    source: String,
    #[serde(flatten)]
    config: &'a SyncClientConfig,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    let config = super::load_config(args.config.as_deref(), None)?;
    let source = args
        .config
        .as_ref()
        .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string());

    if args.json {
        let info = ConfigInfo {
            source,
            config: &config,
        };
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&config, &source);
    }

    Ok(())
}

fn print_config_info(config: &SyncClientConfig, source: &str) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Snapshot Sync Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");
    println!("Source: {}\n", source);

    let dial = &config.dial;
    println!("🔌 Transport");
    println!("   ├─ URL: {}", dial.url);
    if dial.protocols.is_empty() {
        println!("   ├─ Protocols: (none)");
    } else {
        println!("   ├─ Protocols: {}", dial.protocols.join(", "));
    }
    println!("   └─ Binary type: {:?}", dial.binary_type);

    println!("\n📦 Playback");
    println!("   ├─ Reconciliation delay: {} ms", config.reconciliation_delay_ms);
    println!("   └─ Pending buffer capacity: {}", config.max_buffered_snapshots);

    let clock = &config.clock_sync;
    println!("\n⏱  Clock Sync");
    println!("   ├─ Smoothing: {}", clock.smoothing);
    println!("   └─ Max step: {} ms", clock.max_step_ms);

    let interpolation = &config.interpolation;
    println!("\n📈 Interpolation");
    println!(
        "   ├─ Playback buffer: {} ms (range {}-{} ms, step {} ms)",
        interpolation.initial_buffer_ms,
        interpolation.min_buffer_ms,
        interpolation.max_buffer_ms,
        interpolation.max_step_ms
    );
    println!(
        "   ├─ Jitter multiplier: {} (smoothing {})",
        interpolation.jitter_multiplier, interpolation.smoothing
    );
    println!(
        "   └─ History: {} samples, {} ms reorder slack",
        interpolation.history_capacity, interpolation.reorder_slack_ms
    );

    let correction = &config.correction;
    println!("\n🎯 Corrections");
    println!("   ├─ Position threshold: {} m", correction.position_threshold_m);
    println!(
        "   └─ Orientation threshold: {}°",
        correction.orientation_threshold_deg
    );

    println!();
}
