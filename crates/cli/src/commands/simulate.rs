//! `simulate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::SimulateArgs;
use crate::error::CliError;
use crate::pipeline::{run_simulation, SimulationConfig, SimulationReport};

/// Simulation report for JSON output
#[derive(Serialize)]
struct ReportOutput {
    seed: u64,
    delivered: usize,
    dropped: usize,
    render_steps: usize,
    velocity_samples: u64,
    mean_velocity_error: f64,
    p95_velocity_error: f64,
    max_velocity_error: f64,
    final_buffer_ms: f64,
    buffer_dropped: u64,
    out_of_order: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    recording: Option<String>,
}

/// Execute the `simulate` command
pub fn run_simulate(args: &SimulateArgs) -> Result<()> {
    check_args(args)?;

    let client = super::load_config(args.config.as_deref(), args.delay_ms)?;
    let config = SimulationConfig {
        client,
        snapshots: args.snapshots,
        interval_ms: args.interval_ms,
        min_latency_ms: args.min_latency_ms,
        max_latency_ms: args.max_latency_ms,
        drop_rate: args.drop_rate,
        velocity: args.velocity,
        step_ms: args.step_ms,
        seed: args.seed,
    };

    info!(
        snapshots = config.snapshots,
        seed = config.seed,
        drop_rate = config.drop_rate,
        "Running simulation"
    );
    let report = run_simulation(&config);

    if let Some(ref path) = args.record {
        transport::write_recording(path, &report.recording)
            .with_context(|| format!("Failed to write recording to {}", path.display()))?;
        info!(path = %path.display(), frames = report.recording.len(), "Recording written");
    }

    if args.json {
        let output = to_output(args, &report);
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialize simulation report")?;
        println!("{}", json);
    } else {
        print_report(args, &report);
    }

    Ok(())
}

fn check_args(args: &SimulateArgs) -> crate::error::Result<()> {
    let positive = |value: f64| value.is_finite() && value > 0.0;

    if !positive(args.interval_ms) {
        return Err(CliError::invalid_argument("interval-ms", "must be a positive number"));
    }
    if !positive(args.step_ms) {
        return Err(CliError::invalid_argument("step-ms", "must be a positive number"));
    }
    if !(args.min_latency_ms.is_finite() && args.min_latency_ms >= 0.0) {
        return Err(CliError::invalid_argument("min-latency-ms", "must be non-negative"));
    }
    if !(args.max_latency_ms.is_finite() && args.max_latency_ms >= args.min_latency_ms) {
        return Err(CliError::invalid_argument(
            "max-latency-ms",
            "must be at least --min-latency-ms",
        ));
    }
    if !(0.0..=1.0).contains(&args.drop_rate) {
        return Err(CliError::invalid_argument("drop-rate", "must be within 0-1"));
    }
    if !args.velocity.is_finite() {
        return Err(CliError::invalid_argument("velocity", "must be finite"));
    }

    Ok(())
}

fn to_output(args: &SimulateArgs, report: &SimulationReport) -> ReportOutput {
    ReportOutput {
        seed: args.seed,
        delivered: report.delivered,
        dropped: report.dropped,
        render_steps: report.render_steps,
        velocity_samples: report.velocity_error.count(),
        mean_velocity_error: report.velocity_error.mean(),
        p95_velocity_error: report.p95_velocity_error,
        max_velocity_error: report.velocity_error.max(),
        final_buffer_ms: report.final_buffer_ms,
        buffer_dropped: report.buffer.dropped_count,
        out_of_order: report.buffer.out_of_order_count,
        recording: args.record.as_ref().map(|p| p.display().to_string()),
    }
}

fn print_report(args: &SimulateArgs, report: &SimulationReport) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                   Simulation Report                          ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📡 Delivery (seed {})", args.seed);
    println!("   ├─ Delivered: {}", report.delivered);
    println!("   ├─ Lost: {}", report.dropped);
    println!(
        "   └─ Latency: {}-{} ms",
        args.min_latency_ms, args.max_latency_ms
    );

    println!("\n🎯 Velocity Tracking (truth {} units/ms)", args.velocity);
    println!("   ├─ Samples: {}", report.velocity_error.count());
    println!("   ├─ Mean error: {:.4}", report.velocity_error.mean());
    println!("   ├─ p95 error: {:.4}", report.p95_velocity_error);
    println!("   └─ Max error: {:.4}", report.velocity_error.max());

    println!("\n📦 Pending Buffer");
    println!("   ├─ Evicted: {}", report.buffer.dropped_count);
    println!("   ├─ Out-of-order: {}", report.buffer.out_of_order_count);
    println!("   └─ Final playback buffer: {:.1} ms", report.final_buffer_ms);

    if let Some(ref path) = args.record {
        println!("\n💾 Recording: {}", path.display());
    }

    println!("\n{}", report.sync_metrics.summary());
}
