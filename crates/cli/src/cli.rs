//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Snapshot Sync - client-side entity state synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "snapshot-sync",
    author,
    version,
    about = "Client-side entity snapshot synchronizer",
    long_about = "Replays recorded snapshot streams through the synchronizer, simulates \n\
                  jittery delivery, and validates synchronizer configuration."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SNAPSHOT_SYNC_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SNAPSHOT_SYNC_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a recorded message stream through the synchronizer
    Replay(ReplayArgs),

    /// Simulate jittery, lossy snapshot delivery
    Simulate(SimulateArgs),

    /// Validate configuration file
    Validate(ValidateArgs),

    /// Display effective configuration
    Info(InfoArgs),
}

/// Arguments for the `replay` command
#[derive(Parser, Debug, Clone)]
pub struct ReplayArgs {
    /// Recording to replay (JSONL)
    #[arg(short, long, env = "SNAPSHOT_SYNC_RECORDING")]
    pub recording: PathBuf,

    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "SNAPSHOT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override reconciliation delay (ms)
    #[arg(long, env = "SNAPSHOT_SYNC_DELAY_MS")]
    pub delay_ms: Option<f64>,

    /// Deliver binary frames as deferred blobs
    #[arg(long)]
    pub blob: bool,

    /// Replay speed multiplier (1.0 = original speed)
    #[arg(long, default_value = "1.0")]
    pub speed: f64,

    /// Loop the recording until interrupted
    #[arg(long = "loop")]
    pub loop_playback: bool,

    /// Entities to sample (default: roster, else every observed entity)
    #[arg(short, long = "entity")]
    pub entities: Vec<String>,

    /// Sampling rate (Hz)
    #[arg(long, default_value = "60")]
    pub sample_hz: f64,

    /// Stop after this many seconds (0 = until the recording ends)
    #[arg(long, default_value = "0", env = "SNAPSHOT_SYNC_TIMEOUT")]
    pub timeout: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SNAPSHOT_SYNC_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `simulate` command
#[derive(Parser, Debug, Clone)]
pub struct SimulateArgs {
    /// Path to configuration file (TOML or JSON); defaults apply when omitted
    #[arg(short, long, env = "SNAPSHOT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Number of snapshots to send
    #[arg(long, default_value = "200")]
    pub snapshots: usize,

    /// Capture spacing (ms)
    #[arg(long, default_value = "50")]
    pub interval_ms: f64,

    /// Minimum network latency (ms)
    #[arg(long, default_value = "60")]
    pub min_latency_ms: f64,

    /// Maximum network latency (ms)
    #[arg(long, default_value = "100")]
    pub max_latency_ms: f64,

    /// Probability that a snapshot is lost (0-1)
    #[arg(long, default_value = "0.02")]
    pub drop_rate: f64,

    /// Ground-truth entity velocity (units/ms)
    #[arg(long, default_value = "0.04")]
    pub velocity: f64,

    /// Render step (ms)
    #[arg(long, default_value = "16")]
    pub step_ms: f64,

    /// Random seed
    #[arg(long, default_value = "7")]
    pub seed: u64,

    /// Override reconciliation delay (ms)
    #[arg(long)]
    pub delay_ms: Option<f64>,

    /// Write the delivered stream as a replayable recording
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Output report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "sync.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; defaults are shown when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from([
            "snapshot-sync",
            "replay",
            "--recording",
            "session.jsonl",
            "--entity",
            "alpha",
            "--entity",
            "bravo",
            "--loop",
        ]);
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.entities, vec!["alpha", "bravo"]);
        assert!(args.loop_playback);
        assert_eq!(args.speed, 1.0);
    }

    #[test]
    fn test_parse_simulate_defaults() {
        let cli = Cli::parse_from(["snapshot-sync", "-vv", "simulate"]);
        assert_eq!(cli.verbose, 2);
        let Commands::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.snapshots, 200);
        assert_eq!(args.drop_rate, 0.02);
        assert_eq!(args.seed, 7);
    }
}
