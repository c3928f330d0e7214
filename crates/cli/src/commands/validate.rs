//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use sync_client::SyncClientConfig;
use tracing::info;

use crate::cli::ValidateArgs;

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
    url: String,
    reconciliation_delay_ms: f64,
    max_buffered_snapshots: usize,
    playback_buffer_range_ms: [f64; 2],
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
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match super::load_config(Some(&args.config), None) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
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
                    url: config.dial.url.clone(),
                    reconciliation_delay_ms: config.reconciliation_delay_ms,
                    max_buffered_snapshots: config.max_buffered_snapshots,
                    playback_buffer_range_ms: [
                        config.interpolation.min_buffer_ms,
                        config.interpolation.max_buffer_ms,
                    ],
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
fn collect_warnings(config: &SyncClientConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.reconciliation_delay_ms < config.interpolation.min_buffer_ms {
        warnings.push(format!(
            "reconciliation_delay_ms ({}) is below the minimum playback buffer ({}) - late snapshots will be dropped as stale",
            config.reconciliation_delay_ms, config.interpolation.min_buffer_ms
        ));
    }

    if config.clock_sync.smoothing == 0.0 {
        warnings.push("clock_sync.smoothing is 0 - the offset never moves after the first sample".to_string());
    }

    if config.interpolation.max_step_ms == 0.0 {
        warnings.push("interpolation.max_step_ms is 0 - the playback buffer is fixed".to_string());
    }

    let url = config.dial.url.as_str();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        warnings.push(format!(
            "dial.url '{}' is not a websocket URL - only replay transports accept it",
            url
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  URL: {}", summary.url);
            println!("  Reconciliation delay: {} ms", summary.reconciliation_delay_ms);
            println!("  Pending capacity: {}", summary.max_buffered_snapshots);
            println!(
                "  Playback buffer: {}-{} ms",
                summary.playback_buffer_range_ms[0], summary.playback_buffer_range_ms[1]
            );
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
