//! `replay` command implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use contracts::BinaryType;
use tracing::{info, warn};
use transport::ReplayConfig;

use crate::cli::ReplayArgs;
use crate::error::CliError;
use crate::pipeline::{ReplaySession, SessionConfig};

/// Execute the `replay` command
pub async fn run_replay(args: &ReplayArgs) -> Result<()> {
    if !args.recording.exists() {
        anyhow::bail!("Recording not found: {}", args.recording.display());
    }
    if !(args.speed.is_finite() && args.speed > 0.0) {
        return Err(CliError::invalid_argument("speed", "must be a positive number").into());
    }
    if !(args.sample_hz.is_finite() && args.sample_hz > 0.0) {
        return Err(CliError::invalid_argument("sample-hz", "must be a positive number").into());
    }

    let mut client = super::load_config(args.config.as_deref(), args.delay_ms)?;
    client.dial.url = args.recording.display().to_string();
    if args.blob {
        client.dial.binary_type = BinaryType::Blob;
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)
            .context("Failed to start metrics exporter")?;
        info!(port = args.metrics_port, "Metrics exporter listening");
    }

    info!(
        recording = %args.recording.display(),
        delay_ms = client.reconciliation_delay_ms,
        speed = args.speed,
        blob = args.blob,
        "Starting replay"
    );

    let session = ReplaySession::new(SessionConfig {
        client,
        replay: ReplayConfig {
            speed_multiplier: args.speed,
            loop_playback: args.loop_playback,
        },
        entities: args.entities.clone(),
        sample_interval: Duration::from_secs_f64(1.0 / args.sample_hz),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
    });

    let shutdown_signal = setup_shutdown_signal();

    tokio::select! {
        result = session.run() => {
            let stats = result.context("Replay session failed")?;
            info!(
                samples = stats.samples,
                entities = stats.entities_seen.len(),
                duration_secs = stats.duration.as_secs_f64(),
                "Replay completed successfully"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping replay...");
        }
    }

    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(recording: PathBuf) -> ReplayArgs {
        ReplayArgs {
            recording,
            config: None,
            delay_ms: None,
            blob: false,
            speed: 1.0,
            loop_playback: false,
            entities: Vec::new(),
            sample_hz: 60.0,
            timeout: 0,
            metrics_port: 0,
        }
    }

    #[tokio::test]
    async fn test_missing_recording() {
        let err = run_replay(&args(PathBuf::from("/nonexistent/session.jsonl")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Recording not found"));
    }

    #[tokio::test]
    async fn test_rejects_non_positive_speed() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut args = args(file.path().to_path_buf());
        args.speed = 0.0;

        let err = run_replay(&args).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidArgument { name: "speed", .. })
        ));
    }
}
