//! Replay session - drives a sync client from a recording.
//!
//! The recording is replayed at its original pacing while entities are
//! sampled at a fixed render rate, the way a rendering loop would query the
//! client.

use std::time::Duration;

use anyhow::{Context, Result};
use observability::SyncMetricsAggregator;
use sync_client::{ConnectionState, SyncClient, SyncClientConfig};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use transport::{ReplayConfig, ReplaySocketOpener};

use super::SessionStats;

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sync client configuration; `dial.url` names the recording
    pub client: SyncClientConfig,

    /// Replay pacing
    pub replay: ReplayConfig,

    /// Entities to sample (empty = roster, else every observed entity)
    pub entities: Vec<String>,

    /// Render interval
    pub sample_interval: Duration,

    /// Session timeout (None = until the recording ends)
    pub timeout: Option<Duration>,
}

/// Replay session
pub struct ReplaySession {
    config: SessionConfig,
}

impl ReplaySession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run the session until the recording closes or the timeout expires
    pub async fn run(self) -> Result<SessionStats> {
        let start_time = Instant::now();
        let config = self.config;

        let opener = ReplaySocketOpener::new(config.replay.clone());
        let mut client = SyncClient::new(config.client.clone(), opener);
        let mut events = client.events();

        info!(recording = %config.client.dial.url, "Opening recording");
        client
            .connect()
            .await
            .with_context(|| format!("Failed to open recording {}", config.client.dial.url))?;

        let mut stats = SessionStats::default();
        let mut aggregator = SyncMetricsAggregator::new();
        let mut ticker = tokio::time::interval(config.sample_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let ids = if !config.entities.is_empty() {
                config.entities.clone()
            } else {
                let roster = client.known_entity_ids();
                if roster.is_empty() {
                    client.observed_entity_ids()
                } else {
                    roster
                }
            };

            for entity_id in &ids {
                match client.get_entity_state(entity_id, None) {
                    Some(state) => {
                        stats.samples += 1;
                        stats.entities_seen.insert(entity_id.clone());
                        debug!(
                            entity_id = %entity_id,
                            tick_id = state.tick_id,
                            x = state.position.x,
                            y = state.position.y,
                            z = state.position.z,
                            yaw = state.orientation.yaw_deg,
                            "Entity sampled"
                        );
                    }
                    None => stats.misses += 1,
                }
            }
            stats.render_ticks += 1;

            aggregator.record_playback_buffer(client.playback_buffer_ms());
            while let Ok(event) = events.try_recv() {
                aggregator.update(&event);
            }

            if client.connection_status() == ConnectionState::Disconnected {
                info!("Recording finished");
                break;
            }

            if let Some(timeout) = config.timeout {
                if start_time.elapsed() >= timeout {
                    info!(timeout_secs = timeout.as_secs(), "Session timed out");
                    client.disconnect(Some(1000), Some("session timeout"));
                    break;
                }
            }
        }

        while let Ok(event) = events.try_recv() {
            aggregator.update(&event);
        }
        aggregator.set_client_stats(client.stats());

        stats.buffer = client.buffer_stats();
        stats.clock_offset_ms = client.clock_sync().offset_ms();
        stats.clock_samples = client.clock_sync().sample_count();
        stats.roster = client.known_entity_ids();
        stats.sync_metrics = aggregator;
        stats.duration = start_time.elapsed();

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            samples = stats.samples,
            misses = stats.misses,
            "Session complete"
        );

        Ok(stats)
    }
}
