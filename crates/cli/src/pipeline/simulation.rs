//! Jitter / loss simulation on a virtual clock.
//!
//! A single probe entity moves at constant velocity. Each snapshot is lost
//! with a fixed probability or delivered after a uniformly random latency;
//! the client is sampled at a fixed render step and the velocity between
//! successive samples is compared against the ground truth.

use std::sync::Arc;

use contracts::{BufferStats, EntitySnapshot, ManualClock, Orientation, Vector3, WorldSnapshot};
use observability::{RunningStats, SyncMetricsAggregator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sync_client::{SyncClient, SyncClientConfig};
use tracing::{debug, info};
use transport::{MockSocketOpener, RecordedFrame};

/// Entity id of the simulated probe
pub const PROBE_ID: &str = "probe";

/// Simulation parameters
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub client: SyncClientConfig,
    pub snapshots: usize,
    pub interval_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub drop_rate: f64,
    /// Ground-truth velocity (units/ms)
    pub velocity: f64,
    pub step_ms: f64,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            client: SyncClientConfig::default(),
            snapshots: 200,
            interval_ms: 50.0,
            min_latency_ms: 60.0,
            max_latency_ms: 100.0,
            drop_rate: 0.02,
            velocity: 0.04,
            step_ms: 16.0,
            seed: 7,
        }
    }
}

/// Simulation outcome
#[derive(Debug, Clone, Default)]
pub struct SimulationReport {
    pub delivered: usize,
    pub dropped: usize,
    pub render_steps: usize,
    /// Absolute velocity error between successive samples (units/ms)
    pub velocity_error: RunningStats,
    pub p95_velocity_error: f64,
    pub final_buffer_ms: f64,
    pub buffer: BufferStats,
    pub sync_metrics: SyncMetricsAggregator,
    /// Delivered stream as a replayable recording
    pub recording: Vec<RecordedFrame>,
}

/// Run the simulation to completion
pub fn run_simulation(config: &SimulationConfig) -> SimulationReport {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut report = SimulationReport::default();

    let mut arrivals: Vec<(f64, WorldSnapshot)> = Vec::with_capacity(config.snapshots);
    for i in 0..config.snapshots {
        let captured_at_ms = (i as f64 * config.interval_ms).round() as i64;
        if rng.random::<f64>() < config.drop_rate {
            report.dropped += 1;
            continue;
        }

        let latency_ms = if config.max_latency_ms > config.min_latency_ms {
            rng.random_range(config.min_latency_ms..=config.max_latency_ms)
        } else {
            config.min_latency_ms
        };

        let mut probe = EntitySnapshot::new(
            PROBE_ID,
            Vector3::new(config.velocity * captured_at_ms as f64, 0.0, 0.0),
            Orientation::default(),
        );
        if i == 0 {
            probe.active = Some(true);
        }

        arrivals.push((
            captured_at_ms as f64 + latency_ms,
            WorldSnapshot {
                tick_id: i as u64,
                captured_at_ms,
                keyframe: false,
                entities: vec![probe],
            },
        ));
    }
    arrivals.sort_by(|a, b| a.0.total_cmp(&b.0));
    report.delivered = arrivals.len();

    report.recording = arrivals
        .iter()
        .map(|(at_ms, snapshot)| {
            RecordedFrame::binary(*at_ms, wire_codec::encode_world_snapshot(snapshot).to_vec())
        })
        .collect();

    let end_ms = arrivals.last().map_or(0.0, |(at_ms, _)| *at_ms);

    let clock = ManualClock::new(0.0);
    let mut client = SyncClient::with_clock(
        config.client.clone(),
        MockSocketOpener::new(),
        Arc::new(clock.clone()),
    );
    let mut events = client.events();

    let step_ms = config.step_ms.max(1.0);
    let mut pending = arrivals.into_iter().peekable();
    let mut previous: Option<(f64, f64)> = None;
    let mut errors = Vec::new();
    let mut now_ms = 0.0;

    while now_ms <= end_ms {
        while pending.peek().is_some_and(|(at_ms, _)| *at_ms <= now_ms) {
            if let Some((at_ms, snapshot)) = pending.next() {
                clock.set(at_ms);
                client.queue_snapshot(snapshot);
            }
        }
        clock.set(now_ms);

        if let Some(state) = client.get_entity_state(PROBE_ID, None) {
            if let Some((previous_ms, previous_x)) = previous {
                let velocity = (state.position.x - previous_x) / (now_ms - previous_ms);
                let error = (velocity - config.velocity).abs();
                report.velocity_error.push(error);
                errors.push(error);
            }
            previous = Some((now_ms, state.position.x));
        }

        report
            .sync_metrics
            .record_playback_buffer(client.playback_buffer_ms());
        report.render_steps += 1;
        now_ms += step_ms;
    }

    while let Ok(event) = events.try_recv() {
        report.sync_metrics.update(&event);
    }
    report.sync_metrics.set_client_stats(client.stats());
    report.final_buffer_ms = client.playback_buffer_ms();
    report.buffer = client.buffer_stats();
    report.p95_velocity_error = percentile(&mut errors, 0.95);

    debug!(samples = errors.len(), "Velocity errors collected");
    info!(
        delivered = report.delivered,
        dropped = report.dropped,
        p95_velocity_error = report.p95_velocity_error,
        final_buffer_ms = report.final_buffer_ms,
        "Simulation complete"
    );

    report
}

/// Nearest-rank percentile; 0 for an empty set
fn percentile(values: &mut [f64], quantile: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let rank = (quantile.clamp(0.0, 1.0) * values.len() as f64).ceil() as usize;
    values[rank.clamp(1, values.len()) - 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile() {
        let mut values = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&mut values, 0.5), 3.0);
        assert_eq!(percentile(&mut values, 1.0), 5.0);
        assert_eq!(percentile(&mut [], 0.95), 0.0);
    }

    #[test]
    fn test_default_scenario_tracks_velocity() {
        let report = run_simulation(&SimulationConfig::default());

        assert_eq!(report.delivered + report.dropped, 200);
        assert!(report.velocity_error.count() > 100);
        assert!(
            report.p95_velocity_error <= 0.07,
            "p95 velocity error {}",
            report.p95_velocity_error
        );
        assert_eq!(report.recording.len(), report.delivered);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let config = SimulationConfig {
            snapshots: 50,
            drop_rate: 0.2,
            ..Default::default()
        };
        let a = run_simulation(&config);
        let b = run_simulation(&config);
        assert_eq!(a.dropped, b.dropped);
        assert_eq!(a.p95_velocity_error, b.p95_velocity_error);
        assert_eq!(a.recording, b.recording);
    }
}
