//! Sync client configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::DialOptions;

/// Top-level sync client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SyncClientConfig {
    /// Transport dial options
    #[validate(nested)]
    pub dial: DialOptions,

    /// Playback lag applied before a buffered snapshot is released (ms)
    #[validate(range(min = 0.0, max = 10000.0))]
    pub reconciliation_delay_ms: f64,

    /// Pending snapshot capacity
    #[validate(range(min = 1, max = 4096))]
    pub max_buffered_snapshots: usize,

    /// Clock synchronizer tuning
    #[validate(nested)]
    pub clock_sync: ClockSyncConfig,

    /// Interpolator tuning
    #[validate(nested)]
    pub interpolation: InterpolationConfig,

    /// Divergence thresholds
    #[validate(nested)]
    pub correction: CorrectionConfig,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            dial: DialOptions::default(),
            reconciliation_delay_ms: 150.0,
            max_buffered_snapshots: 32,
            clock_sync: ClockSyncConfig::default(),
            interpolation: InterpolationConfig::default(),
            correction: CorrectionConfig::default(),
        }
    }
}

/// Offset estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ClockSyncConfig {
    /// EWMA weight given to each new offset sample (0-1)
    #[validate(range(min = 0.0, max = 1.0))]
    pub smoothing: f64,

    /// Largest offset change a single sample may apply (ms)
    #[validate(range(min = 0.0))]
    pub max_step_ms: f64,
}

impl Default for ClockSyncConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.2,
            max_step_ms: 50.0,
        }
    }
}

/// Snapshot interpolator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct InterpolationConfig {
    /// Lower bound of the recommended playback delay (ms)
    #[validate(range(min = 0.0))]
    pub min_buffer_ms: f64,

    /// Upper bound of the recommended playback delay (ms)
    #[validate(range(min = 0.0))]
    pub max_buffer_ms: f64,

    /// Playback delay before any jitter has been observed (ms)
    #[validate(range(min = 0.0))]
    pub initial_buffer_ms: f64,

    /// Largest change of the playback delay per observation (ms)
    #[validate(range(min = 0.0))]
    pub max_step_ms: f64,

    /// Weight of transit jitter in the delay target
    #[validate(range(min = 0.0))]
    pub jitter_multiplier: f64,

    /// EWMA weight for interval and jitter estimates (0-1)
    #[validate(range(min = 0.0, max = 1.0))]
    pub smoothing: f64,

    /// Samples kept per entity
    #[validate(range(min = 2, max = 1024))]
    pub history_capacity: usize,

    /// Extra history retained to tolerate reordering (ms)
    #[validate(range(min = 0.0))]
    pub reorder_slack_ms: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            min_buffer_ms: 50.0,
            max_buffer_ms: 400.0,
            initial_buffer_ms: 100.0,
            max_step_ms: 5.0,
            jitter_multiplier: 2.0,
            smoothing: 0.1,
            history_capacity: 64,
            reorder_slack_ms: 250.0,
        }
    }
}

/// Divergence thresholds for forced corrections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Position error that forces a correction (m)
    #[validate(range(min = 0.0))]
    pub position_threshold_m: f64,

    /// Per-axis orientation error that forces a correction (deg)
    #[validate(range(min = 0.0, max = 180.0))]
    pub orientation_threshold_deg: f64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            position_threshold_m: 2.0,
            orientation_threshold_deg: 15.0,
        }
    }
}
