//! Divergence measurement and time-boxed forced corrections.

use contracts::{CorrectionConfig, InterpolatedState};
use sync_engine::geometry::{orientation_error, position_distance};

/// Authoritative state pinned over interpolation until it expires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcedCorrection {
    pub state: InterpolatedState,

    /// Last authoritative instant at which the correction still applies (ms)
    pub expires_at_ms: f64,
}

impl ForcedCorrection {
    /// Correction for a keyframe, held for one reconciliation window
    pub fn new(state: InterpolatedState, reconciliation_delay_ms: f64) -> Self {
        Self {
            state,
            expires_at_ms: state.captured_at_ms as f64 + reconciliation_delay_ms,
        }
    }

    #[inline]
    pub fn is_expired(&self, now_ms: f64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// Error between a predicted and an authoritative state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divergence {
    /// Euclidean position distance
    pub position_error: f64,

    /// Largest per-axis shortest-path angle difference (deg)
    pub orientation_error: f64,
}

impl Divergence {
    pub fn between(predicted: &InterpolatedState, authoritative: &InterpolatedState) -> Self {
        Self {
            position_error: position_distance(predicted.position, authoritative.position),
            orientation_error: orientation_error(predicted.orientation, authoritative.orientation),
        }
    }

    /// Strictly above either threshold
    pub fn exceeds(&self, thresholds: &CorrectionConfig) -> bool {
        self.position_error > thresholds.position_threshold_m
            || self.orientation_error > thresholds.orientation_threshold_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Orientation, Vector3};

    fn state(x: f64, yaw: f64) -> InterpolatedState {
        InterpolatedState {
            tick_id: 1,
            keyframe: true,
            captured_at_ms: 1_000,
            position: Vector3::new(x, 0.0, 0.0),
            orientation: Orientation::new(yaw, 0.0, 0.0),
        }
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let thresholds = CorrectionConfig::default();

        let at_limit = Divergence::between(&state(0.0, 0.0), &state(2.0, 15.0));
        assert!(!at_limit.exceeds(&thresholds));

        let position = Divergence::between(&state(0.0, 0.0), &state(2.001, 0.0));
        assert!(position.exceeds(&thresholds));

        let orientation = Divergence::between(&state(0.0, 0.0), &state(0.0, 15.01));
        assert!(orientation.exceeds(&thresholds));
    }

    #[test]
    fn test_orientation_error_wraps() {
        let divergence = Divergence::between(&state(0.0, 175.0), &state(0.0, -175.0));
        assert!((divergence.orientation_error - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_expiry_is_inclusive() {
        let correction = ForcedCorrection::new(state(0.0, 0.0), 150.0);
        assert_eq!(correction.expires_at_ms, 1_150.0);
        assert!(!correction.is_expired(1_150.0));
        assert!(correction.is_expired(1_150.5));
    }
}
