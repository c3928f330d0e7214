//! Position and orientation math shared by interpolation and divergence checks.

use contracts::{Orientation, Vector3};
use nalgebra::Vector3 as NVector3;

#[inline]
fn to_na(v: Vector3) -> NVector3<f64> {
    NVector3::new(v.x, v.y, v.z)
}

#[inline]
fn from_na(v: NVector3<f64>) -> Vector3 {
    Vector3::new(v.x, v.y, v.z)
}

/// Component-wise linear interpolation, `t` in `[0, 1]`
pub fn lerp_position(from: Vector3, to: Vector3, t: f64) -> Vector3 {
    from_na(to_na(from).lerp(&to_na(to), t))
}

/// Euclidean distance between two positions
pub fn position_distance(a: Vector3, b: Vector3) -> f64 {
    (to_na(a) - to_na(b)).norm()
}

/// Signed difference `to - from` along the shortest arc, in `[-180, 180)`
#[inline]
pub fn shortest_angle_delta(from_deg: f64, to_deg: f64) -> f64 {
    (to_deg - from_deg + 180.0).rem_euclid(360.0) - 180.0
}

/// Angle interpolation that never takes the long way around
#[inline]
pub fn lerp_angle(from_deg: f64, to_deg: f64, t: f64) -> f64 {
    from_deg + shortest_angle_delta(from_deg, to_deg) * t
}

/// Per-axis shortest-path interpolation
pub fn lerp_orientation(from: Orientation, to: Orientation, t: f64) -> Orientation {
    Orientation {
        yaw_deg: lerp_angle(from.yaw_deg, to.yaw_deg, t),
        pitch_deg: lerp_angle(from.pitch_deg, to.pitch_deg, t),
        roll_deg: lerp_angle(from.roll_deg, to.roll_deg, t),
    }
}

/// Largest absolute per-axis angle difference (deg)
pub fn orientation_error(a: Orientation, b: Orientation) -> f64 {
    [
        shortest_angle_delta(a.yaw_deg, b.yaw_deg),
        shortest_angle_delta(a.pitch_deg, b.pitch_deg),
        shortest_angle_delta(a.roll_deg, b.roll_deg),
    ]
    .into_iter()
    .map(f64::abs)
    .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_position_midpoint() {
        let mid = lerp_position(Vector3::new(0.0, 0.0, 0.0), Vector3::new(2.0, -4.0, 6.0), 0.5);
        assert_eq!(mid, Vector3::new(1.0, -2.0, 3.0));
    }

    #[test]
    fn test_position_distance() {
        let d = position_distance(Vector3::new(0.0, 0.0, 0.0), Vector3::new(3.0, 4.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_shortest_delta_wraps() {
        assert_eq!(shortest_angle_delta(170.0, -170.0), 20.0);
        assert_eq!(shortest_angle_delta(-170.0, 170.0), -20.0);
        assert_eq!(shortest_angle_delta(10.0, 350.0), -20.0);
        assert_eq!(shortest_angle_delta(0.0, 90.0), 90.0);
    }

    #[test]
    fn test_lerp_angle_crosses_seam() {
        // 170 -> -170 goes through 180, not through 0
        let mid = lerp_angle(170.0, -170.0, 0.5);
        assert!((mid - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_error_uses_max_axis() {
        let a = Orientation::new(0.0, 0.0, 0.0);
        let b = Orientation::new(10.0, -16.0, 359.0);
        assert!((orientation_error(a, b) - 16.0).abs() < 1e-9);
    }
}
