use nalgebra::Vector3;

pub mod algorithms;
pub mod boundary;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod motion;
pub mod navigation;
pub mod sim;
pub mod spatial;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use algorithms::flocking::{AlignmentMode, FlockParams, SteeringWeights};
pub use boundary::BoundaryVolume;
pub use config::SimConfig;
pub use error::{SimError, SimResult};
pub use motion::AgentMotionState;
pub use sim::{AgentConfig, AgentHandle, AgentKind, AgentSnapshot, CatchEvent, TickReport, World};

/// Squared length below which a vector is treated as zero.
pub const ZERO_EPS_SQ: f64 = 1.0e-12;

/// Unit vector along `v`, or the zero vector when `v` has no usable length.
pub fn normalize_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let n2 = v.norm_squared();
    if n2 <= ZERO_EPS_SQ || !n2.is_finite() {
        Vector3::zeros()
    } else {
        v / n2.sqrt()
    }
}

/// Rotate +Z about +Y by `degrees` (ground-plane ray direction).
pub fn yaw_direction(degrees: f64) -> Vector3<f64> {
    let rad = degrees.to_radians();
    Vector3::new(rad.sin(), 0.0, rad.cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_guards_zero_length() {
        assert_eq!(normalize_or_zero(Vector3::zeros()), Vector3::zeros());
        assert_eq!(normalize_or_zero(Vector3::new(1.0e-7, 0.0, 0.0)), Vector3::zeros());
        let n = normalize_or_zero(Vector3::new(3.0, 0.0, 4.0));
        assert!((n.norm() - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn yaw_matches_compass_layout() {
        assert!((yaw_direction(0.0) - Vector3::z()).norm() < 1.0e-12);
        assert!((yaw_direction(90.0) - Vector3::x()).norm() < 1.0e-12);
        assert!((yaw_direction(180.0) + Vector3::z()).norm() < 1.0e-12);
    }
}
