use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

pub const DEFAULT_BOUNDARY_MIN: [f64; 3] = [-25.0, 0.0, -25.0];
pub const DEFAULT_BOUNDARY_MAX: [f64; 3] = [25.0, 10.0, 25.0];

/// Axis-aligned wrap-around volume shared read-only by every agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryVolume {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Default for BoundaryVolume {
    fn default() -> Self {
        Self {
            min: DEFAULT_BOUNDARY_MIN,
            max: DEFAULT_BOUNDARY_MAX,
        }
    }
}

impl BoundaryVolume {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> SimResult<Self> {
        let volume = Self {
            min: [min.x, min.y, min.z],
            max: [max.x, max.y, max.z],
        };
        volume.validate()?;
        Ok(volume)
    }

    /// Cube of half-extent `half` centred on the origin.
    pub fn cube(half: f64) -> SimResult<Self> {
        Self::new(Vector3::repeat(-half), Vector3::repeat(half))
    }

    pub fn validate(&self) -> SimResult<()> {
        for axis in 0..3 {
            if !self.min[axis].is_finite() || !self.max[axis].is_finite() {
                return Err(SimError::InvalidConfig {
                    field: "boundary",
                    reason: "bounds must be finite",
                });
            }
            if self.min[axis] > self.max[axis] {
                return Err(SimError::InvalidConfig {
                    field: "boundary",
                    reason: "min must not exceed max on any axis",
                });
            }
        }
        Ok(())
    }

    pub fn min_corner(&self) -> Vector3<f64> {
        Vector3::new(self.min[0], self.min[1], self.min[2])
    }

    pub fn max_corner(&self) -> Vector3<f64> {
        Vector3::new(self.max[0], self.max[1], self.max[2])
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Teleport wrap: leaving through `max` re-enters at `min` and vice versa.
    /// Each axis is handled on its own; in-bounds coordinates are untouched.
    pub fn wrap(&self, p: Vector3<f64>) -> Vector3<f64> {
        let mut out = p;
        for axis in 0..3 {
            if out[axis] > self.max[axis] {
                out[axis] = self.min[axis];
            } else if out[axis] < self.min[axis] {
                out[axis] = self.max[axis];
            }
        }
        out
    }

    /// Nearest point inside the volume. Used by navigation, never by the tick.
    pub fn clamp(&self, p: Vector3<f64>) -> Vector3<f64> {
        let mut out = p;
        for axis in 0..3 {
            out[axis] = out[axis].clamp(self.min[axis], self.max[axis]);
        }
        out
    }
}
