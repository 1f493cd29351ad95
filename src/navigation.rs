//! Destination sampling for ground agents.
//!
//! The simulation never plans paths; it asks a [`Navigation`] service for the
//! nearest walkable point to where it would like to go and walks straight at it.

use crate::algorithms::obstacles::{ObstacleField, ObstacleSet};
use crate::boundary::BoundaryVolume;
use nalgebra::Vector3;

pub trait Navigation: Send + Sync {
    /// Walkable point within `max_distance` of `point`, if any.
    fn sample(&self, point: Vector3<f64>, max_distance: f64, t: f64) -> Option<Vector3<f64>>;
}

/// Everything is walkable.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeNavigation;

impl Navigation for FreeNavigation {
    fn sample(&self, point: Vector3<f64>, _max_distance: f64, _t: f64) -> Option<Vector3<f64>> {
        Some(point)
    }
}

/// Walkable space is the boundary volume minus the obstacles.
#[derive(Debug, Clone)]
pub struct VolumeNavigation {
    volume: BoundaryVolume,
    obstacles: ObstacleSet,
}

impl VolumeNavigation {
    pub fn new(volume: BoundaryVolume, obstacles: ObstacleSet) -> Self {
        Self { volume, obstacles }
    }
}

impl Navigation for VolumeNavigation {
    fn sample(&self, point: Vector3<f64>, max_distance: f64, t: f64) -> Option<Vector3<f64>> {
        let mut p = self.volume.clamp(point);
        if let Some(out) = self.obstacles.push_out(&p, t) {
            p = self.volume.clamp(out);
            if self.obstacles.push_out(&p, t).is_some() {
                return None;
            }
        }
        if (p - point).norm() > max_distance {
            return None;
        }
        Some(p)
    }
}

impl<N: Navigation + ?Sized> Navigation for Box<N> {
    fn sample(&self, point: Vector3<f64>, max_distance: f64, t: f64) -> Option<Vector3<f64>> {
        (**self).sample(point, max_distance, t)
    }
}
