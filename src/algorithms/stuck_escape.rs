//! Stall detection and corner escape for ground agents.
//!
//! An agent is `Stuck` once it has stayed within `still_threshold` of an anchor
//! point for longer than `still_time_threshold` while a ring of sensing rays says
//! it is boxed in. The escape search then picks the first open heading, or the
//! heading with the longest free run when every ray hits something.

use crate::algorithms::obstacles::ObstacleField;
use crate::error::{ensure_positive, SimError, SimResult};
use crate::yaw_direction;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_STILL_THRESHOLD: f64 = 0.5;
pub const DEFAULT_STILL_TIME_THRESHOLD: f64 = 1.0;
pub const DEFAULT_CORNER_DETECTION_RADIUS: f64 = 2.5;
pub const DEFAULT_CORNER_RAYS: u32 = 8;
pub const DEFAULT_CORNER_HIT_THRESHOLD: u32 = 3;
pub const DEFAULT_ESCAPE_DISTANCE: f64 = 5.0;
pub const DEFAULT_ESCAPE_RAYS: u32 = 36;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckParams {
    /// Displacement from the anchor below which the agent counts as still.
    pub still_threshold: f64,
    /// Seconds of stillness required before the corner test runs.
    pub still_time_threshold: f64,
    pub corner_detection_radius: f64,
    pub corner_rays: u32,
    /// Minimum number of corner rays that must hit.
    pub corner_hit_threshold: u32,
    pub escape_distance: f64,
    pub escape_rays: u32,
}

impl Default for StuckParams {
    fn default() -> Self {
        Self {
            still_threshold: DEFAULT_STILL_THRESHOLD,
            still_time_threshold: DEFAULT_STILL_TIME_THRESHOLD,
            corner_detection_radius: DEFAULT_CORNER_DETECTION_RADIUS,
            corner_rays: DEFAULT_CORNER_RAYS,
            corner_hit_threshold: DEFAULT_CORNER_HIT_THRESHOLD,
            escape_distance: DEFAULT_ESCAPE_DISTANCE,
            escape_rays: DEFAULT_ESCAPE_RAYS,
        }
    }
}

impl StuckParams {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("stuck.still_threshold", self.still_threshold)?;
        if !self.still_time_threshold.is_finite() || self.still_time_threshold < 0.0 {
            return Err(SimError::InvalidConfig {
                field: "stuck.still_time_threshold",
                reason: "must be finite and not negative",
            });
        }
        ensure_positive("stuck.corner_detection_radius", self.corner_detection_radius)?;
        ensure_positive("stuck.escape_distance", self.escape_distance)?;
        if self.corner_rays == 0 {
            return Err(SimError::InvalidConfig { field: "stuck.corner_rays", reason: "must be positive" });
        }
        if self.escape_rays == 0 {
            return Err(SimError::InvalidConfig { field: "stuck.escape_rays", reason: "must be positive" });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StuckPhase {
    Moving,
    Stuck,
}

/// Per-agent detector record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StuckState {
    pub last_position: Vector3<f64>,
    pub accumulated_still_time: f64,
    pub phase: StuckPhase,
}

impl StuckState {
    pub fn new(position: Vector3<f64>) -> Self {
        Self {
            last_position: position,
            accumulated_still_time: 0.0,
            phase: StuckPhase::Moving,
        }
    }

    pub fn is_stuck(&self) -> bool {
        self.phase == StuckPhase::Stuck
    }

    /// Feed this tick's position. `in_corner` is only evaluated when the
    /// stillness timer has run out.
    pub fn observe<F>(&mut self, position: Vector3<f64>, dt: f64, params: &StuckParams, in_corner: F) -> StuckPhase
    where
        F: FnOnce() -> bool,
    {
        let moved = (position - self.last_position).norm();
        if moved >= params.still_threshold {
            self.last_position = position;
            self.accumulated_still_time = 0.0;
            self.phase = StuckPhase::Moving;
            return self.phase;
        }

        self.accumulated_still_time += dt;
        if self.phase == StuckPhase::Moving
            && self.accumulated_still_time > params.still_time_threshold
            && in_corner()
        {
            self.phase = StuckPhase::Stuck;
        }
        self.phase
    }
}

/// True when at least `corner_hit_threshold` of the sensing rays hit something.
pub fn in_corner(field: &dyn ObstacleField, origin: &Vector3<f64>, params: &StuckParams, t: f64) -> bool {
    let step = 360.0 / params.corner_rays as f64;
    let hits = (0..params.corner_rays)
        .filter(|&i| {
            let dir = yaw_direction(i as f64 * step);
            field
                .raycast(origin, &dir, params.corner_detection_radius, t)
                .is_some()
        })
        .count();
    hits as u32 >= params.corner_hit_threshold
}

/// Most open heading around `origin`, or `None` when every ray is blocked at
/// distance zero.
pub fn escape_direction(
    field: &dyn ObstacleField,
    origin: &Vector3<f64>,
    params: &StuckParams,
    t: f64,
) -> Option<Vector3<f64>> {
    let step = 360.0 / params.escape_rays as f64;
    let mut best: Option<Vector3<f64>> = None;
    let mut longest = 0.0;
    for i in 0..params.escape_rays {
        let dir = yaw_direction(i as f64 * step);
        match field.raycast(origin, &dir, params.escape_distance, t) {
            None => return Some(dir),
            Some(hit) if hit > longest => {
                longest = hit;
                best = Some(dir);
            }
            Some(_) => {}
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::obstacles::{NoObstacles, ObstacleBox, ObstacleSet};

    fn params() -> StuckParams {
        StuckParams {
            still_threshold: 0.5,
            still_time_threshold: 3.0,
            ..StuckParams::default()
        }
    }

    /// Walls on +X, +Z and -X leave only -Z open.
    fn pocket() -> ObstacleSet {
        ObstacleSet {
            spheres: Vec::new(),
            boxes: vec![
                ObstacleBox::new(Vector3::new(1.0, -1.0, -3.0), Vector3::new(2.0, 1.0, 3.0)),
                ObstacleBox::new(Vector3::new(-2.0, -1.0, -3.0), Vector3::new(-1.0, 1.0, 3.0)),
                ObstacleBox::new(Vector3::new(-2.0, -1.0, 1.0), Vector3::new(2.0, 1.0, 2.0)),
            ],
        }
    }

    #[test]
    fn becomes_stuck_only_after_strictly_exceeding_the_time() {
        let p = params();
        let mut s = StuckState::new(Vector3::zeros());
        for _ in 0..3 {
            assert_eq!(s.observe(Vector3::zeros(), 1.0, &p, || true), StuckPhase::Moving);
        }
        assert_eq!(s.observe(Vector3::zeros(), 1.0, &p, || true), StuckPhase::Stuck);
    }

    #[test]
    fn corner_test_must_pass() {
        let p = params();
        let mut s = StuckState::new(Vector3::zeros());
        for _ in 0..10 {
            assert_eq!(s.observe(Vector3::zeros(), 1.0, &p, || false), StuckPhase::Moving);
        }
        assert!(s.accumulated_still_time > p.still_time_threshold);
        assert_eq!(s.observe(Vector3::zeros(), 1.0, &p, || true), StuckPhase::Stuck);
    }

    #[test]
    fn displacement_resets_the_accumulator() {
        let p = params();
        let mut s = StuckState::new(Vector3::zeros());
        s.observe(Vector3::new(0.1, 0.0, 0.0), 1.0, &p, || true);
        s.observe(Vector3::new(0.2, 0.0, 0.0), 1.0, &p, || true);
        assert_eq!(s.accumulated_still_time, 2.0);
        s.observe(Vector3::new(0.5, 0.0, 0.0), 1.0, &p, || true);
        assert_eq!(s.accumulated_still_time, 0.0);
        assert_eq!(s.last_position, Vector3::new(0.5, 0.0, 0.0));
        for _ in 0..3 {
            assert_eq!(s.observe(Vector3::new(0.5, 0.0, 0.0), 1.0, &p, || true), StuckPhase::Moving);
        }
    }

    #[test]
    fn movement_clears_stuck() {
        let p = params();
        let mut s = StuckState::new(Vector3::zeros());
        for _ in 0..4 {
            s.observe(Vector3::zeros(), 1.0, &p, || true);
        }
        assert!(s.is_stuck());
        assert_eq!(s.observe(Vector3::new(0.0, 0.0, 1.0), 0.1, &p, || true), StuckPhase::Moving);
    }

    #[test]
    fn open_ground_is_not_a_corner() {
        assert!(!in_corner(&NoObstacles, &Vector3::zeros(), &StuckParams::default(), 0.0));
    }

    #[test]
    fn three_walls_make_a_corner() {
        assert!(in_corner(&pocket(), &Vector3::zeros(), &StuckParams::default(), 0.0));
    }

    #[test]
    fn escape_prefers_first_open_ray() {
        let dir = escape_direction(&NoObstacles, &Vector3::zeros(), &StuckParams::default(), 0.0)
            .expect("open");
        assert!((dir - Vector3::z()).norm() < 1.0e-12);
        let dir = escape_direction(&pocket(), &Vector3::zeros(), &StuckParams::default(), 0.0)
            .expect("open side");
        assert!(dir.z < 0.0);
    }

    #[test]
    fn escape_falls_back_to_longest_hit() {
        let ring = ObstacleSet {
            spheres: Vec::new(),
            boxes: vec![
                ObstacleBox::new(Vector3::new(-10.0, -1.0, 1.0), Vector3::new(10.0, 1.0, 2.0)),
                ObstacleBox::new(Vector3::new(-10.0, -1.0, -2.0), Vector3::new(10.0, 1.0, -1.0)),
                ObstacleBox::new(Vector3::new(1.0, -1.0, -10.0), Vector3::new(2.0, 1.0, 10.0)),
                ObstacleBox::new(Vector3::new(-5.0, -1.0, -10.0), Vector3::new(-4.0, 1.0, 10.0)),
            ],
        };
        let p = StuckParams { escape_distance: 20.0, ..StuckParams::default() };
        let dir = escape_direction(&ring, &Vector3::zeros(), &p, 0.0).expect("some hit");
        // Longest free run points into the wider -X half of the box.
        assert!(dir.x < 0.0);
    }

    #[test]
    fn fully_embedded_agent_gets_no_escape() {
        let solid = ObstacleSet {
            spheres: Vec::new(),
            boxes: vec![ObstacleBox::new(Vector3::repeat(-3.0), Vector3::repeat(3.0))],
        };
        assert_eq!(escape_direction(&solid, &Vector3::zeros(), &StuckParams::default(), 0.0), None);
    }

    #[test]
    fn zero_ray_counts_are_rejected() {
        let p = StuckParams { corner_rays: 0, ..StuckParams::default() };
        assert!(p.validate().is_err());
        assert!(StuckParams::default().validate().is_ok());
    }
}
