//! Chase and flee target selection for the human/zombie populations.

use crate::error::{ensure_positive, SimResult};
use crate::normalize_or_zero;
use crate::sim::AgentHandle;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HUMAN_DETECTION_RANGE: f64 = 15.0;
pub const DEFAULT_HUMAN_SPEED: f64 = 3.0;
pub const DEFAULT_HUMAN_TURN_SPEED: f64 = 8.0;
pub const DEFAULT_FLEE_DISTANCE: f64 = 10.0;
pub const DEFAULT_NAV_SAMPLE_RADIUS: f64 = 10.0;

pub const DEFAULT_ZOMBIE_DETECTION_RANGE: f64 = 20.0;
pub const DEFAULT_ZOMBIE_SPEED: f64 = 3.5;
pub const DEFAULT_ZOMBIE_TURN_SPEED: f64 = 8.0;
pub const DEFAULT_CATCH_DISTANCE: f64 = 1.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanParams {
    pub detection_range: f64,
    pub speed: f64,
    pub turn_speed: f64,
    /// How far past the agent a flee destination is projected.
    pub flee_distance: f64,
    /// Search radius handed to the navigation service for flee points.
    pub nav_sample_radius: f64,
}

impl Default for HumanParams {
    fn default() -> Self {
        Self {
            detection_range: DEFAULT_HUMAN_DETECTION_RANGE,
            speed: DEFAULT_HUMAN_SPEED,
            turn_speed: DEFAULT_HUMAN_TURN_SPEED,
            flee_distance: DEFAULT_FLEE_DISTANCE,
            nav_sample_radius: DEFAULT_NAV_SAMPLE_RADIUS,
        }
    }
}

impl HumanParams {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("human.detection_range", self.detection_range)?;
        ensure_positive("human.speed", self.speed)?;
        ensure_positive("human.turn_speed", self.turn_speed)?;
        ensure_positive("human.flee_distance", self.flee_distance)?;
        ensure_positive("human.nav_sample_radius", self.nav_sample_radius)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZombieParams {
    pub detection_range: f64,
    pub speed: f64,
    pub turn_speed: f64,
    pub catch_distance: f64,
}

impl Default for ZombieParams {
    fn default() -> Self {
        Self {
            detection_range: DEFAULT_ZOMBIE_DETECTION_RANGE,
            speed: DEFAULT_ZOMBIE_SPEED,
            turn_speed: DEFAULT_ZOMBIE_TURN_SPEED,
            catch_distance: DEFAULT_CATCH_DISTANCE,
        }
    }
}

impl ZombieParams {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("zombie.detection_range", self.detection_range)?;
        ensure_positive("zombie.speed", self.speed)?;
        ensure_positive("zombie.turn_speed", self.turn_speed)?;
        ensure_positive("zombie.catch_distance", self.catch_distance)
    }
}

/// A selected candidate and its distance from the searcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threat {
    pub handle: AgentHandle,
    pub position: Vector3<f64>,
    pub distance: f64,
}

/// Nearest candidate within `max_range` (inclusive).
///
/// `locate` maps a handle to its current position and returns `None` for
/// removed agents, which are skipped. Equal distances resolve to the lowest
/// handle so the answer does not depend on list order.
pub fn closest<F>(
    from: Vector3<f64>,
    candidates: &[AgentHandle],
    max_range: f64,
    locate: F,
) -> Option<Threat>
where
    F: Fn(AgentHandle) -> Option<Vector3<f64>>,
{
    let mut best: Option<Threat> = None;
    for &handle in candidates {
        let Some(position) = locate(handle) else {
            continue;
        };
        let distance = (position - from).norm();
        if distance > max_range {
            continue;
        }
        let better = match &best {
            None => true,
            Some(b) => distance < b.distance || (distance == b.distance && handle < b.handle),
        };
        if better {
            best = Some(Threat { handle, position, distance });
        }
    }
    best
}

/// Point `distance` away from `threat`, straight through `from`.
///
/// When the threat sits exactly on the agent there is no away direction and
/// the result is `from` itself.
pub fn flee_point(from: Vector3<f64>, threat: Vector3<f64>, distance: f64) -> Vector3<f64> {
    from + normalize_or_zero(from - threat) * distance
}

pub fn within_catch(zombie: Vector3<f64>, human: Vector3<f64>, catch_distance: f64) -> bool {
    (human - zombie).norm() <= catch_distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;
    use std::collections::HashMap;

    struct Scene {
        handles: Vec<AgentHandle>,
        positions: HashMap<AgentHandle, Vector3<f64>>,
    }

    fn scene(points: &[Vector3<f64>]) -> Scene {
        let mut keys: SlotMap<AgentHandle, ()> = SlotMap::with_key();
        let mut handles = Vec::new();
        let mut positions = HashMap::new();
        for p in points {
            let h = keys.insert(());
            handles.push(h);
            positions.insert(h, *p);
        }
        Scene { handles, positions }
    }

    #[test]
    fn empty_candidates_gives_none() {
        assert_eq!(closest(Vector3::zeros(), &[], 100.0, |_| None), None);
    }

    #[test]
    fn single_target_respects_range() {
        let s = scene(&[Vector3::new(3.0, 0.0, 0.0)]);
        let locate = |h| s.positions.get(&h).copied();
        let found = closest(Vector3::zeros(), &s.handles, 5.0, locate).expect("in range");
        assert_eq!(found.handle, s.handles[0]);
        assert!((found.distance - 3.0).abs() < 1.0e-12);
        assert_eq!(closest(Vector3::zeros(), &s.handles, 2.0, locate), None);
    }

    #[test]
    fn picks_minimum_and_skips_removed() {
        let s = scene(&[
            Vector3::new(4.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
            Vector3::new(-2.0, 0.0, 0.0),
        ]);
        let removed = s.handles[1];
        let locate = |h| if h == removed { None } else { s.positions.get(&h).copied() };
        let found = closest(Vector3::zeros(), &s.handles, 10.0, locate).expect("some target");
        assert_eq!(found.handle, s.handles[2]);
    }

    #[test]
    fn ties_resolve_to_lowest_handle_regardless_of_order() {
        let s = scene(&[Vector3::new(1.0, 0.0, 0.0), Vector3::new(-1.0, 0.0, 0.0)]);
        let locate = |h| s.positions.get(&h).copied();
        let mut reversed = s.handles.clone();
        reversed.reverse();
        let a = closest(Vector3::zeros(), &s.handles, 5.0, locate).map(|t| t.handle);
        let b = closest(Vector3::zeros(), &reversed, 5.0, locate).map(|t| t.handle);
        assert_eq!(a, b);
        assert_eq!(a, s.handles.iter().min().copied());
    }

    #[test]
    fn all_out_of_range_gives_none() {
        let s = scene(&[Vector3::new(30.0, 0.0, 0.0), Vector3::new(0.0, 0.0, -25.0)]);
        let locate = |h| s.positions.get(&h).copied();
        assert_eq!(closest(Vector3::zeros(), &s.handles, 20.0, locate), None);
    }

    #[test]
    fn flee_point_runs_directly_away() {
        let p = flee_point(Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), 10.0);
        assert!((p - Vector3::new(-10.0, 0.0, 0.0)).norm() < 1.0e-12);
        assert_eq!(flee_point(Vector3::zeros(), Vector3::zeros(), 10.0), Vector3::zeros());
    }

    #[test]
    fn catch_distance_is_inclusive() {
        assert!(within_catch(Vector3::zeros(), Vector3::new(1.5, 0.0, 0.0), 1.5));
        assert!(!within_catch(Vector3::zeros(), Vector3::new(1.6, 0.0, 0.0), 1.5));
    }

    #[test]
    fn params_validate() {
        assert!(HumanParams::default().validate().is_ok());
        assert!(ZombieParams::default().validate().is_ok());
        let bad = HumanParams { speed: -3.0, ..HumanParams::default() };
        assert!(bad.validate().is_err());
    }
}
