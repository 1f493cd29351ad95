use crate::error::{ensure_positive, SimError, SimResult};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Spherical obstacle whose centre follows a quadratic path in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstaclePoly {
    /// p(t) = a2 * t^2 + a1 * t + a0
    pub a2: [f64; 3],
    pub a1: [f64; 3],
    pub a0: [f64; 3],
    /// Radius.
    pub d: f64,
}

impl ObstaclePoly {
    pub fn fixed(center: Vector3<f64>, radius: f64) -> Self {
        Self {
            a2: [0.0; 3],
            a1: [0.0; 3],
            a0: [center.x, center.y, center.z],
            d: radius,
        }
    }

    pub fn pos(&self, t: f64) -> Vector3<f64> {
        Vector3::new(
            self.a2[0] * t * t + self.a1[0] * t + self.a0[0],
            self.a2[1] * t * t + self.a1[1] * t + self.a0[1],
            self.a2[2] * t * t + self.a1[2] * t + self.a0[2],
        )
    }

    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("obstacles.spheres.d", self.d)?;
        if !self.a2.iter().chain(&self.a1).chain(&self.a0).all(|c| c.is_finite()) {
            return Err(SimError::InvalidConfig {
                field: "obstacles.spheres",
                reason: "path coefficients must be finite",
            });
        }
        Ok(())
    }
}

/// Solid axis-aligned box (walls, crates).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl ObstacleBox {
    pub fn new(min: Vector3<f64>, max: Vector3<f64>) -> Self {
        Self {
            min: [min.x.min(max.x), min.y.min(max.y), min.z.min(max.z)],
            max: [min.x.max(max.x), min.y.max(max.y), min.z.max(max.z)],
        }
    }

    pub fn contains(&self, p: &Vector3<f64>) -> bool {
        (0..3).all(|a| p[a] >= self.min[a] && p[a] <= self.max[a])
    }

    pub fn validate(&self) -> SimResult<()> {
        for a in 0..3 {
            if !self.min[a].is_finite() || !self.max[a].is_finite() {
                return Err(SimError::InvalidConfig { field: "obstacles.boxes", reason: "bounds must be finite" });
            }
            if self.min[a] > self.max[a] {
                return Err(SimError::InvalidConfig {
                    field: "obstacles.boxes",
                    reason: "min must not exceed max on any axis",
                });
            }
        }
        Ok(())
    }
}

/// Anything a ray can hit.
pub trait ObstacleField: Send + Sync {
    /// Distance along unit `dir` to the first hit no farther than `max`.
    /// A ray starting inside an obstacle hits at distance 0.
    fn raycast(&self, origin: &Vector3<f64>, dir: &Vector3<f64>, max: f64, t: f64) -> Option<f64>;

    /// Push `p` out of any obstacle it lies in; `None` when already clear.
    fn push_out(&self, p: &Vector3<f64>, t: f64) -> Option<Vector3<f64>>;
}

/// Obstacle-free space.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoObstacles;

impl ObstacleField for NoObstacles {
    fn raycast(&self, _origin: &Vector3<f64>, _dir: &Vector3<f64>, _max: f64, _t: f64) -> Option<f64> {
        None
    }

    fn push_out(&self, _p: &Vector3<f64>, _t: f64) -> Option<Vector3<f64>> {
        None
    }
}

/// Static scene layout: spheres (possibly moving) and boxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleSet {
    pub spheres: Vec<ObstaclePoly>,
    pub boxes: Vec<ObstacleBox>,
}

impl ObstacleSet {
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty() && self.boxes.is_empty()
    }

    pub fn validate(&self) -> SimResult<()> {
        self.spheres.iter().try_for_each(ObstaclePoly::validate)?;
        self.boxes.iter().try_for_each(ObstacleBox::validate)
    }
}

impl ObstacleField for ObstacleSet {
    fn raycast(&self, origin: &Vector3<f64>, dir: &Vector3<f64>, max: f64, t: f64) -> Option<f64> {
        let sphere_hits = self
            .spheres
            .iter()
            .filter_map(|s| ray_sphere(origin, dir, &s.pos(t), s.d));
        let box_hits = self.boxes.iter().filter_map(|b| ray_box(origin, dir, b));
        sphere_hits
            .chain(box_hits)
            .filter(|&d| d <= max)
            .min_by(|a, b| a.total_cmp(b))
    }

    fn push_out(&self, p: &Vector3<f64>, t: f64) -> Option<Vector3<f64>> {
        for s in &self.spheres {
            let c = s.pos(t);
            let off = p - c;
            let dist = off.norm();
            if dist < s.d {
                let dir = if dist > 1.0e-12 { off / dist } else { Vector3::x() };
                return Some(c + dir * s.d);
            }
        }
        for b in &self.boxes {
            if b.contains(p) {
                // Leave through the nearest face.
                let mut best = *p;
                let mut best_gap = f64::INFINITY;
                for a in 0..3 {
                    for (face, gap) in [(b.min[a], p[a] - b.min[a]), (b.max[a], b.max[a] - p[a])] {
                        if gap < best_gap {
                            best_gap = gap;
                            best = *p;
                            best[a] = face;
                        }
                    }
                }
                return Some(best);
            }
        }
        None
    }
}

fn ray_sphere(origin: &Vector3<f64>, dir: &Vector3<f64>, center: &Vector3<f64>, radius: f64) -> Option<f64> {
    let oc = origin - center;
    let c = oc.norm_squared() - radius * radius;
    if c <= 0.0 {
        return Some(0.0);
    }
    let b = oc.dot(dir);
    if b > 0.0 {
        return None;
    }
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    Some(-b - disc.sqrt())
}

// Slab test.
fn ray_box(origin: &Vector3<f64>, dir: &Vector3<f64>, b: &ObstacleBox) -> Option<f64> {
    let mut t_min = 0.0_f64;
    let mut t_max = f64::INFINITY;
    for a in 0..3 {
        if dir[a].abs() < 1.0e-12 {
            if origin[a] < b.min[a] || origin[a] > b.max[a] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[a];
        let mut t0 = (b.min[a] - origin[a]) * inv;
        let mut t1 = (b.max[a] - origin[a]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }
    Some(t_min)
}

/// Two static spheres and one drifting across the arena.
pub fn demo_obstacles() -> ObstacleSet {
    ObstacleSet {
        spheres: vec![
            ObstaclePoly::fixed(Vector3::new(6.0, 0.0, 6.0), 2.0),
            ObstaclePoly::fixed(Vector3::new(-8.0, 0.0, 3.0), 1.5),
            ObstaclePoly {
                a2: [0.0, 0.0, 0.0],
                a1: [-0.05, 0.0, 0.0],
                a0: [15.0, 0.0, -10.0],
                d: 1.0,
            },
        ],
        boxes: vec![
            ObstacleBox::new(Vector3::new(-20.0, -1.0, 18.0), Vector3::new(20.0, 3.0, 19.0)),
            ObstacleBox::new(Vector3::new(18.0, -1.0, -20.0), Vector3::new(19.0, 3.0, 19.0)),
        ],
    }
}
