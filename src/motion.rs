use nalgebra::{UnitQuaternion, Vector3};

use crate::error::{ensure_positive, SimResult};
use crate::normalize_or_zero;

const SLERP_EPS: f64 = 1.0e-9;

/// Kinematic state of one agent: position, velocity and heading.
///
/// Speed is fixed per agent; steering only changes the heading, so after every
/// [`AgentMotionState::advance`] the velocity magnitude equals `speed`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentMotionState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    speed: f64,
    turn_speed: f64,
}

impl AgentMotionState {
    pub fn new(
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
        speed: f64,
        turn_speed: f64,
    ) -> SimResult<Self> {
        ensure_positive("speed", speed)?;
        ensure_positive("turn_speed", turn_speed)?;
        Ok(Self {
            position,
            velocity: Vector3::zeros(),
            orientation,
            speed,
            turn_speed,
        })
    }

    pub fn speed(&self) -> f64 { self.speed }

    pub fn turn_speed(&self) -> f64 { self.turn_speed }

    /// Unit vector along local +Z.
    pub fn forward(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    /// One integration step.
    ///
    /// A non-zero `desired` rotates the heading toward it by the fraction
    /// `turn_speed * dt` of the remaining arc (clamped to 1). A zero `desired`
    /// keeps the heading. The agent then moves forward at `speed`.
    pub fn advance(&mut self, desired: Vector3<f64>, dt: f64) {
        let dir = normalize_or_zero(desired);
        if dir != Vector3::zeros() {
            let target = look_rotation(&dir);
            let t = (self.turn_speed * dt).clamp(0.0, 1.0);
            let turned = self
                .orientation
                .try_slerp(&target, t, SLERP_EPS)
                .unwrap_or(target);
            // Repeated slerps drift off unit length.
            self.orientation = UnitQuaternion::new_normalize(turned.into_inner());
        }
        self.velocity = normalize_or_zero(self.forward()) * self.speed;
        self.position += self.velocity * dt;
    }

    /// Stop in place at `point` (navigation arrival).
    pub fn arrive_at(&mut self, point: Vector3<f64>) {
        self.position = point;
        self.velocity = Vector3::zeros();
    }

    pub fn hold(&mut self) {
        self.velocity = Vector3::zeros();
    }
}

/// Rotation that maps local +Z onto `dir` with +Y as the preferred up axis.
pub fn look_rotation(dir: &Vector3<f64>) -> UnitQuaternion<f64> {
    let up = if dir.cross(&Vector3::y()).norm_squared() < 1.0e-12 {
        // Straight up or down: any perpendicular reference works.
        Vector3::z()
    } else {
        Vector3::y()
    };
    UnitQuaternion::face_towards(dir, &up)
}

/// Heading (yaw only) that faces `dir` projected on the ground plane.
pub fn heading_from_direction(dir: &Vector3<f64>) -> UnitQuaternion<f64> {
    let flat = normalize_or_zero(Vector3::new(dir.x, 0.0, dir.z));
    if flat == Vector3::zeros() {
        return UnitQuaternion::identity();
    }
    look_rotation(&flat)
}
