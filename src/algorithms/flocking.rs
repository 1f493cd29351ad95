use crate::error::{ensure_non_negative, ensure_positive, SimResult};
use crate::normalize_or_zero;
use crate::spatial::SnapshotEntry;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub const DEFAULT_NEIGHBOR_RADIUS: f64 = 5.0;
pub const DEFAULT_SEPARATION_RADIUS: f64 = 5.0;
pub const DEFAULT_COHESION_WEIGHT: f64 = 1.0;
pub const DEFAULT_ALIGNMENT_WEIGHT: f64 = 1.0;
pub const DEFAULT_SEPARATION_WEIGHT: f64 = 1.0;
pub const DEFAULT_FLOCK_SPEED: f64 = 5.0;
pub const DEFAULT_FLOCK_TURN_SPEED: f64 = 5.0;
/// Upper end of the slider range hosts expose for weights.
pub const MAX_UI_WEIGHT: f64 = 100.0;

/// How the alignment term reads neighbor velocities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlignmentMode {
    /// normalize(mean neighbor velocity): steer along the local heading.
    #[default]
    MeanVelocity,
    /// normalize(mean neighbor velocity - own velocity): seek relative velocity match.
    RelativeVelocity,
}

/// Per-agent blend of the three flocking rules. Live-updatable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringWeights {
    pub cohesion: f64,
    pub alignment: f64,
    pub separation: f64,
}

impl Default for SteeringWeights {
    fn default() -> Self {
        Self {
            cohesion: DEFAULT_COHESION_WEIGHT,
            alignment: DEFAULT_ALIGNMENT_WEIGHT,
            separation: DEFAULT_SEPARATION_WEIGHT,
        }
    }
}

impl SteeringWeights {
    pub fn new(cohesion: f64, alignment: f64, separation: f64) -> SimResult<Self> {
        let w = Self { cohesion, alignment, separation };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> SimResult<()> {
        ensure_non_negative("weights.cohesion", self.cohesion)?;
        ensure_non_negative("weights.alignment", self.alignment)?;
        ensure_non_negative("weights.separation", self.separation)
    }

    pub fn combine(&self, terms: &SteeringTerms) -> Vector3<f64> {
        terms.cohesion * self.cohesion
            + terms.alignment * self.alignment
            + terms.separation * self.separation
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockParams {
    /// Radius of the neighbor set used by every rule.
    pub neighbor_radius: f64,
    /// Separation only reacts to neighbors this close (capped at `neighbor_radius`).
    pub separation_radius: f64,
    pub alignment_mode: AlignmentMode,
    /// Weights given to newly spawned flock members.
    pub default_weights: SteeringWeights,
    pub speed: f64,
    /// Fraction of the remaining turn covered per second.
    pub turn_speed: f64,
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            neighbor_radius: DEFAULT_NEIGHBOR_RADIUS,
            separation_radius: DEFAULT_SEPARATION_RADIUS,
            alignment_mode: AlignmentMode::default(),
            default_weights: SteeringWeights::default(),
            speed: DEFAULT_FLOCK_SPEED,
            turn_speed: DEFAULT_FLOCK_TURN_SPEED,
        }
    }
}

impl FlockParams {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("flock.neighbor_radius", self.neighbor_radius)?;
        ensure_positive("flock.separation_radius", self.separation_radius)?;
        ensure_positive("flock.speed", self.speed)?;
        ensure_positive("flock.turn_speed", self.turn_speed)?;
        self.default_weights.validate()
    }
}

/// Unweighted rule vectors; each is unit length or exactly zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteeringTerms {
    pub cohesion: Vector3<f64>,
    pub alignment: Vector3<f64>,
    pub separation: Vector3<f64>,
}

impl SteeringTerms {
    pub fn zero() -> Self {
        Self {
            cohesion: Vector3::zeros(),
            alignment: Vector3::zeros(),
            separation: Vector3::zeros(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flocking {
    pub params: FlockParams,
}

impl Flocking {
    pub fn new(params: FlockParams) -> Self {
        Self { params }
    }

    /// Cohesion, alignment and separation for one agent.
    ///
    /// `neighbors` must already exclude the agent itself. Every term is guarded
    /// on its own count, so an empty separation set still leaves the other two.
    pub fn terms<'a, I>(&self, position: Vector3<f64>, velocity: Vector3<f64>, neighbors: I) -> SteeringTerms
    where
        I: IntoIterator<Item = &'a SnapshotEntry>,
    {
        let sep_r = self.params.separation_radius.min(self.params.neighbor_radius);
        let sep_r2 = sep_r * sep_r;

        let mut position_sum = Vector3::zeros();
        let mut velocity_sum = Vector3::zeros();
        let mut away_sum = Vector3::zeros();
        let mut count = 0usize;
        let mut close = 0usize;

        for n in neighbors {
            position_sum += n.position;
            velocity_sum += n.velocity;
            count += 1;
            let away = position - n.position;
            if away.norm_squared() <= sep_r2 {
                away_sum += away;
                close += 1;
            }
        }

        let mut terms = SteeringTerms::zero();
        if count > 0 {
            let inv = 1.0 / count as f64;
            terms.cohesion = normalize_or_zero(position_sum * inv - position);
            let mean_velocity = velocity_sum * inv;
            terms.alignment = match self.params.alignment_mode {
                AlignmentMode::MeanVelocity => normalize_or_zero(mean_velocity),
                AlignmentMode::RelativeVelocity => normalize_or_zero(mean_velocity - velocity),
            };
        }
        if close > 0 {
            terms.separation = normalize_or_zero(away_sum / close as f64);
        }
        terms
    }

    /// Weighted desired direction; zero means "keep the current heading".
    pub fn steer<'a, I>(
        &self,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
        neighbors: I,
        weights: &SteeringWeights,
    ) -> Vector3<f64>
    where
        I: IntoIterator<Item = &'a SnapshotEntry>,
    {
        weights.combine(&self.terms(position, velocity, neighbors))
    }
}
