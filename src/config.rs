use crate::algorithms::flocking::FlockParams;
use crate::algorithms::obstacles::ObstacleSet;
use crate::algorithms::pursuit::{HumanParams, ZombieParams};
use crate::algorithms::stuck_escape::StuckParams;
use crate::boundary::BoundaryVolume;
use crate::error::{ensure_positive, SimResult};
use crate::spatial::IndexStrategy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_DT: f64 = 1.0 / 60.0;
pub const DEFAULT_SEED: u64 = 0x5EED_B01D_2024_0001;

/// What happens to a human once a zombie reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CatchPolicy {
    /// Report the catch; the human keeps running.
    #[default]
    Report,
    /// Report and remove the human at the end of the tick.
    Remove,
}

/// Full static configuration of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Fixed step used by [`crate::World::step`].
    pub dt: f64,
    pub seed: u64,
    pub boundary: BoundaryVolume,
    pub index: IndexStrategy,
    pub obstacles: ObstacleSet,
    pub flock: FlockParams,
    pub human: HumanParams,
    pub zombie: ZombieParams,
    pub stuck: StuckParams,
    pub catch_policy: CatchPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            seed: DEFAULT_SEED,
            boundary: BoundaryVolume::default(),
            index: IndexStrategy::default(),
            obstacles: ObstacleSet::default(),
            flock: FlockParams::default(),
            human: HumanParams::default(),
            zombie: ZombieParams::default(),
            stuck: StuckParams::default(),
            catch_policy: CatchPolicy::default(),
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> SimResult<()> {
        ensure_positive("dt", self.dt)?;
        self.boundary.validate()?;
        self.index.validate()?;
        self.obstacles.validate()?;
        self.flock.validate()?;
        self.human.validate()?;
        self.zombie.validate()?;
        self.stuck.validate()
    }
}
