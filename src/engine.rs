use crate::algorithms::flocking::SteeringWeights;
use crate::algorithms::obstacles::ObstacleField;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::models::agents::{
    flock_configs, ground_config, DEMO_FLOCK_COUNT, DEMO_HUMAN_COUNT, DEMO_SPAWN_RADIUS,
    DEMO_ZOMBIE_COUNT,
};
use crate::sim::{AgentConfig, AgentHandle, AgentKind, AgentSnapshot, TickReport, World};
use nalgebra::Vector3;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{debug, info};

pub const SCENARIO_BIRD_FLOCK: &str = "bird-flock";
pub const SCENARIO_OUTBREAK: &str = "outbreak";

pub struct ScenarioInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub flock: usize,
    pub humans: usize,
    pub zombies: usize,
}

pub fn scenario_catalog() -> &'static [ScenarioInfo] {
    &[
        ScenarioInfo {
            id: SCENARIO_BIRD_FLOCK,
            name: "Bird flock",
            description: "Boids with cohesion, alignment and separation inside a wrapping volume.",
            flock: DEMO_FLOCK_COUNT,
            humans: 0,
            zombies: 0,
        },
        ScenarioInfo {
            id: SCENARIO_OUTBREAK,
            name: "Outbreak",
            description: "Humans flee zombies on the ground while a flock circles overhead.",
            flock: DEMO_FLOCK_COUNT,
            humans: DEMO_HUMAN_COUNT,
            zombies: DEMO_ZOMBIE_COUNT,
        },
    ]
}

/// Agent code used by the flat presentation buffers.
pub fn kind_code(kind: AgentKind) -> u32 {
    match kind {
        AgentKind::FlockMember => 0,
        AgentKind::Human => 1,
        AgentKind::Zombie => 2,
    }
}

/// A [`World`] plus the spawn bookkeeping of one built-in scenario.
///
/// Populations are tracked in spawn order so that shrinking always removes the
/// most recently spawned agents, and every population change re-issues the
/// human/zombie threat lists.
pub struct Engine {
    scenario_id: &'static str,
    world: World,
    rng: SmallRng,
    flock: Vec<AgentHandle>,
    humans: Vec<AgentHandle>,
    zombies: Vec<AgentHandle>,
    flock_origin: Vector3<f64>,
    spawn_center: Vector3<f64>,
    spawn_radius: f64,
}

impl Engine {
    pub fn new_builtin(scenario_id: &str, config: SimConfig) -> SimResult<Self> {
        let scenario_id = normalize_scenario_id(scenario_id)
            .ok_or_else(|| SimError::UnknownScenario(scenario_id.to_string()))?;
        let info = scenario_info(scenario_id)
            .ok_or_else(|| SimError::UnknownScenario(scenario_id.to_string()))?;

        let min = config.boundary.min_corner();
        let max = config.boundary.max_corner();
        let mid = (min + max) * 0.5;
        let rng = SmallRng::seed_from_u64(config.seed);
        let mut engine = Self {
            scenario_id,
            world: World::new(config)?,
            rng,
            flock: Vec::new(),
            humans: Vec::new(),
            zombies: Vec::new(),
            flock_origin: Vector3::new(mid.x, min.y, mid.z),
            spawn_center: Vector3::new(mid.x, min.y, mid.z),
            spawn_radius: DEMO_SPAWN_RADIUS,
        };
        engine.set_flock_size(info.flock)?;
        engine.set_population(info.humans, info.zombies)?;
        info!(
            scenario = scenario_id,
            flock = engine.flock.len(),
            humans = engine.humans.len(),
            zombies = engine.zombies.len(),
            "built scenario"
        );
        Ok(engine)
    }

    pub fn scenario_id(&self) -> &'static str { self.scenario_id }

    pub fn world(&self) -> &World { &self.world }

    pub fn world_mut(&mut self) -> &mut World { &mut self.world }

    pub fn len(&self) -> usize { self.world.len() }

    pub fn is_empty(&self) -> bool { self.world.is_empty() }

    pub fn dt(&self) -> f64 { self.world.config().dt }

    pub fn flock(&self) -> &[AgentHandle] { &self.flock }

    pub fn humans(&self) -> &[AgentHandle] { &self.humans }

    pub fn zombies(&self) -> &[AgentHandle] { &self.zombies }

    pub fn spawn_radius(&self) -> f64 { self.spawn_radius }

    pub fn set_spawn_radius(&mut self, radius: f64) -> SimResult<()> {
        crate::error::ensure_positive("spawn_radius", radius)?;
        self.spawn_radius = radius;
        Ok(())
    }

    /// Grow or shrink the flock to `count` members.
    pub fn set_flock_size(&mut self, count: usize) -> SimResult<()> {
        if count > self.flock.len() {
            let configs = flock_configs(count - self.flock.len(), self.flock_origin, &mut self.rng);
            for cfg in configs {
                let handle = self.world.spawn(cfg)?;
                self.flock.push(handle);
            }
        } else {
            for handle in self.flock.drain(count..) {
                self.world.remove(handle);
            }
        }
        debug!(flock = self.flock.len(), "flock resized");
        Ok(())
    }

    /// Grow or shrink the ground populations, then re-issue threat lists.
    pub fn set_population(&mut self, humans: usize, zombies: usize) -> SimResult<()> {
        self.resize_ground(AgentKind::Human, humans)?;
        self.resize_ground(AgentKind::Zombie, zombies)?;
        self.refresh_threat_lists()?;
        debug!(humans = self.humans.len(), zombies = self.zombies.len(), "population resized");
        Ok(())
    }

    /// Every zombie hunts every human; every human watches every zombie.
    pub fn refresh_threat_lists(&mut self) -> SimResult<()> {
        for &zombie in &self.zombies {
            self.world.set_threat_list(zombie, &self.humans)?;
        }
        for &human in &self.humans {
            self.world.set_threat_list(human, &self.zombies)?;
        }
        Ok(())
    }

    pub fn set_flock_weights(&mut self, weights: SteeringWeights) -> SimResult<usize> {
        self.world.set_flock_weights(weights)
    }

    /// Remove every spawned agent.
    pub fn reset(&mut self) {
        self.world.clear();
        self.flock.clear();
        self.humans.clear();
        self.zombies.clear();
        info!(scenario = self.scenario_id, "scenario reset");
    }

    pub fn step(&mut self) -> TickReport {
        let report = self.world.step();
        if !report.removed.is_empty() {
            self.humans.retain(|h| !report.removed.contains(h));
            for &zombie in &self.zombies {
                if let Err(err) = self.world.set_threat_list(zombie, &self.humans) {
                    debug!(%err, "skipping threat refresh");
                }
            }
        }
        report
    }

    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.world.snapshots()
    }

    pub fn positions_flat(&self) -> Vec<f32> {
        let snapshots = self.world.snapshots();
        let mut out = Vec::with_capacity(snapshots.len() * 3);
        for s in snapshots {
            out.push(s.position.x as f32);
            out.push(s.position.y as f32);
            out.push(s.position.z as f32);
        }
        out
    }

    pub fn velocities_flat(&self) -> Vec<f32> {
        let snapshots = self.world.snapshots();
        let mut out = Vec::with_capacity(snapshots.len() * 3);
        for s in snapshots {
            out.push(s.velocity.x as f32);
            out.push(s.velocity.y as f32);
            out.push(s.velocity.z as f32);
        }
        out
    }

    /// Quaternions as `[x, y, z, w]` per agent.
    pub fn orientations_flat(&self) -> Vec<f32> {
        let snapshots = self.world.snapshots();
        let mut out = Vec::with_capacity(snapshots.len() * 4);
        for s in snapshots {
            let q = s.orientation.quaternion();
            out.push(q.i as f32);
            out.push(q.j as f32);
            out.push(q.k as f32);
            out.push(q.w as f32);
        }
        out
    }

    pub fn kinds_flat(&self) -> Vec<u32> {
        self.world.snapshots().iter().map(|s| kind_code(s.kind)).collect()
    }

    pub fn stuck_flags(&self) -> Vec<u32> {
        self.world.snapshots().iter().map(|s| u32::from(s.stuck)).collect()
    }

    fn resize_ground(&mut self, kind: AgentKind, count: usize) -> SimResult<()> {
        let current = match kind {
            AgentKind::Human => self.humans.len(),
            AgentKind::Zombie => self.zombies.len(),
            AgentKind::FlockMember => return Ok(()),
        };
        if count < current {
            let list = self.list_mut(kind);
            let dropped: Vec<AgentHandle> = list.drain(count..).collect();
            for handle in dropped {
                self.world.remove(handle);
            }
            return Ok(());
        }
        for _ in current..count {
            let cfg = self.ground_spawn(kind);
            let handle = self.world.spawn(cfg)?;
            self.list_mut(kind).push(handle);
        }
        Ok(())
    }

    fn ground_spawn(&mut self, kind: AgentKind) -> AgentConfig {
        let mut cfg = ground_config(kind, self.spawn_center, self.spawn_radius, &mut self.rng);
        let obstacles = &self.world.config().obstacles;
        if let Some(out) = obstacles.push_out(&cfg.position, self.world.time()) {
            cfg.position = self.world.config().boundary.clamp(out);
        }
        cfg
    }

    fn list_mut(&mut self, kind: AgentKind) -> &mut Vec<AgentHandle> {
        match kind {
            AgentKind::Human => &mut self.humans,
            AgentKind::Zombie => &mut self.zombies,
            AgentKind::FlockMember => &mut self.flock,
        }
    }
}

fn normalize_scenario_id(id: &str) -> Option<&'static str> {
    match id.trim().to_ascii_lowercase().as_str() {
        SCENARIO_BIRD_FLOCK | "boids" => Some(SCENARIO_BIRD_FLOCK),
        SCENARIO_OUTBREAK | "zombies" => Some(SCENARIO_OUTBREAK),
        _ => None,
    }
}

fn scenario_info(id: &str) -> Option<&'static ScenarioInfo> {
    scenario_catalog().iter().find(|s| s.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbreak() -> Engine {
        Engine::new_builtin(SCENARIO_OUTBREAK, SimConfig::default()).expect("builtin")
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        assert_eq!(
            Engine::new_builtin("mars", SimConfig::default()).err(),
            Some(SimError::UnknownScenario("mars".to_string()))
        );
    }

    #[test]
    fn catalog_ids_build() {
        for info in scenario_catalog() {
            let engine = Engine::new_builtin(info.id, SimConfig::default()).expect("builtin");
            assert_eq!(engine.len(), info.flock + info.humans + info.zombies);
        }
        assert!(Engine::new_builtin(" Boids ", SimConfig::default()).is_ok());
    }

    #[test]
    fn threat_lists_pair_the_populations() {
        let engine = outbreak();
        for &z in engine.zombies() {
            assert_eq!(engine.world().threat_list(z), Some(engine.humans()));
        }
        for &h in engine.humans() {
            assert_eq!(engine.world().threat_list(h), Some(engine.zombies()));
        }
    }

    #[test]
    fn shrinking_removes_the_newest() {
        let mut engine = outbreak();
        let keep = engine.humans()[..2].to_vec();
        let gone = engine.humans()[2..].to_vec();
        engine.set_population(2, 1).expect("resize");
        assert_eq!(engine.humans(), &keep[..]);
        assert!(gone.iter().all(|&h| !engine.world().contains(h)));
        assert_eq!(engine.zombies().len(), 1);
        assert_eq!(engine.world().threat_list(engine.zombies()[0]), Some(&keep[..]));

        engine.set_flock_size(5).expect("resize");
        assert_eq!(engine.flock().len(), 5);
        assert_eq!(engine.len(), 5 + 2 + 1);
    }

    #[test]
    fn spawn_radius_bounds_new_ground_agents() {
        let mut engine = Engine::new_builtin(SCENARIO_BIRD_FLOCK, SimConfig::default()).expect("builtin");
        assert!(engine.set_spawn_radius(0.0).is_err());
        assert_eq!(engine.spawn_radius(), DEMO_SPAWN_RADIUS);
        engine.set_spawn_radius(2.0).expect("positive");
        engine.set_population(10, 3).expect("grow");
        let b = &engine.world().config().boundary;
        let mid = (b.min_corner() + b.max_corner()) * 0.5;
        for &h in engine.humans().iter().chain(engine.zombies()) {
            let p = engine.world().snapshot(h).expect("alive").position;
            assert!(Vector3::new(p.x - mid.x, 0.0, p.z - mid.z).norm() <= 2.0 + 1.0e-9);
        }
    }

    #[test]
    fn reset_clears_everything() {
        let mut engine = outbreak();
        engine.step();
        engine.reset();
        assert!(engine.is_empty());
        assert!(engine.positions_flat().is_empty());
        engine.set_population(1, 1).expect("respawn");
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn flat_buffers_line_up() {
        let engine = outbreak();
        let n = engine.len();
        assert_eq!(engine.positions_flat().len(), n * 3);
        assert_eq!(engine.velocities_flat().len(), n * 3);
        assert_eq!(engine.orientations_flat().len(), n * 4);
        assert_eq!(engine.kinds_flat().len(), n);
        assert_eq!(engine.stuck_flags().len(), n);
        let zombies = engine.kinds_flat().iter().filter(|&&k| k == 2).count();
        assert_eq!(zombies, DEMO_ZOMBIE_COUNT);
    }

    #[test]
    fn same_seed_same_run() {
        let mut a = outbreak();
        let mut b = outbreak();
        for _ in 0..30 {
            a.step();
            b.step();
        }
        assert_eq!(a.positions_flat(), b.positions_flat());
    }
}
