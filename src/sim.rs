use crate::algorithms::flocking::{Flocking, SteeringWeights};
use crate::algorithms::obstacles::ObstacleField;
use crate::algorithms::pursuit;
use crate::algorithms::stuck_escape::{self, StuckPhase, StuckState};
use crate::config::{CatchPolicy, SimConfig};
use crate::error::{ensure_non_negative, ensure_positive, SimError, SimResult};
use crate::motion::AgentMotionState;
use crate::navigation::{Navigation, VolumeNavigation};
use crate::spatial::{SnapshotEntry, SpatialIndex};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace, warn};

new_key_type! {
    /// Stable handle of a spawned agent. Invalid once the agent is removed.
    pub struct AgentHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    FlockMember,
    Human,
    Zombie,
}

/// Spawn request. Unset overrides fall back to the per-kind params of the world.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub kind: AgentKind,
    pub position: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub speed: Option<f64>,
    pub turn_speed: Option<f64>,
    pub detection_range: Option<f64>,
    pub weights: Option<SteeringWeights>,
    /// Seconds the agent stays put after spawning.
    pub start_delay: f64,
}

impl AgentConfig {
    pub fn new(kind: AgentKind, position: Vector3<f64>) -> Self {
        Self {
            kind,
            position,
            orientation: UnitQuaternion::identity(),
            speed: None,
            turn_speed: None,
            detection_range: None,
            weights: None,
            start_delay: 0.0,
        }
    }

    pub fn facing(mut self, dir: Vector3<f64>) -> Self {
        let dir = crate::normalize_or_zero(dir);
        if dir != Vector3::zeros() {
            self.orientation = crate::motion::look_rotation(&dir);
        }
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_turn_speed(mut self, turn_speed: f64) -> Self {
        self.turn_speed = Some(turn_speed);
        self
    }

    pub fn with_detection_range(mut self, range: f64) -> Self {
        self.detection_range = Some(range);
        self
    }

    pub fn with_weights(mut self, weights: SteeringWeights) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_start_delay(mut self, seconds: f64) -> Self {
        self.start_delay = seconds;
        self
    }
}

#[derive(Debug, Clone)]
struct Agent {
    kind: AgentKind,
    motion: AgentMotionState,
    weights: SteeringWeights,
    detection_range: f64,
    threats: Vec<AgentHandle>,
    current_target: Option<AgentHandle>,
    destination: Option<Vector3<f64>>,
    stuck: StuckState,
    start_delay: f64,
}

/// Read-only view handed to renderers and tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentSnapshot {
    pub handle: AgentHandle,
    pub kind: AgentKind,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
    pub stuck: bool,
    pub target: Option<AgentHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchEvent {
    pub zombie: AgentHandle,
    pub human: AgentHandle,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub time: f64,
    pub catches: Vec<CatchEvent>,
    /// Humans that started a corner escape this tick.
    pub escapes: usize,
    pub removed: Vec<AgentHandle>,
}

#[derive(Debug, Clone, Default)]
struct NavPlan {
    destination: Option<Vector3<f64>>,
    target: Option<AgentHandle>,
    caught: Option<AgentHandle>,
    escaping: bool,
}

#[derive(Debug, Clone)]
enum Action {
    Wait,
    Steer(Vector3<f64>),
    Navigate(NavPlan),
}

#[derive(Debug, Clone)]
struct Plan {
    handle: AgentHandle,
    action: Action,
    stuck: Option<StuckState>,
}

/// Registry of agents plus the fixed-order tick.
///
/// Each tick first freezes every position into a [`SpatialIndex`] and plans all
/// agents against that snapshot, then applies the plans in handle order. No
/// plan ever observes a position written during the same tick.
pub struct World {
    config: SimConfig,
    agents: SlotMap<AgentHandle, Agent>,
    index: SpatialIndex,
    flocking: Flocking,
    navigation: Box<dyn Navigation>,
    time: f64,
    tick: u64,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("agents", &self.agents.len())
            .field("time", &self.time)
            .field("tick", &self.tick)
            .finish()
    }
}

impl World {
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let navigation = Box::new(VolumeNavigation::new(config.boundary, config.obstacles.clone()));
        Ok(Self {
            index: SpatialIndex::new(config.index),
            flocking: Flocking::new(config.flock.clone()),
            navigation,
            agents: SlotMap::with_key(),
            time: 0.0,
            tick: 0,
            config,
        })
    }

    /// Replace the destination sampler (e.g. with a host navmesh bridge).
    pub fn set_navigation<N: Navigation + 'static>(&mut self, navigation: N) {
        self.navigation = Box::new(navigation);
    }

    pub fn config(&self) -> &SimConfig { &self.config }

    pub fn len(&self) -> usize { self.agents.len() }

    pub fn is_empty(&self) -> bool { self.agents.is_empty() }

    pub fn time(&self) -> f64 { self.time }

    pub fn tick_count(&self) -> u64 { self.tick }

    pub fn contains(&self, handle: AgentHandle) -> bool {
        self.agents.contains_key(handle)
    }

    pub fn spawn(&mut self, cfg: AgentConfig) -> SimResult<AgentHandle> {
        let (speed, turn_speed, range) = match cfg.kind {
            AgentKind::FlockMember => (
                self.config.flock.speed,
                self.config.flock.turn_speed,
                self.config.flock.neighbor_radius,
            ),
            AgentKind::Human => (
                self.config.human.speed,
                self.config.human.turn_speed,
                self.config.human.detection_range,
            ),
            AgentKind::Zombie => (
                self.config.zombie.speed,
                self.config.zombie.turn_speed,
                self.config.zombie.detection_range,
            ),
        };
        let detection_range = cfg.detection_range.unwrap_or(range);
        ensure_positive("detection_range", detection_range)?;
        ensure_non_negative("start_delay", cfg.start_delay)?;
        let weights = cfg.weights.unwrap_or(self.config.flock.default_weights);
        weights.validate()?;
        ensure_finite_position(&cfg.position)?;

        let mut motion = AgentMotionState::new(
            cfg.position,
            cfg.orientation,
            cfg.speed.unwrap_or(speed),
            cfg.turn_speed.unwrap_or(turn_speed),
        )?;
        if cfg.kind == AgentKind::FlockMember && cfg.start_delay == 0.0 {
            motion.velocity = motion.forward() * motion.speed();
        }

        let handle = self.agents.insert(Agent {
            kind: cfg.kind,
            stuck: StuckState::new(cfg.position),
            motion,
            weights,
            detection_range,
            threats: Vec::new(),
            current_target: None,
            destination: None,
            start_delay: cfg.start_delay,
        });
        debug!(?handle, kind = ?cfg.kind, "spawned agent");
        Ok(handle)
    }

    /// Remove an agent. Other agents' threat lists keep the stale handle; it is
    /// skipped by every later query.
    pub fn remove(&mut self, handle: AgentHandle) -> bool {
        let removed = self.agents.remove(handle).is_some();
        if removed {
            debug!(?handle, "removed agent");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn set_weights(&mut self, handle: AgentHandle, weights: SteeringWeights) -> SimResult<()> {
        weights.validate()?;
        let agent = self
            .agents
            .get_mut(handle)
            .ok_or(SimError::UnknownAgent(handle))?;
        agent.weights = weights;
        Ok(())
    }

    /// Apply one set of weights to every flock member; returns how many changed.
    pub fn set_flock_weights(&mut self, weights: SteeringWeights) -> SimResult<usize> {
        weights.validate()?;
        let mut changed = 0;
        for agent in self.agents.values_mut().filter(|a| a.kind == AgentKind::FlockMember) {
            agent.weights = weights;
            changed += 1;
        }
        self.config.flock.default_weights = weights;
        debug!(changed, ?weights, "updated flock weights");
        Ok(changed)
    }

    /// Replace an agent's threat (or target) list. The owner's own handle is dropped.
    pub fn set_threat_list(&mut self, handle: AgentHandle, threats: &[AgentHandle]) -> SimResult<()> {
        let agent = self
            .agents
            .get_mut(handle)
            .ok_or(SimError::UnknownAgent(handle))?;
        if threats.contains(&handle) {
            warn!(?handle, "threat list contained its owner; dropping it");
        }
        agent.threats.clear();
        agent
            .threats
            .extend(threats.iter().copied().filter(|&h| h != handle));
        agent.current_target = None;
        debug!(?handle, count = agent.threats.len(), "replaced threat list");
        Ok(())
    }

    pub fn threat_list(&self, handle: AgentHandle) -> Option<&[AgentHandle]> {
        self.agents.get(handle).map(|a| a.threats.as_slice())
    }

    pub fn weights(&self, handle: AgentHandle) -> Option<SteeringWeights> {
        self.agents.get(handle).map(|a| a.weights)
    }

    pub fn destination(&self, handle: AgentHandle) -> Option<Vector3<f64>> {
        self.agents.get(handle).and_then(|a| a.destination)
    }

    pub fn stuck_phase(&self, handle: AgentHandle) -> Option<StuckPhase> {
        self.agents.get(handle).map(|a| a.stuck.phase)
    }

    /// Move an agent without simulating (host-driven resets).
    pub fn set_transform(
        &mut self,
        handle: AgentHandle,
        position: Vector3<f64>,
        orientation: UnitQuaternion<f64>,
    ) -> SimResult<()> {
        ensure_finite_position(&position)?;
        let agent = self
            .agents
            .get_mut(handle)
            .ok_or(SimError::UnknownAgent(handle))?;
        agent.motion.position = position;
        agent.motion.orientation = orientation;
        agent.stuck = StuckState::new(position);
        agent.destination = None;
        Ok(())
    }

    pub fn snapshot(&self, handle: AgentHandle) -> Option<AgentSnapshot> {
        self.agents.get(handle).map(|a| snapshot_of(handle, a))
    }

    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.agents.iter().map(|(h, a)| snapshot_of(h, a)).collect()
    }

    pub fn handles_of(&self, kind: AgentKind) -> Vec<AgentHandle> {
        self.agents
            .iter()
            .filter(|(_, a)| a.kind == kind)
            .map(|(h, _)| h)
            .collect()
    }

    /// Advance by the configured fixed step.
    pub fn step(&mut self) -> TickReport {
        self.tick(self.config.dt)
    }

    /// Advance every agent by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickReport {
        if !(dt.is_finite() && dt > 0.0) {
            warn!(dt, "ignoring tick with non-positive step");
            return TickReport { tick: self.tick, time: self.time, ..TickReport::default() };
        }

        self.index.rebuild(self.agents.iter().map(|(handle, a)| SnapshotEntry {
            handle,
            kind: a.kind,
            position: a.motion.position,
            velocity: a.motion.velocity,
        }));

        let plans = self.plan_all(dt);
        let mut report = TickReport::default();

        for plan in plans {
            let Some(agent) = self.agents.get_mut(plan.handle) else {
                continue;
            };
            if let Some(stuck) = plan.stuck {
                agent.stuck = stuck;
            }
            match plan.action {
                Action::Wait => {
                    agent.start_delay = (agent.start_delay - dt).max(0.0);
                    agent.motion.hold();
                }
                Action::Steer(desired) => agent.motion.advance(desired, dt),
                Action::Navigate(nav) => {
                    if agent.kind == AgentKind::Zombie {
                        agent.current_target = nav.target;
                    }
                    if let Some(dest) = nav.destination {
                        agent.destination = Some(dest);
                    }
                    if nav.escaping {
                        report.escapes += 1;
                        debug!(handle = ?plan.handle, destination = ?nav.destination, "human escaping from corner");
                    }
                    if let Some(human) = nav.caught {
                        debug!(zombie = ?plan.handle, ?human, "human caught by zombie");
                        report.catches.push(CatchEvent { zombie: plan.handle, human });
                    }
                    walk(agent, dt);
                }
            }
            agent.motion.position = self.config.boundary.wrap(agent.motion.position);
        }

        if self.config.catch_policy == CatchPolicy::Remove {
            for event in &report.catches {
                if self.agents.get(event.human).is_some_and(|a| a.kind == AgentKind::Human)
                    && self.remove(event.human)
                {
                    report.removed.push(event.human);
                }
            }
        }

        self.time += dt;
        self.tick += 1;
        report.tick = self.tick;
        report.time = self.time;
        trace!(
            tick = self.tick,
            agents = self.agents.len(),
            catches = report.catches.len(),
            escapes = report.escapes,
            "tick complete"
        );
        report
    }

    #[cfg(not(feature = "parallel"))]
    fn plan_all(&self, dt: f64) -> Vec<Plan> {
        self.agents
            .iter()
            .map(|(handle, agent)| self.plan(handle, agent, dt))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn plan_all(&self, dt: f64) -> Vec<Plan> {
        use rayon::prelude::*;
        let handles: Vec<AgentHandle> = self.agents.keys().collect();
        handles
            .par_iter()
            .map(|&handle| self.plan(handle, &self.agents[handle], dt))
            .collect()
    }

    fn plan(&self, handle: AgentHandle, agent: &Agent, dt: f64) -> Plan {
        if agent.start_delay > 0.0 {
            return Plan { handle, action: Action::Wait, stuck: None };
        }
        match agent.kind {
            AgentKind::FlockMember => {
                let pos = agent.motion.position;
                let neighbors = self.index.neighbors(
                    &pos,
                    self.flocking.params.neighbor_radius,
                    Some(handle),
                    Some(AgentKind::FlockMember),
                );
                let desired = self
                    .flocking
                    .steer(pos, agent.motion.velocity, neighbors, &agent.weights);
                Plan { handle, action: Action::Steer(desired), stuck: None }
            }
            AgentKind::Human => self.plan_human(handle, agent, dt),
            AgentKind::Zombie => self.plan_zombie(handle, agent),
        }
    }

    fn plan_human(&self, handle: AgentHandle, agent: &Agent, dt: f64) -> Plan {
        let pos = agent.motion.position;
        let t = self.time;
        let params = &self.config.stuck;
        let obstacles: &dyn ObstacleField = &self.config.obstacles;

        let mut stuck = agent.stuck;
        stuck.observe(pos, dt, params, || stuck_escape::in_corner(obstacles, &pos, params, t));

        let threat = pursuit::closest(pos, &agent.threats, agent.detection_range, |h| {
            self.index.position_of(h)
        });

        let mut nav = NavPlan::default();
        if let Some(threat) = threat {
            if stuck.is_stuck() {
                let escape = stuck_escape::escape_direction(obstacles, &pos, params, t)
                    .map(|dir| pos + dir * params.escape_distance)
                    .and_then(|goal| self.navigation.sample(goal, params.escape_distance, t));
                if let Some(dest) = escape {
                    nav.destination = Some(dest);
                    nav.escaping = true;
                }
            }
            if !nav.escaping {
                let run_to = pursuit::flee_point(pos, threat.position, self.config.human.flee_distance);
                nav.destination = self
                    .navigation
                    .sample(run_to, self.config.human.nav_sample_radius, t);
            }
        }

        Plan { handle, action: Action::Navigate(nav), stuck: Some(stuck) }
    }

    fn plan_zombie(&self, handle: AgentHandle, agent: &Agent) -> Plan {
        let pos = agent.motion.position;
        let retained = agent
            .current_target
            .filter(|h| agent.threats.contains(h))
            .and_then(|h| self.index.position_of(h).map(|p| (h, p)));
        let target = retained.or_else(|| {
            pursuit::closest(pos, &agent.threats, agent.detection_range, |h| {
                self.index.position_of(h)
            })
            .map(|t| (t.handle, t.position))
        });

        let mut nav = NavPlan::default();
        if let Some((human, at)) = target {
            nav.target = Some(human);
            nav.destination = Some(at);
            if pursuit::within_catch(pos, at, self.config.zombie.catch_distance) {
                nav.caught = Some(human);
            }
        }
        Plan { handle, action: Action::Navigate(nav), stuck: None }
    }
}

fn ensure_finite_position(p: &Vector3<f64>) -> SimResult<()> {
    if p.iter().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(SimError::InvalidConfig { field: "position", reason: "must be finite" })
    }
}

/// Head for the current destination; stop on arrival.
fn walk(agent: &mut Agent, dt: f64) {
    let Some(dest) = agent.destination else {
        agent.motion.hold();
        return;
    };
    let to = dest - agent.motion.position;
    if to.norm() <= agent.motion.speed() * dt {
        agent.motion.arrive_at(dest);
        agent.destination = None;
    } else {
        agent.motion.advance(to, dt);
    }
}

fn snapshot_of(handle: AgentHandle, a: &Agent) -> AgentSnapshot {
    AgentSnapshot {
        handle,
        kind: a.kind,
        position: a.motion.position,
        velocity: a.motion.velocity,
        orientation: a.motion.orientation,
        stuck: a.stuck.is_stuck(),
        target: a.current_target,
    }
}
