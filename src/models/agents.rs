use crate::motion::heading_from_direction;
use crate::normalize_or_zero;
use crate::sim::{AgentConfig, AgentKind};
use nalgebra::Vector3;
use rand::Rng;

pub const DEMO_FLOCK_COUNT: usize = 40;
pub const DEMO_HUMAN_COUNT: usize = 6;
pub const DEMO_ZOMBIE_COUNT: usize = 2;
pub const DEMO_SPAWN_RADIUS: f64 = 10.0;

/// Box flock members appear in, relative to the flock origin.
pub const FLOCK_SPAWN_MIN: [f64; 3] = [-5.0, 0.5, -5.0];
pub const FLOCK_SPAWN_MAX: [f64; 3] = [5.0, 5.0, 5.0];

/// Uniform point inside the flock spawn box around `origin`.
pub fn flock_spawn_position<R: Rng>(origin: Vector3<f64>, rng: &mut R) -> Vector3<f64> {
    origin
        + Vector3::new(
            rng.gen_range(FLOCK_SPAWN_MIN[0]..=FLOCK_SPAWN_MAX[0]),
            rng.gen_range(FLOCK_SPAWN_MIN[1]..=FLOCK_SPAWN_MAX[1]),
            rng.gen_range(FLOCK_SPAWN_MIN[2]..=FLOCK_SPAWN_MAX[2]),
        )
}

/// Random heading drawn from the unit cube; re-draws the (unlikely) zero vector.
pub fn random_direction<R: Rng>(rng: &mut R) -> Vector3<f64> {
    loop {
        let v = normalize_or_zero(Vector3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        ));
        if v != Vector3::zeros() {
            return v;
        }
    }
}

/// Uniform point on the disc of `radius` around `center`, at the centre's height.
pub fn disc_position<R: Rng>(center: Vector3<f64>, radius: f64, rng: &mut R) -> Vector3<f64> {
    let r = radius * rng.gen_range(0.0_f64..=1.0).sqrt();
    let a = rng.gen_range(0.0..std::f64::consts::TAU);
    center + Vector3::new(r * a.cos(), 0.0, r * a.sin())
}

pub fn flock_configs<R: Rng>(count: usize, origin: Vector3<f64>, rng: &mut R) -> Vec<AgentConfig> {
    (0..count)
        .map(|_| {
            AgentConfig::new(AgentKind::FlockMember, flock_spawn_position(origin, rng))
                .facing(random_direction(rng))
        })
        .collect()
}

/// Ground agent of `kind` on the spawn disc with a random yaw.
pub fn ground_config<R: Rng>(kind: AgentKind, center: Vector3<f64>, radius: f64, rng: &mut R) -> AgentConfig {
    let mut cfg = AgentConfig::new(kind, disc_position(center, radius, rng));
    cfg.orientation = heading_from_direction(&random_direction(rng));
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn flock_spawns_inside_the_box() {
        let mut rng = SmallRng::seed_from_u64(7);
        let origin = Vector3::new(0.0, 10.0, 0.0);
        for cfg in flock_configs(100, origin, &mut rng) {
            let local = cfg.position - origin;
            for a in 0..3 {
                assert!(local[a] >= FLOCK_SPAWN_MIN[a] && local[a] <= FLOCK_SPAWN_MAX[a]);
            }
            assert_eq!(cfg.kind, AgentKind::FlockMember);
        }
    }

    #[test]
    fn disc_positions_stay_on_the_disc() {
        let mut rng = SmallRng::seed_from_u64(11);
        let center = Vector3::new(3.0, 0.0, -2.0);
        for _ in 0..200 {
            let p = disc_position(center, 10.0, &mut rng);
            assert_eq!(p.y, 0.0);
            assert!((p - center).norm() <= 10.0 + 1.0e-9);
        }
    }

    #[test]
    fn ground_agents_spawn_on_the_disc_and_only_yaw() {
        let mut rng = SmallRng::seed_from_u64(3);
        for kind in [AgentKind::Human, AgentKind::Zombie] {
            for _ in 0..20 {
                let c = ground_config(kind, Vector3::zeros(), 8.0, &mut rng);
                assert_eq!(c.kind, kind);
                assert!(c.position.norm() <= 8.0 + 1.0e-9);
                let f = c.orientation * Vector3::z();
                assert!(f.y.abs() < 1.0e-9);
            }
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let a = flock_configs(10, Vector3::zeros(), &mut SmallRng::seed_from_u64(42));
        let b = flock_configs(10, Vector3::zeros(), &mut SmallRng::seed_from_u64(42));
        let pa: Vec<_> = a.iter().map(|c| c.position).collect();
        let pb: Vec<_> = b.iter().map(|c| c.position).collect();
        assert_eq!(pa, pb);
    }
}
