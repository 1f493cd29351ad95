use rswarm::algorithms::obstacles::demo_obstacles;
use rswarm::config::CatchPolicy;
use rswarm::engine::{Engine, SCENARIO_OUTBREAK};
use rswarm::{SimConfig, SimResult};
use tracing::{info, warn};

const DEMO_SECONDS: f64 = 30.0;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        warn!(%err, "demo aborted");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn run() -> SimResult<()> {
    let config = SimConfig {
        obstacles: demo_obstacles(),
        catch_policy: CatchPolicy::Remove,
        ..SimConfig::default()
    };
    let mut engine = Engine::new_builtin(SCENARIO_OUTBREAK, config)?;
    info!(agents = engine.len(), dt = engine.dt(), "starting outbreak demo");

    let steps = (DEMO_SECONDS / engine.dt()).round() as u64;
    let mut catches = 0;
    let mut escapes = 0;
    for _ in 0..steps {
        let report = engine.step();
        catches += report.catches.len();
        escapes += report.escapes;
        if !report.removed.is_empty() {
            info!(
                time = report.time,
                left = engine.humans().len(),
                "humans caught"
            );
        }
        if engine.humans().is_empty() {
            info!(time = report.time, "no humans left");
            break;
        }
    }

    println!("t = {:.2} s", engine.world().time());
    println!("humans left = {}", engine.humans().len());
    println!("catches = {catches}, escapes = {escapes}");
    let positions = engine.positions_flat();
    println!("first agent at {:?}", positions.get(..3));
    Ok(())
}
