#![cfg(target_arch = "wasm32")]

use crate::algorithms::flocking::{FlockParams, SteeringWeights};
use crate::algorithms::pursuit::{HumanParams, ZombieParams};
use crate::algorithms::stuck_escape::StuckParams;
use crate::config::SimConfig;
use crate::engine::{scenario_catalog, Engine, ScenarioInfo, SCENARIO_BIRD_FLOCK};
use crate::error::SimError;
use crate::sim::TickReport;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn available_scenarios() -> js_sys::Array {
    let out = js_sys::Array::new();
    for info in scenario_catalog() {
        out.push(&scenario_info_to_js(info));
    }
    out
}

#[wasm_bindgen]
pub fn config_defaults() -> JsValue {
    serde_wasm_bindgen::to_value(&SimConfig::default()).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn flocking_defaults() -> JsValue {
    serde_wasm_bindgen::to_value(&FlockParams::default()).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn human_defaults() -> JsValue {
    serde_wasm_bindgen::to_value(&HumanParams::default()).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn zombie_defaults() -> JsValue {
    serde_wasm_bindgen::to_value(&ZombieParams::default()).unwrap_or(JsValue::NULL)
}

#[wasm_bindgen]
pub fn stuck_defaults() -> JsValue {
    serde_wasm_bindgen::to_value(&StuckParams::default()).unwrap_or(JsValue::NULL)
}

fn scenario_info_to_js(info: &ScenarioInfo) -> JsValue {
    let obj = js_sys::Object::new();
    let _ = js_sys::Reflect::set(&obj, &JsValue::from_str("id"), &JsValue::from_str(info.id));
    let _ = js_sys::Reflect::set(&obj, &JsValue::from_str("name"), &JsValue::from_str(info.name));
    let _ = js_sys::Reflect::set(
        &obj,
        &JsValue::from_str("description"),
        &JsValue::from_str(info.description),
    );
    let _ = js_sys::Reflect::set(&obj, &JsValue::from_str("flock"), &JsValue::from(info.flock as u32));
    let _ = js_sys::Reflect::set(&obj, &JsValue::from_str("humans"), &JsValue::from(info.humans as u32));
    let _ = js_sys::Reflect::set(&obj, &JsValue::from_str("zombies"), &JsValue::from(info.zombies as u32));
    JsValue::from(obj)
}

fn to_js(err: SimError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[wasm_bindgen]
pub struct WasmSim {
    engine: Engine,
    last: TickReport,
}

#[wasm_bindgen]
impl WasmSim {
    #[wasm_bindgen(constructor)]
    pub fn new(scenario_id: &str) -> Result<WasmSim, JsValue> {
        let engine = Engine::new_builtin(scenario_id, SimConfig::default()).map_err(to_js)?;
        Ok(WasmSim { engine, last: TickReport::default() })
    }

    pub fn new_demo() -> Result<WasmSim, JsValue> {
        WasmSim::new(SCENARIO_BIRD_FLOCK)
    }

    /// Build a scenario from a partial [`SimConfig`] object; missing fields take
    /// their defaults, e.g. `{ dt: 0.02, flock: { alignment_mode: "relative-velocity" } }`.
    #[wasm_bindgen(js_name = "newFromConfig")]
    pub fn new_from_config(scenario_id: &str, config: JsValue) -> Result<WasmSim, JsValue> {
        let cfg: SimConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("invalid config: {}", e)))?;
        let engine = Engine::new_builtin(scenario_id, cfg).map_err(to_js)?;
        Ok(WasmSim { engine, last: TickReport::default() })
    }

    pub fn len(&self) -> usize { self.engine.len() }

    pub fn dt(&self) -> f64 { self.engine.dt() }

    pub fn time(&self) -> f64 { self.engine.world().time() }

    pub fn step(&mut self) {
        self.last = self.engine.step();
    }

    /// Catches reported by the last step.
    pub fn last_catches(&self) -> usize { self.last.catches.len() }

    pub fn last_escapes(&self) -> usize { self.last.escapes }

    pub fn set_flock_weights(&mut self, cohesion: f64, alignment: f64, separation: f64) -> Result<(), JsValue> {
        let weights = SteeringWeights::new(cohesion, alignment, separation).map_err(to_js)?;
        self.engine.set_flock_weights(weights).map_err(to_js)?;
        Ok(())
    }

    pub fn set_population(&mut self, humans: usize, zombies: usize) -> Result<(), JsValue> {
        self.engine.set_population(humans, zombies).map_err(to_js)
    }

    pub fn set_spawn_radius(&mut self, radius: f64) -> Result<(), JsValue> {
        self.engine.set_spawn_radius(radius).map_err(to_js)
    }

    pub fn set_flock_size(&mut self, count: usize) -> Result<(), JsValue> {
        self.engine.set_flock_size(count).map_err(to_js)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.last = TickReport::default();
    }

    pub fn positions(&self) -> Vec<f32> { self.engine.positions_flat() }

    pub fn velocities(&self) -> Vec<f32> { self.engine.velocities_flat() }

    pub fn orientations(&self) -> Vec<f32> { self.engine.orientations_flat() }

    pub fn kinds(&self) -> Vec<u32> { self.engine.kinds_flat() }

    pub fn stuck(&self) -> Vec<u32> { self.engine.stuck_flags() }
}
