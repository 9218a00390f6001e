// tests/arm_testkit.rs
//
// Shared helpers for engine scenario tests: a scripted agent that records
// the rewards it receives, a factory for it, a fixed-geometry scene and a
// fast-cycling config.
//
// Note: This module is included via #[path] from other test files.
// The dead_code warnings are suppressed because not all helpers are used
// in every test file that includes this module.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use armctl::agent::{AgentFactory, PolicyAgent};
use armctl::config::{AgentConfig, Config, PerceptionConfig};
use armctl::engine::{Engine, TickReport};
use armctl::error::ControlError;
use armctl::geometry::{Aabb, Vec3};
use armctl::host::StaticHost;
use armctl::logging::EventSink;
use armctl::perception::PerceptionTensor;
use armctl::state::ControlMode;
use armctl::types::ImageFrame;

/// Rewards as received by the agent, in order.
pub type RewardLog = Arc<Mutex<Vec<(f32, bool)>>>;

/// Agent that replays a fixed action list (then repeats the last one).
pub struct ScriptedAgent {
    actions: VecDeque<i64>,
    last: i64,
    rewards: RewardLog,
}

impl PolicyAgent for ScriptedAgent {
    fn version(&self) -> &str {
        "scripted"
    }

    fn select_action(&mut self, _tensor: &PerceptionTensor) -> Result<i64, ControlError> {
        if let Some(a) = self.actions.pop_front() {
            self.last = a;
        }
        Ok(self.last)
    }

    fn submit_reward(&mut self, reward: f32, terminal: bool) -> Result<(), ControlError> {
        self.rewards.lock().unwrap().push((reward, terminal));
        Ok(())
    }
}

#[derive(Clone)]
pub struct ScriptedFactory {
    pub actions: Vec<i64>,
    pub rewards: RewardLog,
}

impl ScriptedFactory {
    pub fn new(actions: Vec<i64>) -> Self {
        Self {
            actions,
            rewards: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rewards(&self) -> Vec<(f32, bool)> {
        self.rewards.lock().unwrap().clone()
    }
}

impl AgentFactory for ScriptedFactory {
    fn create(
        &self,
        _cfg: &AgentConfig,
        _num_actions: usize,
        _input: PerceptionConfig,
    ) -> Result<Box<dyn PolicyAgent>, ControlError> {
        Ok(Box::new(ScriptedAgent {
            actions: self.actions.iter().copied().collect(),
            last: self.actions.last().copied().unwrap_or(0),
            rewards: self.rewards.clone(),
        }))
    }
}

/// Default config with a 4-tick reset animation and no warm-up.
pub fn fast_config() -> Config {
    let mut cfg = Config::default();
    cfg.episode.animation_steps = 4;
    cfg.episode.agent_warmup_s = 0.0;
    cfg
}

pub fn target_box() -> Aabb {
    Aabb::around(Vec3::new(0.6, 0.0, 0.1), Vec3::new(0.04, 0.04, 0.1))
}

pub fn gripper_at(x: f32, min_z: f32) -> Aabb {
    Aabb::new(
        Vec3::new(x - 0.03, -0.03, min_z),
        Vec3::new(x + 0.03, 0.03, min_z + 0.06),
    )
}

/// Scene with the target at x = 0.6 and the gripper hovering at x = 0.2.
pub fn scene(cfg: &Config) -> StaticHost {
    let mut host = StaticHost::new().with_model(
        &cfg.scene.target_model,
        target_box(),
        Vec3::new(0.6, 0.0, 0.0),
    );
    host.place_link(&cfg.scene.gripper_link, gripper_at(0.2, 0.8));
    host
}

pub fn frame() -> ImageFrame {
    ImageFrame::packed(64, 64, 3, vec![128; 64 * 64 * 3])
}

/// Tick until the reset animation hands control to the agent.
pub fn run_until_agent_driven<S: EventSink>(
    engine: &mut Engine<ScriptedFactory, S>,
    host: &mut StaticHost,
    t: &mut f64,
) -> Vec<TickReport> {
    let mut reports = Vec::new();
    for _ in 0..10_000 {
        *t += 0.01;
        reports.push(engine.on_update(host, *t));
        if engine.mode() == ControlMode::AgentDriven {
            return reports;
        }
    }
    panic!("engine never left the scripted reset");
}

/// Deliver one frame and run one tick.
pub fn agent_tick<S: EventSink>(
    engine: &mut Engine<ScriptedFactory, S>,
    host: &mut StaticHost,
    t: &mut f64,
) -> TickReport {
    engine.perception_handle().ingest(&frame()).unwrap();
    *t += 0.01;
    engine.on_update(host, *t)
}
